//! Notification service: registration and the blocking consumer API.
//!
//! The service owns the live subscription set and a FIFO of signaled
//! subscriptions. Consumers block on the queue's condition variable; `close`
//! flips the open flag under the same lock and broadcasts, so every parked
//! consumer observes closure within that call.

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::WatchConfig;
use crate::error::{WatchError, WatchResult};
use crate::event::EventKind;
use crate::subscription::{Subscription, SubscriptionId};

/// Consumer-side surface shared by every notification service.
pub trait WatchService {
    /// Handle type produced for signaled registrations.
    type Key;

    /// Returns the next signaled key without blocking.
    fn poll(&self) -> WatchResult<Option<Self::Key>>;

    /// Waits up to `timeout` for a signaled key.
    fn poll_timeout(&self, timeout: Duration) -> WatchResult<Option<Self::Key>>;

    /// Waits until a key is signaled. Fails with [`WatchError::Closed`] once
    /// the service is closed and never returns a key after that.
    fn take(&self) -> WatchResult<Self::Key>;

    /// Closes the service, cancelling every key and waking every waiter.
    fn close(&self);

    /// Returns false once the service is closed.
    fn is_open(&self) -> bool;
}

struct SignalQueue<R, C> {
    open: bool,
    entries: VecDeque<Subscription<R, C>>,
}

impl<R, C> SignalQueue<R, C> {
    fn pop(&mut self) -> Option<Subscription<R, C>> {
        let sub = self.entries.pop_front()?;
        sub.queued_flag().store(false, Ordering::Release);
        Some(sub)
    }
}

pub(crate) struct Shared<R, C> {
    config: WatchConfig,
    next_id: AtomicU64,
    live: DashMap<SubscriptionId, Subscription<R, C>>,
    signaled: Mutex<SignalQueue<R, C>>,
    available: Condvar,
}

impl<R, C> Shared<R, C> {
    /// Appends a signaled subscription unless it is already queued.
    /// Returns false once the service is closed.
    pub(crate) fn enqueue(&self, sub: &Subscription<R, C>) -> bool {
        let mut queue = self.signaled.lock();
        if !queue.open {
            return false;
        }
        if sub.queued_flag().swap(true, Ordering::AcqRel) {
            return true;
        }
        queue.entries.push_back(sub.clone());
        drop(queue);
        self.available.notify_one();
        true
    }

    pub(crate) fn forget(&self, id: SubscriptionId) {
        self.live.remove(&id);
    }
}

/// In-process change-notification service.
///
/// Producers call [`Subscription::post`] then [`Subscription::signal`];
/// consumers retrieve signaled subscriptions with `poll`/`poll_timeout`/`take`,
/// drain them with [`Subscription::poll_events`] and re-arm them with
/// [`Subscription::reset`]. Handles are cheap to clone and share one service.
pub struct NotificationService<R, C> {
    shared: Arc<Shared<R, C>>,
}

impl<R, C> Clone for NotificationService<R, C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R, C> std::fmt::Debug for NotificationService<R, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationService")
            .field("config", &self.shared.config)
            .field("live", &self.shared.live.len())
            .field("open", &self.is_open())
            .finish()
    }
}

impl<R, C> NotificationService<R, C> {
    /// Creates a service with the default configuration.
    pub fn new() -> Self {
        Self::build(WatchConfig::default())
    }

    /// Creates a service with a validated configuration.
    pub fn with_config(config: WatchConfig) -> WatchResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: WatchConfig) -> Self {
        tracing::debug!(
            "Initializing notification service: capacity={}, coalesce_repeats={}",
            config.capacity,
            config.coalesce_repeats
        );

        Self {
            shared: Arc::new(Shared {
                config,
                next_id: AtomicU64::new(1),
                live: DashMap::new(),
                signaled: Mutex::new(SignalQueue {
                    open: true,
                    entries: VecDeque::new(),
                }),
                available: Condvar::new(),
            }),
        }
    }

    /// Returns the configuration every subscription is created with.
    pub fn config(&self) -> &WatchConfig {
        &self.shared.config
    }

    /// Registers interest in `kinds` on `resource`, returning a READY subscription.
    pub fn register<I>(&self, resource: R, kinds: I) -> WatchResult<Subscription<R, C>>
    where
        I: IntoIterator<Item = EventKind>,
    {
        let interest: HashSet<EventKind> = kinds.into_iter().collect();
        if interest.is_empty() {
            return Err(WatchError::EmptyInterestSet);
        }

        // Held across the insert so close() sees every subscription it must cancel.
        let queue = self.shared.signaled.lock();
        if !queue.open {
            return Err(WatchError::Closed);
        }

        let id = SubscriptionId::new(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let sub = Subscription::new(
            id,
            resource,
            interest,
            &self.shared.config,
            Arc::downgrade(&self.shared),
        );
        self.shared.live.insert(id, sub.clone());
        drop(queue);

        tracing::debug!("Registered subscription {}", id);

        Ok(sub)
    }

    /// Cancels a subscription created by this service.
    pub fn deregister(&self, sub: &Subscription<R, C>) -> WatchResult<()> {
        if !self.owns(sub) {
            return Err(WatchError::ForeignSubscription { id: sub.id() });
        }
        sub.cancel();
        Ok(())
    }

    /// Returns true if `sub` was created by this service.
    pub fn owns(&self, sub: &Subscription<R, C>) -> bool {
        sub.is_owned_by(&self.shared)
    }

    /// Returns the number of subscriptions not yet cancelled.
    pub fn live_count(&self) -> usize {
        self.shared.live.len()
    }

    /// Returns the number of subscriptions waiting for a consumer.
    pub fn signaled_count(&self) -> usize {
        self.shared.signaled.lock().entries.len()
    }

    /// Returns the next signaled subscription if one is immediately available.
    pub fn poll(&self) -> WatchResult<Option<Subscription<R, C>>> {
        let mut queue = self.shared.signaled.lock();
        if !queue.open {
            return Err(WatchError::Closed);
        }
        Ok(queue.pop())
    }

    /// Waits up to `timeout` for a signaled subscription.
    ///
    /// Returns early on a signal, and fails with [`WatchError::Closed`] as soon
    /// as the service is closed.
    pub fn poll_timeout(&self, timeout: Duration) -> WatchResult<Option<Subscription<R, C>>> {
        let deadline = match Instant::now().checked_add(timeout) {
            Some(deadline) => deadline,
            None => return self.take().map(Some),
        };

        let mut queue = self.shared.signaled.lock();
        loop {
            if !queue.open {
                return Err(WatchError::Closed);
            }
            if let Some(sub) = queue.pop() {
                return Ok(Some(sub));
            }
            if self
                .shared
                .available
                .wait_until(&mut queue, deadline)
                .timed_out()
            {
                if !queue.open {
                    return Err(WatchError::Closed);
                }
                return Ok(queue.pop());
            }
        }
    }

    /// Waits until a subscription is signaled or the service is closed.
    pub fn take(&self) -> WatchResult<Subscription<R, C>> {
        let mut queue = self.shared.signaled.lock();
        loop {
            if !queue.open {
                return Err(WatchError::Closed);
            }
            if let Some(sub) = queue.pop() {
                return Ok(sub);
            }
            self.shared.available.wait(&mut queue);
        }
    }

    /// Returns false once the service is closed.
    pub fn is_open(&self) -> bool {
        self.shared.signaled.lock().open
    }

    /// Closes the service. Idempotent.
    ///
    /// Wakes every consumer blocked in `poll_timeout`/`take` and cancels every
    /// live subscription.
    pub fn close(&self) {
        {
            let mut queue = self.shared.signaled.lock();
            if !queue.open {
                return;
            }
            queue.open = false;
            while queue.pop().is_some() {}
        }
        self.shared.available.notify_all();

        let live: Vec<Subscription<R, C>> = self
            .shared
            .live
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        let cancelled = live.len();
        for sub in live {
            sub.cancel();
        }

        tracing::debug!(
            "Closed notification service: cancelled {} subscriptions",
            cancelled
        );
    }
}

impl<R, C> Default for NotificationService<R, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, C> WatchService for NotificationService<R, C> {
    type Key = Subscription<R, C>;

    fn poll(&self) -> WatchResult<Option<Self::Key>> {
        NotificationService::poll(self)
    }

    fn poll_timeout(&self, timeout: Duration) -> WatchResult<Option<Self::Key>> {
        NotificationService::poll_timeout(self, timeout)
    }

    fn take(&self) -> WatchResult<Self::Key> {
        NotificationService::take(self)
    }

    fn close(&self) {
        NotificationService::close(self)
    }

    fn is_open(&self) -> bool {
        NotificationService::is_open(self)
    }
}
