//! A notification service that never signals anything.
//!
//! Backends without change detection hand this out so client code written
//! against [`WatchService`] still works: `poll` finds nothing, `take` parks
//! until `close`, then fails with [`WatchError::Closed`].

use parking_lot::{Condvar, Mutex};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;
use std::time::{Duration, Instant};

use crate::config::WatchConfig;
use crate::error::{WatchError, WatchResult};
use crate::event::EventKind;
use crate::service::WatchService;
use crate::subscription::{Subscription, SubscriptionId};

struct EmptyState<R, C> {
    open: bool,
    // Cancelled entries are pruned lazily; nothing notifies this service on cancel.
    registered: Vec<Subscription<R, C>>,
}

/// Always-empty [`WatchService`].
pub struct AlwaysEmptyService<R, C> {
    config: WatchConfig,
    next_id: AtomicU64,
    state: Mutex<EmptyState<R, C>>,
    closed: Condvar,
}

impl<R, C> AlwaysEmptyService<R, C> {
    /// Creates an open service.
    pub fn new() -> Self {
        Self {
            config: WatchConfig::default(),
            next_id: AtomicU64::new(1),
            state: Mutex::new(EmptyState {
                open: true,
                registered: Vec::new(),
            }),
            closed: Condvar::new(),
        }
    }

    /// Hands out a subscription that is never queued anywhere.
    ///
    /// Producers may still post to and signal it; nothing reaches a consumer.
    pub fn register<I>(&self, resource: R, kinds: I) -> WatchResult<Subscription<R, C>>
    where
        I: IntoIterator<Item = EventKind>,
    {
        let interest: HashSet<EventKind> = kinds.into_iter().collect();
        if interest.is_empty() {
            return Err(WatchError::EmptyInterestSet);
        }

        let mut state = self.state.lock();
        if !state.open {
            return Err(WatchError::Closed);
        }

        state.registered.retain(Subscription::is_valid);
        let id = SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let sub = Subscription::new(id, resource, interest, &self.config, Weak::new());
        state.registered.push(sub.clone());
        Ok(sub)
    }

    /// Returns the number of registered subscriptions not yet cancelled.
    pub fn live_count(&self) -> usize {
        let mut state = self.state.lock();
        state.registered.retain(Subscription::is_valid);
        state.registered.len()
    }

    fn wait_closed(&self, deadline: Option<Instant>) -> WatchResult<Option<Subscription<R, C>>> {
        let mut state = self.state.lock();
        while state.open {
            match deadline {
                Some(deadline) => {
                    if self.closed.wait_until(&mut state, deadline).timed_out() && state.open {
                        return Ok(None);
                    }
                }
                None => self.closed.wait(&mut state),
            }
        }
        Err(WatchError::Closed)
    }
}

impl<R, C> Default for AlwaysEmptyService<R, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, C> WatchService for AlwaysEmptyService<R, C> {
    type Key = Subscription<R, C>;

    fn poll(&self) -> WatchResult<Option<Self::Key>> {
        if !self.state.lock().open {
            return Err(WatchError::Closed);
        }
        Ok(None)
    }

    fn poll_timeout(&self, timeout: Duration) -> WatchResult<Option<Self::Key>> {
        self.wait_closed(Instant::now().checked_add(timeout))
    }

    fn take(&self) -> WatchResult<Self::Key> {
        self.wait_closed(None)?;
        Err(WatchError::Closed)
    }

    fn close(&self) {
        let registered = {
            let mut state = self.state.lock();
            if !state.open {
                return;
            }
            state.open = false;
            std::mem::take(&mut state.registered)
        };
        self.closed.notify_all();

        for sub in &registered {
            sub.cancel();
        }

        tracing::debug!(
            "Closed always-empty service: cancelled {} subscriptions",
            registered.len()
        );
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ChangeEvent;
    use crate::subscription::SubscriptionState;
    use std::sync::Arc;
    use std::thread;

    type Empty = AlwaysEmptyService<&'static str, u64>;

    #[test]
    fn test_poll_is_always_empty() {
        let svc = Empty::new();
        let sub = svc.register("/a", [EventKind::Create]).unwrap();
        sub.post(ChangeEvent::new(EventKind::Create, 1));
        sub.signal();

        assert!(svc.poll().unwrap().is_none());
        assert_eq!(sub.state(), SubscriptionState::Signaled);
    }

    #[test]
    fn test_poll_timeout_elapses() {
        let svc = Empty::new();
        let result = svc.poll_timeout(Duration::from_millis(20)).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_take_wakes_on_close() {
        let svc = Arc::new(Empty::new());
        let waiter = {
            let svc = Arc::clone(&svc);
            thread::spawn(move || svc.take())
        };

        thread::sleep(Duration::from_millis(50));
        svc.close();

        let result = waiter.join().unwrap();
        assert!(matches!(result, Err(WatchError::Closed)));
    }

    #[test]
    fn test_close_cancels_registered() {
        let svc = Empty::new();
        let sub = svc.register("/a", [EventKind::Create]).unwrap();
        svc.close();

        assert!(!sub.is_valid());
        assert!(!sub.reset());
        assert!(!svc.is_open());
    }

    #[test]
    fn test_calls_after_close_fail() {
        let svc = Empty::new();
        svc.close();
        svc.close();

        assert!(matches!(svc.poll(), Err(WatchError::Closed)));
        assert!(matches!(
            svc.poll_timeout(Duration::from_secs(60)),
            Err(WatchError::Closed)
        ));
        assert!(matches!(svc.take(), Err(WatchError::Closed)));
        assert!(matches!(
            svc.register("/a", [EventKind::Create]),
            Err(WatchError::Closed)
        ));
    }

    #[test]
    fn test_cancelled_subscriptions_are_not_retained() {
        let svc = Empty::new();
        for _ in 0..1000 {
            let sub = svc.register("/a", [EventKind::Modify]).unwrap();
            sub.cancel();
        }
        assert_eq!(svc.state.lock().registered.len(), 1);
        assert_eq!(svc.live_count(), 0);

        let kept = svc.register("/b", [EventKind::Modify]).unwrap();
        assert_eq!(svc.live_count(), 1);
        kept.cancel();
        assert_eq!(svc.live_count(), 0);
    }

    #[test]
    fn test_register_empty_interest_rejected() {
        let svc = Empty::new();
        let result = svc.register("/a", Vec::<EventKind>::new());
        assert!(matches!(result, Err(WatchError::EmptyInterestSet)));
    }
}
