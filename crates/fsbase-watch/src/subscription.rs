//! Subscriptions: one registration of interest on one watched resource.
//!
//! A subscription owns a bounded, ordered event buffer and a
//! READY / SIGNALED / CANCELLED lifecycle. Each subscription is guarded by its
//! own lock, so producers and consumers working on different subscriptions
//! never contend. The owning service is reached through a weak handle and is
//! only touched to enqueue on signal or to forget on cancel.
//!
//! Lock order is subscription first, then the service's signaled queue.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Weak};

use crate::config::WatchConfig;
use crate::event::{ChangeEvent, EventKind};
use crate::service::Shared;

/// Identifies a subscription within the service that created it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Creates a new SubscriptionId from a raw u64 value
    pub fn new(id: u64) -> Self {
        SubscriptionId(id)
    }

    /// Returns the raw u64 value of this subscription ID
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SubscriptionState {
    /// Armed; the next signal enqueues it.
    #[default]
    Ready,
    /// Handed to (or waiting for) a consumer; further signals are no-ops until reset.
    Signaled,
    /// Terminal. New events are dropped.
    Cancelled,
}

struct Slot<C> {
    state: SubscriptionState,
    events: Vec<ChangeEvent<C>>,
}

struct Inner<R, C> {
    id: SubscriptionId,
    resource: R,
    interest: HashSet<EventKind>,
    capacity: usize,
    coalesce_repeats: bool,
    slot: Mutex<Slot<C>>,
    // Only flipped while the owner's queue lock is held.
    queued: AtomicBool,
    owner: Weak<Shared<R, C>>,
}

/// Handle to a registered subscription.
///
/// Handles are cheap to clone; every clone refers to the same subscription.
/// Equality is identity.
pub struct Subscription<R, C> {
    inner: Arc<Inner<R, C>>,
}

impl<R, C> Clone for Subscription<R, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R, C> PartialEq for Subscription<R, C> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<R, C> Eq for Subscription<R, C> {}

impl<R, C> fmt::Debug for Subscription<R, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("capacity", &self.inner.capacity)
            .finish()
    }
}

impl<R, C> Subscription<R, C> {
    pub(crate) fn new(
        id: SubscriptionId,
        resource: R,
        interest: HashSet<EventKind>,
        config: &WatchConfig,
        owner: Weak<Shared<R, C>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                id,
                resource,
                interest,
                capacity: config.capacity,
                coalesce_repeats: config.coalesce_repeats,
                slot: Mutex::new(Slot {
                    state: SubscriptionState::Ready,
                    events: Vec::new(),
                }),
                queued: AtomicBool::new(false),
                owner,
            }),
        }
    }

    /// Returns the id assigned at registration.
    pub fn id(&self) -> SubscriptionId {
        self.inner.id
    }

    /// Returns the watched resource.
    pub fn resource(&self) -> &R {
        &self.inner.resource
    }

    /// Returns the kinds this subscription was registered for.
    pub fn interest(&self) -> &HashSet<EventKind> {
        &self.inner.interest
    }

    /// Returns true if events of `kind` are wanted by this subscription.
    pub fn is_interested(&self, kind: &EventKind) -> bool {
        self.inner.interest.contains(kind)
    }

    /// Returns the number of ordinary events buffered before overflow kicks in.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> SubscriptionState {
        self.inner.slot.lock().state
    }

    /// Returns the number of buffered entries, overflow marker included.
    pub fn pending(&self) -> usize {
        self.inner.slot.lock().events.len()
    }

    /// Returns true until the subscription is cancelled.
    pub fn is_valid(&self) -> bool {
        self.state() != SubscriptionState::Cancelled
    }

    /// Marks the subscription as having events ready and makes it visible to
    /// the owning service's `poll`/`take`.
    ///
    /// Idempotent: signaling an already signaled subscription does nothing, so
    /// the subscription sits in the signaled queue at most once.
    pub fn signal(&self) {
        let mut slot = self.inner.slot.lock();
        if slot.state != SubscriptionState::Ready {
            return;
        }
        slot.state = SubscriptionState::Signaled;
        self.enqueue();
        tracing::trace!("Signaled subscription {}", self.inner.id);
    }

    /// Removes and returns everything buffered so far, in post order.
    ///
    /// Events posted after this call land in a fresh buffer. Residual events
    /// remain drainable after cancellation.
    pub fn poll_events(&self) -> Vec<ChangeEvent<C>> {
        let events = std::mem::take(&mut self.inner.slot.lock().events);
        if !events.is_empty() {
            tracing::trace!(
                "Drained {} events from subscription {}",
                events.len(),
                self.inner.id
            );
        }
        events
    }

    /// Re-arms a drained subscription.
    ///
    /// Returns to READY when nothing was posted since the last drain, otherwise
    /// puts the subscription straight back on the signaled queue. Returns false
    /// once the subscription is cancelled or its service has closed; callers
    /// stop draining at that point.
    pub fn reset(&self) -> bool {
        let mut slot = self.inner.slot.lock();
        let state = slot.state;
        match state {
            SubscriptionState::Cancelled => false,
            SubscriptionState::Ready => true,
            SubscriptionState::Signaled if slot.events.is_empty() => {
                slot.state = SubscriptionState::Ready;
                true
            }
            SubscriptionState::Signaled => {
                tracing::debug!(
                    "Re-queued subscription {} on reset: {} events pending",
                    self.inner.id,
                    slot.events.len()
                );
                self.enqueue()
            }
        }
    }

    /// Permanently cancels the subscription.
    ///
    /// Buffered events are kept for a final drain, and an entry already in
    /// the signaled queue stays there.
    pub fn cancel(&self) {
        {
            let mut slot = self.inner.slot.lock();
            if slot.state == SubscriptionState::Cancelled {
                return;
            }
            slot.state = SubscriptionState::Cancelled;
        }

        if let Some(owner) = self.inner.owner.upgrade() {
            owner.forget(self.inner.id);
        }

        tracing::debug!("Cancelled subscription {}", self.inner.id);
    }

    pub(crate) fn is_owned_by(&self, shared: &Arc<Shared<R, C>>) -> bool {
        std::ptr::eq(self.inner.owner.as_ptr(), Arc::as_ptr(shared))
    }

    pub(crate) fn queued_flag(&self) -> &AtomicBool {
        &self.inner.queued
    }

    // Called with the slot lock held. A subscription without a live owner has
    // nowhere to go and counts as enqueued.
    fn enqueue(&self) -> bool {
        match self.inner.owner.upgrade() {
            Some(owner) => owner.enqueue(self),
            None => true,
        }
    }
}

impl<R, C: PartialEq> Subscription<R, C> {
    /// Appends an event to the buffer. Producer-side hook.
    ///
    /// Events posted to a cancelled subscription are dropped. Once `capacity`
    /// events are buffered, further events collapse into a single trailing
    /// overflow marker whose count grows with every dropped event. A full
    /// buffer that already ends in an overflow event, whether synthesized or
    /// posted by the caller, absorbs the event into it.
    /// No interest-set filtering happens here; see [`Subscription::offer`].
    pub fn post(&self, event: ChangeEvent<C>) {
        let mut slot = self.inner.slot.lock();
        if slot.state == SubscriptionState::Cancelled {
            tracing::trace!(
                "Dropped {} event for cancelled subscription {}",
                event.kind(),
                self.inner.id
            );
            return;
        }

        let len = slot.events.len();

        if self.inner.coalesce_repeats && len <= self.inner.capacity {
            if let Some(last) = slot.events.last_mut() {
                if !last.is_overflow()
                    && last.kind() == event.kind()
                    && last.context() == event.context()
                {
                    last.absorb(event.count());
                    return;
                }
            }
        }

        if len < self.inner.capacity {
            slot.events.push(event);
            return;
        }

        if let Some(marker) = slot.events.last_mut().filter(|last| last.is_overflow()) {
            marker.absorb(event.count());
            return;
        }

        tracing::warn!(
            "Subscription {} overflowed at {} events",
            self.inner.id,
            self.inner.capacity
        );
        slot.events.push(ChangeEvent::marker(event.count()));
    }

    /// Posts the event only if its kind is in the interest set.
    ///
    /// Returns whether the event was accepted.
    pub fn offer(&self, event: ChangeEvent<C>) -> bool {
        if !self.is_interested(event.kind()) {
            return false;
        }
        self.post(event);
        true
    }
}
