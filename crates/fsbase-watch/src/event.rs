//! Change events delivered to subscribers.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

use crate::error::{WatchError, WatchResult};

/// Kind of change carried by a [`ChangeEvent`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// An entry was created under the watched resource.
    Create,
    /// An entry under the watched resource was modified.
    Modify,
    /// An entry was removed from the watched resource.
    Delete,
    /// Events were lost because the subscription buffer was full.
    Overflow,
    /// Backend-defined kind.
    Custom(Cow<'static, str>),
}

impl EventKind {
    /// Builds a backend-defined kind from a static name.
    pub const fn custom(name: &'static str) -> Self {
        EventKind::Custom(Cow::Borrowed(name))
    }

    /// Returns the display name of this kind.
    pub fn name(&self) -> &str {
        match self {
            EventKind::Create => "create",
            EventKind::Modify => "modify",
            EventKind::Delete => "delete",
            EventKind::Overflow => "overflow",
            EventKind::Custom(name) => name.as_ref(),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An immutable change notification: a kind, a repeat count and an opaque context.
///
/// The context typically identifies which child of the watched resource changed.
/// Overflow events carry no context; their count records how many raw events
/// were collapsed into them.
///
/// Deserialized events go through the same checks as [`ChangeEvent::with_count`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "RawChangeEvent<C>",
    bound(deserialize = "C: Deserialize<'de>")
)]
pub struct ChangeEvent<C> {
    kind: EventKind,
    count: u32,
    context: Option<C>,
}

// Wire shape of a ChangeEvent before validation.
#[derive(Deserialize)]
struct RawChangeEvent<C> {
    kind: EventKind,
    count: u32,
    context: Option<C>,
}

impl<C> TryFrom<RawChangeEvent<C>> for ChangeEvent<C> {
    type Error = WatchError;

    fn try_from(raw: RawChangeEvent<C>) -> WatchResult<Self> {
        Self::checked(raw.kind, raw.count, raw.context)
    }
}

impl<C> ChangeEvent<C> {
    /// Creates a single-occurrence event.
    ///
    /// An [`EventKind::Overflow`] event never carries a context, so `context`
    /// is dropped for that kind.
    pub fn new(kind: EventKind, context: C) -> Self {
        Self::build(kind, 1, Some(context))
    }

    /// Creates an event standing for `count` occurrences.
    ///
    /// As with [`ChangeEvent::new`], the context is dropped for overflow events.
    pub fn with_count(kind: EventKind, count: u32, context: C) -> WatchResult<Self> {
        Self::checked(kind, count, Some(context))
    }

    /// Creates an overflow marker summarizing `count` dropped events.
    pub fn overflow(count: u32) -> WatchResult<Self> {
        Self::checked(EventKind::Overflow, count, None)
    }

    fn checked(kind: EventKind, count: u32, context: Option<C>) -> WatchResult<Self> {
        if count == 0 {
            return Err(WatchError::InvalidCount { count });
        }
        Ok(Self::build(kind, count, context))
    }

    fn build(kind: EventKind, count: u32, context: Option<C>) -> Self {
        let context = if kind == EventKind::Overflow {
            None
        } else {
            context
        };
        Self {
            kind,
            count,
            context,
        }
    }

    /// Returns the kind of this event.
    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// Returns how many occurrences this event stands for.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Returns the context, absent for overflow markers.
    pub fn context(&self) -> Option<&C> {
        self.context.as_ref()
    }

    /// Consumes the event, returning its context.
    pub fn into_context(self) -> Option<C> {
        self.context
    }

    /// Returns true if this is an overflow marker.
    pub fn is_overflow(&self) -> bool {
        self.kind == EventKind::Overflow
    }

    pub(crate) fn marker(count: u32) -> Self {
        Self {
            kind: EventKind::Overflow,
            count: count.max(1),
            context: None,
        }
    }

    // Buffer-internal: events are immutable once they leave the subscription.
    pub(crate) fn absorb(&mut self, count: u32) {
        self.count = self.count.saturating_add(count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_event_has_count_one() {
        let event = ChangeEvent::new(EventKind::Create, "a.txt");
        assert_eq!(event.count(), 1);
        assert_eq!(event.kind(), &EventKind::Create);
        assert_eq!(event.context(), Some(&"a.txt"));
        assert!(!event.is_overflow());
    }

    #[test]
    fn test_with_count_rejects_zero() {
        let result = ChangeEvent::with_count(EventKind::Modify, 0, "a.txt");
        assert!(matches!(result, Err(WatchError::InvalidCount { count: 0 })));
    }

    #[test]
    fn test_with_count_accepts_positive() {
        let event = ChangeEvent::with_count(EventKind::Modify, 4, "a.txt").unwrap();
        assert_eq!(event.count(), 4);
    }

    #[test]
    fn test_overflow_has_no_context() {
        let event = ChangeEvent::<String>::overflow(3).unwrap();
        assert!(event.is_overflow());
        assert_eq!(event.count(), 3);
        assert!(event.context().is_none());
    }

    #[test]
    fn test_overflow_rejects_zero() {
        assert!(ChangeEvent::<u64>::overflow(0).is_err());
    }

    #[test]
    fn test_absorb_saturates() {
        let mut event = ChangeEvent::<u64>::overflow(u32::MAX - 1).unwrap();
        event.absorb(5);
        assert_eq!(event.count(), u32::MAX);
    }

    #[test]
    fn test_equality_is_by_value() {
        let a = ChangeEvent::new(EventKind::Delete, 7u64);
        let b = ChangeEvent::new(EventKind::Delete, 7u64);
        let c = ChangeEvent::new(EventKind::Delete, 8u64);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_custom_kind_name() {
        let kind = EventKind::custom("attrib");
        assert_eq!(kind.name(), "attrib");
        assert_eq!(kind.to_string(), "attrib");
        assert_eq!(kind, EventKind::Custom(Cow::Owned("attrib".to_string())));
    }

    #[test]
    fn test_event_serializes() {
        let event = ChangeEvent::new(EventKind::Create, "x".to_string());
        let json = serde_json::to_string(&event).unwrap();
        let back: ChangeEvent<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_deserialize_rejects_zero_count() {
        let json = r#"{"kind":"Modify","count":0,"context":"x"}"#;
        let result = serde_json::from_str::<ChangeEvent<String>>(json);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Invalid event count: 0"));
    }

    #[test]
    fn test_deserialize_overflow_without_context() {
        let json = r#"{"kind":"Overflow","count":7}"#;
        let event: ChangeEvent<String> = serde_json::from_str(json).unwrap();
        assert!(event.is_overflow());
        assert_eq!(event.count(), 7);
        assert!(event.context().is_none());
    }

    #[test]
    fn test_overflow_kind_drops_context() {
        let event = ChangeEvent::new(EventKind::Overflow, "a.txt");
        assert!(event.is_overflow());
        assert!(event.context().is_none());

        let event = ChangeEvent::with_count(EventKind::Overflow, 3, "a.txt").unwrap();
        assert_eq!(event.count(), 3);
        assert!(event.context().is_none());

        let json = r#"{"kind":"Overflow","count":2,"context":"x"}"#;
        let event: ChangeEvent<String> = serde_json::from_str(json).unwrap();
        assert!(event.context().is_none());
    }
}
