#![warn(missing_docs)]

//! fsbase watch subsystem: in-process change notification for custom filesystem backends
//!
//! Backends register a [`Subscription`] per watched resource, post
//! [`ChangeEvent`]s to it as changes are observed and signal it. Client threads
//! pick signaled subscriptions off the [`NotificationService`] with
//! `poll`/`poll_timeout`/`take`, drain them and re-arm them with `reset`.
//! How changes are discovered is up to the backend.

pub mod config;
pub mod empty;
pub mod error;
pub mod event;
pub mod service;
pub mod subscription;

pub use config::{WatchConfig, DEFAULT_CAPACITY};
pub use empty::AlwaysEmptyService;
pub use error::{WatchError, WatchResult};
pub use event::{ChangeEvent, EventKind};
pub use service::{NotificationService, WatchService};
pub use subscription::{Subscription, SubscriptionId, SubscriptionState};
