//! Error types for the change-notification service.

use thiserror::Error;

use crate::subscription::SubscriptionId;

/// Result type alias for watch operations.
pub type WatchResult<T> = Result<T, WatchError>;

/// Error variants for watch operations.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The service has been closed; no further subscriptions will ever be signaled.
    #[error("Watch service is closed")]
    Closed,

    /// A registration named no event kinds.
    #[error("Interest set must contain at least one event kind")]
    EmptyInterestSet,

    /// The subscription was created by a different service instance.
    #[error("Subscription {id} does not belong to this service")]
    ForeignSubscription {
        /// The offending subscription.
        id: SubscriptionId,
    },

    /// Change events carry a count of at least one.
    #[error("Invalid event count: {count} (must be >= 1)")]
    InvalidCount {
        /// The rejected count.
        count: u32,
    },

    /// Configuration failed validation.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the problem.
        reason: String,
    },

    /// Wraps standard I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WatchError {
    /// Returns true for the terminal closed-service condition.
    pub fn is_closed(&self) -> bool {
        matches!(self, WatchError::Closed)
    }
}
