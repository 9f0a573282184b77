use thiserror::Error;

use crate::domain::NotificationId;

#[derive(Debug, Error)]
pub enum NotifqError {
    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("notification key type mismatch: expected={expected} actual={actual}")]
    KeyTypeMismatch { expected: String, actual: String },

    /// Ids are generated fresh per entry; seeing one twice is a caller bug.
    #[error("duplicate notification id={0}")]
    DuplicateNotification(NotificationId),

    #[error("notification queue already exists: {0}")]
    QueueAlreadyExists(String),

    #[error("notification queue not found: {0}")]
    QueueNotFound(String),

    #[error("notification queue is still started: {0}")]
    QueueStillStarted(String),

    #[error("duplicate handler for key_type={0}")]
    DuplicateHandler(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Failure reported by a notification handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Worth retrying later; the retry policy decides when.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Never retried.
    #[error("permanent failure: {0}")]
    Permanent(String),
}

impl From<NotifqError> for HandlerError {
    fn from(err: NotifqError) -> Self {
        HandlerError::Permanent(err.to_string())
    }
}
