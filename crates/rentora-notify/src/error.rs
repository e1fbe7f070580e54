//! Notification errors.

use rentora_core::{Channel, RentoraError, UserId};
use rentora_jobs::JobError;
use thiserror::Error;

/// Result type for notification operations.
pub type NotifyResult<T> = Result<T, NotifyError>;

#[derive(Debug, Error)]
pub enum NotifyError {
    /// Provider rejected or failed a send.
    #[error("{channel} provider failed: {message}")]
    Provider { channel: Channel, message: String },

    /// The recipient has no address for the channel.
    #[error("User has no {0} address")]
    NoAddress(Channel),

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("Notification not found: {0}")]
    NotificationNotFound(String),

    /// Every channel failed for the request.
    #[error("Delivery failed on every channel: {0}")]
    Undelivered(String),

    #[error(transparent)]
    Storage(#[from] RentoraError),

    #[error(transparent)]
    Queue(#[from] JobError),
}

impl NotifyError {
    pub fn provider(channel: Channel, message: impl Into<String>) -> Self {
        Self::Provider {
            channel,
            message: message.into(),
        }
    }
}

impl From<NotifyError> for JobError {
    fn from(err: NotifyError) -> Self {
        match err {
            NotifyError::Storage(e) => JobError::Storage(e),
            NotifyError::Queue(e) => e,
            NotifyError::UserNotFound(_) | NotifyError::NotificationNotFound(_) => {
                JobError::Rejected(err.to_string())
            }
            NotifyError::Provider { .. }
            | NotifyError::NoAddress(_)
            | NotifyError::Undelivered(_) => {
                JobError::ExecutionFailed(err.to_string())
            }
        }
    }
}
