//! Job error types.

use rentora_core::RentoraError;
use thiserror::Error;

/// Result type for job operations.
pub type JobResult<T> = Result<T, JobError>;

/// Job-related errors.
#[derive(Debug, Error)]
pub enum JobError {
    /// Handler failed in a way worth retrying.
    #[error("Job execution failed: {0}")]
    ExecutionFailed(String),

    /// Handler failed in a way retrying cannot fix.
    #[error("Job rejected: {0}")]
    Rejected(String),

    /// Job timed out.
    #[error("Job timed out after {0} seconds")]
    Timeout(u64),

    /// Payload could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage or domain error raised inside a handler.
    #[error(transparent)]
    Storage(#[from] RentoraError),

    /// Redis error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Redis pool error.
    #[error("Redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    /// Job not found.
    #[error("Job not found: {0}")]
    NotFound(String),

    /// No handler bound to the job's (queue, type) pair.
    #[error("No handler registered for {job_type} on queue {queue}")]
    HandlerNotFound { queue: String, job_type: String },

    /// A second handler was registered for the same pair.
    #[error("Duplicate handler for {job_type} on queue {queue}")]
    DuplicateHandler { queue: String, job_type: String },

    /// Scheduler error.
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl JobError {
    /// Returns true if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ExecutionFailed(_) | Self::Timeout(_) | Self::Redis(_) | Self::Pool(_) => true,
            Self::Storage(err) => err.is_retriable(),
            _ => false,
        }
    }

    /// Short label used for metrics and logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ExecutionFailed(_) => "execution_failed",
            Self::Rejected(_) => "rejected",
            Self::Timeout(_) => "timeout",
            Self::Serialization(_) => "serialization",
            Self::Storage(_) => "storage",
            Self::Redis(_) | Self::Pool(_) => "broker",
            Self::NotFound(_) => "not_found",
            Self::HandlerNotFound { .. } => "handler_not_found",
            Self::DuplicateHandler { .. } => "duplicate_handler",
            Self::Scheduler(_) => "scheduler",
            Self::Configuration(_) => "configuration",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable_execution_failed() {
        assert!(JobError::ExecutionFailed("oops".into()).is_retryable());
    }

    #[test]
    fn test_is_retryable_timeout() {
        assert!(JobError::Timeout(30).is_retryable());
    }

    #[test]
    fn test_storage_error_follows_inner_retriability() {
        assert!(JobError::from(RentoraError::Storage("down".into())).is_retryable());
        assert!(!JobError::from(RentoraError::validation("bad")).is_retryable());
    }

    #[test]
    fn test_is_not_retryable_configuration() {
        assert!(!JobError::Configuration("bad".into()).is_retryable());
        assert!(!JobError::Rejected("no".into()).is_retryable());
        assert!(!JobError::HandlerNotFound {
            queue: "q".into(),
            job_type: "t".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_is_not_retryable_serialization() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err = JobError::from(json_err);
        assert!(!err.is_retryable());
        assert_eq!(err.kind(), "serialization");
    }
}
