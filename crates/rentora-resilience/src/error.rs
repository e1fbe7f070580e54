//! Rate limiter errors.

use thiserror::Error;

/// Errors raised by a rate limit store.
#[derive(Error, Debug)]
pub enum RateLimitError {
    /// Redis pool exhausted or unreachable.
    #[error("Rate limit store connection failed: {0}")]
    Connection(#[from] deadpool_redis::PoolError),

    /// Command or script failed.
    #[error("Rate limit store command failed: {0}")]
    Command(#[from] deadpool_redis::redis::RedisError),

    /// Malformed reply from the store.
    #[error("Unexpected rate limit store reply: {0}")]
    Reply(String),
}

/// Result type for rate limit store operations.
pub type RateLimitResult<T> = Result<T, RateLimitError>;
