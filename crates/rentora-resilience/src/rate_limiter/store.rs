//! Storage port for window entries and blocks.

use crate::error::RateLimitResult;
use async_trait::async_trait;

/// Window state after one admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    /// Whether the attempt was recorded.
    pub admitted: bool,
    /// Entries in the window, including this attempt when admitted.
    pub count: u64,
    /// Timestamp (ms) of the oldest entry still in the window.
    pub oldest_ms: Option<i64>,
}

/// Backing store for sliding windows and the block list.
///
/// Timestamps are Unix milliseconds taken from the limiter's clock.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Drops entries at or before `now_ms - window_ms`, then records `now_ms`
    /// if fewer than `max_requests` remain. Must be atomic per key.
    async fn hit(
        &self,
        key: &str,
        now_ms: i64,
        window_ms: i64,
        max_requests: u64,
    ) -> RateLimitResult<WindowHit>;

    /// Clears every entry of a window.
    async fn reset(&self, key: &str) -> RateLimitResult<()>;

    /// Blocks `subject` until `until_ms`.
    async fn block(&self, subject: &str, now_ms: i64, until_ms: i64) -> RateLimitResult<()>;

    /// Returns the block expiry if `subject` is blocked at `now_ms`.
    async fn blocked_until(&self, subject: &str, now_ms: i64) -> RateLimitResult<Option<i64>>;

    /// Lifts a block.
    async fn unblock(&self, subject: &str) -> RateLimitResult<()>;
}
