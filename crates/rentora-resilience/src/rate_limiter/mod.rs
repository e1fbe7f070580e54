//! Sliding-window rate limiter.
//!
//! Requests are counted per `(subject, endpoint)` over a trailing window.
//! A subject on the block list is denied on every endpoint until the block
//! expires. When the store cannot be reached the limiter fails open.

mod memory;
mod redis;
mod store;

pub use self::redis::RedisRateLimitStore;
pub use memory::InMemoryRateLimitStore;
pub use store::{RateLimitStore, WindowHit};

use crate::error::RateLimitResult;
use chrono::{DateTime, TimeDelta, Utc};
use metrics::counter;
use rentora_config::RateLimitConfig;
use rentora_core::{RentoraError, RentoraResult, SharedClock};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Requests left in the current window.
    pub remaining: u64,
    /// When the next slot frees up, or when the block ends.
    pub reset_time: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Time until `reset_time`, zero if it has passed.
    #[must_use]
    pub fn retry_after(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.reset_time - now).to_std().unwrap_or_default()
    }

    /// Maps a denial to [`RentoraError::RateLimitExceeded`].
    pub fn ensure_allowed(&self) -> RentoraResult<()> {
        if self.allowed {
            Ok(())
        } else {
            Err(RentoraError::RateLimitExceeded)
        }
    }
}

/// Limits applied by a [`RateLimiter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_requests: u64,
    pub window: TimeDelta,
    /// Block a subject this long once it exceeds the window.
    pub block_duration: Option<TimeDelta>,
}

impl RateLimitPolicy {
    #[must_use]
    pub fn new(max_requests: u64, window: TimeDelta) -> Self {
        Self {
            max_requests,
            window,
            block_duration: None,
        }
    }

    #[must_use]
    pub fn with_block_duration(mut self, block: TimeDelta) -> Self {
        self.block_duration = Some(block);
        self
    }
}

fn millis(ms: u64) -> TimeDelta {
    i64::try_from(ms)
        .ok()
        .and_then(TimeDelta::try_milliseconds)
        .unwrap_or(TimeDelta::MAX)
}

impl From<&RateLimitConfig> for RateLimitPolicy {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests,
            window: millis(config.window_ms),
            block_duration: config.block_duration_ms.map(millis),
        }
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Sliding-window rate limiter over a pluggable store.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    policy: RateLimitPolicy,
    clock: SharedClock,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn RateLimitStore>,
        policy: RateLimitPolicy,
        clock: SharedClock,
    ) -> Self {
        Self {
            store,
            policy,
            clock,
        }
    }

    #[must_use]
    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Time until `decision` resets, by this limiter's clock.
    #[must_use]
    pub fn retry_after(&self, decision: &RateLimitDecision) -> std::time::Duration {
        decision.retry_after(self.clock.now())
    }

    /// Checks and records one request, allowing it if the store fails.
    pub async fn check(&self, subject: &str, endpoint: &str) -> RateLimitDecision {
        match self.try_check(subject, endpoint).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(
                    subject,
                    endpoint,
                    error = %e,
                    "Rate limit store unavailable, allowing request"
                );
                counter!("rentora_rate_limit_store_errors_total").increment(1);
                RateLimitDecision {
                    allowed: true,
                    remaining: self.policy.max_requests,
                    reset_time: self.clock.now() + self.policy.window,
                }
            }
        }
    }

    /// Checks and records one request, surfacing store errors.
    pub async fn try_check(
        &self,
        subject: &str,
        endpoint: &str,
    ) -> RateLimitResult<RateLimitDecision> {
        let now = self.clock.now();
        let now_ms = now.timestamp_millis();

        if let Some(until) = self.store.blocked_until(subject, now_ms).await? {
            counter!("rentora_rate_limit_denied_total", "reason" => "blocked").increment(1);
            return Ok(RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_time: from_millis(until),
            });
        }

        let key = format!("{subject}:{endpoint}");
        let hit = self
            .store
            .hit(
                &key,
                now_ms,
                self.policy.window.num_milliseconds(),
                self.policy.max_requests,
            )
            .await?;
        let reset_time = hit.oldest_ms.map_or(now, from_millis) + self.policy.window;

        if hit.admitted {
            return Ok(RateLimitDecision {
                allowed: true,
                remaining: self.policy.max_requests.saturating_sub(hit.count),
                reset_time,
            });
        }

        counter!("rentora_rate_limit_denied_total", "reason" => "window").increment(1);
        debug!(subject, endpoint, count = hit.count, "Rate limit exceeded");

        if let Some(block) = self.policy.block_duration {
            let until = now + block;
            self.store
                .block(subject, now_ms, until.timestamp_millis())
                .await?;
            warn!(subject, until = %until, "Subject blocked after exceeding rate limit");
            return Ok(RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_time: until,
            });
        }

        Ok(RateLimitDecision {
            allowed: false,
            remaining: 0,
            reset_time,
        })
    }

    /// Denies `subject` on every endpoint for `duration`.
    pub async fn block(&self, subject: &str, duration: TimeDelta) -> RateLimitResult<()> {
        let now = self.clock.now();
        self.store
            .block(subject, now.timestamp_millis(), (now + duration).timestamp_millis())
            .await
    }

    pub async fn unblock(&self, subject: &str) -> RateLimitResult<()> {
        self.store.unblock(subject).await
    }

    /// Forgets every request `subject` made against `endpoint`.
    pub async fn reset(&self, subject: &str, endpoint: &str) -> RateLimitResult<()> {
        self.store.reset(&format!("{subject}:{endpoint}")).await
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
