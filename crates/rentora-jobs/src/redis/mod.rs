//! Redis-backed broker and connection helpers.

mod broker;

pub use broker::RedisBroker;

use crate::error::{JobError, JobResult};
use deadpool_redis::{Config, Pool, Runtime};
use rentora_config::RedisConfig;
use tracing::info;

/// Create a Redis connection pool and check it answers `PING`.
pub async fn create_pool(config: &RedisConfig) -> JobResult<Pool> {
    info!(url = %config.url, "Creating Redis connection pool");

    let pool = Config::from_url(&config.url)
        .builder()
        .map_err(|e| JobError::Configuration(format!("Invalid Redis config: {e}")))?
        .max_size(config.pool_size)
        .wait_timeout(Some(config.connect_timeout()))
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| JobError::Configuration(format!("Failed to create pool: {e}")))?;

    let mut conn = pool.get().await?;
    redis::cmd("PING").query_async::<String>(&mut *conn).await?;

    info!("Redis connection pool created successfully");

    Ok(pool)
}

/// Redis key builder for queues.
#[derive(Debug, Clone)]
pub struct RedisKeys {
    prefix: String,
}

impl RedisKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Job body (string: JSON).
    pub fn job(&self, job_id: &str) -> String {
        format!("{}:job:{}", self.prefix, job_id)
    }

    /// Waiting jobs (list, FIFO).
    pub fn waiting(&self, queue: &str) -> String {
        format!("{}:{}:wait", self.prefix, queue)
    }

    /// Delayed jobs (sorted set by eligibility time in ms).
    pub fn delayed(&self, queue: &str) -> String {
        format!("{}:{}:delayed", self.prefix, queue)
    }

    /// Active jobs (hash: job id -> reserved-at ms).
    pub fn active(&self, queue: &str) -> String {
        format!("{}:{}:active", self.prefix, queue)
    }

    /// Terminal failures (sorted set by failure time in ms).
    pub fn failed(&self, queue: &str) -> String {
        format!("{}:{}:failed", self.prefix, queue)
    }

    /// Counters (hash).
    pub fn stats(&self, queue: &str) -> String {
        format!("{}:{}:stats", self.prefix, queue)
    }

    /// Dedup key claim (string: job id).
    pub fn dedup(&self, queue: &str, key: &str) -> String {
        format!("{}:{}:dedup:{}", self.prefix, queue, key)
    }

    /// Scheduler leadership lock.
    pub fn leader_lock(&self) -> String {
        format!("{}:scheduler:leader", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_namespaced_per_queue() {
        let keys = RedisKeys::new("rentora");
        assert_eq!(keys.waiting("bookings"), "rentora:bookings:wait");
        assert_eq!(keys.delayed("bookings"), "rentora:bookings:delayed");
        assert_eq!(keys.job("abc"), "rentora:job:abc");
        assert_eq!(keys.dedup("payments", "release:1"), "rentora:payments:dedup:release:1");
        assert_ne!(keys.active("a"), keys.active("b"));
    }
}
