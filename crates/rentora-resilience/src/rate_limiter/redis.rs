//! Redis rate limit store.
//!
//! Each window is a sorted set scored by request time. Pruning, counting and
//! recording run in one Lua script so concurrent instances see a consistent
//! count. Blocks are plain keys with a millisecond TTL.

use super::store::{RateLimitStore, WindowHit};
use crate::error::{RateLimitError, RateLimitResult};
use async_trait::async_trait;
use deadpool_redis::redis::{AsyncCommands, Script};
use deadpool_redis::Pool;
use uuid::Uuid;

const HIT_SCRIPT: &str = r"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local max = tonumber(ARGV[3])

redis.call('ZREMRANGEBYSCORE', key, '-inf', now - window)
local count = redis.call('ZCARD', key)
local admitted = 0
if count < max then
    redis.call('ZADD', key, now, ARGV[4])
    count = count + 1
    admitted = 1
end
redis.call('PEXPIRE', key, window)

local oldest = -1
local first = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
if first[2] then
    oldest = tonumber(first[2])
end
return {admitted, count, oldest}
";

/// Store shared by every instance through Redis.
pub struct RedisRateLimitStore {
    pool: Pool,
    prefix: String,
    hit: Script,
}

impl RedisRateLimitStore {
    #[must_use]
    pub fn new(pool: Pool, prefix: impl Into<String>) -> Self {
        Self {
            pool,
            prefix: prefix.into(),
            hit: Script::new(HIT_SCRIPT),
        }
    }

    fn window_key(&self, key: &str) -> String {
        format!("{}:window:{}", self.prefix, key)
    }

    fn block_key(&self, subject: &str) -> String {
        format!("{}:block:{}", self.prefix, subject)
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn hit(
        &self,
        key: &str,
        now_ms: i64,
        window_ms: i64,
        max_requests: u64,
    ) -> RateLimitResult<WindowHit> {
        let mut conn = self.pool.get().await?;
        // Same-millisecond requests need distinct members.
        let member = format!("{now_ms}-{}", Uuid::new_v4().simple());
        let reply: Vec<i64> = self
            .hit
            .key(self.window_key(key))
            .arg(now_ms)
            .arg(window_ms)
            .arg(max_requests)
            .arg(member)
            .invoke_async(&mut *conn)
            .await?;

        let [admitted, count, oldest] = reply[..] else {
            return Err(RateLimitError::Reply(format!("{reply:?}")));
        };
        Ok(WindowHit {
            admitted: admitted == 1,
            count: u64::try_from(count).unwrap_or_default(),
            oldest_ms: (oldest >= 0).then_some(oldest),
        })
    }

    async fn reset(&self, key: &str) -> RateLimitResult<()> {
        let mut conn = self.pool.get().await?;
        conn.del::<_, ()>(self.window_key(key)).await?;
        Ok(())
    }

    async fn block(&self, subject: &str, now_ms: i64, until_ms: i64) -> RateLimitResult<()> {
        let ttl_ms = u64::try_from(until_ms - now_ms).unwrap_or_default().max(1);
        let mut conn = self.pool.get().await?;
        conn.pset_ex::<_, _, ()>(self.block_key(subject), until_ms, ttl_ms)
            .await?;
        Ok(())
    }

    async fn blocked_until(&self, subject: &str, _now_ms: i64) -> RateLimitResult<Option<i64>> {
        let mut conn = self.pool.get().await?;
        let until: Option<i64> = conn.get(self.block_key(subject)).await?;
        Ok(until)
    }

    async fn unblock(&self, subject: &str) -> RateLimitResult<()> {
        let mut conn = self.pool.get().await?;
        conn.del::<_, ()>(self.block_key(subject)).await?;
        Ok(())
    }
}
