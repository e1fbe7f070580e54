//! Redis broker.

use super::RedisKeys;
use crate::broker::{PushOutcome, QueueBroker, QueueCounts};
use crate::error::JobResult;
use crate::job::{JobData, JobId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_redis::Pool;
use redis::{AsyncCommands, Script};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Moves due delayed ids onto the waiting list.
const PROMOTE_SCRIPT: &str = r"
local ids = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, ARGV[2])
for _, id in ipairs(ids) do
    redis.call('ZREM', KEYS[1], id)
    redis.call('RPUSH', KEYS[2], id)
end
return #ids
";

/// Pops a waiting id and records it as active in one step.
const RESERVE_SCRIPT: &str = r"
local id = redis.call('LPOP', KEYS[1])
if not id then
    return false
end
redis.call('HSET', KEYS[2], id, ARGV[1])
return id
";

/// Deletes a key only while it still holds the expected value.
const COMPARE_AND_DELETE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

/// Records a terminal failure and drops the job's dedup claim atomically.
///
/// KEYS: job body, active hash, failed set, dedup key (optional).
/// ARGV: job JSON, job id, failed-at ms.
const BURY_SCRIPT: &str = r"
redis.call('SET', KEYS[1], ARGV[1])
redis.call('HDEL', KEYS[2], ARGV[2])
redis.call('ZADD', KEYS[3], ARGV[3], ARGV[2])
if KEYS[4] and redis.call('GET', KEYS[4]) == ARGV[2] then
    redis.call('DEL', KEYS[4])
end
return 1
";

const PROMOTE_BATCH: usize = 100;

/// Dedup claims outlive the job's delay by this long.
const DEDUP_GRACE_SECS: u64 = 7 * 24 * 60 * 60;

/// Broker storing queues in Redis lists, sorted sets and hashes.
pub struct RedisBroker {
    pool: Pool,
    keys: RedisKeys,
    retain_failed: usize,
    promote: Script,
    reserve: Script,
    bury: Script,
    compare_and_delete: Script,
}

/// A dedup claim only suppresses new jobs while its holder can still run.
fn holds_live_job(body_exists: bool, failed_at: Option<f64>) -> bool {
    body_exists && failed_at.is_none()
}

impl RedisBroker {
    pub fn new(pool: Pool, key_prefix: impl Into<String>, retain_failed: usize) -> Self {
        Self {
            pool,
            keys: RedisKeys::new(key_prefix),
            retain_failed,
            promote: Script::new(PROMOTE_SCRIPT),
            reserve: Script::new(RESERVE_SCRIPT),
            bury: Script::new(BURY_SCRIPT),
            compare_and_delete: Script::new(COMPARE_AND_DELETE_SCRIPT),
        }
    }

    async fn release_dedup(
        &self,
        conn: &mut deadpool_redis::Connection,
        job: &JobData,
    ) -> JobResult<()> {
        if let Some(key) = &job.dedup_key {
            let _: i32 = self
                .compare_and_delete
                .key(self.keys.dedup(&job.queue, key))
                .arg(job.id.as_str())
                .invoke_async(&mut **conn)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl QueueBroker for RedisBroker {
    async fn push(&self, job: JobData, now: DateTime<Utc>) -> JobResult<PushOutcome> {
        let mut conn = self.pool.get().await?;

        if let Some(key) = &job.dedup_key {
            let dedup_key = self.keys.dedup(&job.queue, key);
            let delay_secs = u64::try_from((job.scheduled_at - now).num_seconds()).unwrap_or(0);
            let ttl = delay_secs + DEDUP_GRACE_SECS;

            let claimed: Option<String> = redis::cmd("SET")
                .arg(&dedup_key)
                .arg(job.id.as_str())
                .arg("NX")
                .arg("EX")
                .arg(ttl)
                .query_async(&mut *conn)
                .await?;

            if claimed.is_none() {
                let existing: Option<String> = conn.get(&dedup_key).await?;
                if let Some(existing) = existing {
                    let (body_exists, failed_at): (bool, Option<f64>) = redis::pipe()
                        .exists(self.keys.job(&existing))
                        .zscore(self.keys.failed(&job.queue), &existing)
                        .query_async(&mut *conn)
                        .await?;
                    if holds_live_job(body_exists, failed_at) {
                        debug!(queue = %job.queue, dedup_key = %key, "Duplicate job suppressed");
                        return Ok(PushOutcome::Duplicate(JobId::from(existing)));
                    }
                }
                let _: () = conn.set_ex(&dedup_key, job.id.as_str(), ttl).await?;
            }
        }

        let json = job.to_json()?;
        let mut pipe = redis::pipe();
        pipe.atomic().set(self.keys.job(job.id.as_str()), json).ignore();
        if job.is_delayed(now) {
            pipe.zadd(
                self.keys.delayed(&job.queue),
                job.id.as_str(),
                job.scheduled_at.timestamp_millis(),
            )
            .ignore();
        } else {
            pipe.rpush(self.keys.waiting(&job.queue), job.id.as_str()).ignore();
        }
        pipe.query_async::<()>(&mut *conn).await?;

        Ok(PushOutcome::Enqueued(job.id))
    }

    async fn reserve(&self, queue: &str, now: DateTime<Utc>) -> JobResult<Option<JobData>> {
        let mut conn = self.pool.get().await?;
        let now_ms = now.timestamp_millis();

        let promoted: i64 = self
            .promote
            .key(self.keys.delayed(queue))
            .key(self.keys.waiting(queue))
            .arg(now_ms)
            .arg(PROMOTE_BATCH)
            .invoke_async(&mut *conn)
            .await?;
        if promoted > 0 {
            debug!(queue = %queue, promoted, "Promoted delayed jobs");
        }

        loop {
            let id: Option<String> = self
                .reserve
                .key(self.keys.waiting(queue))
                .key(self.keys.active(queue))
                .arg(now_ms)
                .invoke_async(&mut *conn)
                .await?;
            let Some(id) = id else {
                return Ok(None);
            };

            let body: Option<String> = conn.get(self.keys.job(&id)).await?;
            let Some(body) = body else {
                warn!(queue = %queue, job_id = %id, "Dropping id with no job body");
                let _: () = conn.hdel(self.keys.active(queue), &id).await?;
                continue;
            };

            let mut job = JobData::from_json(&body)?;
            job.attempts += 1;
            job.reserved_at = Some(now);
            let _: () = conn.set(self.keys.job(&id), job.to_json()?).await?;
            return Ok(Some(job));
        }
    }

    async fn complete(&self, job: &JobData) -> JobResult<()> {
        let mut conn = self.pool.get().await?;
        redis::pipe()
            .atomic()
            .hdel(self.keys.active(&job.queue), job.id.as_str())
            .ignore()
            .del(self.keys.job(job.id.as_str()))
            .ignore()
            .hincr(self.keys.stats(&job.queue), "completed", 1)
            .ignore()
            .query_async::<()>(&mut *conn)
            .await?;
        self.release_dedup(&mut conn, job).await
    }

    async fn retry(&self, job: &JobData, run_at: DateTime<Utc>) -> JobResult<()> {
        let mut requeued = job.clone();
        requeued.scheduled_at = run_at;
        requeued.reserved_at = None;

        let mut conn = self.pool.get().await?;
        redis::pipe()
            .atomic()
            .set(self.keys.job(job.id.as_str()), requeued.to_json()?)
            .ignore()
            .hdel(self.keys.active(&job.queue), job.id.as_str())
            .ignore()
            .zadd(
                self.keys.delayed(&job.queue),
                job.id.as_str(),
                run_at.timestamp_millis(),
            )
            .ignore()
            .query_async::<()>(&mut *conn)
            .await?;
        Ok(())
    }

    async fn bury(&self, job: &JobData) -> JobResult<()> {
        let failed_at = job.failed_at.unwrap_or_else(Utc::now);
        let failed_key = self.keys.failed(&job.queue);

        let mut conn = self.pool.get().await?;
        let mut invocation = self.bury.prepare_invoke();
        invocation
            .key(self.keys.job(job.id.as_str()))
            .key(self.keys.active(&job.queue))
            .key(&failed_key)
            .arg(job.to_json()?)
            .arg(job.id.as_str())
            .arg(failed_at.timestamp_millis());
        if let Some(key) = &job.dedup_key {
            invocation.key(self.keys.dedup(&job.queue, key));
        }
        let _: i32 = invocation.invoke_async(&mut *conn).await?;

        let retain = isize::try_from(self.retain_failed).unwrap_or(isize::MAX);
        let evicted: Vec<String> = conn.zrange(&failed_key, 0, -(retain + 1)).await?;
        if !evicted.is_empty() {
            let job_keys: Vec<String> = evicted.iter().map(|id| self.keys.job(id)).collect();
            let _: () = conn.del(job_keys).await?;
            let _: () = conn.zrem(&failed_key, &evicted).await?;
        }
        Ok(())
    }

    async fn requeue_stalled(
        &self,
        queue: &str,
        reserved_before: DateTime<Utc>,
    ) -> JobResult<usize> {
        let mut conn = self.pool.get().await?;
        let active: HashMap<String, i64> = conn.hgetall(self.keys.active(queue)).await?;
        let cutoff = reserved_before.timestamp_millis();

        let mut requeued = 0;
        for (id, reserved_ms) in active {
            if reserved_ms >= cutoff {
                continue;
            }
            let removed: i64 = conn.hdel(self.keys.active(queue), &id).await?;
            if removed == 1 {
                let _: () = conn.rpush(self.keys.waiting(queue), &id).await?;
                requeued += 1;
            }
        }
        Ok(requeued)
    }

    async fn counts(&self, queue: &str) -> JobResult<QueueCounts> {
        let mut conn = self.pool.get().await?;
        let (waiting, delayed, active, completed, failed): (u64, u64, u64, Option<u64>, u64) =
            redis::pipe()
                .llen(self.keys.waiting(queue))
                .zcard(self.keys.delayed(queue))
                .hlen(self.keys.active(queue))
                .hget(self.keys.stats(queue), "completed")
                .zcard(self.keys.failed(queue))
                .query_async(&mut *conn)
                .await?;
        Ok(QueueCounts {
            waiting,
            delayed,
            active,
            completed: completed.unwrap_or(0),
            failed,
        })
    }

    async fn failed_jobs(&self, queue: &str, limit: usize) -> JobResult<Vec<JobData>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.pool.get().await?;
        let stop = isize::try_from(limit).unwrap_or(isize::MAX) - 1;
        let ids: Vec<String> = conn.zrevrange(self.keys.failed(queue), 0, stop).await?;

        let mut jobs = Vec::with_capacity(ids.len());
        for id in ids {
            let body: Option<String> = conn.get(self.keys.job(&id)).await?;
            if let Some(body) = body {
                jobs.push(JobData::from_json(&body)?);
            }
        }
        Ok(jobs)
    }

    async fn ping(&self) -> JobResult<()> {
        let mut conn = self.pool.get().await?;
        redis::cmd("PING").query_async::<String>(&mut *conn).await?;
        Ok(())
    }
}
