//! Broker abstraction the job queue is built on.

use crate::error::JobResult;
use crate::job::{JobData, JobId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Result of pushing a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// The job was admitted.
    Enqueued(JobId),
    /// A live job with the same dedup key exists; nothing was admitted.
    Duplicate(JobId),
}

impl PushOutcome {
    /// The id of the admitted or pre-existing job.
    pub fn job_id(&self) -> &JobId {
        match self {
            Self::Enqueued(id) | Self::Duplicate(id) => id,
        }
    }

    pub fn into_job_id(self) -> JobId {
        match self {
            Self::Enqueued(id) | Self::Duplicate(id) => id,
        }
    }
}

/// Per-queue job counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub waiting: u64,
    pub delayed: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Durable, at-least-once job storage.
///
/// A reserved job stays "active" until it is completed, retried or buried;
/// active jobs older than a visibility cutoff can be requeued after a crash.
#[async_trait]
pub trait QueueBroker: Send + Sync {
    /// Admits a job. A job with `scheduled_at` in the future waits in the
    /// delayed set until it is due.
    async fn push(&self, job: JobData, now: DateTime<Utc>) -> JobResult<PushOutcome>;

    /// Promotes due delayed jobs, then reserves the oldest waiting job.
    ///
    /// The returned job has `attempts` incremented and `reserved_at` set.
    async fn reserve(&self, queue: &str, now: DateTime<Utc>) -> JobResult<Option<JobData>>;

    /// Acknowledges a successfully processed job.
    async fn complete(&self, job: &JobData) -> JobResult<()>;

    /// Moves an active job back to the delayed set until `run_at`.
    async fn retry(&self, job: &JobData, run_at: DateTime<Utc>) -> JobResult<()>;

    /// Moves an active job to the retained terminal-failure set.
    async fn bury(&self, job: &JobData) -> JobResult<()>;

    /// Requeues active jobs reserved before `reserved_before`.
    async fn requeue_stalled(&self, queue: &str, reserved_before: DateTime<Utc>)
        -> JobResult<usize>;

    /// Job counts for a queue.
    async fn counts(&self, queue: &str) -> JobResult<QueueCounts>;

    /// Most recent terminal failures, newest first.
    async fn failed_jobs(&self, queue: &str, limit: usize) -> JobResult<Vec<JobData>>;

    /// Checks the broker is reachable.
    async fn ping(&self) -> JobResult<()>;
}
