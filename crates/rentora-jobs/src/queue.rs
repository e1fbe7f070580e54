//! Producer-side facade over a broker.

use crate::broker::{PushOutcome, QueueBroker, QueueCounts};
use crate::error::JobResult;
use crate::job::{EnqueueOptions, JobData, JobId, JobPayload};
use crate::metrics::JobMetrics;
use rentora_config::JobsConfig;
use rentora_core::SharedClock;
use std::sync::Arc;
use tracing::debug;

/// Enqueues jobs and reports queue health.
#[derive(Clone)]
pub struct JobQueue {
    broker: Arc<dyn QueueBroker>,
    clock: SharedClock,
    default_max_attempts: u32,
}

impl JobQueue {
    pub fn new(
        broker: Arc<dyn QueueBroker>,
        clock: SharedClock,
        default_max_attempts: u32,
    ) -> Self {
        Self {
            broker,
            clock,
            default_max_attempts: default_max_attempts.max(1),
        }
    }

    pub fn from_config(
        broker: Arc<dyn QueueBroker>,
        clock: SharedClock,
        config: &JobsConfig,
    ) -> Self {
        Self::new(broker, clock, config.max_attempts)
    }

    /// Admits a job. With a dedup key matching a live job, returns that
    /// job's id and admits nothing.
    pub async fn enqueue(
        &self,
        queue: &str,
        job_type: &str,
        payload: serde_json::Value,
        opts: EnqueueOptions,
    ) -> JobResult<JobId> {
        self.push(queue, job_type, payload, opts)
            .await
            .map(PushOutcome::into_job_id)
    }

    /// Like [`JobQueue::enqueue`], but reports whether the job was admitted
    /// or matched a live duplicate.
    pub async fn push(
        &self,
        queue: &str,
        job_type: &str,
        payload: serde_json::Value,
        opts: EnqueueOptions,
    ) -> JobResult<PushOutcome> {
        let now = self.clock.now();
        let mut job = JobData::new(
            queue,
            job_type,
            payload,
            opts.max_attempts.unwrap_or(self.default_max_attempts).max(1),
            now,
            opts.delay,
        );
        job.dedup_key = opts.dedup_key;

        match self.broker.push(job, now).await? {
            PushOutcome::Enqueued(id) => {
                debug!(
                    job_id = %id,
                    queue = %queue,
                    job_type = %job_type,
                    delay_ms = opts.delay.as_millis(),
                    "Job enqueued"
                );
                JobMetrics::job_enqueued(queue, job_type);
                Ok(PushOutcome::Enqueued(id))
            }
            PushOutcome::Duplicate(id) => {
                debug!(job_id = %id, queue = %queue, job_type = %job_type, "Job already queued");
                JobMetrics::job_deduplicated(queue, job_type);
                Ok(PushOutcome::Duplicate(id))
            }
        }
    }

    /// Enqueues a typed payload on its own queue. The payload's dedup key
    /// applies unless `opts` sets one.
    pub async fn enqueue_job<P: JobPayload>(
        &self,
        payload: &P,
        opts: EnqueueOptions,
    ) -> JobResult<JobId> {
        self.push_job(payload, opts)
            .await
            .map(PushOutcome::into_job_id)
    }

    /// Typed counterpart of [`JobQueue::push`].
    pub async fn push_job<P: JobPayload>(
        &self,
        payload: &P,
        mut opts: EnqueueOptions,
    ) -> JobResult<PushOutcome> {
        if opts.dedup_key.is_none() {
            opts.dedup_key = payload.dedup_key();
        }
        let value = serde_json::to_value(payload)?;
        self.push(P::QUEUE, P::JOB_TYPE, value, opts).await
    }

    pub async fn counts(&self, queue: &str) -> JobResult<QueueCounts> {
        let counts = self.broker.counts(queue).await?;
        JobMetrics::queue_counts(queue, &counts);
        Ok(counts)
    }

    pub async fn failed_jobs(&self, queue: &str, limit: usize) -> JobResult<Vec<JobData>> {
        self.broker.failed_jobs(queue, limit).await
    }

    /// Returns true when the broker answers.
    pub async fn is_ready(&self) -> bool {
        self.broker.ping().await.is_ok()
    }

    pub fn broker(&self) -> &Arc<dyn QueueBroker> {
        &self.broker
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBroker;
    use rentora_core::ManualClock;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Serialize, Deserialize)]
    struct Expire {
        booking: String,
    }

    impl JobPayload for Expire {
        const JOB_TYPE: &'static str = "expire";
        const QUEUE: &'static str = "bookings";

        fn dedup_key(&self) -> Option<String> {
            Some(format!("expire:{}", self.booking))
        }
    }

    fn queue() -> (JobQueue, Arc<InMemoryBroker>) {
        let broker = Arc::new(InMemoryBroker::default());
        let clock = Arc::new(ManualClock::starting_now());
        (JobQueue::new(broker.clone(), clock, 3), broker)
    }

    #[tokio::test]
    async fn test_payload_dedup_key_is_applied() {
        let (queue, broker) = queue();
        let payload = Expire { booking: "b1".into() };

        let first = queue.enqueue_job(&payload, EnqueueOptions::new()).await.unwrap();
        let second = queue
            .enqueue_job(&payload, EnqueueOptions::new().delay(Duration::from_secs(60)))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(broker.pending_jobs("bookings").len(), 1);
    }

    #[tokio::test]
    async fn test_push_job_reports_duplicates() {
        let (queue, _) = queue();
        let payload = Expire { booking: "b2".into() };

        let first = queue.push_job(&payload, EnqueueOptions::new()).await.unwrap();
        let second = queue.push_job(&payload, EnqueueOptions::new()).await.unwrap();

        assert!(matches!(first, PushOutcome::Enqueued(_)));
        assert!(matches!(&second, PushOutcome::Duplicate(id) if id == first.job_id()));
    }

    #[tokio::test]
    async fn test_default_max_attempts() {
        let (queue, broker) = queue();
        queue
            .enqueue("q", "t", serde_json::json!({}), EnqueueOptions::new())
            .await
            .unwrap();
        queue
            .enqueue("q", "t", serde_json::json!({}), EnqueueOptions::new().max_attempts(7))
            .await
            .unwrap();

        let attempts: Vec<u32> = broker.pending_jobs("q").iter().map(|j| j.max_attempts).collect();
        assert_eq!(attempts, vec![3, 7]);
        assert!(queue.is_ready().await);
    }
}
