//! In-process broker for tests and single-instance deployments.

use crate::broker::{PushOutcome, QueueBroker, QueueCounts};
use crate::error::{JobError, JobResult};
use crate::job::{JobData, JobId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
struct QueueState {
    /// Waiting, delayed and active jobs.
    jobs: HashMap<JobId, JobData>,
    waiting: VecDeque<JobId>,
    /// Keyed by (eligible at, insertion sequence) so equal times stay FIFO.
    delayed: BTreeMap<(DateTime<Utc>, u64), JobId>,
    active: HashSet<JobId>,
    failed: VecDeque<JobData>,
    completed: u64,
    dedup: HashMap<String, JobId>,
}

impl QueueState {
    fn promote_due(&mut self, now: DateTime<Utc>) {
        while let Some(entry) = self.delayed.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let id = entry.remove();
            self.waiting.push_back(id);
        }
    }

    fn release_dedup(&mut self, job: &JobData) {
        if let Some(key) = &job.dedup_key {
            if self.dedup.get(key) == Some(&job.id) {
                self.dedup.remove(key);
            }
        }
    }
}

/// Broker holding every queue in process memory.
///
/// Nothing survives a restart; use the Redis broker where durability matters.
pub struct InMemoryBroker {
    queues: Mutex<HashMap<String, QueueState>>,
    seq: AtomicU64,
    retain_failed: usize,
}

impl InMemoryBroker {
    /// Creates a broker retaining up to `retain_failed` terminal failures per queue.
    pub fn new(retain_failed: usize) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            seq: AtomicU64::new(0),
            retain_failed,
        }
    }

    /// Jobs not yet reserved (waiting, then delayed by due time).
    pub fn pending_jobs(&self, queue: &str) -> Vec<JobData> {
        let queues = self.queues.lock();
        let Some(state) = queues.get(queue) else {
            return Vec::new();
        };
        state
            .waiting
            .iter()
            .chain(state.delayed.values())
            .filter_map(|id| state.jobs.get(id).cloned())
            .collect()
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl QueueBroker for InMemoryBroker {
    async fn push(&self, job: JobData, now: DateTime<Utc>) -> JobResult<PushOutcome> {
        let seq = self.next_seq();
        let mut queues = self.queues.lock();
        let state = queues.entry(job.queue.clone()).or_default();

        if let Some(key) = &job.dedup_key {
            if let Some(existing) = state.dedup.get(key) {
                if state.jobs.contains_key(existing) {
                    return Ok(PushOutcome::Duplicate(existing.clone()));
                }
            }
            state.dedup.insert(key.clone(), job.id.clone());
        }

        let id = job.id.clone();
        if job.is_delayed(now) {
            state.delayed.insert((job.scheduled_at, seq), id.clone());
        } else {
            state.waiting.push_back(id.clone());
        }
        state.jobs.insert(id.clone(), job);
        Ok(PushOutcome::Enqueued(id))
    }

    async fn reserve(&self, queue: &str, now: DateTime<Utc>) -> JobResult<Option<JobData>> {
        let mut queues = self.queues.lock();
        let Some(state) = queues.get_mut(queue) else {
            return Ok(None);
        };
        state.promote_due(now);

        while let Some(id) = state.waiting.pop_front() {
            let Some(job) = state.jobs.get_mut(&id) else {
                continue;
            };
            job.attempts += 1;
            job.reserved_at = Some(now);
            let reserved = job.clone();
            state.active.insert(id);
            return Ok(Some(reserved));
        }
        Ok(None)
    }

    async fn complete(&self, job: &JobData) -> JobResult<()> {
        let mut queues = self.queues.lock();
        let state = queues
            .get_mut(&job.queue)
            .ok_or_else(|| JobError::NotFound(job.id.to_string()))?;
        if !state.active.remove(&job.id) {
            return Err(JobError::NotFound(job.id.to_string()));
        }
        state.jobs.remove(&job.id);
        state.release_dedup(job);
        state.completed += 1;
        Ok(())
    }

    async fn retry(&self, job: &JobData, run_at: DateTime<Utc>) -> JobResult<()> {
        let seq = self.next_seq();
        let mut queues = self.queues.lock();
        let state = queues
            .get_mut(&job.queue)
            .ok_or_else(|| JobError::NotFound(job.id.to_string()))?;
        if !state.active.remove(&job.id) {
            return Err(JobError::NotFound(job.id.to_string()));
        }
        let mut requeued = job.clone();
        requeued.scheduled_at = run_at;
        requeued.reserved_at = None;
        state.delayed.insert((run_at, seq), job.id.clone());
        state.jobs.insert(job.id.clone(), requeued);
        Ok(())
    }

    async fn bury(&self, job: &JobData) -> JobResult<()> {
        let mut queues = self.queues.lock();
        let state = queues
            .get_mut(&job.queue)
            .ok_or_else(|| JobError::NotFound(job.id.to_string()))?;
        state.active.remove(&job.id);
        state.jobs.remove(&job.id);
        state.release_dedup(job);
        state.failed.push_front(job.clone());
        state.failed.truncate(self.retain_failed);
        Ok(())
    }

    async fn requeue_stalled(
        &self,
        queue: &str,
        reserved_before: DateTime<Utc>,
    ) -> JobResult<usize> {
        let mut queues = self.queues.lock();
        let Some(state) = queues.get_mut(queue) else {
            return Ok(0);
        };
        let stalled: Vec<JobId> = state
            .active
            .iter()
            .filter(|id| {
                state
                    .jobs
                    .get(*id)
                    .and_then(|j| j.reserved_at)
                    .is_some_and(|at| at < reserved_before)
            })
            .cloned()
            .collect();
        for id in &stalled {
            state.active.remove(id);
            if let Some(job) = state.jobs.get_mut(id) {
                job.reserved_at = None;
            }
            state.waiting.push_back(id.clone());
        }
        Ok(stalled.len())
    }

    async fn counts(&self, queue: &str) -> JobResult<QueueCounts> {
        let queues = self.queues.lock();
        Ok(queues.get(queue).map_or_else(QueueCounts::default, |s| QueueCounts {
            waiting: s.waiting.len() as u64,
            delayed: s.delayed.len() as u64,
            active: s.active.len() as u64,
            completed: s.completed,
            failed: s.failed.len() as u64,
        }))
    }

    async fn failed_jobs(&self, queue: &str, limit: usize) -> JobResult<Vec<JobData>> {
        let queues = self.queues.lock();
        Ok(queues
            .get(queue)
            .map(|s| s.failed.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn ping(&self) -> JobResult<()> {
        Ok(())
    }
}
