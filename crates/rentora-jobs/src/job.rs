//! Job model.

use crate::error::JobResult;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Unique job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Creates a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the job ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A typed job payload bound to one (queue, job type) pair.
pub trait JobPayload: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Handler selection key.
    const JOB_TYPE: &'static str;

    /// Queue the job is pushed onto.
    const QUEUE: &'static str;

    /// Key identifying "the same" job for deduplication, if any.
    fn dedup_key(&self) -> Option<String> {
        None
    }
}

/// Options accepted by `enqueue`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnqueueOptions {
    /// Earliest-eligibility offset; zero means immediate.
    pub delay: Duration,
    /// Overrides the queue default.
    pub max_attempts: Option<u32>,
    /// While a job with this key is live on the queue, enqueue returns its id.
    pub dedup_key: Option<String>,
}

impl EnqueueOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Delay until `run_at`, or none if it has already passed.
    #[must_use]
    pub fn run_at(self, run_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let delay = (run_at - now).to_std().unwrap_or_default();
        self.delay(delay)
    }

    #[must_use]
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    #[must_use]
    pub fn dedup_key(mut self, key: impl Into<String>) -> Self {
        self.dedup_key = Some(key.into());
        self
    }
}

/// Serialized job as stored by a broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobData {
    pub id: JobId,
    pub queue: String,
    pub job_type: String,
    pub payload: serde_json::Value,
    /// Times the job has been reserved by a worker.
    pub attempts: u32,
    pub max_attempts: u32,
    pub created_at: DateTime<Utc>,
    /// Earliest time the job may run.
    pub scheduled_at: DateTime<Utc>,
    pub reserved_at: Option<DateTime<Utc>>,
    pub dedup_key: Option<String>,
    pub last_error: Option<String>,
    pub failed_at: Option<DateTime<Utc>>,
}

impl JobData {
    /// Builds a job ready to push.
    pub fn new(
        queue: impl Into<String>,
        job_type: impl Into<String>,
        payload: serde_json::Value,
        max_attempts: u32,
        now: DateTime<Utc>,
        delay: Duration,
    ) -> Self {
        let delay = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX);
        Self {
            id: JobId::new(),
            queue: queue.into(),
            job_type: job_type.into(),
            payload,
            attempts: 0,
            max_attempts,
            created_at: now,
            scheduled_at: now.checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC),
            reserved_at: None,
            dedup_key: None,
            last_error: None,
            failed_at: None,
        }
    }

    /// Deserializes the payload.
    pub fn payload<P: DeserializeOwned>(&self) -> JobResult<P> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    /// Returns true if the job may not run before `now`.
    pub fn is_delayed(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at > now
    }

    /// Returns true when no attempts remain.
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    pub fn to_json(&self) -> JobResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> JobResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Execution context handed to a handler.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: JobId,
    pub queue: String,
    pub job_type: String,
    /// 1-based attempt number.
    pub attempt: u32,
    pub max_attempts: u32,
    pub started_at: DateTime<Utc>,
    pub worker_id: String,
}

impl JobContext {
    pub fn new(job: &JobData, worker_id: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            job_id: job.id.clone(),
            queue: job.queue.clone(),
            job_type: job.job_type.clone(),
            attempt: job.attempts,
            max_attempts: job.max_attempts,
            started_at,
            worker_id: worker_id.into(),
        }
    }

    /// Returns true if a failure now will be terminal.
    pub fn is_last_attempt(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_delayed_job_schedule() {
        let now = Utc::now();
        let job = JobData::new("q", "t", json!({}), 3, now, Duration::from_secs(1800));
        assert!(job.is_delayed(now));
        assert!(!job.is_delayed(now + chrono::Duration::minutes(30)));
    }

    #[test]
    fn test_run_at_in_past_is_immediate() {
        let now = Utc::now();
        let opts = EnqueueOptions::new().run_at(now - chrono::Duration::hours(1), now);
        assert_eq!(opts.delay, Duration::ZERO);

        let opts = EnqueueOptions::new().run_at(now + chrono::Duration::seconds(90), now);
        assert_eq!(opts.delay, Duration::from_secs(90));
    }

    #[test]
    fn test_exhaustion() {
        let mut job = JobData::new("q", "t", json!(null), 2, Utc::now(), Duration::ZERO);
        assert!(!job.is_exhausted());
        job.attempts = 2;
        assert!(job.is_exhausted());
        let ctx = JobContext::new(&job, "w", Utc::now());
        assert!(ctx.is_last_attempt());
    }

    #[test]
    fn test_typed_payload() {
        #[derive(Serialize, Deserialize)]
        struct Ping {
            n: u32,
        }
        let job = JobData::new("q", "ping", json!({ "n": 7 }), 1, Utc::now(), Duration::ZERO);
        assert_eq!(job.payload::<Ping>().unwrap().n, 7);
        assert!(job.payload::<Vec<u8>>().is_err());
    }
}
