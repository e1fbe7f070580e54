//! Side-effect-only job lifecycle hooks.
//!
//! Observers see `active`, `completed` and `failed` transitions. A panicking
//! observer is caught and logged; it can never change the job's outcome.

use crate::error::JobError;
use crate::job::JobData;
use crate::metrics::JobMetrics;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// What happens to a job after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    /// Requeued to run again after `delay`.
    Retrying { delay: Duration },
    /// No further attempts; retained for operators.
    Terminal,
}

/// Observation hooks.
pub trait JobObserver: Send + Sync {
    fn on_active(&self, _job: &JobData) {}

    fn on_completed(&self, _job: &JobData, _elapsed: Duration) {}

    fn on_failed(&self, _job: &JobData, _error: &JobError, _disposition: FailureDisposition) {}
}

/// Fans hook calls out to every observer, isolating panics.
#[derive(Clone, Default)]
pub struct Observers {
    observers: Vec<Arc<dyn JobObserver>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, observer: Arc<dyn JobObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Logging and metrics observers.
    pub fn standard() -> Self {
        Self::new()
            .with(Arc::new(LoggingObserver))
            .with(Arc::new(MetricsObserver))
    }

    pub fn active(&self, job: &JobData) {
        self.each("active", |o| o.on_active(job));
    }

    pub fn completed(&self, job: &JobData, elapsed: Duration) {
        self.each("completed", |o| o.on_completed(job, elapsed));
    }

    pub fn failed(&self, job: &JobData, err: &JobError, disposition: FailureDisposition) {
        self.each("failed", |o| o.on_failed(job, err, disposition));
    }

    fn each(&self, hook: &'static str, f: impl Fn(&dyn JobObserver)) {
        for observer in &self.observers {
            if catch_unwind(AssertUnwindSafe(|| f(observer.as_ref()))).is_err() {
                error!(hook, "Job observer panicked");
            }
        }
    }
}

/// Logs every transition.
pub struct LoggingObserver;

impl JobObserver for LoggingObserver {
    fn on_active(&self, job: &JobData) {
        info!(
            job_id = %job.id,
            queue = %job.queue,
            job_type = %job.job_type,
            attempt = job.attempts,
            "Job active"
        );
    }

    fn on_completed(&self, job: &JobData, elapsed: Duration) {
        info!(
            job_id = %job.id,
            queue = %job.queue,
            job_type = %job.job_type,
            elapsed_ms = elapsed.as_millis(),
            "Job completed"
        );
    }

    fn on_failed(&self, job: &JobData, err: &JobError, disposition: FailureDisposition) {
        match disposition {
            FailureDisposition::Retrying { delay } => warn!(
                job_id = %job.id,
                queue = %job.queue,
                job_type = %job.job_type,
                attempt = job.attempts,
                max_attempts = job.max_attempts,
                retry_in_ms = delay.as_millis(),
                error = %err,
                "Job failed, retrying"
            ),
            FailureDisposition::Terminal => error!(
                job_id = %job.id,
                queue = %job.queue,
                job_type = %job.job_type,
                attempt = job.attempts,
                max_attempts = job.max_attempts,
                payload = %job.payload,
                error = %err,
                "Job failed terminally"
            ),
        }
    }
}

/// Records job metrics.
pub struct MetricsObserver;

impl JobObserver for MetricsObserver {
    fn on_active(&self, job: &JobData) {
        JobMetrics::job_started(&job.queue, &job.job_type);
    }

    fn on_completed(&self, job: &JobData, elapsed: Duration) {
        JobMetrics::job_completed(&job.queue, &job.job_type, elapsed);
    }

    fn on_failed(&self, job: &JobData, err: &JobError, disposition: FailureDisposition) {
        match disposition {
            FailureDisposition::Retrying { .. } => {
                JobMetrics::job_retried(&job.queue, &job.job_type, err.kind());
            }
            FailureDisposition::Terminal => {
                JobMetrics::job_failed(&job.queue, &job.job_type, err.kind());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Panicking;

    impl JobObserver for Panicking {
        fn on_completed(&self, _job: &JobData, _elapsed: Duration) {
            panic!("observer bug");
        }
    }

    #[derive(Default)]
    struct Counting(AtomicU32);

    impl JobObserver for Counting {
        fn on_completed(&self, _job: &JobData, _elapsed: Duration) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_panicking_observer_does_not_stop_siblings() {
        let counting = Arc::new(Counting::default());
        let observers = Observers::new()
            .with(Arc::new(Panicking))
            .with(counting.clone());
        let job = JobData::new("q", "t", serde_json::json!({}), 1, Utc::now(), Duration::ZERO);

        observers.completed(&job, Duration::from_millis(5));
        assert_eq!(counting.0.load(Ordering::SeqCst), 1);
    }
}
