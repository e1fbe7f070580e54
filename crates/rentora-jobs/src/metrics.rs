//! Prometheus metrics for queue and trigger monitoring.

use crate::broker::QueueCounts;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Metric names.
pub mod names {
    pub const JOBS_ENQUEUED_TOTAL: &str = "rentora_jobs_enqueued_total";
    pub const JOBS_DEDUPLICATED_TOTAL: &str = "rentora_jobs_deduplicated_total";
    pub const JOBS_STARTED_TOTAL: &str = "rentora_jobs_started_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "rentora_jobs_completed_total";
    pub const JOBS_RETRIED_TOTAL: &str = "rentora_jobs_retried_total";
    pub const JOBS_FAILED_TOTAL: &str = "rentora_jobs_failed_total";

    pub const JOBS_WAITING: &str = "rentora_jobs_waiting";
    pub const JOBS_DELAYED: &str = "rentora_jobs_delayed";
    pub const JOBS_ACTIVE: &str = "rentora_jobs_active";
    pub const JOBS_FAILED_RETAINED: &str = "rentora_jobs_failed_retained";

    pub const JOB_DURATION_SECONDS: &str = "rentora_job_duration_seconds";

    pub const TRIGGERS_FIRED_TOTAL: &str = "rentora_triggers_fired_total";
    pub const TRIGGERS_FAILED_TOTAL: &str = "rentora_triggers_failed_total";
    pub const TRIGGER_DURATION_SECONDS: &str = "rentora_trigger_duration_seconds";
    pub const SCHEDULER_IS_LEADER: &str = "rentora_scheduler_is_leader";
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(names::JOBS_ENQUEUED_TOTAL, "Total number of jobs enqueued");
    describe_counter!(
        names::JOBS_DEDUPLICATED_TOTAL,
        "Enqueue calls answered with an existing job"
    );
    describe_counter!(names::JOBS_STARTED_TOTAL, "Total number of job attempts started");
    describe_counter!(
        names::JOBS_COMPLETED_TOTAL,
        "Total number of jobs completed successfully"
    );
    describe_counter!(names::JOBS_RETRIED_TOTAL, "Total number of job retries scheduled");
    describe_counter!(
        names::JOBS_FAILED_TOTAL,
        "Total number of jobs that failed terminally"
    );

    describe_gauge!(names::JOBS_WAITING, "Jobs waiting to run");
    describe_gauge!(names::JOBS_DELAYED, "Jobs waiting for their delay to pass");
    describe_gauge!(names::JOBS_ACTIVE, "Jobs currently running");
    describe_gauge!(names::JOBS_FAILED_RETAINED, "Terminal failures retained");

    describe_histogram!(names::JOB_DURATION_SECONDS, "Job execution duration in seconds");

    describe_counter!(names::TRIGGERS_FIRED_TOTAL, "Trigger firings");
    describe_counter!(names::TRIGGERS_FAILED_TOTAL, "Trigger firings that returned an error");
    describe_histogram!(names::TRIGGER_DURATION_SECONDS, "Trigger run duration in seconds");
    describe_gauge!(
        names::SCHEDULER_IS_LEADER,
        "Whether this instance fires triggers (1) or not (0)"
    );
}

/// Job metrics recorder.
pub struct JobMetrics;

impl JobMetrics {
    pub fn job_enqueued(queue: &str, job_type: &str) {
        counter!(
            names::JOBS_ENQUEUED_TOTAL,
            "queue" => queue.to_string(),
            "job_type" => job_type.to_string()
        )
        .increment(1);
    }

    pub fn job_deduplicated(queue: &str, job_type: &str) {
        counter!(
            names::JOBS_DEDUPLICATED_TOTAL,
            "queue" => queue.to_string(),
            "job_type" => job_type.to_string()
        )
        .increment(1);
    }

    pub fn job_started(queue: &str, job_type: &str) {
        counter!(
            names::JOBS_STARTED_TOTAL,
            "queue" => queue.to_string(),
            "job_type" => job_type.to_string()
        )
        .increment(1);
    }

    pub fn job_completed(queue: &str, job_type: &str, duration: Duration) {
        counter!(
            names::JOBS_COMPLETED_TOTAL,
            "queue" => queue.to_string(),
            "job_type" => job_type.to_string()
        )
        .increment(1);

        histogram!(
            names::JOB_DURATION_SECONDS,
            "queue" => queue.to_string(),
            "job_type" => job_type.to_string()
        )
        .record(duration.as_secs_f64());
    }

    pub fn job_retried(queue: &str, job_type: &str, error_kind: &'static str) {
        counter!(
            names::JOBS_RETRIED_TOTAL,
            "queue" => queue.to_string(),
            "job_type" => job_type.to_string(),
            "error" => error_kind
        )
        .increment(1);
    }

    pub fn job_failed(queue: &str, job_type: &str, error_kind: &'static str) {
        counter!(
            names::JOBS_FAILED_TOTAL,
            "queue" => queue.to_string(),
            "job_type" => job_type.to_string(),
            "error" => error_kind
        )
        .increment(1);
    }

    /// Publishes a queue's current depth.
    #[allow(clippy::cast_precision_loss)]
    pub fn queue_counts(queue: &str, counts: &QueueCounts) {
        gauge!(names::JOBS_WAITING, "queue" => queue.to_string()).set(counts.waiting as f64);
        gauge!(names::JOBS_DELAYED, "queue" => queue.to_string()).set(counts.delayed as f64);
        gauge!(names::JOBS_ACTIVE, "queue" => queue.to_string()).set(counts.active as f64);
        gauge!(names::JOBS_FAILED_RETAINED, "queue" => queue.to_string())
            .set(counts.failed as f64);
    }

    pub fn trigger_fired(trigger: &str, duration: Duration, ok: bool) {
        counter!(names::TRIGGERS_FIRED_TOTAL, "trigger" => trigger.to_string()).increment(1);
        if !ok {
            counter!(names::TRIGGERS_FAILED_TOTAL, "trigger" => trigger.to_string()).increment(1);
        }
        histogram!(names::TRIGGER_DURATION_SECONDS, "trigger" => trigger.to_string())
            .record(duration.as_secs_f64());
    }

    pub fn leader(is_leader: bool) {
        gauge!(names::SCHEDULER_IS_LEADER).set(if is_leader { 1.0 } else { 0.0 });
    }
}
