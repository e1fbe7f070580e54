//! End-to-end retry behaviour of a queue worker over the in-memory broker.

use chrono::Duration as ChronoDuration;
use parking_lot::Mutex;
use rentora_core::{Clock, ManualClock};
use rentora_jobs::{
    handler_fn, EnqueueOptions, FailureDisposition, HandlerRegistry, InMemoryBroker, JobData,
    JobError, JobObserver, JobQueue, Observers, QueueBroker, QueueWorker, WorkerSettings,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct Recorder {
    dispositions: Mutex<Vec<FailureDisposition>>,
    completed: AtomicU32,
}

impl JobObserver for Recorder {
    fn on_completed(&self, _job: &JobData, _elapsed: Duration) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_failed(&self, _job: &JobData, _error: &JobError, disposition: FailureDisposition) {
        self.dispositions.lock().push(disposition);
    }
}

struct ExplodingObserver;

impl JobObserver for ExplodingObserver {
    fn on_active(&self, _job: &JobData) {
        panic!("observer failure");
    }
}

struct Harness {
    clock: Arc<ManualClock>,
    broker: Arc<InMemoryBroker>,
    queue: JobQueue,
    worker: QueueWorker,
    recorder: Arc<Recorder>,
    calls: Arc<AtomicU32>,
}

/// Handler on queue "q" that fails until it has been called `succeed_on` times.
fn harness(succeed_on: u32) -> Harness {
    let clock = Arc::new(ManualClock::starting_now());
    let broker = Arc::new(InMemoryBroker::default());
    let queue = JobQueue::new(broker.clone(), clock.clone(), 3);
    let calls = Arc::new(AtomicU32::new(0));

    let counter = calls.clone();
    let mut handlers = HandlerRegistry::new();
    handlers
        .register(
            "q",
            "flaky",
            handler_fn(move |_, _| {
                let counter = counter.clone();
                async move {
                    let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if call < succeed_on {
                        Err(JobError::ExecutionFailed(format!("call {call} failed")))
                    } else {
                        Ok(())
                    }
                }
            }),
        )
        .unwrap();

    let recorder = Arc::new(Recorder::default());
    let worker = QueueWorker::new(
        "q",
        broker.clone(),
        Arc::new(handlers),
        clock.clone(),
        WorkerSettings::default(),
    )
    .with_observers(
        Observers::new()
            .with(Arc::new(ExplodingObserver))
            .with(recorder.clone()),
    );

    Harness {
        clock,
        broker,
        queue,
        worker,
        recorder,
        calls,
    }
}

#[tokio::test]
async fn test_job_succeeds_on_third_attempt_with_growing_delays() {
    let h = harness(3);
    h.queue
        .enqueue("q", "flaky", serde_json::json!({}), EnqueueOptions::new())
        .await
        .unwrap();

    assert!(h.worker.run_once().await.unwrap());

    // Not eligible until the first backoff has elapsed.
    h.clock.advance(ChronoDuration::milliseconds(1999));
    assert!(!h.worker.run_once().await.unwrap());
    h.clock.advance(ChronoDuration::milliseconds(1));
    assert!(h.worker.run_once().await.unwrap());

    h.clock.advance(ChronoDuration::seconds(3));
    assert!(!h.worker.run_once().await.unwrap());
    h.clock.advance(ChronoDuration::seconds(1));
    assert!(h.worker.run_once().await.unwrap());

    assert_eq!(h.calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        *h.recorder.dispositions.lock(),
        vec![
            FailureDisposition::Retrying {
                delay: Duration::from_secs(2)
            },
            FailureDisposition::Retrying {
                delay: Duration::from_secs(4)
            },
        ]
    );
    assert_eq!(h.recorder.completed.load(Ordering::SeqCst), 1);

    let counts = h.broker.counts("q").await.unwrap();
    assert_eq!(counts.completed, 1);
    assert_eq!(counts.failed, 0);
}

#[tokio::test]
async fn test_exhausted_job_is_retained_as_failed() {
    let h = harness(u32::MAX);
    h.queue
        .enqueue(
            "q",
            "flaky",
            serde_json::json!({ "booking": "b-1" }),
            EnqueueOptions::new().max_attempts(2),
        )
        .await
        .unwrap();

    assert!(h.worker.run_once().await.unwrap());
    h.clock.advance(ChronoDuration::seconds(2));
    assert!(h.worker.run_once().await.unwrap());
    h.clock.advance(ChronoDuration::hours(1));
    assert!(!h.worker.run_once().await.unwrap());

    assert_eq!(h.calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        h.recorder.dispositions.lock().last(),
        Some(&FailureDisposition::Terminal)
    );

    let failed = h.broker.failed_jobs("q", 10).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].attempts, 2);
    assert_eq!(failed[0].payload["booking"], "b-1");
    assert_eq!(failed[0].last_error.as_deref(), Some("Job execution failed: call 2 failed"));
    assert_eq!(failed[0].failed_at, Some(h.clock.now()));
}

#[tokio::test]
async fn test_dedup_key_reopens_after_completion() {
    let h = harness(1);
    let opts = || EnqueueOptions::new().dedup_key("expire:b-1");

    let first = h.queue.enqueue("q", "flaky", serde_json::json!({}), opts()).await.unwrap();
    let again = h.queue.enqueue("q", "flaky", serde_json::json!({}), opts()).await.unwrap();
    assert_eq!(first, again);

    assert!(h.worker.run_once().await.unwrap());
    assert!(!h.worker.run_once().await.unwrap());

    let next = h.queue.enqueue("q", "flaky", serde_json::json!({}), opts()).await.unwrap();
    assert_ne!(first, next);
    assert_eq!(h.calls.load(Ordering::SeqCst), 1);
}
