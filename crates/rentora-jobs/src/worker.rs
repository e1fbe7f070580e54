//! Workers draining queues.
//!
//! One [`QueueWorker`] serves one queue with a bounded number of jobs in
//! flight. Each attempt runs under a timeout with panics caught, so a
//! misbehaving handler turns into an ordinary failed attempt.

use crate::broker::QueueBroker;
use crate::error::{JobError, JobResult};
use crate::handler::HandlerRegistry;
use crate::job::{JobContext, JobData};
use crate::observer::{FailureDisposition, Observers};
use crate::retry::RetryPolicy;
use chrono::{DateTime, TimeDelta, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use rentora_config::JobsConfig;
use rentora_core::SharedClock;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Extra time past the job timeout before an active job counts as stalled.
const STALL_GRACE: Duration = Duration::from_secs(30);

/// Per-worker tuning.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Jobs of this queue in flight at once.
    pub concurrency: usize,
    pub job_timeout: Duration,
    /// Sleep after finding the queue empty.
    pub poll_interval: Duration,
    /// How long shutdown waits for in-flight jobs.
    pub shutdown_timeout: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            concurrency: 1,
            job_timeout: Duration::from_secs(300),
            poll_interval: Duration::from_millis(250),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkerSettings {
    pub fn for_queue(config: &JobsConfig, queue: &str, shutdown_timeout: Duration) -> Self {
        Self {
            concurrency: config.concurrency_for(queue).max(1),
            job_timeout: config.job_timeout(),
            poll_interval: config.poll_interval(),
            shutdown_timeout,
        }
    }

    fn visibility_timeout(&self) -> Duration {
        self.job_timeout + STALL_GRACE
    }
}

#[derive(Debug, Default)]
struct Counters {
    completed: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time worker statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerStats {
    pub queue: String,
    pub concurrency: usize,
    pub completed: u64,
    pub retried: u64,
    pub failed: u64,
}

/// Processes jobs from a single queue.
pub struct QueueWorker {
    id: String,
    queue: String,
    broker: Arc<dyn QueueBroker>,
    handlers: Arc<HandlerRegistry>,
    observers: Observers,
    retry: RetryPolicy,
    clock: SharedClock,
    settings: WorkerSettings,
    counters: Counters,
}

impl QueueWorker {
    pub fn new(
        queue: impl Into<String>,
        broker: Arc<dyn QueueBroker>,
        handlers: Arc<HandlerRegistry>,
        clock: SharedClock,
        settings: WorkerSettings,
    ) -> Self {
        let queue = queue.into();
        Self {
            id: format!("worker-{queue}-{}", Uuid::new_v4()),
            queue,
            broker,
            handlers,
            observers: Observers::standard(),
            retry: RetryPolicy::default(),
            clock,
            settings,
            counters: Counters::default(),
        }
    }

    #[must_use]
    pub fn with_observers(mut self, observers: Observers) -> Self {
        self.observers = observers;
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            queue: self.queue.clone(),
            concurrency: self.settings.concurrency,
            completed: self.counters.completed.load(Ordering::Relaxed),
            retried: self.counters.retried.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Reserves and processes at most one job. Returns false if none was due.
    pub async fn run_once(&self) -> JobResult<bool> {
        match self.broker.reserve(&self.queue, self.clock.now()).await? {
            Some(job) => {
                self.process(job).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Runs one attempt of a reserved job and records its outcome.
    pub async fn process(&self, job: JobData) -> JobResult<()> {
        let started = Instant::now();
        self.observers.active(&job);

        let outcome = match self.handlers.get(&job.queue, &job.job_type) {
            Some(handler) => {
                let ctx = JobContext::new(&job, self.id.as_str(), self.clock.now());
                let attempt = AssertUnwindSafe(handler.handle(&job, &ctx)).catch_unwind();
                match timeout(self.settings.job_timeout, attempt).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(panic)) => Err(JobError::ExecutionFailed(format!(
                        "handler panicked: {}",
                        panic_message(panic.as_ref())
                    ))),
                    Err(_) => Err(JobError::Timeout(self.settings.job_timeout.as_secs())),
                }
            }
            None => Err(JobError::HandlerNotFound {
                queue: job.queue.clone(),
                job_type: job.job_type.clone(),
            }),
        };

        match outcome {
            Ok(()) => {
                self.broker.complete(&job).await?;
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                self.observers.completed(&job, started.elapsed());
                Ok(())
            }
            Err(err) => self.record_failure(job, err).await,
        }
    }

    async fn record_failure(&self, mut job: JobData, err: JobError) -> JobResult<()> {
        let now = self.clock.now();
        job.last_error = Some(err.to_string());

        if err.is_retryable() && !job.is_exhausted() {
            let delay = self.retry.delay_for_attempt(job.attempts);
            self.broker.retry(&job, run_at(now, delay)).await?;
            self.counters.retried.fetch_add(1, Ordering::Relaxed);
            self.observers
                .failed(&job, &err, FailureDisposition::Retrying { delay });
        } else {
            job.failed_at = Some(now);
            self.broker.bury(&job).await?;
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
            self.observers.failed(&job, &err, FailureDisposition::Terminal);
        }
        Ok(())
    }

    /// Returns jobs left active by a crashed worker to the waiting list.
    pub async fn requeue_stalled(&self) -> JobResult<usize> {
        let cutoff = run_before(self.clock.now(), self.settings.visibility_timeout());
        let requeued = self.broker.requeue_stalled(&self.queue, cutoff).await?;
        if requeued > 0 {
            warn!(queue = %self.queue, requeued, "Requeued stalled jobs");
        }
        Ok(requeued)
    }

    /// Serves the queue until `shutdown` fires, then waits for in-flight jobs.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let concurrency = self.settings.concurrency;
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut stall_check = tokio::time::interval(self.settings.job_timeout);

        info!(
            worker_id = %self.id,
            queue = %self.queue,
            concurrency,
            "Starting queue worker"
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown.recv() => {
                    info!(queue = %self.queue, "Received shutdown signal");
                    break;
                }

                _ = stall_check.tick() => {
                    if let Err(e) = self.requeue_stalled().await {
                        error!(queue = %self.queue, error = %e, "Failed to requeue stalled jobs");
                    }
                }

                permit = semaphore.clone().acquire_owned() => {
                    let Ok(permit) = permit else { break };
                    match self.broker.reserve(&self.queue, self.clock.now()).await {
                        Ok(Some(job)) => {
                            let span = info_span!(
                                "job",
                                job_id = %job.id,
                                queue = %job.queue,
                                job_type = %job.job_type
                            );
                            let worker = Arc::clone(&self);
                            tokio::spawn(
                                async move {
                                    if let Err(e) = worker.process(job).await {
                                        error!(error = %e, "Failed to record job outcome");
                                    }
                                    drop(permit);
                                }
                                .instrument(span),
                            );
                        }
                        Ok(None) => {
                            drop(permit);
                            tokio::time::sleep(self.settings.poll_interval).await;
                        }
                        Err(e) => {
                            drop(permit);
                            error!(queue = %self.queue, error = %e, "Failed to reserve job");
                            tokio::time::sleep(self.settings.poll_interval).await;
                        }
                    }
                }
            }
        }

        debug!(queue = %self.queue, "Waiting for in-flight jobs");
        let permits = u32::try_from(concurrency).unwrap_or(u32::MAX);
        if timeout(self.settings.shutdown_timeout, semaphore.acquire_many(permits))
            .await
            .is_err()
        {
            warn!(queue = %self.queue, "Shutdown timeout reached with jobs still running");
        }

        let stats = self.stats();
        info!(
            queue = %self.queue,
            completed = stats.completed,
            retried = stats.retried,
            failed = stats.failed,
            "Queue worker stopped"
        );
    }
}

fn run_at(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    let delay = TimeDelta::from_std(delay).unwrap_or(TimeDelta::MAX);
    now.checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn run_before(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    let window = TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX);
    now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// One worker per queue that has handlers.
pub struct WorkerPool {
    workers: Vec<Arc<QueueWorker>>,
    shutdown_tx: broadcast::Sender<()>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(workers: Vec<QueueWorker>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            workers: workers.into_iter().map(Arc::new).collect(),
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Builds a worker for every queue in `handlers`.
    pub fn from_config(
        broker: Arc<dyn QueueBroker>,
        handlers: Arc<HandlerRegistry>,
        clock: SharedClock,
        config: &JobsConfig,
        shutdown_timeout: Duration,
    ) -> Self {
        let retry = RetryPolicy::from(config);
        let workers = handlers
            .queues()
            .into_iter()
            .map(|queue| {
                let settings = WorkerSettings::for_queue(config, &queue, shutdown_timeout);
                QueueWorker::new(
                    queue,
                    Arc::clone(&broker),
                    Arc::clone(&handlers),
                    Arc::clone(&clock),
                    settings,
                )
                .with_retry_policy(retry.clone())
            })
            .collect();
        Self::new(workers)
    }

    /// Spawns every worker.
    pub fn start(&self) {
        let mut handles = self.handles.lock();
        for worker in &self.workers {
            let rx = self.shutdown_tx.subscribe();
            handles.push(tokio::spawn(Arc::clone(worker).run(rx)));
        }
        info!(workers = self.workers.len(), "Worker pool started");
    }

    /// Signals every worker to stop.
    pub fn stop(&self) {
        info!("Stopping worker pool...");
        let _ = self.shutdown_tx.send(());
    }

    /// Stops the workers and waits for them to drain.
    pub async fn shutdown(&self) {
        self.stop();
        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Worker task ended abnormally");
            }
        }
        info!("Worker pool stopped");
    }

    pub fn queues(&self) -> Vec<String> {
        self.workers.iter().map(|w| w.queue().to_string()).collect()
    }

    pub fn stats(&self) -> Vec<WorkerStats> {
        self.workers.iter().map(|w| w.stats()).collect()
    }
}
