//! Rentora Jobs - Durable Job Queue and Trigger Scheduler
//!
//! Provides:
//! - Named queues with delayed execution and per-queue concurrency
//! - Retry with exponential backoff and retained terminal failures
//! - Deduplication keys for idempotent enqueues
//! - Interval and cron triggers fired only by the elected leader
//! - In-memory and Redis brokers behind one [`QueueBroker`] trait
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                     Rentora Jobs                               │
//! ├───────────────────────────────────────────────────────────────┤
//! │                                                                │
//! │  Scheduler (leader only)          Producers (listeners,        │
//! │  ┌──────────────────────┐          sweeps, handlers)           │
//! │  │ interval / cron      │                │                     │
//! │  │ triggers ──► action  │────────────────┤                     │
//! │  └──────────────────────┘                ▼                     │
//! │                                   ┌─────────────┐              │
//! │                                   │  JobQueue   │ dedup keys   │
//! │                                   └──────┬──────┘              │
//! │                                          ▼                     │
//! │  ┌─────────────────────────────────────────────────────────┐  │
//! │  │ QueueBroker (memory | redis)                             │  │
//! │  │  delayed ──(due)──► waiting ──(reserve)──► active        │  │
//! │  │     ▲                                     │    │         │  │
//! │  │     └─────────── retry (backoff) ─────────┘    ▼         │  │
//! │  │                                   completed / failed     │  │
//! │  └─────────────────────────────────────────────────────────┘  │
//! │                                          │                     │
//! │                                          ▼                     │
//! │  WorkerPool: one QueueWorker per queue, N jobs in flight,      │
//! │  timeout + panic isolation, observers (logs, metrics)          │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use rentora_jobs::prelude::*;
//!
//! #[derive(Serialize, Deserialize)]
//! struct ReleasePayment { booking_id: BookingId }
//!
//! impl JobPayload for ReleasePayment {
//!     const JOB_TYPE: &'static str = "payments.release";
//!     const QUEUE: &'static str = "payments";
//!
//!     fn dedup_key(&self) -> Option<String> {
//!         Some(format!("release:{}", self.booking_id))
//!     }
//! }
//!
//! queue
//!     .enqueue_job(
//!         &ReleasePayment { booking_id },
//!         EnqueueOptions::new().delay(Duration::from_secs(5)),
//!     )
//!     .await?;
//! ```

pub mod broker;
pub mod error;
pub mod handler;
pub mod job;
pub mod memory;
pub mod metrics;
pub mod observer;
pub mod queue;
pub mod redis;
pub mod retry;
pub mod scheduler;
pub mod worker;

pub use broker::{PushOutcome, QueueBroker, QueueCounts};
pub use error::{JobError, JobResult};
pub use handler::{handler_fn, HandlerRegistry, JobHandler, PayloadHandler};
pub use job::{EnqueueOptions, JobContext, JobData, JobId, JobPayload};
pub use memory::InMemoryBroker;
pub use metrics::{register_metrics, JobMetrics};
pub use observer::{FailureDisposition, JobObserver, LoggingObserver, MetricsObserver, Observers};
pub use queue::JobQueue;
pub use self::redis::{create_pool, RedisBroker};
pub use retry::RetryPolicy;
pub use scheduler::{
    AlwaysLeader, LeaderElection, RedisLeaderLock, Scheduler, TriggerAction, TriggerSchedule,
    TriggerTable,
};
pub use worker::{QueueWorker, WorkerPool, WorkerSettings, WorkerStats};

/// Re-export commonly used traits
pub mod prelude {
    pub use crate::handler::{JobHandler, PayloadHandler};
    pub use crate::job::{EnqueueOptions, JobPayload};
    pub use crate::queue::JobQueue;
    pub use crate::scheduler::TriggerAction;
    pub use crate::{JobContext, JobError, JobId, JobResult};
}
