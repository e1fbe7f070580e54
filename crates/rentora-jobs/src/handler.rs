//! Job handlers and the (queue, job type) registration table.

use crate::error::{JobError, JobResult};
use crate::job::{JobContext, JobData, JobPayload};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::info;

/// Processes one job.
///
/// Delivery is at-least-once; implementations must tolerate being called
/// again with the same job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &JobData, ctx: &JobContext) -> JobResult<()>;
}

/// Handler for a typed payload.
#[async_trait]
pub trait PayloadHandler<P: JobPayload>: Send + Sync {
    async fn handle(&self, payload: P, ctx: &JobContext) -> JobResult<()>;
}

struct Typed<P, H> {
    inner: H,
    _payload: PhantomData<fn() -> P>,
}

#[async_trait]
impl<P, H> JobHandler for Typed<P, H>
where
    P: JobPayload,
    H: PayloadHandler<P>,
{
    async fn handle(&self, job: &JobData, ctx: &JobContext) -> JobResult<()> {
        let payload: P = job.payload()?;
        self.inner.handle(payload, ctx).await
    }
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(JobData, JobContext) -> Fut + Send + Sync,
    Fut: Future<Output = JobResult<()>> + Send + 'static,
{
    async fn handle(&self, job: &JobData, ctx: &JobContext) -> JobResult<()> {
        (self.0)(job.clone(), ctx.clone()).await
    }
}

/// Wraps an async closure as a handler.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn JobHandler>
where
    F: Fn(JobData, JobContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = JobResult<()>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Exactly one handler per (queue, job type) pair.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<(String, String), Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a handler. A second binding for the same pair is an error.
    pub fn register(
        &mut self,
        queue: &str,
        job_type: &str,
        handler: Arc<dyn JobHandler>,
    ) -> JobResult<()> {
        let key = (queue.to_string(), job_type.to_string());
        if self.handlers.contains_key(&key) {
            return Err(JobError::DuplicateHandler {
                queue: queue.to_string(),
                job_type: job_type.to_string(),
            });
        }
        self.handlers.insert(key, handler);
        info!(queue = %queue, job_type = %job_type, "Registered job handler");
        Ok(())
    }

    /// Binds a typed handler to `P::QUEUE` / `P::JOB_TYPE`.
    pub fn register_payload<P, H>(&mut self, handler: H) -> JobResult<()>
    where
        P: JobPayload,
        H: PayloadHandler<P> + 'static,
    {
        self.register(
            P::QUEUE,
            P::JOB_TYPE,
            Arc::new(Typed {
                inner: handler,
                _payload: PhantomData,
            }),
        )
    }

    pub fn get(&self, queue: &str, job_type: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers
            .get(&(queue.to_string(), job_type.to_string()))
            .cloned()
    }

    /// Queues with at least one handler, sorted.
    pub fn queues(&self) -> Vec<String> {
        let mut queues: Vec<String> = self.handlers.keys().map(|(q, _)| q.clone()).collect();
        queues.sort();
        queues.dedup();
        queues
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    const ZERO: Duration = Duration::ZERO;

    #[derive(Serialize, Deserialize)]
    struct Echo {
        value: u32,
    }

    impl JobPayload for Echo {
        const JOB_TYPE: &'static str = "echo";
        const QUEUE: &'static str = "test";
    }

    struct EchoHandler;

    #[async_trait]
    impl PayloadHandler<Echo> for EchoHandler {
        async fn handle(&self, payload: Echo, _ctx: &JobContext) -> JobResult<()> {
            if payload.value == 0 {
                return Err(JobError::Rejected("zero".into()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = HandlerRegistry::new();
        registry.register_payload::<Echo, _>(EchoHandler).unwrap();
        let err = registry.register_payload::<Echo, _>(EchoHandler).unwrap_err();
        assert!(matches!(err, JobError::DuplicateHandler { .. }));

        registry
            .register("other", "echo", handler_fn(|_, _| async { Ok(()) }))
            .unwrap();
        assert_eq!(registry.queues(), vec!["other".to_string(), "test".to_string()]);
    }

    #[tokio::test]
    async fn test_typed_handler_deserializes() {
        let mut registry = HandlerRegistry::new();
        registry.register_payload::<Echo, _>(EchoHandler).unwrap();
        let handler = registry.get("test", "echo").unwrap();

        let now = Utc::now();
        let ok = JobData::new("test", "echo", serde_json::json!({ "value": 1 }), 3, now, ZERO);
        let ctx = JobContext::new(&ok, "w", now);
        assert!(handler.handle(&ok, &ctx).await.is_ok());

        let bad = JobData::new("test", "echo", serde_json::json!({ "nope": 1 }), 3, now, ZERO);
        let err = handler.handle(&bad, &ctx).await.unwrap_err();
        assert!(matches!(err, JobError::Serialization(_)));
    }
}
