//! Event listeners.

use crate::event::DomainEvent;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// Outcome of one listener invocation.
pub type ListenerResult = anyhow::Result<()>;

/// Reacts to domain events.
#[async_trait]
pub trait EventListener: Send + Sync {
    /// Unique name per event, used in logs and dispatch reports.
    fn name(&self) -> &str;

    async fn handle(&self, event: &DomainEvent) -> ListenerResult;
}

struct FnListener<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F, Fut> EventListener for FnListener<F>
where
    F: Fn(DomainEvent) -> Fut + Send + Sync,
    Fut: Future<Output = ListenerResult> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: &DomainEvent) -> ListenerResult {
        (self.f)(event.clone()).await
    }
}

/// Wraps an async closure as a listener.
pub fn listener_fn<F, Fut>(name: impl Into<String>, f: F) -> Arc<dyn EventListener>
where
    F: Fn(DomainEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ListenerResult> + Send + 'static,
{
    Arc::new(FnListener {
        name: name.into(),
        f,
    })
}
