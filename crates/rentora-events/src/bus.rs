//! Isolating event dispatcher.

use crate::event::DomainEvent;
use crate::registry::EventRegistry;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info_span, Instrument};

/// A listener that failed during one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerFailure {
    pub listener: String,
    pub error: String,
}

/// Outcome of one `emit`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<ListenerFailure>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn invoked(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Dispatches events to the listeners frozen at startup.
#[derive(Clone)]
pub struct EventBus {
    registry: Arc<EventRegistry>,
}

impl EventBus {
    pub fn new(registry: EventRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Invokes every listener for the event in registration order.
    ///
    /// A listener that errors or panics is logged and skipped; its siblings
    /// still run.
    pub async fn emit(&self, event: &DomainEvent) -> DispatchReport {
        let span = info_span!("event", event = event.name(), subject = %event.subject_id());
        self.dispatch(event).instrument(span).await
    }

    /// Dispatches on a spawned task and returns immediately.
    pub fn emit_detached(&self, event: DomainEvent) -> JoinHandle<DispatchReport> {
        let bus = self.clone();
        tokio::spawn(async move { bus.emit(&event).await })
    }

    pub fn listener_names(&self, event: &str) -> Vec<&str> {
        self.registry.listener_names(event)
    }

    async fn dispatch(&self, event: &DomainEvent) -> DispatchReport {
        let mut report = DispatchReport::default();

        for listener in self.registry.listeners(event.name()) {
            let name = listener.name().to_string();
            let outcome = AssertUnwindSafe(listener.handle(event)).catch_unwind().await;

            match outcome {
                Ok(Ok(())) => {
                    debug!(listener = %name, "Listener handled event");
                    report.succeeded.push(name);
                }
                Ok(Err(e)) => {
                    error!(listener = %name, error = %e, "Event listener failed");
                    report.failed.push(ListenerFailure {
                        listener: name,
                        error: format!("{e:#}"),
                    });
                }
                Err(_) => {
                    error!(listener = %name, "Event listener panicked");
                    report.failed.push(ListenerFailure {
                        listener: name,
                        error: "listener panicked".to_string(),
                    });
                }
            }
        }

        if report.invoked() == 0 {
            debug!("No listeners for event");
        }
        report
    }
}
