//! Operational HTTP surface.
//!
//! Read-only health and metrics endpoints, plus the ingress the HTTP layer
//! uses to publish domain events into the dispatch fabric.

use crate::rate_limit::rate_limit_middleware;
use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use rentora_events::{DispatchReport, DomainEvent, EventBus};
use rentora_jobs::{JobMetrics, JobQueue, QueueCounts};
use rentora_resilience::RateLimiter;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared state for the operational routes.
#[derive(Clone)]
pub struct AppState {
    pub queue: JobQueue,
    /// Queues this process runs workers for.
    pub queues: Arc<Vec<String>>,
    pub events: EventBus,
    pub metrics: Option<PrometheusHandle>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct QueueHealth {
    pub name: String,
    pub ready: bool,
    #[serde(flatten)]
    pub counts: QueueCounts,
}

#[derive(Debug, Serialize)]
pub struct QueuesResponse {
    pub status: &'static str,
    pub queues: Vec<QueueHealth>,
}

#[derive(Debug, Serialize)]
pub struct ListenerFailureBody {
    pub listener: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct DispatchResponse {
    pub event: &'static str,
    pub succeeded: Vec<String>,
    pub failed: Vec<ListenerFailureBody>,
}

impl DispatchResponse {
    fn new(event: &'static str, report: DispatchReport) -> Self {
        Self {
            event,
            succeeded: report.succeeded,
            failed: report
                .failed
                .into_iter()
                .map(|f| ListenerFailureBody {
                    listener: f.listener,
                    error: f.error,
                })
                .collect(),
        }
    }
}

/// Builds the router. Every route except `/health` is rate limited when a
/// limiter is given.
pub fn create_router(state: AppState, limiter: Option<RateLimiter>) -> Router {
    let mut guarded = Router::new()
        .route("/health/queues", get(queue_health))
        .route("/metrics", get(prometheus_metrics))
        .route("/events", post(publish_event))
        .with_state(state);

    if let Some(limiter) = limiter {
        guarded =
            guarded.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
    }

    let router = Router::new()
        .route("/health", get(health))
        .merge(guarded)
        .layer(TraceLayer::new_for_http());

    info!("Router created with health, metrics and event ingress endpoints");
    router
}

/// Liveness.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Per-queue readiness and counts. 503 when the broker does not answer.
pub async fn queue_health(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.queue.is_ready().await;
    let mut queues = Vec::with_capacity(state.queues.len());

    for name in state.queues.iter() {
        let counts = match state.queue.counts(name).await {
            Ok(counts) => counts,
            Err(e) => {
                warn!(queue = %name, error = %e, "Failed to read queue counts");
                QueueCounts::default()
            }
        };
        queues.push(QueueHealth {
            name: name.clone(),
            ready,
            counts,
        });
    }

    let (status, label) = if ready {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    };
    (status, Json(QueuesResponse { status: label, queues }))
}

/// Prometheus exposition, with queue gauges refreshed first.
pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let Some(handle) = &state.metrics else {
        return (StatusCode::NOT_FOUND, "metrics exporter disabled".to_string());
    };

    for name in state.queues.iter() {
        if let Ok(counts) = state.queue.counts(name).await {
            JobMetrics::queue_counts(name, &counts);
        }
    }
    (StatusCode::OK, handle.render())
}

/// Dispatches one domain event to its listeners.
pub async fn publish_event(
    State(state): State<AppState>,
    Json(event): Json<DomainEvent>,
) -> impl IntoResponse {
    let name = event.name();
    let report = state.events.emit(&event).await;
    (StatusCode::ACCEPTED, Json(DispatchResponse::new(name, report)))
}
