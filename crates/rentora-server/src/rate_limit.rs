//! Per-client rate limiting middleware.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use rentora_resilience::{RateLimitDecision, RateLimiter};
use serde_json::json;
use std::net::SocketAddr;
use tracing::debug;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Client subject: first `X-Forwarded-For` hop, else the peer address.
fn client_subject(request: &Request<Body>) -> String {
    let forwarded = request
        .headers()
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(ip) = forwarded {
        return ip.to_string();
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_string(), |info| info.0.ip().to_string())
}

fn limit_headers(headers: &mut HeaderMap, limiter: &RateLimiter, decision: &RateLimitDecision) {
    headers.insert(
        "x-ratelimit-limit",
        HeaderValue::from(limiter.policy().max_requests),
    );
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));
    headers.insert(
        "x-ratelimit-reset",
        HeaderValue::from(decision.reset_time.timestamp()),
    );
}

/// Admits the request or answers 429 with `Retry-After`.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let subject = client_subject(&request);
    let endpoint = request.uri().path().to_string();
    let decision = limiter.check(&subject, &endpoint).await;

    if let Err(e) = decision.ensure_allowed() {
        debug!(subject, endpoint, "Request rate limited");
        let retry_after = limiter.retry_after(&decision).as_secs().max(1);
        let body = Json(json!({
            "error": e.error_code(),
            "message": e.to_string(),
            "retryAfter": retry_after,
        }));
        let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
        let headers = response.headers_mut();
        headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        limit_headers(headers, &limiter, &decision);
        return response;
    }

    let mut response = next.run(request).await;
    limit_headers(response.headers_mut(), &limiter, &decision);
    response
}
