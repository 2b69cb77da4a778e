//! Rate limiting middleware
//!
//! HTTP glue for the [`RateGovernor`](crate::rate_limit::RateGovernor):
//! derives the client key, checks the quota for the matched route, and
//! attaches `X-RateLimit-*` headers to every governed response.

use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

use crate::rate_limit::RateDecision;
use crate::state::AppState;
use crate::Error;

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let client_key = client_key(&req);

    let decision = state.rate_governor.check(&client_key, &route);

    if !decision.allowed {
        crate::metrics::RATE_LIMITED_TOTAL
            .with_label_values(&[&route])
            .inc();
        tracing::debug!(client = %client_key, route = %route, "Request throttled");
        return Error::RateLimited {
            route,
            limit: decision.limit,
            retry_after_secs: decision.retry_after.as_secs(),
            reset_at: decision.reset_at,
        }
        .into_response();
    }

    let mut response = next.run(req).await;
    attach_headers(&mut response, &decision);
    response
}

/// First `X-Forwarded-For` hop when behind the gateway, else the socket
/// peer. Per-client-address throttling only; no tenant awareness.
fn client_key(req: &Request) -> String {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn attach_headers(response: &mut Response, decision: &RateDecision) {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&decision.limit.to_string()) {
        headers.insert("x-ratelimit-limit", value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert("x-ratelimit-remaining", value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.reset_at.timestamp().to_string()) {
        headers.insert("x-ratelimit-reset", value);
    }
}
