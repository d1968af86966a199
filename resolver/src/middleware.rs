//! Request middleware for the resolver.
//!
//! Two layers wrap every route:
//!
//! 1. `track_requests` - request counting and latency metrics
//! 2. `rate_limit` - fingerprint-keyed limiting, with the tier chosen by
//!    the client classifier and transaction categories gated by path prefix
//!
//! The metrics layer sits outside the limiter so that 429 rejections still
//! show up in the request counters.

use crate::config::{RateLimitConfig, TierLimit};
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use common::classify::ClientTier;
use common::fingerprint::client_fingerprint;
use common::ratelimit::RateLimitDecision;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// Paths that are never rate limited (probes and scrapes).
pub const RATE_LIMIT_EXEMPT_PATHS: &[&str] = &["/healthz", "/metrics"];

/// Extract the client IP from proxy headers.
///
/// `X-Forwarded-For` holds a comma-separated chain; the first entry is the
/// originating client. Falls back to `X-Real-IP`, then to a shared bucket
/// for direct connections with no proxy headers.
pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("")
}

/// Pick the tier bucket for a classified client.
fn limit_for_tier(limits: &RateLimitConfig, tier: ClientTier) -> &TierLimit {
    match tier {
        ClientTier::Standard => &limits.general,
        ClientTier::Automated => &limits.bot,
    }
}

/// Build the 429 response with standard rate-limit headers.
fn too_many_requests(decision: &RateLimitDecision) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        format!(
            "Rate limit exceeded. Please retry after {} seconds.",
            decision.retry_after_secs
        ),
    )
        .into_response();

    let headers = response.headers_mut();
    headers.insert("retry-after", HeaderValue::from(decision.retry_after_secs));
    headers.insert("x-ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(0u64));
    headers.insert("x-ratelimit-reset", HeaderValue::from(decision.reset_at_ms));
    response
}

/// Fingerprint-keyed rate limiting.
///
/// Every non-exempt request burns one token from its tier bucket (general
/// or bot, picked by the classifier). Requests under a configured
/// transaction path prefix additionally burn one token from that
/// category's bucket, so a client cannot dodge the per-hour transaction
/// cap by staying under the general limit. A bucket records nothing for
/// a request it rejects; a tier token already burned stays spent when
/// the transaction bucket rejects the same request.
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if RATE_LIMIT_EXEMPT_PATHS.contains(&path.as_str()) {
        return next.run(request).await;
    }

    let headers = request.headers();
    let ip = client_ip(headers);
    let user_agent = header_str(headers, "user-agent").to_string();
    let fingerprint = client_fingerprint(
        &ip,
        &user_agent,
        header_str(headers, "accept-language"),
        header_str(headers, "x-forwarded-proto"),
    );

    let classification = state
        .classifier
        .classify((!user_agent.is_empty()).then_some(user_agent.as_str()));
    let limits = &state.config.rate_limit;
    let tier_limit = limit_for_tier(limits, classification.tier);

    let now = state.now_ms();
    let decision = state.request_limits.check_and_record(
        &fingerprint,
        now,
        tier_limit.window_ms,
        tier_limit.max_requests,
    );
    if !decision.allowed {
        warn!(
            fingerprint = %fingerprint,
            tier = classification.tier.as_str(),
            path = %path,
            retry_after_secs = decision.retry_after_secs,
            "Rate limit exceeded"
        );
        state
            .metrics
            .rate_limited
            .get_or_create(&[("tier".to_string(), classification.tier.as_str().to_string())])
            .inc();
        return too_many_requests(&decision);
    }

    // Transaction-category buckets are separate from the request tier and
    // keyed by category so one category cannot exhaust another.
    if let Some(tx) = limits
        .transactions
        .iter()
        .find(|tx| tx.path_prefixes.iter().any(|p| path.starts_with(p.as_str())))
    {
        let tx_key = format!("{}:{}", tx.category, fingerprint);
        let tx_decision =
            state
                .tx_limits
                .check_and_record(&tx_key, now, tx.window_ms, tx.max_requests);
        if !tx_decision.allowed {
            warn!(
                fingerprint = %fingerprint,
                category = %tx.category,
                path = %path,
                retry_after_secs = tx_decision.retry_after_secs,
                "Transaction rate limit exceeded"
            );
            state
                .metrics
                .rate_limited
                .get_or_create(&[("tier".to_string(), tx.category.clone())])
                .inc();
            return too_many_requests(&tx_decision);
        }
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(decision.reset_at_ms));
    response
}

/// Request counting and latency metrics for every route.
pub async fn track_requests(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    state
        .metrics
        .http_requests
        .get_or_create(&[
            ("method".to_string(), method.clone()),
            ("status".to_string(), status),
        ])
        .inc();
    state
        .metrics
        .http_duration
        .get_or_create(&[("method".to_string(), method)])
        .observe(start.elapsed().as_secs_f64());

    response
}
