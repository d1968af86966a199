//! HTTP request handlers for the resolver.

use crate::config::{MAX_CACHED_OBJECT_BYTES, MAX_FETCH_RESPONSE_BYTES};
use crate::state::{AppState, CachedContent};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use common::resolve::{ContentRef, TransformOptions, build_gateway_url};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

// ============================================================================
// Error Helpers
// ============================================================================

/// Create a bad gateway error response while logging the detailed error.
///
/// Returns a generic message to the client to prevent information leakage,
/// while logging the full error details for debugging.
pub fn bad_gateway_error(context: &str, error: impl std::fmt::Display) -> (StatusCode, String) {
    error!(context = context, error = %error, "Upstream gateway error");
    (
        StatusCode::BAD_GATEWAY,
        "Failed to fetch content from upstream gateways.".to_string(),
    )
}

// ============================================================================
// Health Check
// ============================================================================

/// Liveness probe. Always returns 200 while the process is serving.
pub async fn healthz() -> &'static str {
    "OK"
}

// ============================================================================
// URL Resolution
// ============================================================================

/// Query parameters for `/resolve`.
#[derive(Debug, Deserialize)]
pub struct ResolveParams {
    /// Reference to resolve: `ipfs://` URI, gateway URL, bare hash via
    /// `/ipfs/` path, or plain HTTP(S) URL
    #[serde(default)]
    pub src: String,
    /// Override the configured transform width for this request
    pub width: Option<u32>,
    /// Skip transform parameters entirely
    #[serde(default)]
    pub raw: bool,
}

/// Merge per-request overrides onto the configured transform options.
fn effective_transform(base: &TransformOptions, width: Option<u32>, raw: bool) -> TransformOptions {
    let mut transform = base.clone();
    if raw {
        transform.enabled = false;
    }
    if let Some(width) = width {
        transform.width = width;
    }
    transform
}

/// Resolve a content reference to a fetchable URL without fetching it.
///
/// This endpoint never records gateway health: only an actual fetch outcome
/// (see `/content`) counts as a success or failure.
pub async fn resolve_url(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ResolveParams>,
) -> impl IntoResponse {
    let transform = effective_transform(state.resolver.transform(), params.width, params.raw);
    let resolution = state
        .resolver
        .resolve_with(&params.src, &transform, state.now_ms());

    state
        .metrics
        .resolutions
        .get_or_create(&[("via".to_string(), resolution.via.as_str().to_string())])
        .inc();
    debug!(src = %params.src, via = resolution.via.as_str(), url = %resolution.url, "Resolved reference");

    Json(serde_json::json!({
        "url": resolution.url,
        "via": resolution.via.as_str(),
    }))
}

// ============================================================================
// Content Fetching
// ============================================================================

/// Reject hashes that could smuggle path segments or URL syntax upstream.
fn validate_content_hash(hash: &str) -> Result<(), (StatusCode, String)> {
    if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err((StatusCode::BAD_REQUEST, "Invalid content hash".to_string()));
    }
    Ok(())
}

/// Fetch content by hash through the healthiest gateway.
pub async fn fetch_content(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
) -> Result<Response, (StatusCode, String)> {
    fetch_inner(state, hash, None).await
}

/// Fetch content by hash and sub-path through the healthiest gateway.
pub async fn fetch_content_path(
    State(state): State<Arc<AppState>>,
    Path((hash, path)): Path<(String, String)>,
) -> Result<Response, (StatusCode, String)> {
    fetch_inner(state, hash, Some(path)).await
}

fn record_fetch_failure(state: &AppState, gateway: &str) {
    state.health.record_failure(gateway, state.now_ms());
    state
        .metrics
        .gateway_fetches
        .get_or_create(&[
            ("gateway".to_string(), gateway.to_string()),
            ("outcome".to_string(), "error".to_string()),
        ])
        .inc();
}

/// Buffer a response body up to the proxy size cap. `Ok(None)` means the
/// body exceeds the cap and the read was abandoned.
async fn read_capped(mut response: reqwest::Response) -> Result<Option<Bytes>, reqwest::Error> {
    if let Some(len) = response.content_length()
        && len > MAX_FETCH_RESPONSE_BYTES as u64
    {
        return Ok(None);
    }

    let mut body = BytesMut::new();
    while let Some(chunk) = response.chunk().await? {
        if body.len() + chunk.len() > MAX_FETCH_RESPONSE_BYTES {
            return Ok(None);
        }
        body.extend_from_slice(&chunk);
    }
    Ok(Some(body.freeze()))
}

/// Failover fetch: try up to `fetch_attempts` gateways, preferring a fresh
/// cached resolution, then the health ranking. Each outcome feeds back into
/// the health tracker so the next request sees it.
async fn fetch_inner(
    state: Arc<AppState>,
    hash: String,
    subpath: Option<String>,
) -> Result<Response, (StatusCode, String)> {
    validate_content_hash(&hash)?;

    let content_ref = ContentRef {
        hash,
        subpath: subpath
            .map(|p| p.trim_matches('/').to_string())
            .filter(|p| !p.is_empty()),
    };
    let key = content_ref.cache_key();

    // Serve from the content cache when the body is still resident.
    if let Some(cached) = state.content_cache.get(&key) {
        state.metrics.content_cache_hits.inc();
        state.metrics.download_bytes.inc_by(cached.body.len() as u64);
        debug!(key = %key, bytes = cached.body.len(), "Content cache hit");
        return Ok((
            StatusCode::OK,
            [("Content-Type", cached.content_type.clone())],
            cached.body,
        )
            .into_response());
    }
    state.metrics.content_cache_misses.inc();

    let attempts = state.config.gateways.fetch_attempts;
    for attempt in 0..attempts {
        let now = state.now_ms();

        // The first attempt honors a fresh resolved-gateway cache entry;
        // later attempts always re-select since that gateway just failed
        // and its cache entries were evicted.
        let (url, gateway) = if attempt == 0
            && let Some(entry) = state.health.cached_entry(&key, now)
        {
            (entry.url, entry.gateway)
        } else {
            match state.selector.select(&state.health, now) {
                Some(base) => (build_gateway_url(&base, &content_ref), base),
                None => {
                    return Err(bad_gateway_error(
                        "fetch_content",
                        format!("no gateway available for {}", key),
                    ));
                }
            }
        };

        debug!(attempt = attempt + 1, url = %url, "Fetching content");
        let fetch_start = Instant::now();
        let result = state.http_client.get(&url).send().await;
        state
            .metrics
            .fetch_duration
            .observe(fetch_start.elapsed().as_secs_f64());

        match result {
            Ok(response) if response.status().is_success() => {
                let content_type = response
                    .headers()
                    .get("content-type")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("application/octet-stream")
                    .to_string();

                match read_capped(response).await {
                    Ok(Some(body)) => {
                        state
                            .health
                            .record_success(&gateway, &key, &url, state.now_ms());
                        state
                            .metrics
                            .gateway_fetches
                            .get_or_create(&[
                                ("gateway".to_string(), gateway.clone()),
                                ("outcome".to_string(), "success".to_string()),
                            ])
                            .inc();
                        state.metrics.download_bytes.inc_by(body.len() as u64);

                        if body.len() <= MAX_CACHED_OBJECT_BYTES {
                            state.content_cache.insert(
                                key.clone(),
                                CachedContent {
                                    body: body.clone(),
                                    content_type: content_type.clone(),
                                },
                            );
                        }

                        info!(
                            key = %key,
                            gateway = %gateway,
                            bytes = body.len(),
                            attempt = attempt + 1,
                            "Content fetched"
                        );
                        return Ok(
                            (StatusCode::OK, [("Content-Type", content_type)], body)
                                .into_response(),
                        );
                    }
                    // Oversized content will not shrink on retry, so give up
                    // without penalizing the gateway.
                    Ok(None) => {
                        warn!(gateway = %gateway, key = %key, "Content exceeds the proxy size cap");
                        return Err((
                            StatusCode::BAD_GATEWAY,
                            "Content exceeds the maximum proxied size.".to_string(),
                        ));
                    }
                    Err(e) => {
                        warn!(gateway = %gateway, error = %e, "Failed reading gateway response body");
                        record_fetch_failure(&state, &gateway);
                    }
                }
            }
            Ok(response) => {
                warn!(
                    gateway = %gateway,
                    status = %response.status(),
                    "Gateway returned error status"
                );
                record_fetch_failure(&state, &gateway);
            }
            Err(e) => {
                warn!(gateway = %gateway, error = %e, "Gateway fetch failed");
                record_fetch_failure(&state, &gateway);
            }
        }
    }

    Err(bad_gateway_error(
        "fetch_content",
        format!("all {} fetch attempts failed for {}", attempts, key),
    ))
}

// ============================================================================
// Stats and Metrics
// ============================================================================

/// Get resolver stats: per-gateway health rankings and cache occupancy.
pub async fn get_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let now = state.now_ms();
    let mut snapshot = state.health.snapshot(state.selector.gateways(), now);
    snapshot.sort_by(|a, b| b.score.total_cmp(&a.score));

    // Build response
    let response = serde_json::json!({
        "gateways": snapshot.iter()
            .map(|gw| serde_json::json!({
                "base": gw.base,
                "successes": gw.successes,
                "failures": gw.failures,
                "score": format!("{:.1}", gw.score),
                "failed": gw.failed,
            }))
            .collect::<Vec<_>>(),
        "resolved_cache_entries": state.health.resolved_entries(),
        "tracked_fingerprints": state.request_limits.tracked_keys(),
        "transaction_buckets": state.tx_limits.tracked_keys(),
    });

    Json(response)
}

/// Prometheus metrics endpoint
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let output = state.metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        output,
    )
}

// ============================================================================
// Admin
// ============================================================================

/// Reset all gateway health state and drop every cached resolution.
pub async fn admin_reset_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.health.reset();
    info!("Gateway health state reset");
    Json(serde_json::json!({ "status": "reset" }))
}

/// Drop the cached resolutions for one content hash, including sub-paths.
pub async fn admin_invalidate(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    validate_content_hash(&hash)?;

    let removed = state.health.invalidate_hash(&hash);
    info!(hash = %hash, removed = removed, "Cache invalidation requested");
    if removed > 0 {
        Ok(Json(serde_json::json!({
            "status": "invalidated",
            "removed": removed,
        })))
    } else {
        Err((StatusCode::NOT_FOUND, "No cached entry for hash".to_string()))
    }
}
