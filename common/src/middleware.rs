//! HTTP middleware shared by Waypoint services.
//!
//! Provides X-API-Key authentication for admin surfaces.

use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::OnceLock;
use subtle::ConstantTimeEq;
use tracing::warn;

/// Header name for API key authentication.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Default test API key (used when WAYPOINT_API_KEY not set).
/// Logs a warning when used - DO NOT USE IN PRODUCTION.
const DEFAULT_TEST_KEY: &str = "waypoint-dev-key-01";

/// Cached API key read once at startup to avoid log spam on every request.
static API_KEY_CACHE: OnceLock<String> = OnceLock::new();

/// Get the expected API key, reading from environment once and caching.
pub fn get_expected_api_key() -> &'static str {
    API_KEY_CACHE.get_or_init(|| {
        std::env::var("WAYPOINT_API_KEY").unwrap_or_else(|_| {
            warn!("WAYPOINT_API_KEY not set, using default test key - DO NOT USE IN PRODUCTION");
            DEFAULT_TEST_KEY.to_string()
        })
    })
}

/// Constant-time string comparison to prevent timing side-channel attacks.
///
/// Length comparison is not constant-time (length may leak); content
/// comparison is.
#[inline]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();
    a_bytes.len() == b_bytes.len() && bool::from(a_bytes.ct_eq(b_bytes))
}

/// Middleware guarding admin routes with an API key check.
///
/// Reads the expected key from the `WAYPOINT_API_KEY` environment variable,
/// falling back to a test key with a warning when unset.
///
/// # Example
/// ```ignore
/// use axum::{Router, middleware, routing::post};
/// use common::middleware::require_api_key;
///
/// let admin = Router::new()
///     .route("/admin/health/reset", post(reset_health))
///     .layer(middleware::from_fn(require_api_key));
/// ```
pub async fn require_api_key(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let expected_key = get_expected_api_key();

    let provided_key = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());

    match provided_key {
        Some(key) if constant_time_eq(key, expected_key) => Ok(next.run(request).await),
        Some(_) => {
            warn!("Invalid API key provided");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            warn!("No API key provided in {} header", API_KEY_HEADER);
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
