//! Prometheus metrics for the resolver.
//!
//! This module defines all metrics exported at the `/metrics` endpoint.
//!
//! # Key Metrics
//!
//! | Metric | Type | Description |
//! |--------|------|-------------|
//! | `resolver_http_requests_total` | Counter | Total requests by method/status |
//! | `resolver_request_duration_seconds` | Histogram | Request latency distribution |
//! | `resolver_resolutions_total` | Counter | Resolutions by source (cache/selected/...) |
//! | `resolver_rate_limited_total` | Counter | 429 rejections by tier or category |
//! | `resolver_gateway_fetches_total` | Counter | Upstream fetches by gateway/outcome |
//! | `resolver_content_cache_hits_total` | Counter | Fetched-content cache hits |
//! | `resolver_resolved_cache_entries` | Gauge | Live resolved-gateway cache entries |
//!
//! # Scraping
//!
//! Configure Prometheus to scrape `http://resolver:8080/metrics` at your
//! desired interval.

use parking_lot::RwLock;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use std::sync::Arc;

/// Prometheus metrics collection for the resolver.
///
/// All metrics are registered with the Prometheus registry on construction
/// and can be scraped via the `/metrics` HTTP endpoint.
///
/// Uses `parking_lot::RwLock` for the registry to allow non-blocking
/// concurrent reads during metric encoding.
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<RwLock<Registry>>,
    pub http_requests: Family<[(String, String); 2], Counter>, // method, status
    pub http_duration: Family<[(String, String); 1], Histogram>, // method
    pub resolutions: Family<[(String, String); 1], Counter>,   // via
    pub rate_limited: Family<[(String, String); 1], Counter>,  // tier or category
    pub gateway_fetches: Family<[(String, String); 2], Counter>, // gateway, outcome
    pub fetch_duration: Histogram,
    pub content_cache_hits: Counter,
    pub content_cache_misses: Counter,
    pub download_bytes: Counter,
    pub resolved_cache_entries: Gauge,
    pub tracked_fingerprints: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let http_requests = Family::<[(String, String); 2], Counter>::default();
        registry.register(
            "resolver_http_requests_total",
            "Total HTTP requests handled",
            http_requests.clone(),
        );

        let http_duration =
            Family::<[(String, String); 1], Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.1, 2.0, 10))
            });
        registry.register(
            "resolver_request_duration_seconds",
            "HTTP request duration",
            http_duration.clone(),
        );

        let resolutions = Family::<[(String, String); 1], Counter>::default();
        registry.register(
            "resolver_resolutions_total",
            "URL resolutions by source",
            resolutions.clone(),
        );

        let rate_limited = Family::<[(String, String); 1], Counter>::default();
        registry.register(
            "resolver_rate_limited_total",
            "Requests rejected with 429 by tier or transaction category",
            rate_limited.clone(),
        );

        let gateway_fetches = Family::<[(String, String); 2], Counter>::default();
        registry.register(
            "resolver_gateway_fetches_total",
            "Upstream gateway fetches by outcome",
            gateway_fetches.clone(),
        );

        let fetch_duration = Histogram::new(exponential_buckets(0.1, 2.0, 10));
        registry.register(
            "resolver_fetch_duration_seconds",
            "Upstream gateway fetch duration",
            fetch_duration.clone(),
        );

        let content_cache_hits = Counter::default();
        registry.register(
            "resolver_content_cache_hits_total",
            "Total fetched-content cache hits",
            content_cache_hits.clone(),
        );

        let content_cache_misses = Counter::default();
        registry.register(
            "resolver_content_cache_misses_total",
            "Total fetched-content cache misses",
            content_cache_misses.clone(),
        );

        let download_bytes = Counter::default();
        registry.register(
            "resolver_download_bytes_total",
            "Total content bytes served",
            download_bytes.clone(),
        );

        let resolved_cache_entries = Gauge::default();
        registry.register(
            "resolver_resolved_cache_entries",
            "Live entries in the resolved-gateway cache",
            resolved_cache_entries.clone(),
        );

        let tracked_fingerprints = Gauge::default();
        registry.register(
            "resolver_tracked_fingerprints",
            "Client fingerprints currently holding rate-limit state",
            tracked_fingerprints.clone(),
        );

        Self {
            registry: Arc::new(RwLock::new(registry)),
            http_requests,
            http_duration,
            resolutions,
            rate_limited,
            gateway_fetches,
            fetch_duration,
            content_cache_hits,
            content_cache_misses,
            download_bytes,
            resolved_cache_entries,
            tracked_fingerprints,
        }
    }

    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        // Use read lock - multiple readers allowed, non-blocking with parking_lot
        let registry = self.registry.read();
        // Handle encoding errors gracefully instead of panicking
        if let Err(e) = encode(&mut buffer, &registry) {
            tracing::error!(error = %e, "Failed to encode Prometheus metrics");
            return format!("# Error encoding metrics: {}", e);
        }
        buffer
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
