//! Application state for the resolver.
//!
//! This module defines `AppState`, the central shared state for all HTTP
//! handlers and background tasks in the resolver.
//!
//! # Concurrency Model
//!
//! All request-path state is lock-free or sharded:
//! - `GatewayHealth` and `RateLimiter` are built on `DashMap`
//! - `quick_cache::Cache` for the fetched-content cache (bounded LRU)
//! - the selector's round-robin cursor is a single `AtomicU64`
//! - the Prometheus registry sits behind a `parking_lot::RwLock` and is
//!   only write-locked at registration time

use std::sync::Arc;

use bytes::Bytes;
use common::Clock;
use common::classify::ClientClassifier;
use common::health::GatewayHealth;
use common::ratelimit::RateLimiter;
use common::resolve::UrlResolver;
use common::select::GatewaySelector;
use quick_cache::sync::Cache;

use crate::config::ResolverConfig;
use crate::metrics::Metrics;

/// One cached content object.
#[derive(Clone)]
pub struct CachedContent {
    pub body: Bytes,
    pub content_type: String,
}

/// Shared application state for all HTTP handlers and background tasks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ResolverConfig>,
    /// Injected time source; tests swap in a manual clock
    pub clock: Arc<dyn Clock>,
    pub health: Arc<GatewayHealth>,
    pub selector: Arc<GatewaySelector>,
    pub resolver: UrlResolver,
    /// Request-tier buckets (general and bot tiers share fingerprint keys)
    pub request_limits: Arc<RateLimiter>,
    /// Transaction-category buckets, keyed `<category>:<fingerprint>`
    pub tx_limits: Arc<RateLimiter>,
    pub classifier: Arc<ClientClassifier>,
    /// Shared HTTP client for connection pooling and reuse
    pub http_client: reqwest::Client,
    /// Fetched-content cache (cache key -> body) - LRU with bounded size
    pub content_cache: Arc<Cache<String, CachedContent>>,
    /// Prometheus Metrics
    pub metrics: Metrics,
}

impl AppState {
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }
}
