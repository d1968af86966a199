//! Resolver entry point for the Waypoint content edge.
//!
//! The resolver fronts a set of public IPFS gateways: it maps content
//! references to fetchable URLs, proxies content through the healthiest
//! gateway with failover, and shields the upstreams with fingerprint-based
//! rate limiting.

mod background;
mod config;
mod handlers;
mod metrics;
mod middleware;
mod state;

use anyhow::Result;
use axum::{
    Router,
    routing::{get, post},
};
use clap::Parser;
use common::classify::ClientClassifier;
use common::health::GatewayHealth;
use common::ratelimit::RateLimiter;
use common::resolve::UrlResolver;
use common::select::GatewaySelector;
use common::{Clock, SystemClock};
use config::ResolverConfig;
use metrics::Metrics;
use quick_cache::sync::Cache;
use state::AppState;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file (default: waypoint.toml)
    #[arg(long, env = "WAYPOINT_CONFIG")]
    config: Option<String>,

    /// Port to listen on (overrides the config file)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    info!(version = env!("CARGO_PKG_VERSION"), "Starting resolver");

    let mut config = ResolverConfig::load(args.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid config: {}", e))?;

    info!(
        gateways = config.gateways.bases.len(),
        fail_open = config.gateways.fail_open_on_total_outage,
        transform_enabled = config.resolve.transform.enabled,
        "Configuration loaded"
    );

    let config = Arc::new(config);
    let health = Arc::new(GatewayHealth::new());
    let selector = Arc::new(GatewaySelector::new(
        config.gateways.bases.clone(),
        config.gateways.fail_open_on_total_outage,
    ));
    let resolver = UrlResolver::new(
        health.clone(),
        selector.clone(),
        config.resolve.fallback_asset.clone(),
        config.resolve.transform.clone(),
    );

    // Shared HTTP client with connection pooling for gateway fetches
    let http_client = reqwest::Client::builder()
        .pool_max_idle_per_host(20)
        .pool_idle_timeout(std::time::Duration::from_secs(90))
        .connect_timeout(std::time::Duration::from_secs(
            config.gateways.connect_timeout_secs,
        ))
        .timeout(std::time::Duration::from_secs(
            config.gateways.fetch_timeout_secs,
        ))
        .user_agent(concat!("waypoint-resolver/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

    // Build application state
    let app_state = Arc::new(AppState {
        clock: Arc::new(SystemClock) as Arc<dyn Clock>,
        health,
        selector,
        resolver,
        request_limits: Arc::new(RateLimiter::new()),
        tx_limits: Arc::new(RateLimiter::new()),
        classifier: Arc::new(ClientClassifier::new(
            config.classifier.rules.clone(),
            config.classifier.threshold,
        )),
        http_client,
        content_cache: Arc::new(Cache::new(config::CONTENT_CACHE_MAX_ENTRIES)),
        metrics: Metrics::new(),
        config: config.clone(),
    });

    // Build HTTP router. The metrics layer is added last so it is
    // outermost and counts rate-limited requests too.
    let app = Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/resolve", get(handlers::resolve_url))
        .route("/content/:hash", get(handlers::fetch_content))
        .route("/content/:hash/*path", get(handlers::fetch_content_path))
        .route("/stats", get(handlers::get_stats))
        .route("/metrics", get(handlers::metrics_handler))
        .route(
            "/admin/health/reset",
            post(handlers::admin_reset_health)
                .layer(axum::middleware::from_fn(common::middleware::require_api_key)),
        )
        .route(
            "/admin/cache/invalidate/:hash",
            post(handlers::admin_invalidate)
                .layer(axum::middleware::from_fn(common::middleware::require_api_key)),
        )
        .layer(axum::middleware::from_fn_with_state(
            app_state.clone(),
            middleware::rate_limit,
        ))
        .layer(axum::middleware::from_fn_with_state(
            app_state.clone(),
            middleware::track_requests,
        ))
        .with_state(app_state.clone());

    // Spawn background sweep
    let state_clone = app_state.clone();
    tokio::spawn(async move {
        background::sweep_loop(state_clone).await;
    });

    let ip: std::net::IpAddr = config.server.bind_addr.parse().map_err(|e| {
        anyhow::anyhow!("Invalid bind address {}: {}", config.server.bind_addr, e)
    })?;
    let addr = std::net::SocketAddr::from((ip, config.server.port));
    info!(addr = %addr, "Resolver listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

    Ok(())
}

/// Sets up a handler for Ctrl+C and termination signals for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Signal received, shutting down gracefully");
}
