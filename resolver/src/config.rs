//! Resolver configuration module.
//!
//! Loads settings from `waypoint.toml` with environment variable overrides.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in this priority order (highest wins):
//! 1. Environment variables (e.g., `GATEWAY_BASES`, `RATE_LIMIT_GENERAL_MAX`)
//! 2. TOML file (`waypoint.toml` by default)
//! 3. Built-in defaults
//!
//! # Sections
//!
//! | Section | Purpose |
//! |---------|---------|
//! | `server` | Bind address and HTTP port |
//! | `gateways` | Gateway base URLs, fail-open policy, fetch retries/timeouts |
//! | `resolve` | Fallback asset, image-transform parameters |
//! | `rate_limit` | Request tiers and transaction category limits |
//! | `classifier` | User-Agent signature rules and threshold |
//!
//! # Example
//!
//! ```toml
//! [gateways]
//! bases = ["https://ipfs.io/ipfs/", "https://dweb.link/ipfs/"]
//! fail_open_on_total_outage = true
//!
//! [rate_limit.general]
//! max_requests = 100
//! window_ms = 60000
//!
//! [[rate_limit.transactions]]
//! category = "burn"
//! max_requests = 10
//! path_prefixes = ["/api/burn"]
//! ```

use common::classify::{SignatureRule, default_rules, default_threshold};
use common::resolve::TransformOptions;
use serde::{Deserialize, Serialize};
use tracing::warn;

// ============================================================================
// Constants
// ============================================================================

/// Interval for the background sweep of expired health/cache/bucket state
pub const SWEEP_INTERVAL_SECS: u64 = 60;

/// Maximum entries in the fetched-content cache (LRU eviction).
/// Each entry holds one object body capped at `MAX_CACHED_OBJECT_BYTES`,
/// so 2048 entries x 4 MiB = 8 GiB worst case; typical NFT imagery is
/// well under 200 KB, putting the expected footprint near 400 MB.
pub const CONTENT_CACHE_MAX_ENTRIES: usize = 2048;

/// Objects larger than this are served but not cached (4 MiB)
pub const MAX_CACHED_OBJECT_BYTES: usize = 4 * 1024 * 1024;

/// Hard cap on a buffered gateway response (32 MiB). Larger bodies abort
/// the fetch rather than grow the heap.
pub const MAX_FETCH_RESPONSE_BYTES: usize = 32 * 1024 * 1024;

// ============================================================================
// Sections
// ============================================================================

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ResolverConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub gateways: GatewaysConfig,
    #[serde(default)]
    pub resolve: ResolveConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_port() -> u16 {
    8080
}
fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

/// Gateway pool configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewaysConfig {
    /// Gateway base URLs in priority order (ties in health score resolve
    /// toward the front of this list)
    #[serde(default = "default_gateway_bases")]
    pub bases: Vec<String>,
    /// When every gateway is inside its failure cooldown, clear all flags
    /// and retry the full list instead of giving up
    #[serde(default = "default_true")]
    pub fail_open_on_total_outage: bool,
    /// How many gateways to try per content fetch before giving up
    #[serde(default = "default_fetch_attempts")]
    pub fetch_attempts: u32,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for GatewaysConfig {
    fn default() -> Self {
        Self {
            bases: default_gateway_bases(),
            fail_open_on_total_outage: true,
            fetch_attempts: default_fetch_attempts(),
            connect_timeout_secs: default_connect_timeout_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_gateway_bases() -> Vec<String> {
    [
        "https://ipfs.io/ipfs/",
        "https://dweb.link/ipfs/",
        "https://cloudflare-ipfs.com/ipfs/",
        "https://gateway.pinata.cloud/ipfs/",
        "https://nftstorage.link/ipfs/",
        "https://4everland.io/ipfs/",
        "https://w3s.link/ipfs/",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_fetch_attempts() -> u32 {
    3
}
fn default_connect_timeout_secs() -> u64 {
    5
}
fn default_fetch_timeout_secs() -> u64 {
    15
}

/// URL resolution configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolveConfig {
    /// Local asset served when a reference cannot be resolved
    #[serde(default = "default_fallback_asset")]
    pub fallback_asset: String,
    #[serde(default)]
    pub transform: TransformOptions,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            fallback_asset: default_fallback_asset(),
            transform: TransformOptions::default(),
        }
    }
}

fn default_fallback_asset() -> String {
    "/assets/placeholder.png".to_string()
}

/// Rate limit configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Tier for ordinary browser traffic
    #[serde(default)]
    pub general: TierLimit,
    /// Stricter tier for clients classified as automated
    #[serde(default = "default_bot_tier")]
    pub bot: TierLimit,
    /// Per-category limits gating sensitive operations by path prefix
    #[serde(default = "default_transaction_limits")]
    pub transactions: Vec<TransactionLimit>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            general: TierLimit::default(),
            bot: default_bot_tier(),
            transactions: default_transaction_limits(),
        }
    }
}

/// One sliding-window limit: `max_requests` per `window_ms`
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct TierLimit {
    #[serde(default = "default_general_max")]
    pub max_requests: u64,
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

impl Default for TierLimit {
    fn default() -> Self {
        Self {
            max_requests: default_general_max(),
            window_ms: default_window_ms(),
        }
    }
}

fn default_general_max() -> u64 {
    100
}
fn default_window_ms() -> u64 {
    60_000
}
fn default_bot_tier() -> TierLimit {
    TierLimit {
        max_requests: 15,
        window_ms: 60_000,
    }
}

/// Sub-limit for one transaction category
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransactionLimit {
    pub category: String,
    pub max_requests: u64,
    #[serde(default = "default_tx_window_ms")]
    pub window_ms: u64,
    /// Request paths starting with any of these prefixes count against
    /// this category
    pub path_prefixes: Vec<String>,
}

fn default_tx_window_ms() -> u64 {
    3_600_000
}
fn default_transaction_limits() -> Vec<TransactionLimit> {
    vec![
        TransactionLimit {
            category: "burn".to_string(),
            max_requests: 10,
            window_ms: default_tx_window_ms(),
            path_prefixes: vec!["/api/burn".to_string()],
        },
        TransactionLimit {
            category: "approve".to_string(),
            max_requests: 5,
            window_ms: default_tx_window_ms(),
            path_prefixes: vec!["/api/approve".to_string()],
        },
    ]
}

/// Client classifier configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_rules")]
    pub rules: Vec<SignatureRule>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            rules: default_rules(),
        }
    }
}

/// Parse boolean from env var string (truthy unless "0", "false", or "FALSE")
fn parse_bool_env(val: &str) -> bool {
    !matches!(val, "0" | "false" | "FALSE")
}

/// Parse comma-separated gateway base list from env var string.
fn parse_base_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl ResolverConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = path.unwrap_or("waypoint.toml");

        let mut config = if std::path::Path::new(config_path).exists() {
            let content = std::fs::read_to_string(config_path)?;
            toml::from_str(&content)?
        } else {
            warn!(path = config_path, "No config file found, using defaults");
            ResolverConfig::default()
        };

        // Environment variable overrides
        if let Ok(val) = std::env::var("PORT") {
            if let Ok(port) = val.parse() {
                config.server.port = port;
            }
        }
        if let Ok(val) = std::env::var("BIND_ADDR") {
            if !val.trim().is_empty() {
                config.server.bind_addr = val;
            }
        }

        // Gateway pool env overrides
        if let Ok(val) = std::env::var("GATEWAY_BASES") {
            let bases = parse_base_list(&val);
            if !bases.is_empty() {
                config.gateways.bases = bases;
            }
        }
        if let Ok(val) = std::env::var("FAIL_OPEN_ON_TOTAL_OUTAGE") {
            config.gateways.fail_open_on_total_outage = parse_bool_env(&val);
        }
        if let Ok(val) = std::env::var("FETCH_ATTEMPTS") {
            if let Ok(n) = val.parse() {
                config.gateways.fetch_attempts = n;
            }
        }
        if let Ok(val) = std::env::var("GATEWAY_CONNECT_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                config.gateways.connect_timeout_secs = n;
            }
        }
        if let Ok(val) = std::env::var("GATEWAY_FETCH_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                config.gateways.fetch_timeout_secs = n;
            }
        }

        // Resolution env overrides
        if let Ok(val) = std::env::var("FALLBACK_ASSET") {
            if !val.trim().is_empty() {
                config.resolve.fallback_asset = val;
            }
        }
        if let Ok(val) = std::env::var("TRANSFORM_ENABLED") {
            config.resolve.transform.enabled = parse_bool_env(&val);
        }
        if let Ok(val) = std::env::var("TRANSFORM_WIDTH") {
            if let Ok(n) = val.parse() {
                config.resolve.transform.width = n;
            }
        }

        // Rate limit env overrides
        if let Ok(val) = std::env::var("RATE_LIMIT_GENERAL_MAX") {
            if let Ok(n) = val.parse() {
                config.rate_limit.general.max_requests = n;
            }
        }
        if let Ok(val) = std::env::var("RATE_LIMIT_GENERAL_WINDOW_MS") {
            if let Ok(n) = val.parse() {
                config.rate_limit.general.window_ms = n;
            }
        }
        if let Ok(val) = std::env::var("RATE_LIMIT_BOT_MAX") {
            if let Ok(n) = val.parse() {
                config.rate_limit.bot.max_requests = n;
            }
        }
        if let Ok(val) = std::env::var("RATE_LIMIT_BOT_WINDOW_MS") {
            if let Ok(n) = val.parse() {
                config.rate_limit.bot.window_ms = n;
            }
        }

        // Classifier env overrides
        if let Ok(val) = std::env::var("CLASSIFIER_THRESHOLD") {
            if let Ok(n) = val.parse() {
                config.classifier.threshold = n;
            }
        }

        config.normalize();
        Ok(config)
    }

    /// Trim gateway bases, drop empties, and ensure a trailing slash so the
    /// base string doubles as a stable health-map key.
    fn normalize(&mut self) {
        self.gateways.bases = self
            .gateways
            .bases
            .iter()
            .map(|base| base.trim())
            .filter(|base| !base.is_empty())
            .map(|base| {
                if base.ends_with('/') {
                    base.to_string()
                } else {
                    format!("{base}/")
                }
            })
            .collect();
    }

    /// Validate configuration before the service starts
    pub fn validate(&self) -> Result<(), String> {
        if self.gateways.bases.is_empty() {
            return Err("gateways.bases must list at least one gateway".to_string());
        }
        if self.gateways.fetch_attempts == 0 {
            return Err("gateways.fetch_attempts must be at least 1".to_string());
        }
        if self.rate_limit.general.window_ms == 0 || self.rate_limit.bot.window_ms == 0 {
            return Err("rate_limit windows must be non-zero".to_string());
        }
        for tx in &self.rate_limit.transactions {
            if tx.window_ms == 0 {
                return Err(format!(
                    "rate_limit.transactions window for '{}' must be non-zero",
                    tx.category
                ));
            }
            if tx.path_prefixes.is_empty() {
                return Err(format!(
                    "rate_limit.transactions '{}' must gate at least one path prefix",
                    tx.category
                ));
            }
        }
        Ok(())
    }

    /// Longest window across the request tiers, for conservative pruning.
    pub fn max_request_window_ms(&self) -> u64 {
        self.rate_limit
            .general
            .window_ms
            .max(self.rate_limit.bot.window_ms)
    }

    /// Longest window across the transaction categories.
    pub fn max_transaction_window_ms(&self) -> u64 {
        self.rate_limit
            .transactions
            .iter()
            .map(|tx| tx.window_ms)
            .max()
            .unwrap_or(0)
    }
}
