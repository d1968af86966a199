//! Gateway health tracking and the resolved-gateway cache.
//!
//! Each gateway base accumulates success/failure counters plus the timestamp
//! of its most recent success. A weighted score derived from those counters
//! ranks gateways for selection; a recent success earns a bonus that decays
//! linearly to zero over [`RECENCY_WINDOW_MS`].
//!
//! Failures additionally set a transient failed flag that excludes the
//! gateway from selection for [`FAILURE_COOLDOWN_MS`], and evict every cached
//! resolution pointing at the failing gateway so clients are not steered back
//! to it.

use dashmap::DashMap;

/// How long a failed gateway stays excluded from selection.
pub const FAILURE_COOLDOWN_MS: u64 = 3 * 60 * 1000;

/// Lifetime of an entry in the resolved-gateway cache.
pub const RESOLVED_CACHE_TTL_MS: u64 = 5 * 60 * 1000;

/// Window over which the recency bonus decays to zero.
pub const RECENCY_WINDOW_MS: u64 = 5 * 60 * 1000;

/// Score contribution of one recorded success.
pub const SUCCESS_WEIGHT: f64 = 5.0;

/// Score penalty of one recorded failure.
pub const FAILURE_WEIGHT: f64 = 3.0;

/// Peak recency bonus, before scaling.
pub const RECENCY_BONUS_MAX: f64 = 5.0;

/// Multiplier applied to the decayed recency bonus.
pub const RECENCY_BONUS_SCALE: f64 = 2.0;

/// Per-gateway success/failure counters.
#[derive(Debug, Clone, Default)]
pub struct GatewayStats {
    pub successes: u64,
    pub failures: u64,
    pub last_success_ms: Option<u64>,
    pub failed_at_ms: Option<u64>,
}

/// A cached resolution: the URL a content reference resolved to, and the
/// gateway that produced it.
#[derive(Debug, Clone)]
pub struct ResolvedEntry {
    pub url: String,
    pub gateway: String,
    pub cached_at_ms: u64,
}

/// Point-in-time view of one gateway, for the stats endpoint.
#[derive(Debug, Clone)]
pub struct GatewaySnapshot {
    pub base: String,
    pub successes: u64,
    pub failures: u64,
    pub score: f64,
    pub failed: bool,
}

/// Counts from one sweep pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepReport {
    pub expired_cache_entries: usize,
    pub cleared_failed_flags: usize,
}

/// Shared health state for all configured gateways.
///
/// The service wraps this in an `Arc` and shares it between the resolver,
/// the selector, the handlers, and the background sweep.
#[derive(Debug, Default)]
pub struct GatewayHealth {
    /// Success/failure counters keyed by gateway base URL.
    stats: DashMap<String, GatewayStats>,
    /// Resolved-gateway cache keyed by content reference (`hash` or
    /// `hash/subpath`).
    resolved: DashMap<String, ResolvedEntry>,
}

impl GatewayHealth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful fetch of `key` through `gateway` and overwrites
    /// the cached resolution for `key` with `url`.
    ///
    /// Does not clear a pending failed flag: one success during the cooldown
    /// is not enough evidence that the gateway has recovered.
    pub fn record_success(&self, gateway: &str, key: &str, url: &str, now_ms: u64) {
        {
            let mut entry = self.stats.entry(gateway.to_string()).or_default();
            entry.successes += 1;
            entry.last_success_ms = Some(now_ms);
        }
        self.resolved.insert(
            key.to_string(),
            ResolvedEntry {
                url: url.to_string(),
                gateway: gateway.to_string(),
                cached_at_ms: now_ms,
            },
        );
    }

    /// Records a failed fetch through `gateway`, marks it failed for
    /// [`FAILURE_COOLDOWN_MS`], and evicts every cached resolution that
    /// points at it.
    pub fn record_failure(&self, gateway: &str, now_ms: u64) {
        {
            let mut entry = self.stats.entry(gateway.to_string()).or_default();
            entry.failures += 1;
            entry.failed_at_ms = Some(now_ms);
        }
        self.resolved.retain(|_, entry| entry.gateway != gateway);
    }

    /// Weighted health score for `gateway`. A gateway with no recorded
    /// history scores a neutral 0.0.
    pub fn score(&self, gateway: &str, now_ms: u64) -> f64 {
        let Some(entry) = self.stats.get(gateway) else {
            return 0.0;
        };
        let base =
            entry.successes as f64 * SUCCESS_WEIGHT - entry.failures as f64 * FAILURE_WEIGHT;
        base + Self::recency_bonus(entry.last_success_ms, now_ms)
    }

    fn recency_bonus(last_success_ms: Option<u64>, now_ms: u64) -> f64 {
        let Some(last) = last_success_ms else {
            return 0.0;
        };
        let age = now_ms.saturating_sub(last) as f64;
        let decay = (1.0 - age / RECENCY_WINDOW_MS as f64).max(0.0);
        decay * RECENCY_BONUS_MAX * RECENCY_BONUS_SCALE
    }

    /// Whether `gateway` is inside its failure cooldown. Read-only; elapsed
    /// flags are cleared by [`Self::sweep`].
    pub fn is_failed(&self, gateway: &str, now_ms: u64) -> bool {
        self.stats
            .get(gateway)
            .and_then(|entry| entry.failed_at_ms)
            .is_some_and(|failed_at| failed_at.saturating_add(FAILURE_COOLDOWN_MS) > now_ms)
    }

    /// Looks up a fresh cached resolution for `key`, removing the entry
    /// inline if it has expired.
    pub fn cached_url(&self, key: &str, now_ms: u64) -> Option<String> {
        self.cached_entry(key, now_ms).map(|entry| entry.url)
    }

    /// Like [`Self::cached_url`] but returns the whole entry, including the
    /// gateway that produced it.
    pub fn cached_entry(&self, key: &str, now_ms: u64) -> Option<ResolvedEntry> {
        let expired = match self.resolved.get(key) {
            Some(entry) if Self::cache_fresh(entry.cached_at_ms, now_ms) => {
                return Some(entry.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.resolved.remove(key);
        }
        None
    }

    // Entries stamped in the future (clock skew) count as fresh.
    fn cache_fresh(cached_at_ms: u64, now_ms: u64) -> bool {
        cached_at_ms > now_ms || now_ms.saturating_sub(cached_at_ms) < RESOLVED_CACHE_TTL_MS
    }

    /// Drops the cached resolution for `key`. Returns whether an entry was
    /// present.
    pub fn invalidate(&self, key: &str) -> bool {
        self.resolved.remove(key).is_some()
    }

    /// Drops every cached resolution for `hash`, including sub-path entries.
    /// Returns how many entries were removed.
    pub fn invalidate_hash(&self, hash: &str) -> usize {
        let before = self.resolved.len();
        let prefix = format!("{hash}/");
        self.resolved
            .retain(|key, _| key != hash && !key.starts_with(&prefix));
        before.saturating_sub(self.resolved.len())
    }

    /// Clears every failed flag. Used by the fail-open path when the whole
    /// gateway set is inside its cooldown.
    pub fn clear_failed_flags(&self) {
        for mut entry in self.stats.iter_mut() {
            entry.failed_at_ms = None;
        }
    }

    /// Evicts expired cache entries and clears elapsed failed flags.
    pub fn sweep(&self, now_ms: u64) -> SweepReport {
        let mut report = SweepReport::default();

        let before = self.resolved.len();
        self.resolved
            .retain(|_, entry| Self::cache_fresh(entry.cached_at_ms, now_ms));
        report.expired_cache_entries = before.saturating_sub(self.resolved.len());

        for mut entry in self.stats.iter_mut() {
            if let Some(failed_at) = entry.failed_at_ms
                && failed_at.saturating_add(FAILURE_COOLDOWN_MS) <= now_ms
            {
                entry.failed_at_ms = None;
                report.cleared_failed_flags += 1;
            }
        }
        report
    }

    /// Removes all health state, counters and cache alike.
    pub fn reset(&self) {
        self.stats.clear();
        self.resolved.clear();
    }

    /// Snapshot of every configured gateway, including ones with no recorded
    /// history yet.
    pub fn snapshot(&self, gateways: &[String], now_ms: u64) -> Vec<GatewaySnapshot> {
        gateways
            .iter()
            .map(|base| {
                let (successes, failures) = self
                    .stats
                    .get(base)
                    .map(|entry| (entry.successes, entry.failures))
                    .unwrap_or((0, 0));
                GatewaySnapshot {
                    base: base.clone(),
                    successes,
                    failures,
                    score: self.score(base, now_ms),
                    failed: self.is_failed(base, now_ms),
                }
            })
            .collect()
    }

    /// Number of live entries in the resolved-gateway cache.
    pub fn resolved_entries(&self) -> usize {
        self.resolved.len()
    }
}
