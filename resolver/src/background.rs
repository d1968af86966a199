//! Background task loops for the resolver.

use crate::config::SWEEP_INTERVAL_SECS;
use crate::state::AppState;
use std::sync::Arc;
use tracing::debug;

/// Sweep expired state periodically.
///
/// Reads and writes already skip stale entries lazily, so the sweep only
/// bounds memory: without it, entries for clients and hashes that never
/// come back would sit in the maps forever.
pub async fn sweep_loop(state: Arc<AppState>) {
    loop {
        tokio::time::sleep(std::time::Duration::from_secs(SWEEP_INTERVAL_SECS)).await;

        let now = state.now_ms();
        let report = state.health.sweep(now);

        let dropped_request_buckets = state
            .request_limits
            .prune_stale(now, state.config.max_request_window_ms());
        let dropped_tx_buckets = state
            .tx_limits
            .prune_stale(now, state.config.max_transaction_window_ms());

        // Occupancy gauges for dashboards
        state
            .metrics
            .resolved_cache_entries
            .set(state.health.resolved_entries() as i64);
        state
            .metrics
            .tracked_fingerprints
            .set(state.request_limits.tracked_keys() as i64);

        debug!(
            expired_cache_entries = report.expired_cache_entries,
            cleared_failed_flags = report.cleared_failed_flags,
            dropped_request_buckets = dropped_request_buckets,
            dropped_tx_buckets = dropped_tx_buckets,
            "Sweep completed"
        );
    }
}
