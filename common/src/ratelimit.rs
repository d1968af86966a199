//! Sliding-window rate limiting.
//!
//! Each client fingerprint owns a queue of request timestamps. A check
//! prunes timestamps older than the window, rejects if the remainder is at
//! the limit, and otherwise records the request. Rejections are not
//! recorded, so a client hammering past the limit does not extend its own
//! lockout.
//!
//! Buckets live in process memory. In a multi-instance deployment each
//! instance counts independently, which under-counts the true global rate;
//! acceptable for coarse abuse deterrence.

use std::collections::VecDeque;

use dashmap::DashMap;
use tracing::warn;

/// Upper bound on tracked fingerprints. At the cap, requests from unknown
/// fingerprints are admitted without being recorded.
pub const MAX_TRACKED_FINGERPRINTS: usize = 100_000;

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// The limit that applied to this check.
    pub limit: u64,
    /// Requests left in the current window after this one.
    pub remaining: u64,
    /// When the oldest recorded request leaves the window.
    pub reset_at_ms: u64,
    /// Seconds to wait before retrying; 0 when admitted.
    pub retry_after_secs: u64,
}

/// Sliding-window request counters keyed by client fingerprint.
///
/// One instance per limit domain: the service keeps one for request-tier
/// limits and a separate one for transaction categories, so a burst of page
/// loads cannot consume a client's transaction allowance.
#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: DashMap<String, VecDeque<u64>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits or rejects a request for `key`, recording the timestamp when
    /// admitted. Prune, check, then record; rejected requests leave the
    /// bucket untouched.
    pub fn check_and_record(
        &self,
        key: &str,
        now_ms: u64,
        window_ms: u64,
        max_count: u64,
    ) -> RateLimitDecision {
        // Approximate under concurrent inserts; the cap is a memory guard,
        // not an exact count
        if !self.buckets.contains_key(key) && self.buckets.len() >= MAX_TRACKED_FINGERPRINTS {
            warn!(
                tracked = self.buckets.len(),
                "Fingerprint bucket cap reached; admitting without recording"
            );
            return RateLimitDecision {
                allowed: true,
                limit: max_count,
                remaining: 0,
                reset_at_ms: now_ms.saturating_add(window_ms),
                retry_after_secs: 0,
            };
        }

        let mut bucket = self.buckets.entry(key.to_string()).or_default();
        prune_window(&mut bucket, now_ms, window_ms);

        if bucket.len() as u64 >= max_count {
            let oldest = bucket.front().copied().unwrap_or(now_ms);
            let reset_at_ms = oldest.saturating_add(window_ms);
            return RateLimitDecision {
                allowed: false,
                limit: max_count,
                remaining: 0,
                reset_at_ms,
                retry_after_secs: reset_at_ms.saturating_sub(now_ms).div_ceil(1000).max(1),
            };
        }

        bucket.push_back(now_ms);
        let oldest = bucket.front().copied().unwrap_or(now_ms);
        RateLimitDecision {
            allowed: true,
            limit: max_count,
            remaining: max_count.saturating_sub(bucket.len() as u64),
            reset_at_ms: oldest.saturating_add(window_ms),
            retry_after_secs: 0,
        }
    }

    /// Prunes every bucket against `window_ms` and drops the ones that end
    /// up empty. Returns how many buckets were dropped.
    pub fn prune_stale(&self, now_ms: u64, window_ms: u64) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| {
            prune_window(bucket, now_ms, window_ms);
            !bucket.is_empty()
        });
        before.saturating_sub(self.buckets.len())
    }

    /// Number of fingerprints currently holding at least one timestamp.
    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }
}

// Timestamps stamped in the future (clock skew) stay in the window.
fn prune_window(bucket: &mut VecDeque<u64>, now_ms: u64, window_ms: u64) {
    while let Some(&front) = bucket.front() {
        if front > now_ms || now_ms.saturating_sub(front) < window_ms {
            break;
        }
        bucket.pop_front();
    }
}
