//! Property-based tests for the sliding-window rate limiter.
//!
//! Tests the following invariants:
//! - Exactly `max_count` requests are admitted per window
//! - Rejected requests consume nothing and never extend the window
//! - `remaining` counts down by one per admitted request
//! - Rejections always carry a retry hint of at least one second
//! - Buckets are isolated per key
//! - Pruning drops exactly the buckets with no live timestamps

use crate::strategies::*;
use common::ratelimit::RateLimiter;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Hammering one key at a single instant admits exactly `max` requests.
    #[test]
    fn prop_exactly_max_requests_admitted(
        max in limit_strategy(),
        window in window_strategy(),
        extra in 1u64..10,
        now in now_ms_strategy(),
    ) {
        let limiter = RateLimiter::new();

        let mut admitted = 0u64;
        for _ in 0..(max + extra) {
            if limiter.check_and_record("key", now, window, max).allowed {
                admitted += 1;
            }
        }

        prop_assert_eq!(admitted, max);
    }

    /// Rejected requests are not recorded, so the window still clears at
    /// `now + window` no matter how many rejections happened meanwhile.
    #[test]
    fn prop_rejections_never_extend_the_window(
        max in limit_strategy(),
        window in window_strategy(),
        rejections in 1u64..20,
        now in now_ms_strategy(),
    ) {
        let limiter = RateLimiter::new();
        for _ in 0..max {
            prop_assert!(limiter.check_and_record("key", now, window, max).allowed);
        }
        for _ in 0..rejections {
            let decision = limiter.check_and_record("key", now + window / 2, window, max);
            prop_assert!(!decision.allowed);
        }

        let decision = limiter.check_and_record("key", now + window, window, max);
        prop_assert!(decision.allowed, "window should have cleared at now + window");
    }

    /// Each admitted request decrements `remaining` by exactly one.
    #[test]
    fn prop_remaining_counts_down(
        max in limit_strategy(),
        window in window_strategy(),
        now in now_ms_strategy(),
    ) {
        let limiter = RateLimiter::new();

        for i in 0..max {
            let decision = limiter.check_and_record("key", now, window, max);
            prop_assert!(decision.allowed);
            prop_assert_eq!(decision.remaining, max - 1 - i);
        }
    }

    /// A rejection points at the oldest recorded request leaving the
    /// window, and the retry hint is never zero.
    #[test]
    fn prop_rejection_reset_matches_oldest_entry(
        max in limit_strategy(),
        window in window_strategy(),
        now in now_ms_strategy(),
    ) {
        let limiter = RateLimiter::new();
        for _ in 0..max {
            limiter.check_and_record("key", now, window, max);
        }

        let decision = limiter.check_and_record("key", now, window, max);

        prop_assert!(!decision.allowed);
        prop_assert_eq!(decision.reset_at_ms, now + window);
        prop_assert_eq!(decision.retry_after_secs, window.div_ceil(1000).max(1));
    }

    /// Exhausting one key leaves every other key untouched.
    #[test]
    fn prop_keys_are_isolated(
        max in limit_strategy(),
        window in window_strategy(),
        now in now_ms_strategy(),
    ) {
        let limiter = RateLimiter::new();
        for _ in 0..(max + 1) {
            limiter.check_and_record("noisy", now, window, max);
        }

        let decision = limiter.check_and_record("quiet", now, window, max);

        prop_assert!(decision.allowed);
        prop_assert_eq!(decision.remaining, max - 1);
    }

    /// Pruning drops exactly the buckets whose every timestamp has aged
    /// out, and leaves the rest tracked.
    #[test]
    fn prop_prune_drops_only_expired_buckets(
        window in window_strategy(),
        now in now_ms_strategy(),
    ) {
        let limiter = RateLimiter::new();
        limiter.check_and_record("old", now, window, 10);
        limiter.check_and_record("fresh", now + window - 1, window, 10);

        let dropped = limiter.prune_stale(now + window, window);

        prop_assert_eq!(dropped, 1);
        prop_assert_eq!(limiter.tracked_keys(), 1);
    }
}
