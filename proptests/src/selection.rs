//! Property-based tests for gateway health scoring and selection.
//!
//! Tests the following invariants:
//! - Fresh state ties resolve toward configuration order
//! - Ranking output is sorted best-first and covers every candidate
//! - More recorded successes never rank a gateway lower
//! - A failed gateway is excluded for exactly the cooldown period
//! - Fail-open clears every failed flag; fail-closed selects nothing
//! - The recency bonus never increases as a success ages

use crate::strategies::*;
use common::health::{FAILURE_COOLDOWN_MS, GatewayHealth};
use common::select::{GatewaySelector, rank_gateways};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// With no recorded history every score is 0.0, so the first
    /// configured gateway must win.
    #[test]
    fn prop_fresh_state_follows_configuration_order(
        count in 1usize..6,
        now in now_ms_strategy(),
    ) {
        let bases = test_gateways(count);
        let health = GatewayHealth::new();
        let selector = GatewaySelector::new(bases.clone(), true);

        prop_assert_eq!(selector.select(&health, now), Some(bases[0].clone()));
    }

    /// Whatever history accumulated, ranking returns every candidate
    /// exactly once, sorted best-first.
    #[test]
    fn prop_ranking_is_a_sorted_permutation(
        ops in prop::collection::vec((0usize..4, prop::bool::ANY), 0..40),
        now in now_ms_strategy(),
    ) {
        let bases = test_gateways(4);
        let health = GatewayHealth::new();
        for (i, (idx, success)) in ops.iter().enumerate() {
            let gw = &bases[*idx];
            if *success {
                let url = format!("{}k{}", gw, i);
                health.record_success(gw, &format!("k{}", i), &url, now);
            } else {
                health.record_failure(gw, now);
            }
        }

        let ranked = rank_gateways(&health, &bases, now);

        prop_assert_eq!(ranked.len(), bases.len());
        let mut seen: Vec<&str> = ranked.iter().map(|r| r.base.as_str()).collect();
        seen.sort_unstable();
        let mut expected: Vec<&str> = bases.iter().map(String::as_str).collect();
        expected.sort_unstable();
        prop_assert_eq!(seen, expected);
        for pair in ranked.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
    }

    /// With equal recency, the gateway with more successes ranks first.
    #[test]
    fn prop_more_successes_rank_higher(
        base_count in 1u64..20,
        extra in 1u64..20,
        now in now_ms_strategy(),
    ) {
        let bases = test_gateways(2);
        let health = GatewayHealth::new();
        for i in 0..base_count {
            health.record_success(&bases[0], &format!("a{}", i), "u", now);
        }
        for i in 0..(base_count + extra) {
            health.record_success(&bases[1], &format!("b{}", i), "u", now);
        }

        let ranked = rank_gateways(&health, &bases, now);
        prop_assert_eq!(ranked[0].base.as_str(), bases[1].as_str());
    }

    /// A failed gateway stays out of selection for the whole cooldown.
    #[test]
    fn prop_failed_gateway_excluded_during_cooldown(
        age in 0u64..FAILURE_COOLDOWN_MS,
        now in now_ms_strategy(),
    ) {
        let bases = test_gateways(3);
        let health = GatewayHealth::new();
        let selector = GatewaySelector::new(bases.clone(), false);
        health.record_failure(&bases[0], now);

        let selected = selector.select(&health, now + age);

        prop_assert!(selected.is_some());
        prop_assert_ne!(selected.unwrap(), bases[0].clone());
    }

    /// A lone failed gateway yields nothing mid-cooldown and comes back
    /// the moment the cooldown lapses, without fail-open.
    #[test]
    fn prop_single_gateway_recovers_after_cooldown(
        age in 0u64..FAILURE_COOLDOWN_MS,
        now in now_ms_strategy(),
    ) {
        let bases = test_gateways(1);
        let health = GatewayHealth::new();
        let selector = GatewaySelector::new(bases.clone(), false);
        health.record_failure(&bases[0], now);

        prop_assert_eq!(selector.select(&health, now + age), None);
        prop_assert_eq!(
            selector.select(&health, now + FAILURE_COOLDOWN_MS),
            Some(bases[0].clone())
        );
    }

    /// When every gateway is failed and fail-open is on, selection still
    /// returns a configured gateway and clears every failed flag.
    #[test]
    fn prop_fail_open_restores_all_gateways(
        count in 1usize..5,
        now in now_ms_strategy(),
    ) {
        let bases = test_gateways(count);
        let health = GatewayHealth::new();
        let selector = GatewaySelector::new(bases.clone(), true);
        for base in &bases {
            health.record_failure(base, now);
        }

        let selected = selector.select(&health, now);

        prop_assert!(selected.is_some());
        prop_assert!(bases.contains(&selected.unwrap()));
        for base in &bases {
            prop_assert!(!health.is_failed(base, now));
        }
    }

    /// The same total outage without fail-open selects nothing and leaves
    /// the flags in place.
    #[test]
    fn prop_total_outage_without_fail_open_selects_nothing(
        count in 1usize..5,
        now in now_ms_strategy(),
    ) {
        let bases = test_gateways(count);
        let health = GatewayHealth::new();
        let selector = GatewaySelector::new(bases.clone(), false);
        for base in &bases {
            health.record_failure(base, now);
        }

        prop_assert_eq!(selector.select(&health, now), None);
        for base in &bases {
            prop_assert!(health.is_failed(base, now));
        }
    }

    /// A success's recency bonus can only shrink as it ages.
    #[test]
    fn prop_recency_bonus_decays_monotonically(
        d1 in 0u64..600_000,
        d2 in 0u64..600_000,
        now in now_ms_strategy(),
    ) {
        let bases = test_gateways(1);
        let health = GatewayHealth::new();
        health.record_success(&bases[0], "k", "u", now);

        let (earlier, later) = (d1.min(d2), d1.max(d2));
        let score_earlier = health.score(&bases[0], now + earlier);
        let score_later = health.score(&bases[0], now + later);

        prop_assert!(
            score_earlier >= score_later,
            "score rose from {} to {} as the success aged",
            score_earlier,
            score_later
        );
    }
}
