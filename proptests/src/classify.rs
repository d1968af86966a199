//! Property-based tests for User-Agent classification.
//!
//! Tests the following invariants:
//! - Real browser agents stay in the standard tier
//! - Known automation agents land in the automated tier
//! - Classification is insensitive to casing
//! - Repeating tokens from one rule never inflates the score
//! - Missing or blank agents are treated as automated

use crate::strategies::*;
use common::classify::{ClientClassifier, ClientTier, default_rules};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Browser agents must not trip the default signature rules.
    #[test]
    fn prop_browser_uas_are_standard(ua in browser_ua_strategy()) {
        let classifier = ClientClassifier::default();
        let classification = classifier.classify(Some(&ua));

        prop_assert_eq!(
            classification.tier,
            ClientTier::Standard,
            "browser UA misclassified (matched: {:?}): {}",
            classification.matched,
            ua
        );
    }

    /// Automation agents must reach the automated tier under defaults.
    #[test]
    fn prop_bot_uas_are_automated(ua in bot_ua_strategy()) {
        let classifier = ClientClassifier::default();
        let classification = classifier.classify(Some(&ua));

        prop_assert_eq!(
            classification.tier,
            ClientTier::Automated,
            "automation UA slipped through: {}",
            ua
        );
    }

    /// Casing never changes the outcome.
    #[test]
    fn prop_classification_ignores_case(ua in bot_ua_strategy()) {
        let classifier = ClientClassifier::default();

        let original = classifier.classify(Some(&ua));
        let upper = classifier.classify(Some(&ua.to_uppercase()));
        let lower = classifier.classify(Some(&ua.to_lowercase()));

        prop_assert_eq!(original.tier, upper.tier);
        prop_assert_eq!(original.tier, lower.tier);
        prop_assert_eq!(original.score, upper.score);
    }

    /// Doubling an agent string repeats its tokens but matches the same
    /// rules, so the score must not change.
    #[test]
    fn prop_repeated_tokens_score_once(ua in bot_ua_strategy()) {
        let classifier = ClientClassifier::default();

        let once = classifier.classify(Some(&ua));
        let doubled = classifier.classify(Some(&format!("{} {}", ua, ua)));

        prop_assert_eq!(once.score, doubled.score);
        prop_assert_eq!(once.matched, doubled.matched);
    }

    /// Absent and whitespace-only agents are indistinguishable and both
    /// land in the automated tier.
    #[test]
    fn prop_missing_or_blank_ua_is_automated(blank in "[ \t]{0,10}") {
        let classifier = ClientClassifier::default();

        prop_assert_eq!(
            classifier.classify(Some(&blank)).tier,
            ClientTier::Automated
        );
        prop_assert_eq!(classifier.classify(None).tier, ClientTier::Automated);
    }

    /// An unreachable threshold keeps even obvious automation in the
    /// standard tier; the score still reports what matched.
    #[test]
    fn prop_unreachable_threshold_never_automates(ua in bot_ua_strategy()) {
        let classifier = ClientClassifier::new(default_rules(), 100.0);
        let classification = classifier.classify(Some(&ua));

        prop_assert_eq!(classification.tier, ClientTier::Standard);
        prop_assert!(classification.score >= 1.0);
    }
}
