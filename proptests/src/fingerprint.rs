//! Property-based tests for client fingerprinting.
//!
//! Tests the following invariants:
//! - The fingerprint is a pure function of its inputs
//! - The IP always survives as a readable prefix
//! - Changing any single input moves the client to a different bucket
//! - Field boundaries are framed, so shifting bytes between fields
//!   produces a different digest

use crate::strategies::*;
use common::fingerprint::client_fingerprint;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Same inputs, same bucket.
    #[test]
    fn prop_fingerprint_is_deterministic(
        ip in ip_strategy(),
        ua in bot_ua_strategy(),
        lang in "[a-z]{2}(-[A-Z]{2})?",
    ) {
        let a = client_fingerprint(&ip, &ua, &lang, "https");
        let b = client_fingerprint(&ip, &ua, &lang, "https");
        prop_assert_eq!(a, b);
    }

    /// The fingerprint reads as `<ip>-<16 hex chars>`.
    #[test]
    fn prop_fingerprint_keeps_ip_prefix(
        ip in ip_strategy(),
        ua in browser_ua_strategy(),
    ) {
        let fingerprint = client_fingerprint(&ip, &ua, "en-US", "https");

        let (prefix, digest) = fingerprint
            .rsplit_once('-')
            .expect("fingerprint should contain a separator");
        prop_assert_eq!(prefix, ip.as_str());
        prop_assert_eq!(digest.len(), 16);
        prop_assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    /// A different User-Agent is a different bucket even from the same IP.
    #[test]
    fn prop_user_agent_change_moves_the_bucket(
        ip in ip_strategy(),
        ua_a in browser_ua_strategy(),
        ua_b in bot_ua_strategy(),
    ) {
        let a = client_fingerprint(&ip, &ua_a, "en-US", "https");
        let b = client_fingerprint(&ip, &ua_b, "en-US", "https");
        prop_assert_ne!(a, b);
    }

    /// Moving bytes across the field boundary changes the digest: the
    /// fields are length-framed, not concatenated.
    #[test]
    fn prop_field_boundaries_are_framed(
        ip in ip_strategy(),
        left in "[a-z]{1,6}",
        right in "[a-z]{1,6}",
    ) {
        let joined = format!("{}{}", left, right);
        let a = client_fingerprint(&ip, &joined, "", "");
        let b = client_fingerprint(&ip, &left, &right, "");
        prop_assert_ne!(a, b);
    }
}
