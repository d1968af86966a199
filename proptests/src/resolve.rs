//! Property-based tests for URL resolution.
//!
//! Tests the following invariants:
//! - `ipfs://` URIs route through a configured gateway with the hash preserved
//! - Gateway-path URLs re-route to our configured gateways, not the input host
//! - Plain HTTP URLs pass through with only query-string augmentation
//! - Unresolvable input maps to the untransformed fallback asset
//! - A recorded resolution is served from cache until its TTL lapses

use crate::strategies::*;
use common::health::RESOLVED_CACHE_TTL_MS;
use common::resolve::{ResolvedVia, TransformOptions};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// An `ipfs://` URI must resolve to the top-ranked configured gateway
    /// with the hash (and sub-path, when present) preserved.
    #[test]
    fn prop_ipfs_uri_routes_through_configured_gateway(
        cid in cid_strategy(),
        maybe_sub in prop::option::of(subpath_strategy()),
        now in now_ms_strategy(),
    ) {
        let (_health, _selector, resolver) = build_resolver(test_gateways(3), true);

        let src = match &maybe_sub {
            Some(sub) => format!("ipfs://{}/{}", cid, sub),
            None => format!("ipfs://{}", cid),
        };
        let resolution = resolver.resolve(&src, now);

        prop_assert_eq!(resolution.via, ResolvedVia::Selected);
        // Fresh state scores every gateway 0.0; ties go to configuration order
        prop_assert!(
            resolution.url.starts_with("https://gw1.example/ipfs/"),
            "expected the first configured gateway, got {}",
            resolution.url
        );
        match &maybe_sub {
            Some(sub) => {
                let expected = format!("{}/{}", cid, sub);
                prop_assert!(resolution.url.contains(&expected));
            }
            None => prop_assert!(resolution.url.contains(cid.as_str())),
        }
        prop_assert!(resolution.url.ends_with("?format=webp&width=256"));
    }

    /// A URL carrying an `/ipfs/` path segment is treated as a content
    /// reference and re-routed through our gateways, whatever its host.
    #[test]
    fn prop_gateway_path_urls_reroute(
        cid in cid_strategy(),
        host in "[a-z]{3,10}",
        now in now_ms_strategy(),
    ) {
        let (_health, _selector, resolver) = build_resolver(test_gateways(3), true);

        let src = format!("https://{}.example/ipfs/{}?x=1", host, cid);
        let resolution = resolver.resolve(&src, now);

        prop_assert_eq!(resolution.via, ResolvedVia::Selected);
        prop_assert!(resolution.url.starts_with("https://gw1.example/ipfs/"));
        prop_assert!(resolution.url.contains(cid.as_str()));
        let input_host = format!("{}.example", host);
        prop_assert!(!resolution.url.contains(&input_host));
    }

    /// Plain HTTP(S) URLs pass through untouched apart from the transform
    /// query parameters, joined with the right separator.
    #[test]
    fn prop_plain_http_urls_pass_through(
        url in http_url_strategy(),
        now in now_ms_strategy(),
    ) {
        let (_health, _selector, resolver) = build_resolver(test_gateways(3), true);

        let resolution = resolver.resolve(&url, now);

        prop_assert_eq!(resolution.via, ResolvedVia::Passthrough);
        let sep = if url.contains('?') { '&' } else { '?' };
        prop_assert_eq!(
            resolution.url,
            format!("{}{}format=webp&width=256", url, sep)
        );
    }

    /// Anything that is neither a content reference nor an HTTP URL maps to
    /// the fallback asset, which never gets transform parameters.
    #[test]
    fn prop_unresolvable_input_falls_back(
        junk in "[a-z0-9 ]{0,24}",
        now in now_ms_strategy(),
    ) {
        prop_assume!(!junk.contains("ipfs") && !junk.contains("http"));
        let (_health, _selector, resolver) = build_resolver(test_gateways(3), true);

        let resolution = resolver.resolve(&junk, now);

        prop_assert_eq!(resolution.via, ResolvedVia::Fallback);
        prop_assert_eq!(resolution.url, "/assets/placeholder.png");
    }

    /// A recorded success pins later resolutions of the same hash to the
    /// recorded URL for the full cache TTL.
    #[test]
    fn prop_recorded_resolution_pins_the_gateway(
        cid in cid_strategy(),
        now in now_ms_strategy(),
        age in 0u64..RESOLVED_CACHE_TTL_MS,
    ) {
        let (health, _selector, resolver) = build_resolver(test_gateways(3), true);

        // gw3 would lose a fresh-state tie; only the cache can route to it
        let url = format!("https://gw3.example/ipfs/{}", cid);
        health.record_success("https://gw3.example/ipfs/", &cid, &url, now);

        let resolution = resolver.resolve(&format!("ipfs://{}", cid), now + age);

        prop_assert_eq!(resolution.via, ResolvedVia::Cache);
        prop_assert!(
            resolution.url.starts_with(&url),
            "expected the recorded URL, got {}",
            resolution.url
        );
    }

    /// Once the cache TTL lapses, resolution goes back through selection.
    #[test]
    fn prop_expired_resolution_is_reselected(
        cid in cid_strategy(),
        now in now_ms_strategy(),
    ) {
        let (health, _selector, resolver) = build_resolver(test_gateways(3), true);

        let url = format!("https://gw3.example/ipfs/{}", cid);
        health.record_success("https://gw3.example/ipfs/", &cid, &url, now);

        let resolution = resolver.resolve(&format!("ipfs://{}", cid), now + RESOLVED_CACHE_TTL_MS);

        prop_assert_eq!(resolution.via, ResolvedVia::Selected);
    }

    /// A caller-supplied width lands verbatim in the transform suffix.
    #[test]
    fn prop_transform_width_is_respected(
        cid in cid_strategy(),
        width in 1u32..4096,
        now in now_ms_strategy(),
    ) {
        let (_health, _selector, resolver) = build_resolver(test_gateways(3), true);
        let transform = TransformOptions {
            enabled: true,
            format: "webp".to_string(),
            width,
        };

        let resolution = resolver.resolve_with(&format!("ipfs://{}", cid), &transform, now);

        let suffix = format!("format=webp&width={}", width);
        prop_assert!(resolution.url.ends_with(&suffix));
    }

    /// Disabled transforms leave gateway URLs without any query string.
    #[test]
    fn prop_disabled_transform_appends_nothing(
        cid in cid_strategy(),
        now in now_ms_strategy(),
    ) {
        let (_health, _selector, resolver) = build_resolver(test_gateways(3), true);
        let transform = TransformOptions {
            enabled: false,
            ..TransformOptions::default()
        };

        let resolution = resolver.resolve_with(&format!("ipfs://{}", cid), &transform, now);

        prop_assert_eq!(resolution.via, ResolvedVia::Selected);
        prop_assert!(!resolution.url.contains('?'));
    }
}
