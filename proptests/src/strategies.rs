//! Shared proptest strategies for property-based testing.
//!
//! This module provides reusable strategies for generating:
//! - Content hashes and sub-paths
//! - Plain HTTP URLs with and without query strings
//! - Gateway base lists and wired-up resolvers
//! - Browser and automated User-Agent strings
//! - Rate-limit windows and caps

use common::health::GatewayHealth;
use common::resolve::{TransformOptions, UrlResolver};
use common::select::GatewaySelector;
use proptest::prelude::*;
use std::sync::Arc;

/// Generate a CIDv0-shaped content hash (Qm plus 44 base58 characters).
pub fn cid_strategy() -> impl Strategy<Value = String> {
    "Qm[1-9A-HJ-NP-Za-km-z]{44}"
}

/// Generate a sub-path with 1-3 segments.
pub fn subpath_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z0-9]{1,8}", 1..=3).prop_map(|segments| segments.join("/"))
}

/// Generate a plain HTTP(S) URL with a single path segment and an optional
/// query string. Single-segment paths cannot accidentally spell an
/// `/ipfs/` prefix.
pub fn http_url_strategy() -> impl Strategy<Value = String> {
    (
        prop::bool::ANY,
        "[a-z]{3,10}",
        "[a-z0-9]{0,12}",
        prop::option::of("[a-z]=[0-9]{1,3}"),
    )
        .prop_map(|(https, host, path, query)| {
            let scheme = if https { "https" } else { "http" };
            let mut url = format!("{}://{}.example/{}", scheme, host, path);
            if let Some(q) = query {
                url.push('?');
                url.push_str(&q);
            }
            url
        })
}

/// Generate an IPv4 address string.
pub fn ip_strategy() -> impl Strategy<Value = String> {
    (0u8..=255, 0u8..=255, 0u8..=255, 0u8..=255)
        .prop_map(|(a, b, c, d)| format!("{}.{}.{}.{}", a, b, c, d))
}

/// Generate a Unix timestamp in milliseconds within a reasonable range.
pub fn now_ms_strategy() -> impl Strategy<Value = u64> {
    // Range: 2020-01-01 to 2030-01-01 (approximately)
    1_577_836_800_000u64..1_893_456_000_000
}

/// Generate a rate-limit window in milliseconds (1 second to 10 minutes).
pub fn window_strategy() -> impl Strategy<Value = u64> {
    1_000u64..=600_000
}

/// Generate a rate-limit request cap.
pub fn limit_strategy() -> impl Strategy<Value = u64> {
    1u64..=50
}

/// Generate a browser-like User-Agent string.
pub fn browser_ua_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
             Chrome/120.0.0.0 Safari/537.36"
                .to_string()
        ),
        Just(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like \
             Gecko) Version/17.0 Safari/605.1.15"
                .to_string()
        ),
        Just(
            "Mozilla/5.0 (X11; Linux x86_64; rv:126.0) Gecko/20100101 Firefox/126.0".to_string()
        ),
        Just(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, \
             like Gecko) Mobile/15E148"
                .to_string()
        ),
    ]
}

/// Generate an automated-client User-Agent string.
pub fn bot_ua_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Googlebot/2.1 (+http://www.google.com/bot.html)".to_string()),
        Just("Mozilla/5.0 (compatible; AhrefsBot/7.0; +http://ahrefs.com/robot/)".to_string()),
        Just("curl/8.5.0".to_string()),
        Just("Wget/1.21.4".to_string()),
        Just("python-requests/2.31.0".to_string()),
        Just("Scrapy/2.11.0 (+https://scrapy.org)".to_string()),
        Just("HeadlessChrome/120.0.6099.109".to_string()),
        Just("Go-http-client/2.0".to_string()),
    ]
}

/// Gateway bases under test, numbered so list-order ties are observable.
pub fn test_gateways(count: usize) -> Vec<String> {
    (1..=count)
        .map(|i| format!("https://gw{}.example/ipfs/", i))
        .collect()
}

/// Build a resolver over fresh health state with the given gateway bases.
pub fn build_resolver(
    bases: Vec<String>,
    fail_open: bool,
) -> (Arc<GatewayHealth>, Arc<GatewaySelector>, UrlResolver) {
    let health = Arc::new(GatewayHealth::new());
    let selector = Arc::new(GatewaySelector::new(bases, fail_open));
    let resolver = UrlResolver::new(
        health.clone(),
        selector.clone(),
        "/assets/placeholder.png".to_string(),
        TransformOptions::default(),
    );
    (health, selector, resolver)
}
