//! Property-based tests for the Waypoint resolver.
//!
//! This crate contains proptest-based property tests for verifying
//! invariants across the resolver components.
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all property tests
//! cargo test -p proptests
//!
//! # Run with more test cases (slower but more thorough)
//! PROPTEST_CASES=10000 cargo test -p proptests
//!
//! # Run specific test module
//! cargo test -p proptests resolve
//!
//! # Run single test
//! cargo test -p proptests prop_plain_http_urls_pass_through
//! ```
//!
//! ## Test Categories
//!
//! - **Resolve tests**: Reference-to-URL mapping (gateway routing, passthrough, fallback)
//! - **Selection tests**: Health scoring and gateway choice (ordering, cooldown, fail-open)
//! - **Ratelimit tests**: Sliding-window admission (caps, window expiry, key isolation)
//! - **Classify tests**: User-agent tiering (browser vs automated, case folding)
//! - **Fingerprint tests**: Client bucket keys (determinism, IP prefixing)

// Re-export common for use in test modules
pub use common;

/// Shared test strategies and helpers.
pub mod strategies;

// Test modules
#[cfg(test)]
mod classify;
#[cfg(test)]
mod fingerprint;
#[cfg(test)]
mod ratelimit;
#[cfg(test)]
mod resolve;
#[cfg(test)]
mod selection;
