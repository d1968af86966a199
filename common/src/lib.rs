//! Shared types and algorithms for the Waypoint content edge.
//!
//! This crate provides the core logic used by the resolver service:
//! - **Gateway health tracking**: success/failure scoring with recency bonus,
//!   transient failure flags, and the resolved-gateway cache
//! - **Gateway selection**: score-ranked selection with stable tie-breaking,
//!   a fail-open policy for total outages, and a round-robin fallback
//! - **URL resolution**: mapping `ipfs://` references, `/ipfs/` gateway URLs,
//!   and plain HTTP URLs to one fetchable URL
//! - **Rate limiting**: sliding-window request counters keyed by client
//!   fingerprint, with tiered and per-category limits
//! - **Client classification**: a rule-scoring engine over the User-Agent
//! - **HTTP middleware**: X-API-Key authentication for admin surfaces
//!
//! # Key Design Principles
//!
//! - **Explicit state objects**: health, selection, and limiting state live in
//!   structs owned by the service, never in module-level globals
//! - **Injected time**: every TTL and window computation takes a caller-supplied
//!   timestamp, so behavior is reproducible under test (see [`time`])
//! - **Availability first**: resolution never errors toward the caller; the
//!   fail-open policy restores the full gateway set rather than locking out

pub mod classify;
pub mod fingerprint;
pub mod health;
pub mod middleware;
pub mod ratelimit;
pub mod resolve;
pub mod select;
pub mod time;

pub use time::{Clock, ManualClock, SystemClock, now_ms};
