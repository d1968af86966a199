//! Client fingerprinting for rate-limit bucketing.
//!
//! A fingerprint combines the client IP with a short digest of
//! request-shape headers (User-Agent, Accept-Language, forwarded protocol),
//! so distinct clients behind one NAT land in separate buckets. The IP stays
//! in the clear for operator log correlation; the headers are only ever
//! exposed as a digest.

use blake3::Hasher;

const FINGERPRINT_DOMAIN: &[u8] = b"WAYPOINT_FINGERPRINT_V1";

/// `<ip>-<first 16 hex chars of the header digest>`.
///
/// Fields are length-framed before hashing so `("ab", "c")` and
/// `("a", "bc")` produce different digests.
pub fn client_fingerprint(
    ip: &str,
    user_agent: &str,
    accept_language: &str,
    forwarded_proto: &str,
) -> String {
    let mut hasher = Hasher::new();
    hasher.update(FINGERPRINT_DOMAIN);
    for field in [user_agent, accept_language, forwarded_proto] {
        hasher.update(&(field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    let digest = hasher.finalize();
    format!("{}-{}", ip, &digest.to_hex().as_str()[..16])
}
