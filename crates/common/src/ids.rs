//! Run identifier derivation
//!
//! Run ids are content hashes over (test type, game url, start time)
//! rather than random tokens, so repeated starts within the same second
//! map to the same id and logs stay correlatable while debugging.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Derive a run id: a sanitized lowercase test-type slug followed by
/// the first 12 hex characters of a SHA-256 content hash. Timestamp is
/// taken at second resolution.
pub fn run_id(test_type: &str, game_url: &str, started_at: DateTime<Utc>) -> String {
    let base = format!("{}|{}|{}", test_type, game_url, started_at.timestamp());
    let mut hasher = Sha256::new();
    hasher.update(base.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}_{}", slug(test_type), &digest[..12])
}

/// Lowercase a test-type name into an identifier-safe slug.
fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_sep = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep && !out.is_empty() {
            out.push('_');
            last_was_sep = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}
