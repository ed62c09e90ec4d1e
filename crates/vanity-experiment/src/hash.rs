//! Consistent bucketing and override fingerprints
//!
//! Both functions are pure: the same inputs always produce the same output,
//! across processes and hosts.

use crate::identity::Identity;
use sha2::{Digest, Sha256};

/// Length of an override fingerprint in hex characters
pub const FINGERPRINT_LEN: usize = 10;

/// Map an identity onto `[0, alternatives)` for an experiment
///
/// BLAKE3 over `"<experiment>/<identity>"`, first 8 bytes as a big-endian
/// `u64`, reduced modulo the alternative count. Returns `0` when there are no
/// alternatives.
#[must_use]
pub fn bucket(experiment: &str, identity: &Identity, alternatives: usize) -> usize {
    if alternatives == 0 {
        return 0;
    }
    let digest = blake3::hash(format!("{experiment}/{identity}").as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.as_bytes()[..8]);
    (u64::from_be_bytes(prefix) % alternatives as u64) as usize
}

/// Fingerprint token that forces an alternative through the query string
///
/// Last [`FINGERPRINT_LEN`] hex chars of SHA-256 over `"<experiment> <index>"`.
#[must_use]
pub fn fingerprint(experiment: &str, index: usize) -> String {
    let digest = Sha256::digest(format!("{experiment} {index}").as_bytes());
    let encoded = hex::encode(digest);
    encoded[encoded.len() - FINGERPRINT_LEN..].to_string()
}
