//! SHA-256 helpers used by the assembler (file hashes) and the tuning
//! proposal generator (stable ids).

use sha2::{Digest, Sha256};

pub fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Stable tuning-proposal id: SHA-256 of `action + JSON(details)`, first 16
/// hex chars.
pub fn stable_proposal_id(action: &str, details: &serde_json::Value) -> String {
    let payload = format!("{action}{details}");
    let full = sha256_hex(payload.as_bytes());
    full[..16].to_string()
}
