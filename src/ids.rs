use std::fmt::Write;

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::{AiRegistryError, Result};

static ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{1,64}$").expect("address pattern is valid"));

/// Deterministic id for an AI owned by `creator_address` and called `name`.
///
/// Two requests with the same creator and name always collide; uniqueness is
/// enforced by the store, not by this function.
pub fn derive_ai_id(creator_address: &str, name: &str) -> String {
    sha256_hex(format!("{}:{}", creator_address.trim(), name.trim()).as_bytes())
}

/// Fresh handle for an entry in the embedding index.
pub fn new_index_handle() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Hex SHA-256 of stored RAG content, anchored on chain with the blob.
pub fn content_digest(contents: &str) -> String {
    sha256_hex(contents.as_bytes())
}

/// Accepts `0x` followed by 1 to 64 hex digits (short forms are zero-padded on chain).
pub fn validate_creator_address(address: &str) -> Result<()> {
    if ADDRESS_RE.is_match(address) {
        Ok(())
    } else {
        Err(AiRegistryError::Validation(format!(
            "creator address {address:?} is not a blockchain address"
        )))
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ai_id_is_deterministic_and_name_sensitive() {
        let a = derive_ai_id("0xA", "Bot1");
        assert_eq!(a, derive_ai_id("0xA", "Bot1"));
        assert_eq!(a, derive_ai_id(" 0xA", "Bot1 "));
        assert_ne!(a, derive_ai_id("0xA", "Bot2"));
        assert_ne!(a, derive_ai_id("0xB", "Bot1"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn index_handles_do_not_repeat() {
        let first = new_index_handle();
        let second = new_index_handle();
        assert_ne!(first, second);
        assert_eq!(first.len(), 36);
    }

    #[test]
    fn address_validation() {
        assert!(validate_creator_address("0xA").is_ok());
        assert!(validate_creator_address(&format!("0x{}", "f".repeat(64))).is_ok());
        assert!(validate_creator_address("0x").is_err());
        assert!(validate_creator_address("alice").is_err());
        assert!(validate_creator_address("0xZZ").is_err());
        assert!(validate_creator_address(&format!("0x{}", "1".repeat(65))).is_err());
    }

    #[test]
    fn digest_matches_known_vector() {
        assert_eq!(
            content_digest("hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }
}
