//! SHA256 digest utilities
//!
//! Centralized computation and validation of the `sha256:<hex>` content
//! digests used for every blob the tool stores or transfers.

use sha2::{Digest, Sha256};

use crate::error::{RegistryError, Result};

/// Digest algorithm prefix; only sha256 is supported.
pub const SHA256_PREFIX: &str = "sha256:";

pub struct DigestUtils;

impl DigestUtils {
    /// Compute the SHA256 hex of a byte slice (64 lowercase hex chars).
    pub fn compute_sha256(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    /// Compute a full digest with the `sha256:` prefix.
    pub fn compute_digest(data: &[u8]) -> String {
        format!("{}{}", SHA256_PREFIX, Self::compute_sha256(data))
    }

    /// Validate a bare hex digest: exactly 64 lowercase hex characters.
    pub fn is_valid_sha256_hex(hex_part: &str) -> bool {
        hex_part.len() == 64
            && hex_part
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    }

    /// Validate a full `sha256:<hex>` digest.
    pub fn is_valid_digest(digest: &str) -> bool {
        digest
            .strip_prefix(SHA256_PREFIX)
            .is_some_and(Self::is_valid_sha256_hex)
    }

    /// Extract the hex portion of a full digest, validating it.
    pub fn extract_hex_part(digest: &str) -> Result<&str> {
        match digest.strip_prefix(SHA256_PREFIX) {
            Some(hex_part) if Self::is_valid_sha256_hex(hex_part) => Ok(hex_part),
            Some(_) => Err(RegistryError::Validation(format!(
                "invalid sha256 hex part in digest: {}",
                digest
            ))),
            None => Err(RegistryError::Validation(format!(
                "digest missing sha256: prefix: {}",
                digest
            ))),
        }
    }

    /// Verify that data hashes to the claimed digest, failing fast on mismatch.
    pub fn verify(data: &[u8], expected: &str) -> Result<()> {
        let expected_hex = Self::extract_hex_part(expected)?;
        let actual_hex = Self::compute_sha256(data);
        if actual_hex != expected_hex {
            return Err(RegistryError::Validation(format!(
                "digest mismatch: expected sha256:{}, got sha256:{}",
                expected_hex, actual_hex
            )));
        }
        Ok(())
    }
}
