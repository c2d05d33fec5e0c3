// navigator-core/src/hashing.rs
// ============================================================================
// Module: Navigator Canonical Hashing
// Description: Canonical JSON hashing utilities used for checkpoint integrity.
// Purpose: Provide deterministic hashes for checkpoints and configuration.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Checkpoint integrity and configuration drift detection both depend on
//! hashing the *same* canonical byte representation regardless of struct
//! field order or platform. All hashing here goes through RFC 8785 (JCS)
//! JSON canonicalization before the digest is taken.

use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

/// Hash algorithm used for checkpoint and configuration digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashAlgorithm;

/// The single supported hash algorithm.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm;

/// Deterministic content hash, hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct HashDigest(String);

impl HashDigest {
    /// Creates a digest from raw bytes.
    #[must_use]
    pub fn new(bytes: &[u8]) -> Self {
        Self(hex_encode(bytes))
    }

    /// Returns the digest as a lowercase hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reconstructs a digest from an already hex-encoded string, e.g. one
    /// read back from storage, without rehashing it.
    #[must_use]
    pub fn from_hex(hex: String) -> Self {
        Self(hex)
    }
}

impl std::fmt::Display for HashDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Errors raised while computing canonical hashes.
#[derive(Debug, Error)]
pub enum HashError {
    /// JSON canonicalization failed.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
}

/// Returns canonical JSON bytes for a serializable value using RFC 8785.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Hashes canonical JSON of a value with SHA-256.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn hash_canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<HashDigest, HashError> {
    let bytes = canonical_json_bytes(value)?;
    Ok(hash_bytes(&bytes))
}

/// Hashes raw bytes with SHA-256.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> HashDigest {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    HashDigest::new(&hasher.finalize())
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_value_hashes_identically_regardless_of_field_order() {
        #[derive(Serialize)]
        struct A {
            b: u32,
            a: u32,
        }
        #[derive(Serialize)]
        struct B {
            a: u32,
            b: u32,
        }
        let left = hash_canonical_json(&A { b: 2, a: 1 }).expect("hash");
        let right = hash_canonical_json(&B { a: 1, b: 2 }).expect("hash");
        assert_eq!(left, right);
    }

    #[test]
    fn different_values_hash_differently() {
        let left = hash_bytes(b"left");
        let right = hash_bytes(b"right");
        assert_ne!(left, right);
    }
}
