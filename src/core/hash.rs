//! One-way hashing of string query values.
//!
//! Query circuits compare field elements, so string claims are committed as
//! hashes. Verifiers hash sensitive string values (such as passport numbers)
//! before they go on the wire, so the plaintext never leaves the verifier.

use std::fmt::Debug;

use num_bigint::BigUint;
use sha2::{Digest, Sha256};

/// Bytes of the digest kept so the result always fits in a 254-bit field element.
const FIELD_SAFE_BYTES: usize = 31;

/// Hashes a string value into the decimal form of a field element.
pub trait ValueHasher: Debug + Send + Sync {
    fn hash_str(&self, value: &str) -> String;
}

/// SHA-256 truncated to 248 bits, rendered as a decimal integer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256FieldHasher;

impl ValueHasher for Sha256FieldHasher {
    fn hash_str(&self, value: &str) -> String {
        let digest = Sha256::digest(value.as_bytes());
        BigUint::from_bytes_be(&digest[..FIELD_SAFE_BYTES]).to_string()
    }
}
