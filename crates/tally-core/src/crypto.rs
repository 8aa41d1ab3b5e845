// crates/tally-core/src/crypto.rs

use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of the given bytes.
///
/// Returns a 32-byte hash.
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    hash_parts(&[data])
}

/// Compute SHA-256 over the concatenation of several byte slices without
/// allocating the joined buffer.
pub fn hash_parts(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}
