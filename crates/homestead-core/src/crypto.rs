// crates/homestead-core/src/crypto.rs
//
// SHA-256 helpers shared by duplicate detection, spot-check seeding, and the
// consensus hash. Every validator must derive identical digests from
// identical inputs, so these functions operate on raw bytes only.

use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of the given bytes.
///
/// Returns a 32-byte hash.
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Compute SHA-256 of the given bytes and return it as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(hash_bytes(data))
}

/// First 32 bits (big-endian) of SHA-256 over `data`.
///
/// Used to seed the tier-3 spot-check sampler.
pub fn seed_from_bytes(data: &[u8]) -> u32 {
    let digest = hash_bytes(data);
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}
