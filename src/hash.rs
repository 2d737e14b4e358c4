//! BLAKE3 hashing utilities for artifact content addressing

use blake3::Hasher;

/// Hash prefix for BLAKE3 hashes
pub const HASH_PREFIX: &str = "blake3:";

/// Calculate the BLAKE3 digest of raw artifact bytes
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    format!("{}{}", HASH_PREFIX, hasher.finalize().to_hex())
}

/// Strip the algorithm prefix, leaving the hex digest
///
/// Used to build file names for the content-addressed cache.
pub fn digest_hex(digest: &str) -> &str {
    digest.strip_prefix(HASH_PREFIX).unwrap_or(digest)
}

/// Verify raw bytes against an expected digest
pub fn verify_bytes(bytes: &[u8], expected: &str) -> bool {
    hash_bytes(bytes) == expected
}
