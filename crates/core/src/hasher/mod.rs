pub mod perceptual;

use sha2::{Digest, Sha256};

/// Compute the SHA-256 content hash of an in-memory byte buffer.
/// This is the exact-duplicate fingerprint: two files share a hash iff they
/// are byte-identical.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
