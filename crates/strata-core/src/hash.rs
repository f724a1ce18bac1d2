//! Block Hash: content hashing and sparse-block detection.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 checksum of a block's bytes, in the
/// `"sha256:<hex>"` form the envelope's `checksum` field carries.
pub fn checksum(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    format!("sha256:{}", hex::encode(digest))
}

/// A block of all-zero bytes needs no storage object: it is represented by
/// a sparse block UID and reconstructed as zeros on restore.
pub fn is_sparse(data: &[u8]) -> bool {
    data.iter().all(|&b| b == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_deterministic() {
        assert_eq!(checksum(b"hello"), checksum(b"hello"));
        assert_ne!(checksum(b"hello"), checksum(b"world"));
    }

    #[test]
    fn checksum_has_sha256_prefix() {
        assert!(checksum(b"data").starts_with("sha256:"));
    }

    #[test]
    fn detects_sparse_blocks() {
        assert!(is_sparse(&[0u8; 4096]));
        assert!(!is_sparse(&[0u8, 0, 1, 0]));
    }

    #[test]
    fn empty_block_is_sparse() {
        assert!(is_sparse(&[]));
    }
}
