//! Blocks are raw content bytes, not a structured object: a block's hash
//! is the plain BLAKE3 digest of its bytes with no kind tag, matching the
//! data model's `Block | raw bytes | its own hash is BLAKE3 of bytes`.

use crate::hash::Hash;

/// Compute the content hash of a block's raw bytes.
pub fn block_hash(data: &[u8]) -> Hash {
    Hash::of(data)
}

/// Verify that `data` actually hashes to `expected`, as required after
/// every block fetch.
pub fn verify_block(data: &[u8], expected: Hash) -> bool {
    block_hash(data) == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_hash_has_no_kind_prefix() {
        assert_eq!(block_hash(b"payload"), Hash::of(b"payload"));
    }

    #[test]
    fn verify_detects_tampering() {
        let data = b"original block content";
        let hash = block_hash(data);
        assert!(verify_block(data, hash));
        assert!(!verify_block(b"tampered block content!", hash));
    }
}
