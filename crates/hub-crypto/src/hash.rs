//! BLAKE3 digest utilities
//!
//! All content addressing in the hub uses BLAKE3 truncated to 160 bits:
//! message hashes, sync-trie leaf hashes, and aggregated node hashes are
//! all 20-byte values. Truncation is done through the extensible output
//! reader so the prefix is well-defined.

/// Digest size used throughout the hub (160 bits)
pub const DIGEST_SIZE: usize = 20;

/// The digest of the empty set: all-zero 20 bytes.
///
/// Used for the root of an empty trie and for exclusion levels with no
/// siblings.
pub const EMPTY_DIGEST: [u8; DIGEST_SIZE] = [0u8; DIGEST_SIZE];

/// Hash data with BLAKE3, truncated to 160 bits
pub fn blake3_20(data: &[u8]) -> [u8; DIGEST_SIZE] {
    let mut out = [0u8; DIGEST_SIZE];
    let mut reader = blake3::Hasher::new().update(data).finalize_xof();
    reader.fill(&mut out);
    out
}

/// Hash multiple byte slices together, truncated to 160 bits
pub fn blake3_20_concat(items: &[&[u8]]) -> [u8; DIGEST_SIZE] {
    let mut hasher = blake3::Hasher::new();
    for item in items {
        hasher.update(item);
    }
    let mut out = [0u8; DIGEST_SIZE];
    hasher.finalize_xof().fill(&mut out);
    out
}
