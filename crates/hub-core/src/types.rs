//! Core identifier types and protocol constants

use serde::{Deserialize, Serialize};
use std::fmt;

/// Farcaster ID: unsigned 64-bit user identifier assigned on chain
pub type Fid = u64;

/// 20-byte BLAKE3 message digest
///
/// Message identity. Ordered byte-wise unsigned, which is the total order
/// used by every conflict tie-break.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct MessageHash([u8; 20]);

impl MessageHash {
    pub const SIZE: usize = 20;

    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 20] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Lowercase hex rendering, as used on every RPC surface
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes).ok_or(hex::FromHexError::InvalidStringLength)
    }
}

impl fmt::Debug for MessageHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for MessageHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

/// Protocol constants
pub mod constants {
    /// Maximum resident messages in the signer set
    pub const SIGNER_CAPACITY: usize = 100;

    /// Maximum resident messages in the cast set
    pub const CAST_CAPACITY: usize = 10_000;

    /// Maximum resident messages in the reaction set
    pub const REACTION_CAPACITY: usize = 5_000;

    /// Maximum resident messages in the verification set
    pub const VERIFICATION_CAPACITY: usize = 50;

    /// Cast retention (1 year, milliseconds)
    pub const CAST_TTL_MS: u64 = 365 * 24 * 60 * 60 * 1000;

    /// Reaction retention (90 days, milliseconds)
    pub const REACTION_TTL_MS: u64 = 90 * 24 * 60 * 60 * 1000;

    /// Maximum cast text length in bytes
    pub const CAST_TEXT_MAX: usize = 320;

    /// Maximum embeds per cast
    pub const CAST_EMBEDS_MAX: usize = 2;

    /// Maximum embed URL length in bytes
    pub const CAST_EMBED_MAX: usize = 256;

    /// Maximum mentions per cast
    pub const CAST_MENTIONS_MAX: usize = 10;

    /// Maximum signer display name length in bytes
    pub const SIGNER_NAME_MAX: usize = 32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_hex_roundtrip() {
        let hash = MessageHash::new([0xabu8; 20]);
        let hex = hash.to_hex();
        assert_eq!(hex.len(), 40);
        assert_eq!(MessageHash::from_hex(&hex).unwrap(), hash);
    }

    #[test]
    fn test_hash_ordering_is_bytewise() {
        let lo = MessageHash::new([0x01; 20]);
        let hi = MessageHash::new([0x02; 20]);
        assert!(lo < hi);
    }

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        assert!(MessageHash::from_slice(&[0u8; 19]).is_none());
        assert!(MessageHash::from_slice(&[0u8; 21]).is_none());
    }
}
