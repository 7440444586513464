//! Error types for cryptographic operations

use thiserror::Error;

/// Result type alias for crypto operations
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur while hashing, verifying, or recovering signatures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Byte slice has the wrong length for the declared scheme
    #[error("invalid {what} length: expected {expected}, got {actual}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Public key bytes do not decode to a valid key
    #[error("invalid public key")]
    InvalidKey,

    /// Signature bytes do not decode to a valid signature
    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    /// Signature does not verify under the given key
    #[error("signature verification failed")]
    VerificationFailed,

    /// Recovered Ethereum address does not match the expected signer
    #[error("recovered address {recovered} does not match expected {expected}")]
    AddressMismatch { recovered: String, expected: String },
}

impl CryptoError {
    pub(crate) fn bad_len(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::InvalidLength {
            what,
            expected,
            actual,
        }
    }
}
