//! Error taxonomy for hub operations
//!
//! Every failure is classified into one of four handling classes:
//!
//! - `Rejection` - the submitted message is bad; the sender is at fault and
//!   the error is never retried
//! - `Transient` - peer or I/O trouble; retried with bounded backoff inside
//!   the owning subsystem
//! - `Integrity` - a peer's responses are inconsistent with its advertised
//!   state; the current sync cycle aborts and the peer is shunned for the
//!   session
//! - `Fatal` - local state is corrupt; the hub halts merging

use thiserror::Error;

/// Result type alias for hub operations
pub type Result<T> = std::result::Result<T, HubError>;

/// Handling class for a hub error
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    Rejection,
    Transient,
    Integrity,
    Fatal,
}

/// Errors surfaced by validation, merge, and sync
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    // === Rejections (bad message, sender at fault) ===
    /// Required fields missing or byte lengths wrong for the declared scheme
    #[error("malformed message: {0}")]
    MalformedBytes(String),

    /// Re-encoded data does not hash to the declared message hash
    #[error("hash mismatch")]
    HashMismatch,

    /// Signature does not verify under the declared signer
    #[error("bad signature: {0}")]
    BadSignature(String),

    /// Signer is not authorized for the message's fid
    #[error("unauthorized signer: {0}")]
    UnauthorizedSigner(String),

    /// Type-specific body constraint violated
    #[error("body constraint violated: {0}")]
    BodyConstraintViolated(String),

    /// The fid has no custody record on chain
    #[error("unknown fid: {0}")]
    UnknownFid(u64),

    /// Timestamp is too far ahead of local time
    #[error("timestamp too far in the future")]
    FutureTimestamp,

    /// Message network does not match the hub's configured network
    #[error("wrong network")]
    WrongNetwork,

    /// Byte-identical message already merged
    #[error("duplicate message")]
    Duplicate,

    /// Message lost conflict resolution against existing state
    #[error("merge conflict: {0}")]
    Conflict(String),

    /// Requested entity does not exist
    #[error("not found: {0}")]
    NotFound(String),

    // === Transient (peer / I/O) ===
    /// RPC deadline exceeded
    #[error("rpc timeout")]
    RpcTimeout,

    /// Peer unreachable or refusing connections
    #[error("rpc unavailable: {0}")]
    RpcUnavailable(String),

    /// Local store contended beyond its wait budget
    #[error("store busy")]
    StoreBusy,

    // === Integrity (peer misbehaving) ===
    /// Peer's trie leaves do not match its advertised root hash
    #[error("trie root mismatch")]
    TrieRootMismatch,

    /// Peer advertised a sync id it could not serve
    #[error("sync id not found on peer")]
    SyncIdNotFound,

    /// Peer returned messages inconsistent with the requested sync ids
    #[error("message root mismatch")]
    MessageRootMismatch,

    // === Fatal ===
    /// Local storage is corrupt; operator intervention required
    #[error("storage corruption: {0}")]
    StorageCorruption(String),
}

impl HubError {
    /// Handling class of this error
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MalformedBytes(_)
            | Self::HashMismatch
            | Self::BadSignature(_)
            | Self::UnauthorizedSigner(_)
            | Self::BodyConstraintViolated(_)
            | Self::UnknownFid(_)
            | Self::FutureTimestamp
            | Self::WrongNetwork
            | Self::Duplicate
            | Self::Conflict(_)
            | Self::NotFound(_) => ErrorClass::Rejection,

            Self::RpcTimeout | Self::RpcUnavailable(_) | Self::StoreBusy => ErrorClass::Transient,

            Self::TrieRootMismatch | Self::SyncIdNotFound | Self::MessageRootMismatch => {
                ErrorClass::Integrity
            }

            Self::StorageCorruption(_) => ErrorClass::Fatal,
        }
    }

    /// Whether the caller may retry the same operation
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// Stable label for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedBytes(_) => "malformed_bytes",
            Self::HashMismatch => "hash_mismatch",
            Self::BadSignature(_) => "bad_signature",
            Self::UnauthorizedSigner(_) => "unauthorized_signer",
            Self::BodyConstraintViolated(_) => "body_constraint_violated",
            Self::UnknownFid(_) => "unknown_fid",
            Self::FutureTimestamp => "future_timestamp",
            Self::WrongNetwork => "wrong_network",
            Self::Duplicate => "duplicate",
            Self::Conflict(_) => "conflict",
            Self::NotFound(_) => "not_found",
            Self::RpcTimeout => "rpc_timeout",
            Self::RpcUnavailable(_) => "rpc_unavailable",
            Self::StoreBusy => "store_busy",
            Self::TrieRootMismatch => "trie_root_mismatch",
            Self::SyncIdNotFound => "sync_id_not_found",
            Self::MessageRootMismatch => "message_root_mismatch",
            Self::StorageCorruption(_) => "storage_corruption",
        }
    }
}

impl From<hub_crypto::CryptoError> for HubError {
    fn from(err: hub_crypto::CryptoError) -> Self {
        use hub_crypto::CryptoError;
        match err {
            CryptoError::InvalidLength { .. } => HubError::MalformedBytes(err.to_string()),
            _ => HubError::BadSignature(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classes() {
        assert_eq!(HubError::HashMismatch.class(), ErrorClass::Rejection);
        assert_eq!(HubError::RpcTimeout.class(), ErrorClass::Transient);
        assert_eq!(HubError::TrieRootMismatch.class(), ErrorClass::Integrity);
        assert_eq!(
            HubError::StorageCorruption("bad".into()).class(),
            ErrorClass::Fatal
        );
    }

    #[test]
    fn test_retryable_is_transient_only() {
        assert!(HubError::StoreBusy.is_retryable());
        assert!(!HubError::Duplicate.is_retryable());
        assert!(!HubError::SyncIdNotFound.is_retryable());
    }
}
