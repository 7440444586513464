//! # Hub Crypto
//!
//! Cryptographic primitives used by the hub core:
//! - BLAKE3 truncated to 160 bits for message identity and trie aggregation
//! - Ed25519 signatures for delegated signer messages
//! - EIP-712 typed-data signatures for custody-address messages and
//!   Ethereum address verification claims
//!
//! Everything here is a thin facade: callers hand in raw bytes and get back
//! typed results, never library-specific key or signature objects.

pub mod ed25519;
pub mod eip712;
pub mod error;
pub mod hash;

pub use error::{CryptoError, Result};
