//! Ed25519 signature verification
//!
//! Delegated signer messages are signed with Ed25519 over the 20-byte
//! message digest. The hub only ever verifies; signing helpers exist for
//! fixtures and local tooling.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use crate::error::{CryptoError, Result};

/// Ed25519 public key size
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Ed25519 signature size
pub const SIGNATURE_SIZE: usize = 64;

/// Verify an Ed25519 signature over `message` under `public_key`
pub fn verify(signature: &[u8], message: &[u8], public_key: &[u8]) -> Result<()> {
    let key_bytes: &[u8; PUBLIC_KEY_SIZE] = public_key
        .try_into()
        .map_err(|_| CryptoError::bad_len("public key", PUBLIC_KEY_SIZE, public_key.len()))?;
    let sig_bytes: &[u8; SIGNATURE_SIZE] = signature
        .try_into()
        .map_err(|_| CryptoError::bad_len("signature", SIGNATURE_SIZE, signature.len()))?;

    let verifying_key = VerifyingKey::from_bytes(key_bytes).map_err(|_| CryptoError::InvalidKey)?;
    let sig = Signature::from_bytes(sig_bytes);

    verifying_key
        .verify(message, &sig)
        .map_err(|_| CryptoError::VerificationFailed)
}

/// Sign `message` with a secret key seed. Fixture and tooling use only.
pub fn sign(seed: &[u8; 32], message: &[u8]) -> [u8; SIGNATURE_SIZE] {
    let signing_key = SigningKey::from_bytes(seed);
    signing_key.sign(message).to_bytes()
}

/// Derive the public key for a secret key seed
pub fn public_key(seed: &[u8; 32]) -> [u8; PUBLIC_KEY_SIZE] {
    SigningKey::from_bytes(seed).verifying_key().to_bytes()
}
