//! EIP-712 typed-data signatures
//!
//! Custody-address messages (signer add/remove) and Ethereum address
//! verification claims are signed as EIP-712 typed data under the
//! "Farcaster Verify Ethereum Address" domain. Verification recovers the
//! signing address from the typed-data digest and compares it against the
//! expected signer; no public key ever travels with the message.

use alloy_primitives::{Address, FixedBytes, Signature, U256, b256};
use alloy_signer::SignerSync;
use alloy_sol_types::{Eip712Domain, SolStruct, eip712_domain, sol};
use once_cell::sync::Lazy;

pub use alloy_signer_local::PrivateKeySigner;

use crate::error::{CryptoError, Result};

/// Ethereum address size
pub const ADDRESS_SIZE: usize = 20;

/// EIP-712 signature size (r || s || v)
pub const SIGNATURE_SIZE: usize = 65;

sol! {
    /// Claim signed by a custody address over a 20-byte message digest.
    struct MessageDigestClaim {
        bytes20 digest;
    }

    /// Claim binding an Ethereum address to an fid at a specific block.
    ///
    /// Solidity grammar does not allow a field named `address`, so the
    /// claimed address lives in `verifyAddress`.
    struct VerificationEthAddressClaim {
        uint256 fid;
        address verifyAddress;
        bytes32 blockHash;
        uint8 network;
    }
}

static DOMAIN: Lazy<Eip712Domain> = Lazy::new(|| {
    eip712_domain! {
        name: "Farcaster Verify Ethereum Address",
        version: "2.0.0",
        salt: b256!("f2d857f4a3edcb9b78b4d503bfe733db1e3f6cdc2b7971ee739626c97e86a558"),
    }
});

/// The shared signing domain for all hub typed data
pub fn domain() -> &'static Eip712Domain {
    &DOMAIN
}

fn parse_signature(signature: &[u8]) -> Result<Signature> {
    let raw: &[u8; SIGNATURE_SIZE] = signature
        .try_into()
        .map_err(|_| CryptoError::bad_len("eip712 signature", SIGNATURE_SIZE, signature.len()))?;
    Signature::from_raw_array(raw).map_err(|e| CryptoError::MalformedSignature(e.to_string()))
}

fn recover_and_compare(signature: Signature, digest: FixedBytes<32>, expected: Address) -> Result<()> {
    let recovered = signature
        .recover_address_from_prehash(&digest)
        .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;
    if recovered != expected {
        return Err(CryptoError::AddressMismatch {
            recovered: recovered.to_string(),
            expected: expected.to_string(),
        });
    }
    Ok(())
}

/// Verify a custody-address signature over a message digest
pub fn verify_message_signature(
    digest: &[u8; 20],
    signature: &[u8],
    expected_signer: &[u8; ADDRESS_SIZE],
) -> Result<()> {
    let signature = parse_signature(signature)?;
    let claim = MessageDigestClaim {
        digest: FixedBytes(*digest),
    };
    let signing_hash = claim.eip712_signing_hash(domain());
    recover_and_compare(signature, signing_hash, Address::from(*expected_signer))
}

/// Verify an Ethereum address verification claim.
///
/// The signature must recover to the claimed address itself.
pub fn verify_verification_claim(
    fid: u64,
    address: &[u8; ADDRESS_SIZE],
    block_hash: &[u8; 32],
    network: u8,
    signature: &[u8],
) -> Result<()> {
    let signature = parse_signature(signature)?;
    let claim = VerificationEthAddressClaim {
        fid: U256::from(fid),
        verifyAddress: Address::from(*address),
        blockHash: FixedBytes(*block_hash),
        network,
    };
    let signing_hash = claim.eip712_signing_hash(domain());
    recover_and_compare(signature, signing_hash, Address::from(*address))
}

/// Sign a message digest with a local key. Fixture and tooling use only.
pub fn sign_message_digest(signer: &PrivateKeySigner, digest: &[u8; 20]) -> Result<[u8; SIGNATURE_SIZE]> {
    let claim = MessageDigestClaim {
        digest: FixedBytes(*digest),
    };
    let signing_hash = claim.eip712_signing_hash(domain());
    let signature = signer
        .sign_hash_sync(&signing_hash)
        .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;
    Ok(signature.as_bytes())
}

/// Sign a verification claim with a local key. Fixture and tooling use only.
pub fn sign_verification_claim(
    signer: &PrivateKeySigner,
    fid: u64,
    address: &[u8; ADDRESS_SIZE],
    block_hash: &[u8; 32],
    network: u8,
) -> Result<[u8; SIGNATURE_SIZE]> {
    let claim = VerificationEthAddressClaim {
        fid: U256::from(fid),
        verifyAddress: Address::from(*address),
        blockHash: FixedBytes(*block_hash),
        network,
    };
    let signing_hash = claim.eip712_signing_hash(domain());
    let signature = signer
        .sign_hash_sync(&signing_hash)
        .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;
    Ok(signature.as_bytes())
}

/// The 20-byte address of a local signer
pub fn signer_address(signer: &PrivateKeySigner) -> [u8; ADDRESS_SIZE] {
    signer.address().into_array()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_signature_roundtrip() {
        let signer = PrivateKeySigner::random();
        let digest = [7u8; 20];

        let sig = sign_message_digest(&signer, &digest).unwrap();
        let addr = signer_address(&signer);

        assert!(verify_message_signature(&digest, &sig, &addr).is_ok());
    }

    #[test]
    fn test_wrong_digest_rejected() {
        let signer = PrivateKeySigner::random();
        let sig = sign_message_digest(&signer, &[1u8; 20]).unwrap();
        let addr = signer_address(&signer);

        assert!(matches!(
            verify_message_signature(&[2u8; 20], &sig, &addr),
            Err(CryptoError::AddressMismatch { .. })
        ));
    }

    #[test]
    fn test_wrong_signer_rejected() {
        let signer = PrivateKeySigner::random();
        let other = PrivateKeySigner::random();
        let digest = [3u8; 20];
        let sig = sign_message_digest(&signer, &digest).unwrap();

        assert!(verify_message_signature(&digest, &sig, &signer_address(&other)).is_err());
    }

    #[test]
    fn test_verification_claim_roundtrip() {
        let signer = PrivateKeySigner::random();
        let address = signer_address(&signer);
        let block_hash = [9u8; 32];

        let sig = sign_verification_claim(&signer, 42, &address, &block_hash, 1).unwrap();
        assert!(verify_verification_claim(42, &address, &block_hash, 1, &sig).is_ok());

        // Claim fields are bound by the signature
        assert!(verify_verification_claim(43, &address, &block_hash, 1, &sig).is_err());
        assert!(verify_verification_claim(42, &address, &[0u8; 32], 1, &sig).is_err());
        assert!(verify_verification_claim(42, &address, &block_hash, 2, &sig).is_err());
    }

    #[test]
    fn test_signature_length_checked() {
        assert!(matches!(
            verify_message_signature(&[0u8; 20], &[0u8; 64], &[0u8; 20]),
            Err(CryptoError::InvalidLength { .. })
        ));
    }
}
