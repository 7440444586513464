//! Message validation
//!
//! `validate_message` runs the full admission gauntlet in a fixed order:
//!
//! 1. structural checks (fields present, byte lengths match the declared
//!    schemes, body arm matches the declared type)
//! 2. encoding check (re-encode the payload canonically and compare digests)
//! 3. signature verification over the digest
//! 4. semantic checks (network, clock skew, per-type body constraints)
//! 5. authorization binding (custody address for EIP-712, delegated signer
//!    for Ed25519)
//!
//! Every failure is a rejection: the sender is at fault and nothing here is
//! retried. Ordering matters - cheap structural checks run before signature
//! verification, and authorization runs last because it reads shared state.

use crate::error::{HubError, Result};
use crate::message::{
    Body, CastAddBody, CastId, FarcasterNetwork, HashScheme, Message, MessageType, ReactionBody,
    ReactionType, SignatureScheme, SignerBody, UserDataBody, UserDataType,
    VerificationAddEthAddressBody, VerificationRemoveBody,
};
use crate::time::MAX_CLOCK_SKEW_MS;
use crate::types::{Fid, constants};

/// Lookup surface for the authorization binding step.
///
/// Implemented by the store family: custody addresses come from the on-chain
/// registry, active signers from the signer set.
pub trait SignerAuthority {
    /// Current custody address of an fid, if registered
    fn custody_address(&self, fid: Fid) -> Option<[u8; 20]>;

    /// Whether `signer` is in the fid's signer add-set
    fn is_active_signer(&self, fid: Fid, signer: &[u8]) -> bool;
}

/// Everything validation needs besides the message itself
pub struct ValidationContext<'a> {
    /// The hub's configured network
    pub network: FarcasterNetwork,
    /// Current time in epoch milliseconds
    pub now: u32,
    pub authority: &'a dyn SignerAuthority,
}

/// Validate a message for admission into the merge pipeline
pub fn validate_message(message: &Message, ctx: &ValidationContext<'_>) -> Result<()> {
    let data = message
        .data
        .as_ref()
        .ok_or_else(|| HubError::MalformedBytes("missing data".into()))?;

    validate_structure(message, data.r#type)?;
    validate_hash(message)?;
    validate_signature(message)?;
    validate_semantics(message, ctx)?;
    validate_authorization(message, ctx)
}

fn validate_structure(message: &Message, type_tag: i32) -> Result<()> {
    let msg_type = MessageType::try_from(type_tag)
        .ok()
        .filter(|t| *t != MessageType::None)
        .ok_or_else(|| HubError::MalformedBytes(format!("unknown message type {type_tag}")))?;

    if message.hash_scheme != HashScheme::Blake3 as i32 {
        return Err(HubError::MalformedBytes("unsupported hash scheme".into()));
    }
    if message.hash.len() != 20 {
        return Err(HubError::MalformedBytes(format!(
            "hash must be 20 bytes, got {}",
            message.hash.len()
        )));
    }

    let scheme = SignatureScheme::try_from(message.signature_scheme)
        .ok()
        .filter(|s| *s != SignatureScheme::None)
        .ok_or_else(|| HubError::MalformedBytes("unknown signature scheme".into()))?;

    // Signer-set mutations are custody-signed; everything else is signed by
    // a delegated Ed25519 key.
    let expected_scheme = if msg_type.is_signer_kind() {
        SignatureScheme::Eip712
    } else {
        SignatureScheme::Ed25519
    };
    if scheme != expected_scheme {
        return Err(HubError::MalformedBytes(format!(
            "{msg_type:?} requires {expected_scheme:?} signatures"
        )));
    }

    match scheme {
        SignatureScheme::Ed25519 => {
            if message.signer.len() != 32 {
                return Err(HubError::MalformedBytes("ed25519 signer must be 32 bytes".into()));
            }
            if message.signature.len() != 64 {
                return Err(HubError::MalformedBytes(
                    "ed25519 signature must be 64 bytes".into(),
                ));
            }
        }
        SignatureScheme::Eip712 => {
            if message.signer.len() != 20 {
                return Err(HubError::MalformedBytes("eip712 signer must be 20 bytes".into()));
            }
            if message.signature.len() != 65 {
                return Err(HubError::MalformedBytes(
                    "eip712 signature must be 65 bytes".into(),
                ));
            }
        }
        SignatureScheme::None => unreachable!("filtered above"),
    }

    // The body arm must match the declared type.
    let body = message
        .body()
        .ok_or_else(|| HubError::MalformedBytes("missing body".into()))?;
    let arm_matches = matches!(
        (msg_type, body),
        (MessageType::SignerAdd, Body::SignerAddBody(_))
            | (MessageType::SignerRemove, Body::SignerRemoveBody(_))
            | (MessageType::UserDataAdd, Body::UserDataBody(_))
            | (MessageType::CastAdd, Body::CastAddBody(_))
            | (MessageType::CastRemove, Body::CastRemoveBody(_))
            | (MessageType::ReactionAdd, Body::ReactionBody(_))
            | (MessageType::ReactionRemove, Body::ReactionBody(_))
            | (
                MessageType::VerificationAddEthAddress,
                Body::VerificationAddEthAddressBody(_)
            )
            | (MessageType::VerificationRemove, Body::VerificationRemoveBody(_))
    );
    if !arm_matches {
        return Err(HubError::MalformedBytes(format!(
            "body does not match type {msg_type:?}"
        )));
    }

    Ok(())
}

fn validate_hash(message: &Message) -> Result<()> {
    let computed = message
        .compute_hash()
        .ok_or_else(|| HubError::MalformedBytes("missing data".into()))?;
    if computed[..] != message.hash[..] {
        return Err(HubError::HashMismatch);
    }
    Ok(())
}

fn validate_signature(message: &Message) -> Result<()> {
    match SignatureScheme::try_from(message.signature_scheme) {
        Ok(SignatureScheme::Ed25519) => {
            hub_crypto::ed25519::verify(&message.signature, &message.hash, &message.signer)
                .map_err(|e| HubError::BadSignature(e.to_string()))
        }
        Ok(SignatureScheme::Eip712) => {
            let digest: &[u8; 20] = message
                .hash
                .as_slice()
                .try_into()
                .map_err(|_| HubError::HashMismatch)?;
            let signer: &[u8; 20] = message
                .signer
                .as_slice()
                .try_into()
                .map_err(|_| HubError::MalformedBytes("eip712 signer must be 20 bytes".into()))?;
            hub_crypto::eip712::verify_message_signature(digest, &message.signature, signer)
                .map_err(|e| HubError::BadSignature(e.to_string()))
        }
        _ => Err(HubError::MalformedBytes("unknown signature scheme".into())),
    }
}

fn validate_semantics(message: &Message, ctx: &ValidationContext<'_>) -> Result<()> {
    let network = message.network();
    if network == FarcasterNetwork::None {
        return Err(HubError::MalformedBytes("unknown network".into()));
    }
    if network != ctx.network {
        return Err(HubError::WrongNetwork);
    }

    if message.timestamp() > ctx.now.saturating_add(MAX_CLOCK_SKEW_MS) {
        return Err(HubError::FutureTimestamp);
    }

    match message.body().expect("structure validated") {
        Body::SignerAddBody(body) => validate_signer_body(body, true),
        Body::SignerRemoveBody(body) => validate_signer_body(body, false),
        Body::UserDataBody(body) => validate_user_data_body(body),
        Body::CastAddBody(body) => validate_cast_add_body(body),
        Body::CastRemoveBody(body) => validate_target_hash(&body.target_hash),
        Body::ReactionBody(body) => validate_reaction_body(body),
        Body::VerificationAddEthAddressBody(body) => {
            validate_verification_add_body(body, message.fid(), network)
        }
        Body::VerificationRemoveBody(body) => validate_verification_remove_body(body),
    }
}

fn validate_signer_body(body: &SignerBody, is_add: bool) -> Result<()> {
    if body.signer.len() != 32 {
        return Err(HubError::BodyConstraintViolated(
            "signer key must be 32 bytes".into(),
        ));
    }
    if is_add && body.name.len() > constants::SIGNER_NAME_MAX {
        return Err(HubError::BodyConstraintViolated(format!(
            "signer name exceeds {} bytes",
            constants::SIGNER_NAME_MAX
        )));
    }
    Ok(())
}

fn validate_user_data_body(body: &UserDataBody) -> Result<()> {
    let data_type = UserDataType::try_from(body.r#type)
        .ok()
        .filter(|t| *t != UserDataType::None)
        .ok_or_else(|| HubError::BodyConstraintViolated("unknown user data type".into()))?;

    // Fname ownership is attested by the external name registry; only its
    // shape is checked here.
    let max = match data_type {
        UserDataType::Pfp | UserDataType::Bio | UserDataType::Url => 256,
        UserDataType::Display | UserDataType::Fname => 32,
        UserDataType::None => unreachable!("filtered above"),
    };
    if body.value.len() > max {
        return Err(HubError::BodyConstraintViolated(format!(
            "{data_type:?} value exceeds {max} bytes"
        )));
    }
    Ok(())
}

fn validate_cast_add_body(body: &CastAddBody) -> Result<()> {
    if body.text.len() > constants::CAST_TEXT_MAX {
        return Err(HubError::BodyConstraintViolated(format!(
            "text exceeds {} bytes",
            constants::CAST_TEXT_MAX
        )));
    }
    if body.embeds.len() > constants::CAST_EMBEDS_MAX {
        return Err(HubError::BodyConstraintViolated(format!(
            "more than {} embeds",
            constants::CAST_EMBEDS_MAX
        )));
    }
    for embed in &body.embeds {
        if embed.is_empty() || embed.len() > constants::CAST_EMBED_MAX {
            return Err(HubError::BodyConstraintViolated(format!(
                "embed must be 1..={} bytes",
                constants::CAST_EMBED_MAX
            )));
        }
    }
    if body.mentions.len() > constants::CAST_MENTIONS_MAX {
        return Err(HubError::BodyConstraintViolated(format!(
            "more than {} mentions",
            constants::CAST_MENTIONS_MAX
        )));
    }
    if body.mentions_positions.len() != body.mentions.len() {
        return Err(HubError::BodyConstraintViolated(
            "mentions and positions must pair up".into(),
        ));
    }
    let mut last: Option<u32> = None;
    for &pos in &body.mentions_positions {
        if pos as usize > body.text.len() {
            return Err(HubError::BodyConstraintViolated(
                "mention position beyond end of text".into(),
            ));
        }
        if let Some(prev) = last {
            if pos <= prev {
                return Err(HubError::BodyConstraintViolated(
                    "mention positions must be strictly ascending".into(),
                ));
            }
        }
        last = Some(pos);
    }
    if let Some(parent) = &body.parent {
        validate_cast_id(parent)?;
    }
    Ok(())
}

fn validate_cast_id(cast_id: &CastId) -> Result<()> {
    if cast_id.fid == 0 {
        return Err(HubError::BodyConstraintViolated("cast id fid must be set".into()));
    }
    validate_target_hash(&cast_id.hash)
}

fn validate_target_hash(hash: &[u8]) -> Result<()> {
    if hash.len() != 20 {
        return Err(HubError::BodyConstraintViolated(
            "target hash must be 20 bytes".into(),
        ));
    }
    Ok(())
}

fn validate_reaction_body(body: &ReactionBody) -> Result<()> {
    ReactionType::try_from(body.r#type)
        .ok()
        .filter(|t| *t != ReactionType::None)
        .ok_or_else(|| HubError::BodyConstraintViolated("unknown reaction type".into()))?;
    let target = body
        .target
        .as_ref()
        .ok_or_else(|| HubError::BodyConstraintViolated("reaction target missing".into()))?;
    validate_cast_id(target)
}

fn validate_verification_add_body(
    body: &VerificationAddEthAddressBody,
    fid: u64,
    network: FarcasterNetwork,
) -> Result<()> {
    let address: &[u8; 20] = body
        .address
        .as_slice()
        .try_into()
        .map_err(|_| HubError::BodyConstraintViolated("address must be 20 bytes".into()))?;
    let block_hash: &[u8; 32] = body
        .block_hash
        .as_slice()
        .try_into()
        .map_err(|_| HubError::BodyConstraintViolated("block hash must be 32 bytes".into()))?;

    hub_crypto::eip712::verify_verification_claim(
        fid,
        address,
        block_hash,
        network as i32 as u8,
        &body.eth_signature,
    )
    .map_err(|e| HubError::BodyConstraintViolated(format!("verification claim: {e}")))
}

fn validate_verification_remove_body(body: &VerificationRemoveBody) -> Result<()> {
    if body.address.len() != 20 {
        return Err(HubError::BodyConstraintViolated(
            "address must be 20 bytes".into(),
        ));
    }
    Ok(())
}

fn validate_authorization(message: &Message, ctx: &ValidationContext<'_>) -> Result<()> {
    let fid = message.fid();
    match SignatureScheme::try_from(message.signature_scheme) {
        Ok(SignatureScheme::Eip712) => {
            let custody = ctx
                .authority
                .custody_address(fid)
                .ok_or(HubError::UnknownFid(fid))?;
            if custody[..] != message.signer[..] {
                return Err(HubError::UnauthorizedSigner(format!(
                    "signer is not the custody address of fid {fid}"
                )));
            }
            Ok(())
        }
        Ok(SignatureScheme::Ed25519) => {
            if !ctx.authority.is_active_signer(fid, &message.signer) {
                return Err(HubError::UnauthorizedSigner(format!(
                    "signer not delegated for fid {fid}"
                )));
            }
            Ok(())
        }
        _ => Err(HubError::MalformedBytes("unknown signature scheme".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{self, Fixtures};

    struct OpenAuthority;

    impl SignerAuthority for OpenAuthority {
        fn custody_address(&self, _fid: u64) -> Option<[u8; 20]> {
            None
        }
        fn is_active_signer(&self, _fid: u64, _signer: &[u8]) -> bool {
            true
        }
    }

    fn permissive_ctx(authority: &dyn SignerAuthority) -> ValidationContext<'_> {
        ValidationContext {
            network: FarcasterNetwork::Devnet,
            now: 100_000,
            authority,
        }
    }

    #[test]
    fn test_valid_cast_passes() {
        let fx = Fixtures::new();
        let message = factory::cast_add(&fx, 1, 1_000, "hi");
        let authority = OpenAuthority;
        assert!(validate_message(&message, &permissive_ctx(&authority)).is_ok());
    }

    #[test]
    fn test_tampered_hash_rejected() {
        let fx = Fixtures::new();
        let mut message = factory::cast_add(&fx, 1, 1_000, "hi");
        message.hash[0] ^= 0xff;
        let authority = OpenAuthority;
        // The signature covers the declared hash, so corrupting the hash
        // surfaces as a hash mismatch before signature verification.
        assert_eq!(
            validate_message(&message, &permissive_ctx(&authority)),
            Err(HubError::HashMismatch)
        );
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let fx = Fixtures::new();
        let mut message = factory::cast_add(&fx, 1, 1_000, "hi");
        message.signature[0] ^= 0xff;
        let authority = OpenAuthority;
        assert!(matches!(
            validate_message(&message, &permissive_ctx(&authority)),
            Err(HubError::BadSignature(_))
        ));
    }

    #[test]
    fn test_future_timestamp_rejected() {
        let fx = Fixtures::new();
        let message = factory::cast_add(&fx, 1, 10_000_000, "hi");
        let authority = OpenAuthority;
        let ctx = ValidationContext {
            network: FarcasterNetwork::Devnet,
            now: 1_000,
            authority: &authority,
        };
        assert_eq!(validate_message(&message, &ctx), Err(HubError::FutureTimestamp));
    }

    #[test]
    fn test_wrong_network_rejected() {
        let fx = Fixtures::new();
        let message = factory::cast_add(&fx, 1, 1_000, "hi");
        let authority = OpenAuthority;
        let ctx = ValidationContext {
            network: FarcasterNetwork::Mainnet,
            now: 100_000,
            authority: &authority,
        };
        assert_eq!(validate_message(&message, &ctx), Err(HubError::WrongNetwork));
    }

    #[test]
    fn test_oversized_text_rejected() {
        let fx = Fixtures::new();
        let text = "x".repeat(constants::CAST_TEXT_MAX + 1);
        let message = factory::cast_add(&fx, 1, 1_000, &text);
        let authority = OpenAuthority;
        assert!(matches!(
            validate_message(&message, &permissive_ctx(&authority)),
            Err(HubError::BodyConstraintViolated(_))
        ));
    }

    #[test]
    fn test_mention_positions_must_ascend() {
        let fx = Fixtures::new();
        let mut message = factory::cast_add(&fx, 1, 1_000, "hello world");
        if let Some(data) = message.data.as_mut() {
            if let Some(Body::CastAddBody(body)) = data.body.as_mut() {
                body.mentions = vec![2, 3];
                body.mentions_positions = vec![5, 5];
            }
        }
        let message = factory::resign(&fx, message);
        let authority = OpenAuthority;
        assert!(matches!(
            validate_message(&message, &permissive_ctx(&authority)),
            Err(HubError::BodyConstraintViolated(_))
        ));
    }

    #[test]
    fn test_unknown_fid_for_custody_message() {
        let fx = Fixtures::new();
        let message = factory::signer_add(&fx, 1, 1_000);
        let authority = OpenAuthority;
        assert_eq!(
            validate_message(&message, &permissive_ctx(&authority)),
            Err(HubError::UnknownFid(1))
        );
    }
}
