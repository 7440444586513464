//! Message fixtures
//!
//! Builders for fully signed messages, used by unit and integration tests
//! across the workspace. Keys are derived deterministically from a seed byte
//! so fixtures are reproducible; `Fixtures::new` uses seed 7.

use hub_crypto::eip712::{self, PrivateKeySigner};
use hub_crypto::{ed25519, hash::blake3_20};

use crate::message::{
    Body, CastAddBody, CastId, CastRemoveBody, FarcasterNetwork, HashScheme, Message, MessageData,
    MessageType, ReactionBody, ReactionType, SignatureScheme, SignerBody, UserDataBody,
    UserDataType, VerificationAddEthAddressBody, VerificationRemoveBody,
};

/// Network used by all fixtures
pub const TEST_NETWORK: FarcasterNetwork = FarcasterNetwork::Devnet;

/// A delegated signer keypair plus a custody key
pub struct Fixtures {
    /// Ed25519 seed of the delegated signer
    pub signer_seed: [u8; 32],
    /// Ed25519 public key of the delegated signer
    pub signer_pub: [u8; 32],
    /// Ethereum custody key
    pub custody: PrivateKeySigner,
}

impl Fixtures {
    pub fn new() -> Self {
        Self::with_seed(7)
    }

    /// Deterministic fixtures; distinct seeds give distinct keys
    pub fn with_seed(seed: u8) -> Self {
        let signer_seed = [seed; 32];
        let signer_pub = ed25519::public_key(&signer_seed);
        let mut custody_seed = [seed; 32];
        custody_seed[31] = custody_seed[31].wrapping_add(1);
        let custody = PrivateKeySigner::from_slice(&custody_seed)
            .expect("fixture custody seed is a valid scalar");
        Self {
            signer_seed,
            signer_pub,
            custody,
        }
    }

    pub fn custody_address(&self) -> [u8; 20] {
        eip712::signer_address(&self.custody)
    }
}

impl Default for Fixtures {
    fn default() -> Self {
        Self::new()
    }
}

fn data(fid: u64, timestamp: u32, r#type: MessageType, body: Body) -> MessageData {
    MessageData {
        r#type: r#type as i32,
        fid,
        timestamp,
        network: TEST_NETWORK as i32,
        body: Some(body),
    }
}

/// Hash and sign a payload into a complete message
pub fn finish(fx: &Fixtures, data: MessageData) -> Message {
    let msg_type = MessageType::try_from(data.r#type).expect("fixture type is valid");
    let hash = blake3_20(&data.canonical_bytes());

    let (scheme, signer, signature) = if msg_type.is_signer_kind() {
        let signature = eip712::sign_message_digest(&fx.custody, &hash)
            .expect("fixture signing cannot fail");
        (
            SignatureScheme::Eip712,
            fx.custody_address().to_vec(),
            signature.to_vec(),
        )
    } else {
        let signature = ed25519::sign(&fx.signer_seed, &hash);
        (
            SignatureScheme::Ed25519,
            fx.signer_pub.to_vec(),
            signature.to_vec(),
        )
    };

    Message {
        data: Some(data),
        hash: hash.to_vec(),
        hash_scheme: HashScheme::Blake3 as i32,
        signature,
        signature_scheme: scheme as i32,
        signer,
    }
}

/// Recompute hash and signature after editing a message's payload
pub fn resign(fx: &Fixtures, message: Message) -> Message {
    finish(fx, message.data.expect("fixture message has data"))
}

pub fn signer_add(fx: &Fixtures, fid: u64, timestamp: u32) -> Message {
    signer_add_key(fx, fid, timestamp, fx.signer_pub)
}

pub fn signer_add_key(fx: &Fixtures, fid: u64, timestamp: u32, key: [u8; 32]) -> Message {
    finish(
        fx,
        data(
            fid,
            timestamp,
            MessageType::SignerAdd,
            Body::SignerAddBody(SignerBody {
                signer: key.to_vec(),
                name: String::new(),
            }),
        ),
    )
}

pub fn signer_remove(fx: &Fixtures, fid: u64, timestamp: u32, key: [u8; 32]) -> Message {
    finish(
        fx,
        data(
            fid,
            timestamp,
            MessageType::SignerRemove,
            Body::SignerRemoveBody(SignerBody {
                signer: key.to_vec(),
                name: String::new(),
            }),
        ),
    )
}

pub fn cast_add(fx: &Fixtures, fid: u64, timestamp: u32, text: &str) -> Message {
    finish(
        fx,
        data(
            fid,
            timestamp,
            MessageType::CastAdd,
            Body::CastAddBody(CastAddBody {
                text: text.to_string(),
                embeds: vec![],
                mentions: vec![],
                mentions_positions: vec![],
                parent: None,
            }),
        ),
    )
}

pub fn cast_remove(fx: &Fixtures, fid: u64, timestamp: u32, target_hash: &[u8]) -> Message {
    finish(
        fx,
        data(
            fid,
            timestamp,
            MessageType::CastRemove,
            Body::CastRemoveBody(CastRemoveBody {
                target_hash: target_hash.to_vec(),
            }),
        ),
    )
}

pub fn user_data_add(
    fx: &Fixtures,
    fid: u64,
    timestamp: u32,
    data_type: UserDataType,
    value: &str,
) -> Message {
    finish(
        fx,
        data(
            fid,
            timestamp,
            MessageType::UserDataAdd,
            Body::UserDataBody(UserDataBody {
                r#type: data_type as i32,
                value: value.to_string(),
            }),
        ),
    )
}

pub fn reaction_add(
    fx: &Fixtures,
    fid: u64,
    timestamp: u32,
    reaction_type: ReactionType,
    target: CastId,
) -> Message {
    finish(
        fx,
        data(
            fid,
            timestamp,
            MessageType::ReactionAdd,
            Body::ReactionBody(ReactionBody {
                r#type: reaction_type as i32,
                target: Some(target),
            }),
        ),
    )
}

pub fn reaction_remove(
    fx: &Fixtures,
    fid: u64,
    timestamp: u32,
    reaction_type: ReactionType,
    target: CastId,
) -> Message {
    finish(
        fx,
        data(
            fid,
            timestamp,
            MessageType::ReactionRemove,
            Body::ReactionBody(ReactionBody {
                r#type: reaction_type as i32,
                target: Some(target),
            }),
        ),
    )
}

/// Build a verification with a fresh Ethereum key and a valid claim signature
pub fn verification_add(fx: &Fixtures, fid: u64, timestamp: u32) -> Message {
    let eth_key = PrivateKeySigner::from_slice(&[0x33u8; 32]).expect("valid scalar");
    verification_add_with_key(fx, fid, timestamp, &eth_key)
}

pub fn verification_add_with_key(
    fx: &Fixtures,
    fid: u64,
    timestamp: u32,
    eth_key: &PrivateKeySigner,
) -> Message {
    let address = eip712::signer_address(eth_key);
    let block_hash = [0xbbu8; 32];
    let eth_signature = eip712::sign_verification_claim(
        eth_key,
        fid,
        &address,
        &block_hash,
        TEST_NETWORK as i32 as u8,
    )
    .expect("fixture signing cannot fail");

    finish(
        fx,
        data(
            fid,
            timestamp,
            MessageType::VerificationAddEthAddress,
            Body::VerificationAddEthAddressBody(VerificationAddEthAddressBody {
                address: address.to_vec(),
                eth_signature: eth_signature.to_vec(),
                block_hash: block_hash.to_vec(),
            }),
        ),
    )
}

pub fn verification_remove(fx: &Fixtures, fid: u64, timestamp: u32, address: &[u8]) -> Message {
    finish(
        fx,
        data(
            fid,
            timestamp,
            MessageType::VerificationRemove,
            Body::VerificationRemoveBody(VerificationRemoveBody {
                address: address.to_vec(),
            }),
        ),
    )
}
