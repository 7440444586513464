//! Canonical message model
//!
//! Messages travel as deterministically encoded protobufs. The structs here
//! are hand-written in prost's generated shape; prost's encoder emits fields
//! in ascending tag order, omits default-valued scalars, packs repeated
//! numerics, and writes only the active oneof arm - which is exactly the
//! canonical encoding the network pins. Two conformant implementations
//! produce byte-identical encodings for every message.
//!
//! Message identity is the 20-byte BLAKE3 digest of the encoded
//! [`MessageData`]; signatures cover the digest, never the envelope.

use prost::Message as ProstMessage;

use crate::error::{HubError, Result};
use crate::types::MessageHash;

/// Signed message envelope
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Message {
    /// Payload; its canonical encoding is what `hash` commits to
    #[prost(message, optional, tag = "1")]
    pub data: Option<MessageData>,
    /// 20-byte BLAKE3 digest of the canonical `data` encoding
    #[prost(bytes = "vec", tag = "2")]
    pub hash: Vec<u8>,
    #[prost(enumeration = "HashScheme", tag = "3")]
    pub hash_scheme: i32,
    /// 64-byte Ed25519 or 65-byte EIP-712 signature over `hash`
    #[prost(bytes = "vec", tag = "4")]
    pub signature: Vec<u8>,
    #[prost(enumeration = "SignatureScheme", tag = "5")]
    pub signature_scheme: i32,
    /// 32-byte Ed25519 public key or 20-byte Ethereum custody address
    #[prost(bytes = "vec", tag = "6")]
    pub signer: Vec<u8>,
}

/// Message payload: routing fields plus a type-tagged body
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MessageData {
    #[prost(enumeration = "MessageType", tag = "1")]
    pub r#type: i32,
    #[prost(uint64, tag = "2")]
    pub fid: u64,
    /// Milliseconds since the network epoch (2021-01-01T00:00:00Z)
    #[prost(uint32, tag = "3")]
    pub timestamp: u32,
    #[prost(enumeration = "FarcasterNetwork", tag = "4")]
    pub network: i32,
    #[prost(oneof = "Body", tags = "5, 6, 7, 8, 9, 10, 11, 12")]
    pub body: Option<Body>,
}

/// Type-tagged message body
#[derive(Clone, PartialEq, ::prost::Oneof)]
pub enum Body {
    #[prost(message, tag = "5")]
    SignerAddBody(SignerBody),
    #[prost(message, tag = "6")]
    SignerRemoveBody(SignerBody),
    #[prost(message, tag = "7")]
    UserDataBody(UserDataBody),
    #[prost(message, tag = "8")]
    CastAddBody(CastAddBody),
    #[prost(message, tag = "9")]
    CastRemoveBody(CastRemoveBody),
    #[prost(message, tag = "10")]
    ReactionBody(ReactionBody),
    #[prost(message, tag = "11")]
    VerificationAddEthAddressBody(VerificationAddEthAddressBody),
    #[prost(message, tag = "12")]
    VerificationRemoveBody(VerificationRemoveBody),
}

/// Body of signer add and remove messages
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SignerBody {
    /// 32-byte Ed25519 public key being delegated or revoked
    #[prost(bytes = "vec", tag = "1")]
    pub signer: Vec<u8>,
    /// Optional human-readable label; empty means unset
    #[prost(string, tag = "2")]
    pub name: String,
}

/// Body of user data messages
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UserDataBody {
    #[prost(enumeration = "UserDataType", tag = "1")]
    pub r#type: i32,
    #[prost(string, tag = "2")]
    pub value: String,
}

/// Reference to a cast by author and hash
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CastId {
    #[prost(uint64, tag = "1")]
    pub fid: u64,
    #[prost(bytes = "vec", tag = "2")]
    pub hash: Vec<u8>,
}

/// Body of a new cast
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CastAddBody {
    #[prost(string, tag = "1")]
    pub text: String,
    #[prost(string, repeated, tag = "2")]
    pub embeds: Vec<String>,
    #[prost(uint64, repeated, tag = "3")]
    pub mentions: Vec<u64>,
    /// Byte offsets into `text`, one per mention, strictly ascending
    #[prost(uint32, repeated, tag = "4")]
    pub mentions_positions: Vec<u32>,
    #[prost(message, optional, tag = "5")]
    pub parent: Option<CastId>,
}

/// Body of a cast removal
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CastRemoveBody {
    /// Hash of the cast being removed
    #[prost(bytes = "vec", tag = "1")]
    pub target_hash: Vec<u8>,
}

/// Body of reaction add and remove messages
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReactionBody {
    #[prost(enumeration = "ReactionType", tag = "1")]
    pub r#type: i32,
    #[prost(message, optional, tag = "2")]
    pub target: Option<CastId>,
}

/// Body of an Ethereum address verification
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VerificationAddEthAddressBody {
    #[prost(bytes = "vec", tag = "1")]
    pub address: Vec<u8>,
    /// EIP-712 signature over the verification claim, made by `address`
    #[prost(bytes = "vec", tag = "2")]
    pub eth_signature: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub block_hash: Vec<u8>,
}

/// Body of a verification removal
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VerificationRemoveBody {
    #[prost(bytes = "vec", tag = "1")]
    pub address: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum MessageType {
    None = 0,
    SignerAdd = 1,
    SignerRemove = 2,
    UserDataAdd = 3,
    CastAdd = 4,
    CastRemove = 5,
    ReactionAdd = 6,
    ReactionRemove = 7,
    VerificationAddEthAddress = 8,
    VerificationRemove = 9,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum FarcasterNetwork {
    None = 0,
    Mainnet = 1,
    Testnet = 2,
    Devnet = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum HashScheme {
    None = 0,
    Blake3 = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum SignatureScheme {
    None = 0,
    Ed25519 = 1,
    Eip712 = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum UserDataType {
    None = 0,
    Pfp = 1,
    Display = 2,
    Bio = 3,
    Url = 4,
    Fname = 5,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ReactionType {
    None = 0,
    Like = 1,
    Recast = 2,
}

impl MessageType {
    /// Whether this type lands in a remove set
    pub fn is_remove(&self) -> bool {
        matches!(
            self,
            Self::SignerRemove | Self::CastRemove | Self::ReactionRemove | Self::VerificationRemove
        )
    }

    /// Whether this type belongs to the signer set
    pub fn is_signer_kind(&self) -> bool {
        matches!(self, Self::SignerAdd | Self::SignerRemove)
    }
}

impl MessageData {
    /// The canonical encoding this network hashes and signs
    pub fn canonical_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }
}

impl Message {
    pub fn fid(&self) -> u64 {
        self.data.as_ref().map(|d| d.fid).unwrap_or(0)
    }

    pub fn timestamp(&self) -> u32 {
        self.data.as_ref().map(|d| d.timestamp).unwrap_or(0)
    }

    pub fn msg_type(&self) -> MessageType {
        self.data
            .as_ref()
            .and_then(|d| MessageType::try_from(d.r#type).ok())
            .unwrap_or(MessageType::None)
    }

    pub fn network(&self) -> FarcasterNetwork {
        self.data
            .as_ref()
            .and_then(|d| FarcasterNetwork::try_from(d.network).ok())
            .unwrap_or(FarcasterNetwork::None)
    }

    pub fn body(&self) -> Option<&Body> {
        self.data.as_ref().and_then(|d| d.body.as_ref())
    }

    /// Declared hash as a typed digest, if well-formed
    pub fn message_hash(&self) -> Option<MessageHash> {
        MessageHash::from_slice(&self.hash)
    }

    /// Recompute the digest from the payload's canonical encoding
    pub fn compute_hash(&self) -> Option<[u8; 20]> {
        self.data
            .as_ref()
            .map(|d| hub_crypto::hash::blake3_20(&d.canonical_bytes()))
    }
}

/// Encode a message in the canonical wire form
pub fn encode_message(message: &Message) -> Vec<u8> {
    message.encode_to_vec()
}

/// Decode a message from wire bytes
pub fn decode_message(bytes: &[u8]) -> Result<Message> {
    Message::decode(bytes).map_err(|e| HubError::MalformedBytes(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data() -> MessageData {
        MessageData {
            r#type: MessageType::CastAdd as i32,
            fid: 7,
            timestamp: 1_000,
            network: FarcasterNetwork::Devnet as i32,
            body: Some(Body::CastAddBody(CastAddBody {
                text: "hello".to_string(),
                embeds: vec![],
                mentions: vec![],
                mentions_positions: vec![],
                parent: None,
            })),
        }
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let message = Message {
            data: Some(sample_data()),
            hash: vec![1u8; 20],
            hash_scheme: HashScheme::Blake3 as i32,
            signature: vec![2u8; 64],
            signature_scheme: SignatureScheme::Ed25519 as i32,
            signer: vec![3u8; 32],
        };

        let bytes = encode_message(&message);
        let decoded = decode_message(&bytes).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_canonical_encoding_is_deterministic() {
        let a = sample_data().canonical_bytes();
        let b = sample_data().canonical_bytes();
        assert_eq!(a, b);
    }

    #[test]
    fn test_default_fields_are_omitted() {
        // An all-default payload encodes to nothing: proto3 scalars at
        // their zero value take no wire space.
        let empty = MessageData::default();
        assert!(empty.canonical_bytes().is_empty());
    }

    #[test]
    fn test_hash_commits_to_payload() {
        let mut message = Message {
            data: Some(sample_data()),
            ..Default::default()
        };
        message.hash = message.compute_hash().unwrap().to_vec();

        let mut tampered = message.clone();
        if let Some(data) = tampered.data.as_mut() {
            if let Some(Body::CastAddBody(body)) = data.body.as_mut() {
                body.text.push('!');
            }
        }
        assert_ne!(tampered.compute_hash().unwrap().to_vec(), message.hash);
    }

    #[test]
    fn test_decode_garbage_rejected() {
        assert!(decode_message(&[0xff, 0xff, 0xff]).is_err());
    }
}
