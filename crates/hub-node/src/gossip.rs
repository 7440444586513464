//! Gossip surface
//!
//! Topic naming and payload codecs for the two gossip topics:
//! `messages` carries canonical-encoded message envelopes, `contact`
//! carries hub advertisements. The libp2p swarm that actually publishes
//! and subscribes is an external collaborator; it hands received payloads
//! to [`Hub::handle_gossip_payload`] with no ordering assumptions.

use libp2p::gossipsub::IdentTopic;
use prost::Message as ProstMessage;
use tracing::debug;

use hub_core::error::{HubError, Result};
use hub_core::message::{FarcasterNetwork, Message};
use hub_storage::MergeOutcome;

use crate::hub::Hub;

fn network_label(network: FarcasterNetwork) -> &'static str {
    match network {
        FarcasterNetwork::Mainnet => "mainnet",
        FarcasterNetwork::Testnet => "testnet",
        FarcasterNetwork::Devnet => "devnet",
        FarcasterNetwork::None => "unknown",
    }
}

/// Topic carrying message broadcasts
pub fn messages_topic(network: FarcasterNetwork) -> IdentTopic {
    IdentTopic::new(format!("hub/{}/messages", network_label(network)))
}

/// Topic carrying hub contact advertisements
pub fn contact_topic(network: FarcasterNetwork) -> IdentTopic {
    IdentTopic::new(format!("hub/{}/contact", network_label(network)))
}

/// Hub advertisement payload
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ContactInfoBody {
    #[prost(string, tag = "1")]
    pub nickname: String,
    #[prost(string, tag = "2")]
    pub version: String,
    /// Hex-lowercase trie root at publish time
    #[prost(string, tag = "3")]
    pub root_hash: String,
    /// Multiaddresses the hub listens on
    #[prost(string, repeated, tag = "4")]
    pub addresses: Vec<String>,
}

/// Envelope for everything travelling over gossip
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GossipEnvelope {
    #[prost(oneof = "Content", tags = "1, 2")]
    pub content: Option<Content>,
}

#[derive(Clone, PartialEq, ::prost::Oneof)]
pub enum Content {
    #[prost(message, tag = "1")]
    Message(Message),
    #[prost(message, tag = "2")]
    Contact(ContactInfoBody),
}

/// Outbound publishing seam implemented by the swarm collaborator
pub trait GossipPublisher: Send + Sync {
    fn publish(&self, topic: IdentTopic, payload: Vec<u8>) -> Result<()>;
}

pub fn encode_message_envelope(message: &Message) -> Vec<u8> {
    GossipEnvelope {
        content: Some(Content::Message(message.clone())),
    }
    .encode_to_vec()
}

pub fn encode_contact_envelope(contact: ContactInfoBody) -> Vec<u8> {
    GossipEnvelope {
        content: Some(Content::Contact(contact)),
    }
    .encode_to_vec()
}

pub fn decode_envelope(bytes: &[u8]) -> Result<Content> {
    let envelope =
        GossipEnvelope::decode(bytes).map_err(|e| HubError::MalformedBytes(e.to_string()))?;
    envelope
        .content
        .ok_or_else(|| HubError::MalformedBytes("empty gossip envelope".into()))
}

impl Hub {
    /// Feed one received gossip payload into the merge pipeline.
    ///
    /// Contact advertisements return `None`; they are peer-table input for
    /// the swarm, not hub state.
    pub fn handle_gossip_payload(&self, bytes: &[u8]) -> Result<Option<MergeOutcome>> {
        match decode_envelope(bytes)? {
            Content::Message(message) => self.submit_message(message).map(Some),
            Content::Contact(contact) => {
                debug!(nickname = %contact.nickname, "gossip contact received");
                Ok(None)
            }
        }
    }

    /// The hub's own advertisement for the contact topic
    pub fn contact_info(&self, addresses: Vec<String>) -> ContactInfoBody {
        let info = self.info();
        ContactInfoBody {
            nickname: info.nickname,
            version: info.version,
            root_hash: info.root_hash,
            addresses,
        }
    }
}
