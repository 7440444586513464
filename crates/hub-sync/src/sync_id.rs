//! Sync IDs
//!
//! A sync id is the 36-byte key a message occupies in the sync trie:
//!
//! ```text
//! timestamp_decimal_ascii(10) || fid_be(8) || message_type(1) || hash_prefix(17)
//! ```
//!
//! The leading ten bytes are the epoch-millisecond timestamp rendered as
//! zero-padded ASCII decimal, so byte order equals chronological order and
//! an in-order trie walk is a timeline. The 26-byte suffix is a stable,
//! unique function of (fid, body discriminator, hash); it carries enough of
//! the digest to resolve the message back out of its store.

use std::fmt;

use hub_core::error::{HubError, Result};
use hub_core::message::{Message, MessageType};

/// Total sync id length
pub const SYNC_ID_LEN: usize = 36;

/// Length of the decimal timestamp prefix
pub const TIMESTAMP_PREFIX_LEN: usize = 10;

/// Length of the hash prefix carried in the suffix
pub const HASH_PREFIX_LEN: usize = 17;

/// Render a timestamp as the 10-byte trie prefix
pub fn timestamp_prefix(timestamp: u32) -> [u8; TIMESTAMP_PREFIX_LEN] {
    let text = format!("{timestamp:010}");
    text.as_bytes()
        .try_into()
        .expect("u32 renders to at most 10 decimal digits")
}

/// 36-byte chronologically sortable message key
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SyncId([u8; SYNC_ID_LEN]);

impl SyncId {
    /// Derive the sync id of a message
    pub fn from_message(message: &Message) -> Result<Self> {
        let hash = message
            .message_hash()
            .ok_or_else(|| HubError::MalformedBytes("hash must be 20 bytes".into()))?;
        let msg_type = message.msg_type();
        if msg_type == MessageType::None {
            return Err(HubError::MalformedBytes("unknown message type".into()));
        }

        let mut bytes = [0u8; SYNC_ID_LEN];
        bytes[..TIMESTAMP_PREFIX_LEN].copy_from_slice(&timestamp_prefix(message.timestamp()));
        bytes[10..18].copy_from_slice(&message.fid().to_be_bytes());
        bytes[18] = msg_type as u8;
        bytes[19..36].copy_from_slice(&hash.as_bytes()[..HASH_PREFIX_LEN]);
        Ok(Self(bytes))
    }

    /// Parse a sync id received from a peer
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; SYNC_ID_LEN] = bytes
            .try_into()
            .map_err(|_| HubError::MalformedBytes(format!("sync id must be {SYNC_ID_LEN} bytes")))?;
        if !arr[..TIMESTAMP_PREFIX_LEN].iter().all(u8::is_ascii_digit) {
            return Err(HubError::MalformedBytes(
                "sync id timestamp prefix must be decimal".into(),
            ));
        }
        MessageType::try_from(arr[18] as i32)
            .ok()
            .filter(|t| *t != MessageType::None)
            .ok_or_else(|| HubError::MalformedBytes("sync id carries unknown type".into()))?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; SYNC_ID_LEN] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    pub fn timestamp(&self) -> u32 {
        std::str::from_utf8(&self.0[..TIMESTAMP_PREFIX_LEN])
            .ok()
            .and_then(|s| s.parse().ok())
            .expect("validated decimal prefix")
    }

    pub fn fid(&self) -> u64 {
        u64::from_be_bytes(self.0[10..18].try_into().expect("fixed slice"))
    }

    pub fn msg_type(&self) -> MessageType {
        MessageType::try_from(self.0[18] as i32).expect("validated discriminator")
    }

    /// First 17 bytes of the message digest
    pub fn hash_prefix(&self) -> &[u8] {
        &self.0[19..]
    }
}

impl fmt::Debug for SyncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SyncId({} fid={} {:?})",
            self.timestamp(),
            self.fid(),
            self.msg_type()
        )
    }
}
