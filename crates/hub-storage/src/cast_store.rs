//! Cast set
//!
//! Two-phase set of casts. Adds are keyed by (fid, message hash), removes
//! by (fid, target hash), so an add and the remove aimed at it collide on
//! the same key. The ladder is remove-wins: a removal beats the add it
//! targets even when the removal carries an older timestamp, and once an
//! add loses, only its tombstone (the remove) stays resident - the body is
//! gone from storage.

use hub_core::message::{Body, Message};

use crate::store::Store;
use crate::two_phase::{
    RankKey, SetKind, StorePolicy, Winner, by_remove_then_timestamp_then_hash,
    kind_by_message_type,
};

pub struct CastPolicy;

impl StorePolicy for CastPolicy {
    const NAME: &'static str = "cast";

    fn set_kind(message: &Message) -> SetKind {
        kind_by_message_type(message)
    }

    fn conflict_key(message: &Message) -> Vec<u8> {
        let mut key = message.fid().to_be_bytes().to_vec();
        match message.body() {
            Some(Body::CastAddBody(_)) => key.extend_from_slice(&message.hash),
            Some(Body::CastRemoveBody(body)) => key.extend_from_slice(&body.target_hash),
            _ => {}
        }
        key
    }

    fn select_winner(existing: &RankKey, incoming: &RankKey) -> Winner {
        by_remove_then_timestamp_then_hash(existing, incoming)
    }
}

pub type CastStore = Store<CastPolicy>;

impl CastStore {
    /// A resident cast by author and hash
    pub fn get_cast(&self, fid: u64, hash: &[u8]) -> Option<Message> {
        let mut key = fid.to_be_bytes().to_vec();
        key.extend_from_slice(hash);
        self.get_add(&key)
    }
}
