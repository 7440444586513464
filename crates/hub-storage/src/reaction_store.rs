//! Reaction set
//!
//! Two-phase set keyed by (fid, reaction type, target cast). Last write
//! wins on timestamp; a remove beats an add on a tie.

use hub_core::message::{Body, Message, ReactionBody};

use crate::store::Store;
use crate::two_phase::{
    RankKey, SetKind, StorePolicy, Winner, by_timestamp_then_remove_then_hash,
    kind_by_message_type,
};

fn reaction_body(message: &Message) -> Option<&ReactionBody> {
    match message.body() {
        Some(Body::ReactionBody(body)) => Some(body),
        _ => None,
    }
}

pub struct ReactionPolicy;

impl StorePolicy for ReactionPolicy {
    const NAME: &'static str = "reaction";

    fn set_kind(message: &Message) -> SetKind {
        kind_by_message_type(message)
    }

    fn conflict_key(message: &Message) -> Vec<u8> {
        let mut key = message.fid().to_be_bytes().to_vec();
        if let Some(body) = reaction_body(message) {
            key.push(body.r#type as u8);
            if let Some(target) = &body.target {
                key.extend_from_slice(&target.fid.to_be_bytes());
                key.extend_from_slice(&target.hash);
            }
        }
        key
    }

    fn select_winner(existing: &RankKey, incoming: &RankKey) -> Winner {
        by_timestamp_then_remove_then_hash(existing, incoming)
    }
}

pub type ReactionStore = Store<ReactionPolicy>;
