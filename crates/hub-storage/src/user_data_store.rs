//! User data set
//!
//! Grow-only: there is no remove arm, and the set is unbounded. One entry
//! per (fid, field); newer timestamps replace older values, with the higher
//! hash breaking ties.

use hub_core::message::{Body, Message, UserDataBody, UserDataType};

use crate::store::Store;
use crate::two_phase::{RankKey, SetKind, StorePolicy, Winner, by_timestamp_then_hash};

fn user_data_body(message: &Message) -> Option<&UserDataBody> {
    match message.body() {
        Some(Body::UserDataBody(body)) => Some(body),
        _ => None,
    }
}

pub struct UserDataPolicy;

impl StorePolicy for UserDataPolicy {
    const NAME: &'static str = "user_data";

    fn set_kind(_message: &Message) -> SetKind {
        SetKind::Add
    }

    fn conflict_key(message: &Message) -> Vec<u8> {
        let mut key = message.fid().to_be_bytes().to_vec();
        if let Some(body) = user_data_body(message) {
            key.push(body.r#type as u8);
        }
        key
    }

    fn select_winner(existing: &RankKey, incoming: &RankKey) -> Winner {
        by_timestamp_then_hash(existing, incoming)
    }
}

pub type UserDataStore = Store<UserDataPolicy>;

impl UserDataStore {
    /// Current value of one field for an fid
    pub fn get_field(&self, fid: u64, data_type: UserDataType) -> Option<Message> {
        let mut key = fid.to_be_bytes().to_vec();
        key.push(data_type as u8);
        self.get_add(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDb;
    use hub_core::factory::{self, Fixtures};
    use std::sync::Arc;

    fn store() -> UserDataStore {
        UserDataStore::new(Arc::new(MemoryDb::new()), None, None)
    }

    #[test]
    fn test_newer_value_replaces() {
        let fx = Fixtures::new();
        let store = store();
        store
            .merge(
                factory::user_data_add(&fx, 1, 1_000, UserDataType::Bio, "old"),
                10_000,
            )
            .unwrap();
        store
            .merge(
                factory::user_data_add(&fx, 1, 2_000, UserDataType::Bio, "new"),
                10_000,
            )
            .unwrap();

        let current = store.get_field(1, UserDataType::Bio).unwrap();
        match current.body() {
            Some(Body::UserDataBody(body)) => assert_eq!(body.value, "new"),
            _ => panic!("expected user data body"),
        }
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_timestamp_tie_breaks_on_hash() {
        let fx = Fixtures::new();
        let store = store();
        let a = factory::user_data_add(&fx, 1, 1_000, UserDataType::Bio, "aaa");
        let b = factory::user_data_add(&fx, 1, 1_000, UserDataType::Bio, "bbb");

        let winner_hash = std::cmp::max(a.hash.clone(), b.hash.clone());
        store.merge(a, 10_000).unwrap();
        let _ = store.merge(b, 10_000);

        let current = store.get_field(1, UserDataType::Bio).unwrap();
        assert_eq!(current.hash, winner_hash);
    }

    #[test]
    fn test_fields_are_independent() {
        let fx = Fixtures::new();
        let store = store();
        store
            .merge(
                factory::user_data_add(&fx, 1, 1_000, UserDataType::Bio, "bio"),
                10_000,
            )
            .unwrap();
        store
            .merge(
                factory::user_data_add(&fx, 1, 1_000, UserDataType::Display, "name"),
                10_000,
            )
            .unwrap();

        assert_eq!(store.len(), 2);
    }
}
