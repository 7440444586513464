//! Verification set
//!
//! Two-phase set of Ethereum address verifications, keyed by
//! (fid, address). Last write wins on timestamp; a remove beats an add on
//! a tie.

use hub_core::message::{Body, Message};

use crate::store::Store;
use crate::two_phase::{
    RankKey, SetKind, StorePolicy, Winner, by_timestamp_then_remove_then_hash,
    kind_by_message_type,
};

fn claimed_address(message: &Message) -> Option<&[u8]> {
    match message.body() {
        Some(Body::VerificationAddEthAddressBody(body)) => Some(&body.address),
        Some(Body::VerificationRemoveBody(body)) => Some(&body.address),
        _ => None,
    }
}

pub struct VerificationPolicy;

impl StorePolicy for VerificationPolicy {
    const NAME: &'static str = "verification";

    fn set_kind(message: &Message) -> SetKind {
        kind_by_message_type(message)
    }

    fn conflict_key(message: &Message) -> Vec<u8> {
        let mut key = message.fid().to_be_bytes().to_vec();
        if let Some(address) = claimed_address(message) {
            key.extend_from_slice(address);
        }
        key
    }

    fn select_winner(existing: &RankKey, incoming: &RankKey) -> Winner {
        by_timestamp_then_remove_then_hash(existing, incoming)
    }
}

pub type VerificationStore = Store<VerificationPolicy>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDb;
    use hub_core::factory::{self, Fixtures};
    use std::sync::Arc;

    fn store() -> VerificationStore {
        VerificationStore::new(Arc::new(MemoryDb::new()), Some(50), None)
    }

    #[test]
    fn test_verify_then_unverify() {
        let fx = Fixtures::new();
        let store = store();
        let add = factory::verification_add(&fx, 1, 1_000);
        let address = claimed_address(&add).unwrap().to_vec();
        store.merge(add, 10_000).unwrap();
        assert_eq!(store.with_read(|set| set.iter_adds().count()), 1);

        store
            .merge(factory::verification_remove(&fx, 1, 2_000, &address), 10_000)
            .unwrap();
        assert_eq!(store.with_read(|set| set.iter_adds().count()), 0);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let fx = Fixtures::new();
        let store = VerificationStore::new(Arc::new(MemoryDb::new()), Some(2), None);

        store
            .merge(factory::verification_remove(&fx, 1, 100, &[1u8; 20]), 10_000)
            .unwrap();
        store
            .merge(factory::verification_remove(&fx, 1, 200, &[2u8; 20]), 10_000)
            .unwrap();
        let outcome = store
            .merge(factory::verification_remove(&fx, 1, 300, &[3u8; 20]), 10_000)
            .unwrap();

        assert_eq!(outcome.evicted.len(), 1);
        assert_eq!(outcome.evicted[0].timestamp(), 100);
        assert_eq!(store.len(), 2);
    }
}
