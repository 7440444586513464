//! Signer set
//!
//! Two-phase set of signer delegations, keyed by (fid, delegated key).
//! Custody-signed adds authorize an Ed25519 key for an fid; removes revoke
//! it. Everything the other sets admit hangs off this one: when a signer
//! add leaves this set for any reason, the revocation cascade discards that
//! signer's messages everywhere else.

use hub_core::message::{Body, Message, SignerBody};

use crate::store::Store;
use crate::two_phase::{
    RankKey, SetKind, StorePolicy, Winner, by_timestamp_then_remove_then_hash,
    kind_by_message_type,
};

pub(crate) fn signer_body(message: &Message) -> Option<&SignerBody> {
    match message.body() {
        Some(Body::SignerAddBody(body)) | Some(Body::SignerRemoveBody(body)) => Some(body),
        _ => None,
    }
}

pub struct SignerPolicy;

impl StorePolicy for SignerPolicy {
    const NAME: &'static str = "signer";

    fn set_kind(message: &Message) -> SetKind {
        kind_by_message_type(message)
    }

    fn conflict_key(message: &Message) -> Vec<u8> {
        let mut key = message.fid().to_be_bytes().to_vec();
        if let Some(body) = signer_body(message) {
            key.extend_from_slice(&body.signer);
        }
        key
    }

    fn select_winner(existing: &RankKey, incoming: &RankKey) -> Winner {
        by_timestamp_then_remove_then_hash(existing, incoming)
    }
}

pub type SignerStore = Store<SignerPolicy>;

impl SignerStore {
    /// Whether `signer` is currently delegated for `fid`
    pub fn is_active(&self, fid: u64, signer: &[u8]) -> bool {
        let mut key = fid.to_be_bytes().to_vec();
        key.extend_from_slice(signer);
        self.get_add(&key).is_some()
    }

    /// All delegated keys for an fid
    pub fn active_signers(&self, fid: u64) -> Vec<Vec<u8>> {
        self.with_read(|set| {
            set.iter_adds()
                .filter(|m| m.fid() == fid)
                .filter_map(|m| signer_body(m).map(|b| b.signer.clone()))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDb;
    use hub_core::error::HubError;
    use hub_core::factory::{self, Fixtures};
    use std::sync::Arc;

    fn store() -> SignerStore {
        SignerStore::new(Arc::new(MemoryDb::new()), Some(100), None)
    }

    #[test]
    fn test_add_then_query() {
        let fx = Fixtures::new();
        let store = store();
        store.merge(factory::signer_add(&fx, 1, 100), 1_000).unwrap();

        assert!(store.is_active(1, &fx.signer_pub));
        assert_eq!(store.active_signers(1).len(), 1);
        assert!(!store.is_active(2, &fx.signer_pub));
    }

    #[test]
    fn test_newer_remove_wins() {
        let fx = Fixtures::new();
        let store = store();
        store.merge(factory::signer_add(&fx, 1, 100), 1_000).unwrap();
        let outcome = store
            .merge(factory::signer_remove(&fx, 1, 200, fx.signer_pub), 1_000)
            .unwrap();

        assert_eq!(outcome.evicted.len(), 1);
        assert!(!store.is_active(1, &fx.signer_pub));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_older_remove_loses() {
        let fx = Fixtures::new();
        let store = store();
        store.merge(factory::signer_add(&fx, 1, 200), 1_000).unwrap();

        let result = store.merge(factory::signer_remove(&fx, 1, 100, fx.signer_pub), 1_000);
        assert!(matches!(result, Err(HubError::Conflict(_))));
        assert!(store.is_active(1, &fx.signer_pub));
    }

    #[test]
    fn test_remove_beats_add_on_timestamp_tie() {
        let fx = Fixtures::new();
        let store = store();
        store.merge(factory::signer_add(&fx, 1, 100), 1_000).unwrap();
        store
            .merge(factory::signer_remove(&fx, 1, 100, fx.signer_pub), 1_000)
            .unwrap();

        assert!(!store.is_active(1, &fx.signer_pub));
    }

    #[test]
    fn test_duplicate_rejected() {
        let fx = Fixtures::new();
        let store = store();
        let message = factory::signer_add(&fx, 1, 100);
        store.merge(message.clone(), 1_000).unwrap();

        assert_eq!(store.merge(message, 1_000), Err(HubError::Duplicate));
    }
}
