//! Revocation cascade
//!
//! Two triggers invalidate messages across the set family:
//!
//! - a signer add leaving the signer set for any reason - conflicted out by
//!   a remove, or capacity-evicted - revokes that key's messages in every
//!   non-signer set
//! - a custody transfer discards every signer message issued by the
//!   previous custody address, then revokes each displaced delegation
//!   transitively
//!
//! Cascade discards are unconditional: they bypass conflict resolution and
//! leave no tombstones or journal entries, so a re-delegated signer's
//! messages can merge again. One pass reaches the fixed point because
//! non-signer sets hold no signer messages. Every discard lands in the
//! caller's batch, so persisted state never reflects half a cascade.

use tracing::{debug, info};

use hub_core::error::Result;
use hub_core::message::{Message, MessageType};
use hub_core::types::Fid;

use crate::db::Batch;
use crate::id_registry::IdRegistryEvent;
use crate::signer_store::signer_body;
use crate::stores::Stores;
use crate::two_phase::MergeOutcome;

/// Discard every Ed25519 message signed by `signer` for `fid` across the
/// non-signer sets.
pub fn revoke_signer(
    stores: &Stores,
    fid: Fid,
    signer: &[u8],
    batch: &mut Batch,
) -> Vec<Message> {
    let matches = |m: &Message| m.fid() == fid && m.signer.as_slice() == signer;

    let mut discarded = stores.user_data.discard_where_batched(matches, batch);
    discarded.extend(stores.casts.discard_where_batched(matches, batch));
    discarded.extend(stores.reactions.discard_where_batched(matches, batch));
    discarded.extend(stores.verifications.discard_where_batched(matches, batch));

    if !discarded.is_empty() {
        info!(
            fid,
            signer = %hex::encode(signer),
            count = discarded.len(),
            "revoked signer, discarded dependent messages"
        );
    }
    discarded
}

/// Revoke every signer add a merge displaced, folding the discards into
/// the merge outcome.
pub fn run_for_displaced_signers(
    stores: &Stores,
    outcome: &mut MergeOutcome,
    batch: &mut Batch,
) {
    let revoked: Vec<(Fid, Vec<u8>)> = outcome
        .evicted
        .iter()
        .filter(|e| e.msg_type() == MessageType::SignerAdd)
        .filter_map(|e| signer_body(e).map(|b| (e.fid(), b.signer.clone())))
        .collect();
    for (fid, signer) in revoked {
        outcome
            .evicted
            .extend(revoke_signer(stores, fid, &signer, batch));
    }
}

/// Apply one on-chain registry event into the caller's batch. On a custody
/// transfer, every signer message issued by the previous custody address is
/// discarded and its delegations are revoked transitively; the record
/// update and the whole cascade share the batch.
pub fn apply_id_event(
    stores: &Stores,
    event: &IdRegistryEvent,
    batch: &mut Batch,
) -> Result<Vec<Message>> {
    let Some(change) = stores.registry.apply_event_batched(event, batch)? else {
        return Ok(Vec::new());
    };

    let previous = change.previous;
    let dropped = stores.signers.discard_where_batched(
        |m| m.fid() == change.fid && m.signer.as_slice() == previous.as_slice(),
        batch,
    );

    let mut discarded = Vec::new();
    for message in &dropped {
        if message.msg_type() == MessageType::SignerAdd {
            if let Some(body) = signer_body(message) {
                let signer = body.signer.clone();
                discarded.extend(revoke_signer(stores, change.fid, &signer, batch));
            }
        }
    }
    discarded.extend(dropped);

    debug!(
        fid = change.fid,
        discarded = discarded.len(),
        "custody transfer cascade complete"
    );
    Ok(discarded)
}

#[cfg(test)]
mod tests {
    use crate::db::MemoryDb;
    use crate::id_registry::{IdRegistryEvent, IdRegistryEventType};
    use crate::stores::{StoreLimits, Stores};
    use hub_core::factory::{self, Fixtures};
    use hub_core::message::{CastId, ReactionType};
    use hub_core::validation::SignerAuthority;
    use std::sync::Arc;

    fn stores() -> Stores {
        Stores::new(Arc::new(MemoryDb::new()), &StoreLimits::unlimited())
    }

    fn register(fid: u64, to: [u8; 20], block: u64) -> IdRegistryEvent {
        IdRegistryEvent {
            fid,
            to,
            event_type: IdRegistryEventType::Register,
            block_number: block,
            log_index: 0,
        }
    }

    fn transfer(fid: u64, to: [u8; 20], block: u64) -> IdRegistryEvent {
        IdRegistryEvent {
            fid,
            to,
            event_type: IdRegistryEventType::Transfer,
            block_number: block,
            log_index: 0,
        }
    }

    #[test]
    fn test_signer_remove_cascades() {
        let fx = Fixtures::new();
        let stores = stores();

        stores.merge(factory::signer_add(&fx, 1, 100), 10_000).unwrap();
        stores
            .merge(factory::cast_add(&fx, 1, 200, "by signer"), 10_000)
            .unwrap();
        stores
            .merge(
                factory::reaction_add(
                    &fx,
                    1,
                    300,
                    ReactionType::Like,
                    CastId {
                        fid: 2,
                        hash: vec![9u8; 20],
                    },
                ),
                10_000,
            )
            .unwrap();
        assert_eq!(stores.total_messages(), 3);

        let outcome = stores
            .merge(factory::signer_remove(&fx, 1, 400, fx.signer_pub), 10_000)
            .unwrap();

        // The add left the signer set and its two messages were discarded.
        assert_eq!(outcome.evicted.len(), 3);
        assert_eq!(stores.casts.len(), 0);
        assert_eq!(stores.reactions.len(), 0);
        // Only the signer remove tombstone remains.
        assert_eq!(stores.total_messages(), 1);
    }

    #[test]
    fn test_cascade_spares_other_signers() {
        let alice = Fixtures::with_seed(1);
        let bob = Fixtures::with_seed(2);
        let stores = stores();

        stores.merge(factory::signer_add(&alice, 1, 100), 10_000).unwrap();
        stores
            .merge(factory::signer_add_key(&alice, 1, 100, bob.signer_pub), 10_000)
            .unwrap();
        stores
            .merge(factory::cast_add(&alice, 1, 200, "mine"), 10_000)
            .unwrap();
        // Bob's fixture signs with bob's delegated key for the same fid.
        stores
            .merge(factory::cast_add(&bob, 1, 200, "bobs"), 10_000)
            .unwrap();

        stores
            .merge(factory::signer_remove(&alice, 1, 300, alice.signer_pub), 10_000)
            .unwrap();

        assert_eq!(stores.casts.len(), 1);
        assert!(stores.is_active_signer(1, &bob.signer_pub));
    }

    #[test]
    fn test_fid_transfer_cascade() {
        let fx = Fixtures::new();
        let stores = stores();

        stores
            .apply_id_event(&register(1, fx.custody_address(), 10))
            .unwrap();
        stores.merge(factory::signer_add(&fx, 1, 100), 10_000).unwrap();
        stores.merge(factory::cast_add(&fx, 1, 200, "hi"), 10_000).unwrap();

        let discarded = stores
            .apply_id_event(&transfer(1, [0xbb; 20], 11))
            .unwrap();

        // The signer add and the cast it authorized are both gone, with no
        // tombstones anywhere.
        assert_eq!(discarded.len(), 2);
        assert_eq!(stores.total_messages(), 0);
        assert_eq!(stores.custody_address(1), Some([0xbb; 20]));
    }

    #[test]
    fn test_revoked_messages_can_return_after_redelegation() {
        let fx = Fixtures::new();
        let stores = stores();

        stores.merge(factory::signer_add(&fx, 1, 100), 10_000).unwrap();
        let cast = factory::cast_add(&fx, 1, 200, "hi");
        stores.merge(cast.clone(), 10_000).unwrap();
        stores
            .merge(factory::signer_remove(&fx, 1, 300, fx.signer_pub), 10_000)
            .unwrap();
        assert_eq!(stores.casts.len(), 0);

        // Cascade discards leave no journal entry, so after a fresh
        // delegation the cast merges again.
        stores.merge(factory::signer_add(&fx, 1, 400), 10_000).unwrap();
        assert!(stores.merge(cast, 10_000).is_ok());
        assert_eq!(stores.casts.len(), 1);
    }
}
