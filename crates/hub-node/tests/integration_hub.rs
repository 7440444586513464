//! End-to-end merge pipeline scenarios
//!
//! Each test drives a full hub through registration, delegation, message
//! merges, and the cascades that tie the CRDTs together.

use std::sync::Arc;

use hub_core::error::HubError;
use hub_core::factory::{self, Fixtures};
use hub_core::message::UserDataType;
use hub_node::{Hub, HubConfig};
use hub_storage::{IdRegistryEvent, IdRegistryEventType, StoreLimits};

const NOW: u32 = 1_000_000;

fn hub_with_limits(limits: StoreLimits) -> Arc<Hub> {
    let mut config = HubConfig::devnet();
    config.limits = limits;
    Hub::new(config).unwrap()
}

fn hub() -> Arc<Hub> {
    hub_with_limits(StoreLimits::unlimited())
}

fn register(hub: &Hub, fid: u64, custody: [u8; 20], block: u64) {
    hub.apply_id_registry_event(&IdRegistryEvent {
        fid,
        to: custody,
        event_type: IdRegistryEventType::Register,
        block_number: block,
        log_index: 0,
    })
    .unwrap();
}

fn transfer(hub: &Hub, fid: u64, to: [u8; 20], block: u64) -> Vec<hub_core::message::Message> {
    hub.apply_id_registry_event(&IdRegistryEvent {
        fid,
        to,
        event_type: IdRegistryEventType::Transfer,
        block_number: block,
        log_index: 0,
    })
    .unwrap()
}

#[test]
fn signer_authorization_loop() {
    let fx = Fixtures::new();
    let hub = hub();
    register(&hub, 1, fx.custody_address(), 1);

    let root0 = hub.root_hash();
    hub.submit_message_at(factory::signer_add(&fx, 1, 1_000), NOW)
        .unwrap();
    let root1 = hub.root_hash();
    assert_ne!(root1, root0);

    let cast = factory::cast_add(&fx, 1, 1_100, "hi");
    hub.submit_message_at(cast.clone(), NOW).unwrap();
    let root2 = hub.root_hash();
    assert_ne!(root2, root1);

    assert!(hub.stores().signers.is_active(1, &fx.signer_pub));
    assert!(hub.stores().casts.get_cast(1, &cast.hash).is_some());

    // Revoking the signer discards the cast outright: no tombstone, just
    // the signer remove left behind.
    let outcome = hub
        .submit_message_at(factory::signer_remove(&fx, 1, 1_200, fx.signer_pub), NOW)
        .unwrap();
    assert_eq!(outcome.evicted.len(), 2);

    assert!(!hub.stores().signers.is_active(1, &fx.signer_pub));
    assert_eq!(hub.stores().casts.len(), 0);
    assert_eq!(hub.stores().signers.len(), 1);

    let root3 = hub.root_hash();
    assert_ne!(root3, root2);
    assert_eq!(hub.sync_ids_by_prefix(&[]).len(), 1);
}

#[test]
fn cast_remove_tombstone_beats_re_add() {
    let fx = Fixtures::new();
    let hub = hub();
    register(&hub, 1, fx.custody_address(), 1);
    hub.submit_message_at(factory::signer_add(&fx, 1, 100), NOW)
        .unwrap();

    let add = factory::cast_add(&fx, 1, 2_000, "removable");
    hub.submit_message_at(add.clone(), NOW).unwrap();

    // The remove is older than the add and still wins.
    hub.submit_message_at(factory::cast_remove(&fx, 1, 1_500, &add.hash), NOW)
        .unwrap();
    assert!(hub.stores().casts.get_cast(1, &add.hash).is_none());

    // Re-submission hits the resident tombstone.
    let result = hub.submit_message_at(add, NOW);
    assert!(matches!(result, Err(HubError::Conflict(_))));
}

#[test]
fn user_data_timestamp_tie_breaks_on_hash() {
    let fx = Fixtures::new();
    let hub = hub();
    register(&hub, 1, fx.custody_address(), 1);
    hub.submit_message_at(factory::signer_add(&fx, 1, 100), NOW)
        .unwrap();

    let a = factory::user_data_add(&fx, 1, 1_000, UserDataType::Bio, "first");
    let b = factory::user_data_add(&fx, 1, 1_000, UserDataType::Bio, "second");
    let winner_hash = std::cmp::max(a.hash.clone(), b.hash.clone());

    let _ = hub.submit_message_at(a, NOW);
    let _ = hub.submit_message_at(b, NOW);

    let resident = hub
        .stores()
        .user_data
        .get_field(1, UserDataType::Bio)
        .unwrap();
    assert_eq!(resident.hash, winner_hash);
}

#[test]
fn fid_transfer_cascades_transitively() {
    let fx = Fixtures::new();
    let hub = hub();
    register(&hub, 1, fx.custody_address(), 1);
    hub.submit_message_at(factory::signer_add(&fx, 1, 100), NOW)
        .unwrap();
    hub.submit_message_at(factory::cast_add(&fx, 1, 200, "mine"), NOW)
        .unwrap();
    assert_eq!(hub.sync_ids_by_prefix(&[]).len(), 2);

    let new_custody = Fixtures::with_seed(9);
    let discarded = transfer(&hub, 1, new_custody.custody_address(), 2);

    assert_eq!(discarded.len(), 2);
    assert_eq!(hub.stores().total_messages(), 0);
    assert_eq!(hub.sync_ids_by_prefix(&[]).len(), 0);

    // The new custody address can delegate afresh.
    hub.submit_message_at(factory::signer_add(&new_custody, 1, 300), NOW)
        .unwrap();
    assert!(hub.stores().signers.is_active(1, &new_custody.signer_pub));
}

#[test]
fn capacity_overflow_evicts_permanently() {
    let fx = Fixtures::new();
    let mut limits = StoreLimits::unlimited();
    limits.signers = Some(3);
    let hub = hub_with_limits(limits);
    register(&hub, 1, fx.custody_address(), 1);

    let keys: Vec<[u8; 32]> = (1u8..=4).map(|b| [b; 32]).collect();
    let first = factory::signer_add_key(&fx, 1, 100, keys[0]);
    hub.submit_message_at(first.clone(), NOW).unwrap();
    hub.submit_message_at(factory::signer_add_key(&fx, 1, 200, keys[1]), NOW)
        .unwrap();
    hub.submit_message_at(factory::signer_add_key(&fx, 1, 300, keys[2]), NOW)
        .unwrap();

    let outcome = hub
        .submit_message_at(factory::signer_add_key(&fx, 1, 400, keys[3]), NOW)
        .unwrap();
    assert_eq!(outcome.evicted.len(), 1);
    assert_eq!(outcome.evicted[0].timestamp(), 100);
    assert_eq!(hub.stores().signers.len(), 3);

    // The evicted delegation may not be re-admitted.
    let result = hub.submit_message_at(first, NOW);
    assert!(matches!(result, Err(HubError::Conflict(_))));
    assert_eq!(hub.stores().signers.len(), 3);
}

#[test]
fn revocation_closure_across_all_stores() {
    let fx = Fixtures::new();
    let hub = hub();
    register(&hub, 1, fx.custody_address(), 1);
    hub.submit_message_at(factory::signer_add(&fx, 1, 100), NOW)
        .unwrap();

    hub.submit_message_at(factory::cast_add(&fx, 1, 200, "cast"), NOW)
        .unwrap();
    hub.submit_message_at(
        factory::user_data_add(&fx, 1, 300, UserDataType::Display, "name"),
        NOW,
    )
    .unwrap();
    hub.submit_message_at(factory::verification_add(&fx, 1, 400), NOW)
        .unwrap();

    hub.submit_message_at(factory::signer_remove(&fx, 1, 500, fx.signer_pub), NOW)
        .unwrap();

    // No Ed25519 message signed by the revoked key survives anywhere.
    for message in hub.stores().all_messages() {
        assert_ne!(message.signer.as_slice(), fx.signer_pub.as_slice());
    }
    assert_eq!(hub.stores().total_messages(), 1);
}

#[test]
fn gossip_payload_feeds_the_pipeline() {
    let fx = Fixtures::new();
    let hub = hub();
    register(&hub, 1, fx.custody_address(), 1);
    hub.submit_message_at(factory::signer_add(&fx, 1, 100), NOW)
        .unwrap();

    // Gossip merging runs at the wall clock, so the message must carry a
    // current timestamp to clear the TTL-free devnet validator.
    let ts = hub_core::time::now().saturating_sub(1_000);
    let cast = factory::cast_add(&fx, 1, ts, "from gossip");
    let payload = hub_node::gossip::encode_message_envelope(&cast);

    let outcome = hub.handle_gossip_payload(&payload).unwrap().unwrap();
    assert_eq!(outcome.merged.hash, cast.hash);
    assert!(hub.stores().casts.get_cast(1, &cast.hash).is_some());
}

#[test]
fn body_constraints_are_enforced_at_the_gate() {
    let fx = Fixtures::new();
    let hub = hub();
    register(&hub, 1, fx.custody_address(), 1);
    hub.submit_message_at(factory::signer_add(&fx, 1, 100), NOW)
        .unwrap();

    let text = "x".repeat(321);
    let result = hub.submit_message_at(factory::cast_add(&fx, 1, 200, &text), NOW);
    assert!(matches!(result, Err(HubError::BodyConstraintViolated(_))));

    // Rejections leave no trace in the trie.
    assert_eq!(hub.sync_ids_by_prefix(&[]).len(), 1);
}
