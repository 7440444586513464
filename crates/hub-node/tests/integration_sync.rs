//! Two-hub diff-sync scenarios over the RPC surface
//!
//! Each test stands up two full hubs, serves one through the service
//! handler, and drives the other's sync engine against it - the same wiring
//! a deployed node uses, minus the network channel.

use std::sync::Arc;

use libp2p::PeerId;

use hub_core::factory::{self, Fixtures};
use hub_node::{Hub, HubConfig, HubServiceHandler, ServiceSyncClient};
use hub_storage::{IdRegistryEvent, IdRegistryEventType, StoreLimits};

fn hub() -> Arc<Hub> {
    let mut config = HubConfig::devnet();
    config.limits = StoreLimits::unlimited();
    Hub::new(config).unwrap()
}

fn register(hub: &Hub, fid: u64, custody: [u8; 20]) {
    hub.apply_id_registry_event(&IdRegistryEvent {
        fid,
        to: custody,
        event_type: IdRegistryEventType::Register,
        block_number: 1,
        log_index: 0,
    })
    .unwrap();
}

fn client_for(hub: &Arc<Hub>) -> ServiceSyncClient<HubServiceHandler> {
    ServiceSyncClient::new(Arc::new(HubServiceHandler::new(hub.clone())))
}

#[tokio::test]
async fn divergence_is_located_at_depth_three() {
    let fx = Fixtures::new();
    let hub_a = hub();
    let hub_b = hub();
    register(&hub_a, 1, fx.custody_address());
    register(&hub_b, 1, fx.custody_address());

    // Identical spine on both hubs. All timestamps render with the prefix
    // "010...", so the tries agree on the first three levels.
    let signer = factory::signer_add(&fx, 1, 100_000_000);
    let shared = factory::cast_add(&fx, 1, 100_000_001, "shared");
    for h in [&hub_a, &hub_b] {
        h.submit_message_at(signer.clone(), 101_000_000).unwrap();
        h.submit_message_at(shared.clone(), 101_000_000).unwrap();
    }
    assert_eq!(hub_a.root_hash(), hub_b.root_hash());

    // One extra cast only on B, splitting off at the fourth digit.
    let extra = factory::cast_add(&fx, 1, 100_900_000, "only on b");
    hub_b.submit_message_at(extra.clone(), 101_000_000).unwrap();

    let engine = hub_a.build_sync_engine();
    let stats = engine
        .sync_with_peer(PeerId::random(), &client_for(&hub_b), 101_000_000)
        .await
        .unwrap();

    // The exclusion sets agree for three levels and split at the fourth,
    // so the walk descends exactly to the divergent subtree.
    assert_eq!(stats.divergence_prefix, b"010".to_vec());
    assert_eq!(stats.fetched, 1);
    assert_eq!(stats.merged, 1);

    assert_eq!(hub_a.root_hash(), hub_b.root_hash());
    assert!(hub_a.stores().casts.get_cast(1, &extra.hash).is_some());
}

#[tokio::test]
async fn bidirectional_sync_converges() {
    let alice = Fixtures::with_seed(1);
    let bob = Fixtures::with_seed(2);
    let hub_a = hub();
    let hub_b = hub();

    // Both hubs saw the same chain events; each saw a different signer
    // delegation and its messages.
    for h in [&hub_a, &hub_b] {
        register(h, 1, alice.custody_address());
        register(h, 2, bob.custody_address());
    }
    hub_a
        .submit_message_at(factory::signer_add(&alice, 1, 1_000), 10_000)
        .unwrap();
    hub_a
        .submit_message_at(factory::cast_add(&alice, 1, 1_100, "from a"), 10_000)
        .unwrap();
    hub_b
        .submit_message_at(factory::signer_add(&bob, 2, 1_200), 10_000)
        .unwrap();
    hub_b
        .submit_message_at(factory::cast_add(&bob, 2, 1_300, "from b"), 10_000)
        .unwrap();
    assert_ne!(hub_a.root_hash(), hub_b.root_hash());

    // A pulls from B; the signer delegation merges before the cast that
    // depends on it.
    let engine_a = hub_a.build_sync_engine();
    let stats = engine_a
        .sync_with_peer(PeerId::random(), &client_for(&hub_b), 10_000)
        .await
        .unwrap();
    assert_eq!(stats.merged, 2);
    assert_eq!(stats.failed, 0);
    hub_a.note_sync_cycle(&stats);

    // B pulls from A.
    let engine_b = hub_b.build_sync_engine();
    let stats = engine_b
        .sync_with_peer(PeerId::random(), &client_for(&hub_a), 10_000)
        .await
        .unwrap();
    assert_eq!(stats.merged, 2);
    hub_b.note_sync_cycle(&stats);

    assert_eq!(hub_a.root_hash(), hub_b.root_hash());
    assert_eq!(hub_a.stores().total_messages(), 4);
    assert_eq!(hub_b.stores().total_messages(), 4);
    assert!(hub_a.info().is_synced);

    // A third cycle in either direction is a no-op.
    let stats = engine_a
        .sync_with_peer(PeerId::random(), &client_for(&hub_b), 10_000)
        .await
        .unwrap();
    assert!(stats.already_synced);
}

#[tokio::test]
async fn sync_is_idempotent_under_reruns() {
    let fx = Fixtures::new();
    let hub_a = hub();
    let hub_b = hub();
    register(&hub_a, 1, fx.custody_address());
    register(&hub_b, 1, fx.custody_address());

    hub_b
        .submit_message_at(factory::signer_add(&fx, 1, 1_000), 10_000)
        .unwrap();
    for i in 0..5u32 {
        hub_b
            .submit_message_at(
                factory::cast_add(&fx, 1, 1_100 + i, &format!("cast {i}")),
                10_000,
            )
            .unwrap();
    }

    let engine = hub_a.build_sync_engine();
    let client = client_for(&hub_b);
    let peer = PeerId::random();

    let first = engine.sync_with_peer(peer, &client, 10_000).await.unwrap();
    assert_eq!(first.merged, 6);

    // Abandon-and-restart is safe: the second cycle finds nothing to do.
    let second = engine.sync_with_peer(peer, &client, 10_000).await.unwrap();
    assert!(second.already_synced);
    assert_eq!(hub_a.root_hash(), hub_b.root_hash());
}
