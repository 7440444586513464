//! Periodic sync driver
//!
//! Diff sync fires in three ways: once at startup, periodically against a
//! uniformly random connected peer, and on demand through
//! [`sync_once`]. The swarm collaborator supplies the peer table through
//! [`PeerProvider`]; faulty peers are filtered before the random draw.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use libp2p::PeerId;

use hub_core::error::Result;
use hub_sync::engine::{PeerSyncClient, SyncEngine, SyncStats};

use crate::hub::Hub;

/// The currently connected peers, as the swarm sees them
pub trait PeerProvider: Send + Sync {
    fn connected_peers(&self) -> Vec<(PeerId, Arc<dyn PeerSyncClient>)>;
}

/// Run one on-demand cycle against a specific peer
pub async fn sync_once(
    hub: &Hub,
    engine: &SyncEngine,
    peer: PeerId,
    client: &dyn PeerSyncClient,
) -> Result<SyncStats> {
    let stats = engine
        .sync_with_peer(peer, client, hub_core::time::now())
        .await?;
    hub.note_sync_cycle(&stats);
    Ok(stats)
}

/// Drive sync until the engine is cancelled: one immediate cycle at
/// startup, then one per interval against a random healthy peer.
///
/// Individual cycle failures are logged and absorbed; the protocol is
/// idempotent, so the next tick retries from wherever this one stopped.
pub async fn run_sync_loop(
    hub: Arc<Hub>,
    engine: Arc<SyncEngine>,
    peers: Arc<dyn PeerProvider>,
    interval: Duration,
) {
    loop {
        let candidates: Vec<_> = peers
            .connected_peers()
            .into_iter()
            .filter(|(peer, _)| !engine.is_faulty(peer))
            .collect();

        if candidates.is_empty() {
            debug!("no healthy peers to sync with");
        } else {
            let (peer, client) =
                &candidates[rand::thread_rng().gen_range(0..candidates.len())];
            match sync_once(&hub, &engine, *peer, client.as_ref()).await {
                Ok(stats) if !stats.already_synced => {
                    info!(%peer, merged = stats.merged, "periodic sync cycle finished");
                }
                Ok(_) => {}
                Err(err) => warn!(%peer, %err, "periodic sync cycle failed"),
            }
        }

        if engine.is_cancelled() {
            return;
        }
        tokio::time::sleep(interval).await;
        if engine.is_cancelled() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HubConfig;
    use crate::rpc::{HubServiceHandler, ServiceSyncClient};
    use hub_core::factory::{self, Fixtures};
    use hub_storage::{IdRegistryEvent, IdRegistryEventType, StoreLimits};

    struct OnePeer {
        client: Arc<dyn PeerSyncClient>,
    }

    impl PeerProvider for OnePeer {
        fn connected_peers(&self) -> Vec<(PeerId, Arc<dyn PeerSyncClient>)> {
            vec![(PeerId::random(), self.client.clone())]
        }
    }

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

    #[tokio::test]
    async fn test_loop_syncs_at_startup_and_stops_on_cancel() {
        let fx = Fixtures::new();
        let local = hub();
        let remote = hub();
        register(&local, 1, fx.custody_address());
        register(&remote, 1, fx.custody_address());

        let ts = hub_core::time::now().saturating_sub(5_000);
        remote
            .submit_message_at(factory::signer_add(&fx, 1, ts), ts + 1_000)
            .unwrap();

        let engine = Arc::new(local.build_sync_engine());
        let provider = Arc::new(OnePeer {
            client: Arc::new(ServiceSyncClient::new(Arc::new(HubServiceHandler::new(
                remote.clone(),
            )))),
        });

        let task = tokio::spawn(run_sync_loop(
            local.clone(),
            engine.clone(),
            provider,
            Duration::from_millis(20),
        ));

        // The startup cycle runs before the first tick.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(local.root_hash(), remote.root_hash());
        assert!(local.info().is_synced);

        engine.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("loop exits after cancellation")
            .unwrap();
    }
}
