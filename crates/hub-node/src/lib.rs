//! # Hub Node
//!
//! Wires the hub together: the merge pipeline over the CRDT store family
//! and sync trie, configuration presets, Prometheus metrics, the RPC
//! service surface, and the gossip topic codecs. The gRPC listener, the
//! libp2p swarm, the chain ingester, and the disk engine are external
//! collaborators that plug into the seams exposed here.

pub mod config;
pub mod gossip;
pub mod hub;
pub mod metrics;
pub mod rpc;
pub mod sync_runner;

pub use config::{HubConfig, NetworkChoice};
pub use hub::Hub;
pub use metrics::HubMetrics;
pub use rpc::{HubService, HubServiceHandler, ServiceSyncClient};
pub use sync_runner::{PeerProvider, run_sync_loop, sync_once};

/// Install the process-wide tracing subscriber, honoring `RUST_LOG`
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
