//! Hub configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use hub_core::message::FarcasterNetwork;
use hub_storage::StoreLimits;
use hub_sync::SyncConfig;

/// Complete node configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HubConfig {
    /// Node settings
    pub node: NodeSettings,
    /// Which network this hub participates in
    pub network: NetworkChoice,
    /// CRDT capacities and retention
    pub limits: StoreLimits,
    /// Diff-sync settings
    pub sync: SyncSettings,
    /// Metrics settings
    pub metrics: MetricsSettings,
}

/// Node settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeSettings {
    /// Human-readable name advertised over RPC and gossip
    pub nickname: String,
    /// Version string advertised over RPC
    pub version: String,
    /// Number of fid shards for the merge pipeline
    pub shard_count: usize,
}

/// Network selection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkChoice {
    Mainnet,
    Testnet,
    Devnet,
}

impl NetworkChoice {
    pub fn to_network(self) -> FarcasterNetwork {
        match self {
            Self::Mainnet => FarcasterNetwork::Mainnet,
            Self::Testnet => FarcasterNetwork::Testnet,
            Self::Devnet => FarcasterNetwork::Devnet,
        }
    }
}

/// Diff-sync settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Run periodic sync against random peers
    pub enabled: bool,
    /// Seconds between periodic cycles
    pub interval_secs: u64,
    /// Per-RPC deadline in milliseconds
    pub rpc_deadline_ms: u64,
    /// Retries after the first attempt
    pub retry_budget: u32,
    /// Base backoff in milliseconds
    pub retry_base_ms: u64,
    /// Sync ids per message-fetch RPC
    pub fetch_batch_size: usize,
    /// Subtree size at which the engine fetches ids instead of descending
    pub leaf_fetch_threshold: usize,
    /// Passes over arrivals waiting on their signer delegation
    pub max_requeue_passes: usize,
}

/// Metrics settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricsSettings {
    /// Enable the metrics registry
    pub enabled: bool,
    /// Prometheus listen address for the external binding
    pub prometheus_addr: String,
}

impl HubConfig {
    /// Create config for a specific network
    pub fn for_network(network: &str) -> anyhow::Result<Self> {
        match network {
            "mainnet" => Ok(Self::mainnet()),
            "testnet" => Ok(Self::testnet()),
            "devnet" => Ok(Self::devnet()),
            _ => anyhow::bail!("unknown network: {network}"),
        }
    }

    pub fn mainnet() -> Self {
        Self::preset(NetworkChoice::Mainnet, "hub-mainnet")
    }

    pub fn testnet() -> Self {
        Self::preset(NetworkChoice::Testnet, "hub-testnet")
    }

    pub fn devnet() -> Self {
        Self::preset(NetworkChoice::Devnet, "hub-devnet")
    }

    fn preset(network: NetworkChoice, nickname: &str) -> Self {
        Self {
            node: NodeSettings {
                nickname: nickname.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                shard_count: 16,
            },
            network,
            limits: StoreLimits::default(),
            sync: SyncSettings {
                enabled: true,
                interval_secs: 30,
                rpc_deadline_ms: 15_000,
                retry_budget: 3,
                retry_base_ms: 250,
                fetch_batch_size: 128,
                leaf_fetch_threshold: 64,
                max_requeue_passes: 3,
            },
            metrics: MetricsSettings {
                enabled: true,
                prometheus_addr: "127.0.0.1:9090".to_string(),
            },
        }
    }

    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Engine tunables derived from the sync settings
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            rpc_deadline: Duration::from_millis(self.sync.rpc_deadline_ms),
            retry_budget: self.sync.retry_budget,
            retry_base: Duration::from_millis(self.sync.retry_base_ms),
            fetch_batch_size: self.sync.fetch_batch_size,
            leaf_fetch_threshold: self.sync.leaf_fetch_threshold,
            max_requeue_passes: self.sync.max_requeue_passes,
        }
    }
}
