//! # Hub Sync
//!
//! State reconciliation between hubs:
//! - 36-byte chronologically sortable sync ids
//! - the Merkle trie that aggregates them, with exclusion-set snapshots for
//!   constant-size divergence detection
//! - the diff-sync engine that walks two tries to their symmetric
//!   difference and funnels missing messages through the merge pipeline

pub mod engine;
pub mod sync_id;
pub mod trie;

pub use engine::{HubInfo, MessageSink, PeerSyncClient, SyncConfig, SyncEngine, SyncStats};
pub use sync_id::{SYNC_ID_LEN, SyncId, timestamp_prefix};
pub use trie::{MerkleTrie, NodeMetadata, TrieSnapshot};
