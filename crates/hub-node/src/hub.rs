//! The hub object
//!
//! Owns the CRDT store family, the sync trie, and the locks that make the
//! merge pipeline single-writer per fid. Every admission path - gossip,
//! RPC submission, diff sync - funnels through [`Hub::submit_message`]:
//!
//! 1. validate under the fid's shard lock
//! 2. merge into the owning CRDT, collecting evictions and cascades
//! 3. mutate the trie in the same critical section
//! 4. commit the whole step as one atomic batch
//!
//! Signer merges and chain events can touch other fids through the
//! revocation cascade, so they serialize on a coarser lock instead of a
//! shard.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

use hub_core::error::{HubError, Result};
use hub_core::message::Message;
use hub_core::time;
use hub_core::validation::{ValidationContext, validate_message};
use hub_storage::db::{Batch, HubDb, keys};
use hub_storage::{IdRegistryEvent, MemoryDb, MergeOutcome, Stores};
use hub_sync::engine::{HubInfo, MessageSink, SyncStats};
use hub_sync::{MerkleTrie, NodeMetadata, SyncEngine, SyncId, TrieSnapshot};

use crate::config::HubConfig;
use crate::metrics::HubMetrics;

pub struct Hub {
    config: HubConfig,
    stores: Stores,
    trie: Arc<RwLock<MerkleTrie>>,
    shards: Vec<Mutex<()>>,
    /// Serializes signer merges and chain events, whose cascades cross fids
    cascade_lock: Mutex<()>,
    metrics: HubMetrics,
    db: Arc<dyn HubDb>,
    is_synced: AtomicBool,
}

impl Hub {
    pub fn new(config: HubConfig) -> anyhow::Result<Arc<Self>> {
        let db: Arc<dyn HubDb> = Arc::new(MemoryDb::new());
        let stores = Stores::new(db.clone(), &config.limits);
        let shard_count = config.node.shard_count.max(1);
        let shards = (0..shard_count).map(|_| Mutex::new(())).collect();

        Ok(Arc::new(Self {
            config,
            stores,
            trie: Arc::new(RwLock::new(MerkleTrie::new())),
            shards,
            cascade_lock: Mutex::new(()),
            metrics: HubMetrics::new()?,
            db,
            is_synced: AtomicBool::new(false),
        }))
    }

    /// Build the diff-sync engine wired to this hub's trie and merge
    /// pipeline
    pub fn build_sync_engine(self: &Arc<Self>) -> SyncEngine {
        SyncEngine::new(
            self.trie.clone(),
            self.clone() as Arc<dyn MessageSink>,
            self.config.sync_config(),
        )
    }

    /// Validate and merge one message at the current time
    pub fn submit_message(&self, message: Message) -> Result<MergeOutcome> {
        self.submit_message_at(message, time::now())
    }

    /// Validate and merge one message at an explicit time
    pub fn submit_message_at(&self, message: Message, now: u32) -> Result<MergeOutcome> {
        // Signer mutations can cascade into any store; everything else
        // stays within its fid.
        let _coarse;
        let _shard;
        if message.msg_type().is_signer_kind() {
            _coarse = self.cascade_lock.lock();
        } else {
            _shard = self.shard_for(message.fid()).lock();
        }

        let result = self.merge_locked(message, now);
        match &result {
            Ok(outcome) => {
                self.metrics.merges_total.inc();
                self.metrics.trie_messages.set(self.trie.read().len() as i64);
                debug!(
                    hash = %hex::encode(&outcome.merged.hash),
                    evicted = outcome.evicted.len(),
                    "merged message"
                );
            }
            Err(err) => {
                self.metrics
                    .rejections_total
                    .with_label_values(&[err.kind()])
                    .inc();
            }
        }
        result
    }

    fn merge_locked(&self, message: Message, now: u32) -> Result<MergeOutcome> {
        let ctx = ValidationContext {
            network: self.config.network.to_network(),
            now,
            authority: &self.stores,
        };
        validate_message(&message, &ctx)?;

        let mut batch = Batch::new();
        let outcome = self.stores.merge_batched(message, now, &mut batch)?;

        // Trie mutation is visible iff the CRDT change is visible: both
        // happen here, before the shard lock drops, in one batch.
        self.index_outcome(&outcome, &mut batch)?;
        self.db.commit(batch)?;
        Ok(outcome)
    }

    fn index_outcome(&self, outcome: &MergeOutcome, batch: &mut Batch) -> Result<()> {
        let mut trie = self.trie.write();
        for evicted in &outcome.evicted {
            if let Ok(id) = SyncId::from_message(evicted) {
                trie.remove(&id);
                batch.delete(keys::trie(id.as_bytes()));
            }
        }
        let merged_stays = !outcome
            .evicted
            .iter()
            .any(|e| e.hash == outcome.merged.hash);
        if merged_stays {
            let id = SyncId::from_message(&outcome.merged)?;
            trie.insert(&id);
            batch.put(keys::trie(id.as_bytes()), Vec::new());
        }
        Ok(())
    }

    /// Apply one on-chain registry event, cascading as needed
    pub fn apply_id_registry_event(&self, event: &IdRegistryEvent) -> Result<Vec<Message>> {
        let _guard = self.cascade_lock.lock();

        let mut batch = Batch::new();
        let discarded = self.stores.apply_id_event_batched(event, &mut batch)?;
        {
            let mut trie = self.trie.write();
            for message in &discarded {
                if let Ok(id) = SyncId::from_message(message) {
                    trie.remove(&id);
                    batch.delete(keys::trie(id.as_bytes()));
                }
            }
        }
        self.db.commit(batch)?;

        if !discarded.is_empty() {
            self.metrics
                .cascade_discards_total
                .inc_by(discarded.len() as u64);
            self.metrics.trie_messages.set(self.trie.read().len() as i64);
        }
        Ok(discarded)
    }

    /// Evict everything past its retention window
    pub fn prune_expired(&self) -> Result<usize> {
        self.prune_expired_at(time::now())
    }

    pub fn prune_expired_at(&self, now: u32) -> Result<usize> {
        let _guard = self.cascade_lock.lock();

        let mut batch = Batch::new();
        let evicted = self.stores.prune_expired_batched(now, &mut batch);
        {
            let mut trie = self.trie.write();
            for message in &evicted {
                if let Ok(id) = SyncId::from_message(message) {
                    trie.remove(&id);
                    batch.delete(keys::trie(id.as_bytes()));
                }
            }
        }
        self.db.commit(batch)?;

        if !evicted.is_empty() {
            debug!(count = evicted.len(), "pruned expired messages");
            self.metrics.trie_messages.set(self.trie.read().len() as i64);
        }
        Ok(evicted.len())
    }

    fn shard_for(&self, fid: u64) -> &Mutex<()> {
        &self.shards[(fid as usize) % self.shards.len()]
    }

    // === Query surface ===

    pub fn info(&self) -> HubInfo {
        HubInfo {
            version: self.config.node.version.clone(),
            is_synced: self.is_synced.load(Ordering::Relaxed),
            nickname: self.config.node.nickname.clone(),
            root_hash: hex::encode(self.trie.read().root_hash()),
        }
    }

    pub fn root_hash(&self) -> [u8; 20] {
        self.trie.read().root_hash()
    }

    pub fn snapshot(&self, prefix: &[u8]) -> TrieSnapshot {
        self.trie.read().snapshot(prefix)
    }

    pub fn metadata(&self, prefix: &[u8]) -> NodeMetadata {
        self.trie.read().metadata(prefix)
    }

    pub fn sync_ids_by_prefix(&self, prefix: &[u8]) -> Vec<SyncId> {
        self.trie.read().sync_ids_by_prefix(prefix)
    }

    /// Resolve sync ids back to messages; unknown ids are skipped
    pub fn messages_by_sync_ids(&self, ids: &[SyncId]) -> Vec<Message> {
        ids.iter()
            .filter_map(|id| {
                let found = self.stores.find_message(
                    id.msg_type(),
                    id.fid(),
                    id.timestamp(),
                    id.hash_prefix(),
                );
                if found.is_none() {
                    warn!(?id, "sync id resident in trie resolved to no message");
                }
                found
            })
            .collect()
    }

    /// Record the outcome of a sync cycle in the metrics and the synced flag
    pub fn note_sync_cycle(&self, stats: &SyncStats) {
        self.metrics.sync_cycles_total.inc();
        self.metrics
            .sync_messages_merged
            .inc_by(stats.merged as u64);
        if stats.already_synced || stats.failed == 0 {
            self.is_synced.store(true, Ordering::Relaxed);
        }
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn metrics(&self) -> &HubMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn trie_handle(&self) -> Arc<RwLock<MerkleTrie>> {
        self.trie.clone()
    }
}

impl MessageSink for Hub {
    fn merge_message(&self, message: Message) -> Result<()> {
        self.submit_message(message).map(|_| ())
    }
}
