//! Locked, persisted wrapper around the two-phase set core
//!
//! `Store` owns the lock and the write-through to the atomic-batch
//! persistence layer. Mutations either commit their own single batch or
//! append to a caller-owned batch so a multi-store cascade lands as one
//! atomic group.

use parking_lot::RwLock;
use std::sync::Arc;

use hub_core::error::Result;
use hub_core::message::{Message, encode_message};

use crate::db::{Batch, HubDb, keys};
use crate::two_phase::{MergeOutcome, SetKind, StorePolicy, TwoPhaseSet};

pub struct Store<P: StorePolicy> {
    set: RwLock<TwoPhaseSet<P>>,
    db: Arc<dyn HubDb>,
}

impl<P: StorePolicy> Store<P> {
    pub fn new(db: Arc<dyn HubDb>, capacity: Option<usize>, ttl_ms: Option<u64>) -> Self {
        Self {
            set: RwLock::new(TwoPhaseSet::new(capacity, ttl_ms)),
            db,
        }
    }

    /// Merge and commit the resulting batch on its own
    pub fn merge(&self, message: Message, now: u32) -> Result<MergeOutcome> {
        let mut batch = Batch::new();
        let outcome = self.merge_batched(message, now, &mut batch)?;
        self.db.commit(batch)?;
        Ok(outcome)
    }

    /// Merge, appending persistence ops to a caller-owned batch
    pub fn merge_batched(
        &self,
        message: Message,
        now: u32,
        batch: &mut Batch,
    ) -> Result<MergeOutcome> {
        let outcome = self.set.write().merge(message, now)?;
        Self::record_outcome(&outcome, batch);
        Ok(outcome)
    }

    /// Cascade discard, appending deletes to a caller-owned batch
    pub fn discard_where_batched(
        &self,
        pred: impl Fn(&Message) -> bool,
        batch: &mut Batch,
    ) -> Vec<Message> {
        let discarded = self.set.write().discard_where(pred);
        for message in &discarded {
            batch.delete(Self::db_key(message));
        }
        discarded
    }

    /// TTL pruning, appending deletes to a caller-owned batch
    pub fn prune_expired_batched(&self, now: u32, batch: &mut Batch) -> Vec<Message> {
        let evicted = self.set.write().prune_expired(now);
        for message in &evicted {
            batch.delete(Self::db_key(message));
        }
        evicted
    }

    pub fn get_add(&self, key: &[u8]) -> Option<Message> {
        self.set.read().get_add(key).cloned()
    }

    pub fn get_remove(&self, key: &[u8]) -> Option<Message> {
        self.set.read().get_remove(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.set.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.read().is_empty()
    }

    /// Resolve a message by exact timestamp and hash prefix
    pub fn find_by_rank(&self, timestamp: u32, hash_prefix: &[u8]) -> Option<Message> {
        self.set.read().find_by_rank(timestamp, hash_prefix).cloned()
    }

    /// Clone of every message in both sets
    pub fn all_messages(&self) -> Vec<Message> {
        let set = self.set.read();
        set.iter_adds().chain(set.iter_removes()).cloned().collect()
    }

    /// Run a closure over the locked set for store-specific queries
    pub fn with_read<R>(&self, f: impl FnOnce(&TwoPhaseSet<P>) -> R) -> R {
        f(&self.set.read())
    }

    fn record_outcome(outcome: &MergeOutcome, batch: &mut Batch) {
        for evicted in &outcome.evicted {
            batch.delete(Self::db_key(evicted));
        }
        // A TTL bound can evict the merged message in the same call; only
        // persist it when it actually stayed.
        let merged_stays = !outcome
            .evicted
            .iter()
            .any(|e| e.hash == outcome.merged.hash);
        if merged_stays {
            batch.put(Self::db_key(&outcome.merged), encode_message(&outcome.merged));
        }
    }

    fn db_key(message: &Message) -> Vec<u8> {
        let is_remove = P::set_kind(message) == SetKind::Remove;
        keys::crdt(P::NAME, is_remove, &P::conflict_key(message))
    }
}
