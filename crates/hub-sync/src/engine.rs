//! Diff sync
//!
//! Reconciles this hub's trie with a peer's in sublinear time when the
//! symmetric difference is small:
//!
//! 1. compare root hashes; equal roots end the cycle immediately
//! 2. compare exclusion-set snapshots level by level to find the divergence
//!    prefix - the shared chronological spine up to the first level whose
//!    folded siblings differ
//! 3. walk both subtrees below the divergence prefix in parallel, by
//!    metadata, descending only into children whose hashes differ, and
//!    collect the peer's sync ids we lack
//! 4. fetch the messages and feed them through the merge pipeline, signer
//!    messages first; arrivals that fail authorization are re-queued for a
//!    bounded number of passes while their signer delegations land
//!
//! Every RPC carries an independent deadline and a jittered retry budget.
//! A peer whose responses contradict its advertised state is marked faulty
//! and not contacted again within the session; merge idempotence makes the
//! whole cycle safe to abandon and restart at any point.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use hashbrown::{HashMap, HashSet};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use libp2p::PeerId;

use hub_core::error::{ErrorClass, HubError, Result};
use hub_core::message::Message;

use crate::sync_id::{SyncId, timestamp_prefix};
use crate::trie::{MerkleTrie, NodeMetadata, TrieSnapshot};

/// Identity and state advertised by a hub
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HubInfo {
    pub version: String,
    pub is_synced: bool,
    pub nickname: String,
    /// Hex-lowercase trie root
    pub root_hash: String,
}

/// RPC surface of a remote peer, as the sync engine consumes it
#[async_trait]
pub trait PeerSyncClient: Send + Sync {
    async fn get_info(&self) -> Result<HubInfo>;
    async fn get_snapshot(&self, prefix: &[u8]) -> Result<TrieSnapshot>;
    async fn get_metadata(&self, prefix: &[u8]) -> Result<NodeMetadata>;
    async fn get_sync_ids(&self, prefix: &[u8]) -> Result<Vec<SyncId>>;
    async fn get_messages(&self, ids: &[SyncId]) -> Result<Vec<Message>>;
}

/// Where fetched messages go. Implemented by the hub's merge pipeline.
pub trait MessageSink: Send + Sync {
    fn merge_message(&self, message: Message) -> Result<()>;
}

/// Tunables for one engine instance
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Per-RPC deadline
    pub rpc_deadline: Duration,
    /// Retries after the first attempt
    pub retry_budget: u32,
    /// Base backoff; jitter of up to half the base is added
    pub retry_base: Duration,
    /// Sync ids per message-fetch RPC
    pub fetch_batch_size: usize,
    /// Subtrees at or below this size are fetched as id lists instead of
    /// descended further
    pub leaf_fetch_threshold: usize,
    /// Passes over arrivals rejected for a missing signer
    pub max_requeue_passes: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            rpc_deadline: Duration::from_secs(15),
            retry_budget: 3,
            retry_base: Duration::from_millis(250),
            fetch_batch_size: 128,
            leaf_fetch_threshold: 64,
            max_requeue_passes: 3,
        }
    }
}

/// What one sync cycle accomplished
#[derive(Clone, Debug, Default)]
pub struct SyncStats {
    pub divergence_prefix: Vec<u8>,
    pub fetched: usize,
    pub merged: usize,
    pub rejected: usize,
    pub requeued: usize,
    pub failed: usize,
    pub already_synced: bool,
}

pub struct SyncEngine {
    trie: Arc<RwLock<MerkleTrie>>,
    sink: Arc<dyn MessageSink>,
    config: SyncConfig,
    faulty: Mutex<HashSet<PeerId>>,
    cancelled: AtomicBool,
}

impl SyncEngine {
    pub fn new(trie: Arc<RwLock<MerkleTrie>>, sink: Arc<dyn MessageSink>, config: SyncConfig) -> Self {
        Self {
            trie,
            sink,
            config,
            faulty: Mutex::new(HashSet::new()),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Ask any in-flight cycle to wind down at its next checkpoint
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Shun a peer for the rest of the session
    pub fn mark_faulty(&self, peer: &PeerId) {
        warn!(%peer, "marking peer faulty for this session");
        self.faulty.lock().insert(*peer);
    }

    pub fn is_faulty(&self, peer: &PeerId) -> bool {
        self.faulty.lock().contains(peer)
    }

    /// Run one full diff-sync cycle against a peer
    pub async fn sync_with_peer(
        &self,
        peer: PeerId,
        client: &dyn PeerSyncClient,
        now: u32,
    ) -> Result<SyncStats> {
        if self.is_faulty(&peer) {
            return Err(HubError::RpcUnavailable("peer is marked faulty".into()));
        }

        let mut stats = SyncStats::default();

        let info = self.with_retry(|| client.get_info()).await?;
        let local_root = hex::encode(self.trie.read().root_hash());
        if info.root_hash == local_root {
            stats.already_synced = true;
            return Ok(stats);
        }

        stats.divergence_prefix = self.find_divergence_prefix(client, now).await?;
        debug!(
            %peer,
            prefix = %String::from_utf8_lossy(&stats.divergence_prefix),
            "divergence located"
        );

        let missing = self
            .collect_missing(client, stats.divergence_prefix.clone())
            .await?;
        if missing.is_empty() {
            return Ok(stats);
        }
        stats.fetched = missing.len();

        match self.fetch_and_merge(&peer, client, missing, &mut stats).await {
            Ok(()) => {}
            Err(err) if err.class() == ErrorClass::Integrity => {
                self.mark_faulty(&peer);
                return Err(err);
            }
            Err(err) => return Err(err),
        }

        info!(
            %peer,
            fetched = stats.fetched,
            merged = stats.merged,
            rejected = stats.rejected,
            failed = stats.failed,
            "diff sync cycle complete"
        );
        Ok(stats)
    }

    /// Compare exclusion sets along the rightmost path and return the
    /// shared prefix up to the first level that differs.
    async fn find_divergence_prefix(
        &self,
        client: &dyn PeerSyncClient,
        now: u32,
    ) -> Result<Vec<u8>> {
        let prefix = timestamp_prefix(now).to_vec();
        let ours = self.trie.read().snapshot(&prefix);
        let theirs = self
            .with_retry(|| client.get_snapshot(&prefix))
            .await?;

        let aligned = ours
            .excluded_hashes
            .iter()
            .zip(theirs.excluded_hashes.iter())
            .take_while(|(a, b)| a == b)
            .count();
        let shared = aligned.min(ours.excluded_hashes.len().min(theirs.excluded_hashes.len()));
        Ok(prefix[..shared.min(prefix.len())].to_vec())
    }

    /// Parallel metadata walk below the divergence prefix, collecting the
    /// peer's sync ids that are absent locally.
    async fn collect_missing(
        &self,
        client: &dyn PeerSyncClient,
        divergence: Vec<u8>,
    ) -> Result<Vec<SyncId>> {
        let mut missing = Vec::new();
        let mut queue = VecDeque::from([divergence]);

        while let Some(prefix) = queue.pop_front() {
            if self.is_cancelled() {
                break;
            }

            let theirs = self.with_retry(|| client.get_metadata(&prefix)).await?;
            if theirs.num_messages == 0 {
                continue;
            }
            let ours = self.trie.read().metadata(&prefix);
            if ours.hash == theirs.hash && ours.num_messages == theirs.num_messages {
                continue;
            }

            if theirs.children.is_empty() || theirs.num_messages <= self.config.leaf_fetch_threshold
            {
                let ids = self.with_retry(|| client.get_sync_ids(&prefix)).await?;
                let trie = self.trie.read();
                missing.extend(ids.into_iter().filter(|id| !trie.contains(id)));
                continue;
            }

            let our_children: HashMap<u8, [u8; 20]> = ours
                .children
                .iter()
                .filter_map(|c| c.prefix.last().map(|l| (*l, c.hash)))
                .collect();
            for child in &theirs.children {
                let Some(&label) = child.prefix.last() else {
                    return Err(HubError::MessageRootMismatch);
                };
                if child.prefix.len() != prefix.len() + 1 || !child.prefix.starts_with(&prefix) {
                    return Err(HubError::MessageRootMismatch);
                }
                if our_children.get(&label) != Some(&child.hash) {
                    let mut next = prefix.clone();
                    next.push(label);
                    queue.push_back(next);
                }
            }
        }

        Ok(missing)
    }

    /// Fetch missing messages in chunks and merge them in dependency order
    async fn fetch_and_merge(
        &self,
        peer: &PeerId,
        client: &dyn PeerSyncClient,
        mut missing: Vec<SyncId>,
        stats: &mut SyncStats,
    ) -> Result<()> {
        // Signer delegations first so dependent messages pass
        // authorization; chronological within each class.
        missing.sort_by_key(|id| (!id.msg_type().is_signer_kind(), *id.as_bytes()));

        let mut requeue: Vec<Message> = Vec::new();

        for chunk in missing.chunks(self.config.fetch_batch_size) {
            if self.is_cancelled() {
                break;
            }

            let messages = self.with_retry(|| client.get_messages(chunk)).await?;
            if messages.len() < chunk.len() {
                warn!(%peer, "peer served fewer messages than advertised");
                return Err(HubError::SyncIdNotFound);
            }
            let requested: HashSet<SyncId> = chunk.iter().copied().collect();
            for message in &messages {
                let served = SyncId::from_message(message)
                    .map_err(|_| HubError::MessageRootMismatch)?;
                if !requested.contains(&served) {
                    return Err(HubError::MessageRootMismatch);
                }
            }

            for message in messages {
                match self.sink.merge_message(message.clone()) {
                    Ok(()) => stats.merged += 1,
                    Err(HubError::UnauthorizedSigner(_)) => requeue.push(message),
                    Err(HubError::Duplicate) => {}
                    Err(_) => stats.rejected += 1,
                }
            }
        }

        // Out-of-order arrivals get another chance once their signer
        // delegations have landed.
        for _ in 0..self.config.max_requeue_passes {
            if requeue.is_empty() {
                break;
            }
            let pending = std::mem::take(&mut requeue);
            for message in pending {
                match self.sink.merge_message(message.clone()) {
                    Ok(()) => {
                        stats.merged += 1;
                        stats.requeued += 1;
                    }
                    Err(HubError::UnauthorizedSigner(_)) => requeue.push(message),
                    Err(HubError::Duplicate) => {}
                    Err(_) => stats.rejected += 1,
                }
            }
        }
        stats.failed += requeue.len();

        Ok(())
    }

    /// One RPC attempt per deadline, retried with jittered backoff while
    /// the failure is transient.
    async fn with_retry<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            let outcome = tokio::time::timeout(self.config.rpc_deadline, op()).await;
            let err = match outcome {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) if !e.is_retryable() => return Err(e),
                Ok(Err(e)) => e,
                Err(_) => HubError::RpcTimeout,
            };
            attempt += 1;
            if attempt > self.config.retry_budget {
                return Err(err);
            }
            let base = self.config.retry_base.as_millis() as u64;
            let jitter = rand::thread_rng().gen_range(0..=base / 2);
            tokio::time::sleep(Duration::from_millis(base * u64::from(attempt) + jitter)).await;
        }
    }
}
