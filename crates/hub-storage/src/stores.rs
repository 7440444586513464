//! The store family
//!
//! One object owning the five CRDT sets and the fid registry. Merges
//! dispatch to the owning set; any cross-store effect - a merge that
//! displaces a signer add, or a custody transfer - runs through the
//! revocation cascade in [`crate::cascade`], and everything a single cause
//! touches lands in one atomic batch.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use hub_core::error::{HubError, Result};
use hub_core::message::{Message, MessageType};
use hub_core::types::constants;
use hub_core::validation::SignerAuthority;

use crate::cascade;
use crate::cast_store::{CastPolicy, CastStore};
use crate::db::{Batch, HubDb};
use crate::id_registry::{IdRegistry, IdRegistryEvent};
use crate::reaction_store::{ReactionPolicy, ReactionStore};
use crate::signer_store::{SignerPolicy, SignerStore};
use crate::store::Store;
use crate::two_phase::MergeOutcome;
use crate::user_data_store::{UserDataPolicy, UserDataStore};
use crate::verification_store::{VerificationPolicy, VerificationStore};

/// Capacity and retention configuration for the set family
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreLimits {
    pub signers: Option<usize>,
    pub casts: Option<usize>,
    pub reactions: Option<usize>,
    pub verifications: Option<usize>,
    pub cast_ttl_ms: Option<u64>,
    pub reaction_ttl_ms: Option<u64>,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            signers: Some(constants::SIGNER_CAPACITY),
            casts: Some(constants::CAST_CAPACITY),
            reactions: Some(constants::REACTION_CAPACITY),
            verifications: Some(constants::VERIFICATION_CAPACITY),
            cast_ttl_ms: Some(constants::CAST_TTL_MS),
            reaction_ttl_ms: Some(constants::REACTION_TTL_MS),
        }
    }
}

impl StoreLimits {
    /// No bounds at all
    pub fn unlimited() -> Self {
        Self {
            signers: None,
            casts: None,
            reactions: None,
            verifications: None,
            cast_ttl_ms: None,
            reaction_ttl_ms: None,
        }
    }

    /// Tight bounds for exercising eviction in tests
    pub fn test() -> Self {
        Self {
            signers: Some(4),
            casts: Some(4),
            reactions: Some(3),
            verifications: Some(2),
            cast_ttl_ms: None,
            reaction_ttl_ms: None,
        }
    }
}

pub struct Stores {
    pub signers: SignerStore,
    pub user_data: UserDataStore,
    pub casts: CastStore,
    pub reactions: ReactionStore,
    pub verifications: VerificationStore,
    pub registry: IdRegistry,
    db: Arc<dyn HubDb>,
}

impl Stores {
    pub fn new(db: Arc<dyn HubDb>, limits: &StoreLimits) -> Self {
        Self {
            signers: Store::<SignerPolicy>::new(db.clone(), limits.signers, None),
            user_data: Store::<UserDataPolicy>::new(db.clone(), None, None),
            casts: Store::<CastPolicy>::new(db.clone(), limits.casts, limits.cast_ttl_ms),
            reactions: Store::<ReactionPolicy>::new(
                db.clone(),
                limits.reactions,
                limits.reaction_ttl_ms,
            ),
            verifications: Store::<VerificationPolicy>::new(
                db.clone(),
                limits.verifications,
                None,
            ),
            registry: IdRegistry::new(db.clone()),
            db,
        }
    }

    /// Merge one validated message, running any triggered cascade, and
    /// commit everything as one batch.
    pub fn merge(&self, message: Message, now: u32) -> Result<MergeOutcome> {
        let mut batch = Batch::new();
        let outcome = self.merge_batched(message, now, &mut batch)?;
        self.db.commit(batch)?;
        Ok(outcome)
    }

    /// Merge into the caller's batch; used by the hub to pair the CRDT
    /// write with the trie write in one critical section.
    pub fn merge_batched(
        &self,
        message: Message,
        now: u32,
        batch: &mut Batch,
    ) -> Result<MergeOutcome> {
        let mut outcome = match message.msg_type() {
            MessageType::SignerAdd | MessageType::SignerRemove => {
                self.signers.merge_batched(message, now, batch)
            }
            MessageType::UserDataAdd => self.user_data.merge_batched(message, now, batch),
            MessageType::CastAdd | MessageType::CastRemove => {
                self.casts.merge_batched(message, now, batch)
            }
            MessageType::ReactionAdd | MessageType::ReactionRemove => {
                self.reactions.merge_batched(message, now, batch)
            }
            MessageType::VerificationAddEthAddress | MessageType::VerificationRemove => {
                self.verifications.merge_batched(message, now, batch)
            }
            MessageType::None => Err(HubError::MalformedBytes("unknown message type".into())),
        }?;

        // Any signer add displaced by this merge revokes that key
        // everywhere else.
        cascade::run_for_displaced_signers(self, &mut outcome, batch);

        Ok(outcome)
    }

    /// Apply one on-chain registry event, committing its own batch
    pub fn apply_id_event(&self, event: &IdRegistryEvent) -> Result<Vec<Message>> {
        let mut batch = Batch::new();
        let discarded = self.apply_id_event_batched(event, &mut batch)?;
        self.db.commit(batch)?;
        Ok(discarded)
    }

    /// Apply one on-chain registry event into the caller's batch,
    /// cascading custody transfers.
    pub fn apply_id_event_batched(
        &self,
        event: &IdRegistryEvent,
        batch: &mut Batch,
    ) -> Result<Vec<Message>> {
        cascade::apply_id_event(self, event, batch)
    }

    /// Evict everything past its retention window
    pub fn prune_expired(&self, now: u32) -> Result<Vec<Message>> {
        let mut batch = Batch::new();
        let evicted = self.prune_expired_batched(now, &mut batch);
        self.db.commit(batch)?;
        Ok(evicted)
    }

    /// TTL pruning into the caller's batch
    pub fn prune_expired_batched(&self, now: u32, batch: &mut Batch) -> Vec<Message> {
        let mut evicted = self.casts.prune_expired_batched(now, batch);
        evicted.extend(self.reactions.prune_expired_batched(now, batch));
        evicted
    }

    /// Total resident messages across all sets
    pub fn total_messages(&self) -> usize {
        self.signers.len()
            + self.user_data.len()
            + self.casts.len()
            + self.reactions.len()
            + self.verifications.len()
    }

    /// Every resident message; used to rebuild the sync trie
    pub fn all_messages(&self) -> Vec<Message> {
        let mut all = self.signers.all_messages();
        all.extend(self.user_data.all_messages());
        all.extend(self.casts.all_messages());
        all.extend(self.reactions.all_messages());
        all.extend(self.verifications.all_messages());
        all
    }

    /// Resolve a message from its sync-id fields
    pub fn find_message(
        &self,
        msg_type: MessageType,
        fid: u64,
        timestamp: u32,
        hash_prefix: &[u8],
    ) -> Option<Message> {
        let found = match msg_type {
            MessageType::SignerAdd | MessageType::SignerRemove => {
                self.signers.find_by_rank(timestamp, hash_prefix)
            }
            MessageType::UserDataAdd => self.user_data.find_by_rank(timestamp, hash_prefix),
            MessageType::CastAdd | MessageType::CastRemove => {
                self.casts.find_by_rank(timestamp, hash_prefix)
            }
            MessageType::ReactionAdd | MessageType::ReactionRemove => {
                self.reactions.find_by_rank(timestamp, hash_prefix)
            }
            MessageType::VerificationAddEthAddress | MessageType::VerificationRemove => {
                self.verifications.find_by_rank(timestamp, hash_prefix)
            }
            MessageType::None => None,
        };
        found.filter(|m| m.fid() == fid)
    }
}

impl SignerAuthority for Stores {
    fn custody_address(&self, fid: u64) -> Option<[u8; 20]> {
        self.registry.custody_address(fid)
    }

    fn is_active_signer(&self, fid: u64, signer: &[u8]) -> bool {
        self.signers.is_active(fid, signer)
    }
}
