//! Generic two-phase set
//!
//! Every CRDT in the hub is an instance of the same machine: an add-set and
//! a remove-set keyed by a store-specific conflict key, a winner ladder that
//! totally orders any two messages sharing a key, a capacity bound enforced
//! by evicting the chronologically smallest entry, and an optional TTL.
//!
//! Two rules make the sets conflict-free under any delivery order:
//!
//! - At most one message per conflict key exists across both sets; an
//!   arrival either loses (rejected) or wins (the occupant is evicted).
//! - Evictions are permanent. Losers of conflicts, capacity evictions, and
//!   TTL expiries are journaled; an arrival that does not out-rank the
//!   journaled occupant of its key is a re-admission and is rejected.
//!
//! Cascaded discards deliberately bypass both rules: they are authorization
//! revocations, not conflicts, and leave no trace.

use hashbrown::HashMap;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::marker::PhantomData;

use hub_core::error::{HubError, Result};
use hub_core::message::Message;
use hub_core::types::MessageHash;

/// Which set a message belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetKind {
    Add,
    Remove,
}

/// Outcome of conflict resolution
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Winner {
    Existing,
    Incoming,
}

/// The fields a winner ladder may consult
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RankKey {
    pub is_remove: bool,
    pub timestamp: u32,
    pub hash: MessageHash,
}

impl RankKey {
    pub fn of(message: &Message) -> Result<Self> {
        Ok(Self {
            is_remove: message.msg_type().is_remove(),
            timestamp: message.timestamp(),
            hash: message
                .message_hash()
                .ok_or_else(|| HubError::MalformedBytes("hash must be 20 bytes".into()))?,
        })
    }
}

/// Higher timestamp wins; on a tie the remove wins; then the higher hash.
///
/// The ladder for signer, reaction, and verification sets.
pub fn by_timestamp_then_remove_then_hash(existing: &RankKey, incoming: &RankKey) -> Winner {
    use std::cmp::Ordering::*;
    match existing.timestamp.cmp(&incoming.timestamp) {
        Less => Winner::Incoming,
        Greater => Winner::Existing,
        Equal => match (existing.is_remove, incoming.is_remove) {
            (true, false) => Winner::Existing,
            (false, true) => Winner::Incoming,
            _ => by_hash(existing, incoming),
        },
    }
}

/// A remove beats an add regardless of timestamps; then higher timestamp,
/// then higher hash.
///
/// The cast ladder: a removed cast stays removed even if the removal is
/// older than the add.
pub fn by_remove_then_timestamp_then_hash(existing: &RankKey, incoming: &RankKey) -> Winner {
    use std::cmp::Ordering::*;
    match (existing.is_remove, incoming.is_remove) {
        (true, false) => Winner::Existing,
        (false, true) => Winner::Incoming,
        _ => match existing.timestamp.cmp(&incoming.timestamp) {
            Less => Winner::Incoming,
            Greater => Winner::Existing,
            Equal => by_hash(existing, incoming),
        },
    }
}

/// Higher timestamp wins, then higher hash. The grow-only ladder.
pub fn by_timestamp_then_hash(existing: &RankKey, incoming: &RankKey) -> Winner {
    use std::cmp::Ordering::*;
    match existing.timestamp.cmp(&incoming.timestamp) {
        Less => Winner::Incoming,
        Greater => Winner::Existing,
        Equal => by_hash(existing, incoming),
    }
}

fn by_hash(existing: &RankKey, incoming: &RankKey) -> Winner {
    if incoming.hash > existing.hash {
        Winner::Incoming
    } else {
        Winner::Existing
    }
}

/// Per-CRDT configuration of the generic machine
pub trait StorePolicy: Send + Sync + 'static {
    /// Namespace under `crdt/` in the persistence layout
    const NAME: &'static str;

    fn set_kind(message: &Message) -> SetKind;

    fn conflict_key(message: &Message) -> Vec<u8>;

    fn select_winner(existing: &RankKey, incoming: &RankKey) -> Winner;
}

/// What a merge changed
#[derive(Clone, Debug, PartialEq)]
pub struct MergeOutcome {
    /// The admitted message
    pub merged: Message,
    /// Messages that left the store: conflict losers, capacity evictions,
    /// TTL expiries, and (at the store-family level) cascade discards
    pub evicted: Vec<Message>,
}

/// The single-writer core of one CRDT. Callers wrap it in a lock.
pub struct TwoPhaseSet<P: StorePolicy> {
    capacity: Option<usize>,
    ttl_ms: Option<u64>,
    adds: HashMap<Vec<u8>, Message>,
    removes: HashMap<Vec<u8>, Message>,
    /// (timestamp, hash) -> conflict key; iteration order is eviction order
    order: BTreeMap<(u32, MessageHash), Vec<u8>>,
    /// Bounded FIFO of permanent evictions
    journal: IndexMap<Vec<u8>, RankKey>,
    journal_cap: usize,
    _policy: PhantomData<P>,
}

impl<P: StorePolicy> TwoPhaseSet<P> {
    pub fn new(capacity: Option<usize>, ttl_ms: Option<u64>) -> Self {
        // The journal must cover at least one full capacity turnover.
        let journal_cap = capacity.map(|c| c.saturating_mul(2).max(16)).unwrap_or(1024);
        Self {
            capacity,
            ttl_ms,
            adds: HashMap::new(),
            removes: HashMap::new(),
            order: BTreeMap::new(),
            journal: IndexMap::new(),
            journal_cap,
            _policy: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.adds.len() + self.removes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_add(&self, key: &[u8]) -> Option<&Message> {
        self.adds.get(key)
    }

    pub fn get_remove(&self, key: &[u8]) -> Option<&Message> {
        self.removes.get(key)
    }

    pub fn iter_adds(&self) -> impl Iterator<Item = &Message> {
        self.adds.values()
    }

    pub fn iter_removes(&self) -> impl Iterator<Item = &Message> {
        self.removes.values()
    }

    /// Merge one message. Returns what changed, or a rejection.
    pub fn merge(&mut self, message: Message, now: u32) -> Result<MergeOutcome> {
        let incoming = RankKey::of(&message)?;
        let key = P::conflict_key(&message);

        let occupant = match self.adds.get(&key).or_else(|| self.removes.get(&key)) {
            Some(resident) => Some((resident.hash.clone(), RankKey::of(resident)?)),
            None => None,
        };

        if let Some((occupant_hash, occupant_rank)) = occupant {
            if occupant_hash == message.hash {
                return Err(HubError::Duplicate);
            }
            match P::select_winner(&occupant_rank, &incoming) {
                Winner::Existing => {
                    return Err(HubError::Conflict(
                        "loses to an existing message with the same conflict key".into(),
                    ));
                }
                Winner::Incoming => {
                    let old = self
                        .take(&key)
                        .expect("occupant was just observed under this key");
                    self.journal_evict(key.clone(), occupant_rank);
                    self.insert(key, message.clone());
                    let mut evicted = vec![old];
                    evicted.extend(self.enforce_bounds(now));
                    return Ok(MergeOutcome {
                        merged: message,
                        evicted,
                    });
                }
            }
        }

        // Empty slot: refuse to re-admit anything that does not out-rank a
        // journaled eviction of this key.
        if let Some(past) = self.journal.get(&key) {
            if P::select_winner(past, &incoming) == Winner::Existing {
                return Err(HubError::Conflict(
                    "would re-admit an evicted message".into(),
                ));
            }
        }

        self.insert(key, message.clone());
        let evicted = self.enforce_bounds(now);
        Ok(MergeOutcome {
            merged: message,
            evicted,
        })
    }

    /// Discard every message matching the predicate, bypassing conflict
    /// resolution and the journal. Used by the revocation cascade.
    pub fn discard_where(&mut self, pred: impl Fn(&Message) -> bool) -> Vec<Message> {
        let doomed: Vec<Vec<u8>> = self
            .adds
            .iter()
            .chain(self.removes.iter())
            .filter(|(_, m)| pred(m))
            .map(|(k, _)| k.clone())
            .collect();

        doomed
            .into_iter()
            .filter_map(|key| self.take(&key))
            .collect()
    }

    /// Evict everything older than the TTL window
    pub fn prune_expired(&mut self, now: u32) -> Vec<Message> {
        let Some(ttl) = self.ttl_ms else {
            return Vec::new();
        };
        let cutoff = (now as u64).saturating_sub(ttl);
        let mut evicted = Vec::new();
        while let Some((&(ts, _), _)) = self.order.first_key_value() {
            if (ts as u64) >= cutoff {
                break;
            }
            evicted.push(self.evict_front());
        }
        evicted
    }

    /// Find a message by its chronological rank: exact timestamp plus a
    /// hash prefix. Serves sync-id resolution.
    pub fn find_by_rank(&self, timestamp: u32, hash_prefix: &[u8]) -> Option<&Message> {
        let mut lo = [0u8; 20];
        lo[..hash_prefix.len()].copy_from_slice(hash_prefix);
        let mut hi = [0xffu8; 20];
        hi[..hash_prefix.len()].copy_from_slice(hash_prefix);

        let range = (timestamp, MessageHash::new(lo))..=(timestamp, MessageHash::new(hi));
        let (_, key) = self.order.range(range).next()?;
        self.adds.get(key).or_else(|| self.removes.get(key))
    }

    fn insert(&mut self, key: Vec<u8>, message: Message) {
        let rank = (message.timestamp(), message.message_hash().expect("validated"));
        match P::set_kind(&message) {
            SetKind::Add => {
                self.adds.insert(key.clone(), message);
            }
            SetKind::Remove => {
                self.removes.insert(key.clone(), message);
            }
        }
        self.order.insert(rank, key);
    }

    fn take(&mut self, key: &[u8]) -> Option<Message> {
        let message = self
            .adds
            .remove(key)
            .or_else(|| self.removes.remove(key))?;
        let rank = (message.timestamp(), message.message_hash().expect("validated"));
        self.order.remove(&rank);
        Some(message)
    }

    fn enforce_bounds(&mut self, now: u32) -> Vec<Message> {
        let mut evicted = Vec::new();
        if let Some(cap) = self.capacity {
            while self.len() > cap {
                evicted.push(self.evict_front());
            }
        }
        evicted.extend(self.prune_expired(now));
        evicted
    }

    /// Evict the chronologically smallest entry and journal it
    fn evict_front(&mut self) -> Message {
        let (&rank, key) = self
            .order
            .first_key_value()
            .expect("evict_front called on a non-empty order index");
        let key = key.clone();
        let message = self.take(&key).expect("order index is consistent");
        self.journal_evict(
            key,
            RankKey {
                is_remove: message.msg_type().is_remove(),
                timestamp: rank.0,
                hash: rank.1,
            },
        );
        message
    }

    fn journal_evict(&mut self, key: Vec<u8>, rank: RankKey) {
        self.journal.shift_remove(&key);
        self.journal.insert(key, rank);
        while self.journal.len() > self.journal_cap {
            self.journal.shift_remove_index(0);
        }
    }
}

/// Kind helper shared by the per-store policies
pub fn kind_by_message_type(message: &Message) -> SetKind {
    if message.msg_type().is_remove() {
        SetKind::Remove
    } else {
        SetKind::Add
    }
}
