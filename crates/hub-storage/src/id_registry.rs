//! Fid ownership registry
//!
//! Tracks the custody address of every fid, fed exclusively by on-chain
//! registry events applied in block order. Replays and stale events are
//! ignored, so the chain ingester can re-deliver freely.

use hashbrown::HashMap;
use parking_lot::RwLock;
use std::sync::Arc;

use hub_core::error::Result;
use hub_core::types::Fid;

use crate::db::{Batch, HubDb, keys};

/// Kind of on-chain registry event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdRegistryEventType {
    Register,
    Transfer,
}

/// A registry event as delivered by the chain ingester
#[derive(Clone, Debug)]
pub struct IdRegistryEvent {
    pub fid: Fid,
    /// Custody address after the event
    pub to: [u8; 20],
    pub event_type: IdRegistryEventType,
    pub block_number: u64,
    pub log_index: u32,
}

/// Custody transfer that the caller must cascade
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustodyChange {
    pub fid: Fid,
    pub previous: [u8; 20],
}

#[derive(Clone, Copy, Debug)]
struct CustodyRecord {
    custody: [u8; 20],
    block_number: u64,
    log_index: u32,
}

pub struct IdRegistry {
    records: RwLock<HashMap<Fid, CustodyRecord>>,
    db: Arc<dyn HubDb>,
}

impl IdRegistry {
    pub fn new(db: Arc<dyn HubDb>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            db,
        }
    }

    /// Apply one chain event and commit it on its own
    pub fn apply_event(&self, event: &IdRegistryEvent) -> Result<Option<CustodyChange>> {
        let mut batch = Batch::new();
        let change = self.apply_event_batched(event, &mut batch)?;
        self.db.commit(batch)?;
        Ok(change)
    }

    /// Apply one chain event into a caller-owned batch. Returns the custody
    /// change when an existing fid moved to a new address; the caller owns
    /// the resulting cascade.
    pub fn apply_event_batched(
        &self,
        event: &IdRegistryEvent,
        batch: &mut Batch,
    ) -> Result<Option<CustodyChange>> {
        let mut records = self.records.write();

        let change = match records.get(&event.fid) {
            Some(existing)
                if (event.block_number, event.log_index)
                    <= (existing.block_number, existing.log_index) =>
            {
                // Stale or replayed event.
                tracing::debug!(
                    fid = event.fid,
                    block = event.block_number,
                    "ignoring stale registry event"
                );
                return Ok(None);
            }
            Some(existing) if existing.custody != event.to => Some(CustodyChange {
                fid: event.fid,
                previous: existing.custody,
            }),
            _ => None,
        };

        records.insert(
            event.fid,
            CustodyRecord {
                custody: event.to,
                block_number: event.block_number,
                log_index: event.log_index,
            },
        );
        drop(records);

        let mut value = event.to.to_vec();
        value.extend_from_slice(&event.block_number.to_be_bytes());
        value.extend_from_slice(&event.log_index.to_be_bytes());
        batch.put(keys::fid(event.fid), value);

        Ok(change)
    }

    /// Current custody address of an fid
    pub fn custody_address(&self, fid: Fid) -> Option<[u8; 20]> {
        self.records.read().get(&fid).map(|r| r.custody)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}
