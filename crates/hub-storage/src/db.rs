//! Atomic-batch key-value interface
//!
//! Persistence is an external collaborator; the stores speak to it through
//! [`HubDb`], an atomic multi-put / multi-delete surface. Every merge and
//! every cascade commits exactly one batch, so a crash never exposes a
//! partial state change. The in-repo realization is an in-memory ordered
//! map; a disk engine slots in behind the same trait.
//!
//! Key namespaces:
//! - `crdt/<name>/add/<conflict_key>` and `crdt/<name>/remove/<conflict_key>`
//! - `trie/<prefix>`
//! - `fid/<id>`

use parking_lot::RwLock;
use std::collections::BTreeMap;

use hub_core::error::Result;

/// A single write in a batch
#[derive(Clone, Debug)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// An atomic group of writes
#[derive(Clone, Debug, Default)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(BatchOp::Put { key, value });
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.ops.push(BatchOp::Delete { key });
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }
}

/// Atomic-batch key-value store
pub trait HubDb: Send + Sync {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Apply all operations in the batch, atomically
    fn commit(&self, batch: Batch) -> Result<()>;

    /// Keys and values under a prefix, in key order
    fn scan_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)>;
}

/// In-memory store backed by an ordered map
pub struct MemoryDb {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl Default for MemoryDb {
    fn default() -> Self {
        Self::new()
    }
}

impl HubDb for MemoryDb {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.read().get(key).cloned()
    }

    fn commit(&self, batch: Batch) -> Result<()> {
        let mut data = self.data.write();
        for op in batch.ops {
            match op {
                BatchOp::Put { key, value } => {
                    data.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.data
            .read()
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Key construction for the shared namespaces
pub mod keys {
    /// `crdt/<name>/add/<conflict_key>` or `crdt/<name>/remove/<conflict_key>`
    pub fn crdt(name: &str, is_remove: bool, conflict_key: &[u8]) -> Vec<u8> {
        let set = if is_remove { "remove" } else { "add" };
        let mut key = Vec::with_capacity(name.len() + set.len() + conflict_key.len() + 7);
        key.extend_from_slice(b"crdt/");
        key.extend_from_slice(name.as_bytes());
        key.push(b'/');
        key.extend_from_slice(set.as_bytes());
        key.push(b'/');
        key.extend_from_slice(conflict_key);
        key
    }

    /// `trie/<prefix>`
    pub fn trie(prefix: &[u8]) -> Vec<u8> {
        let mut key = Vec::with_capacity(prefix.len() + 5);
        key.extend_from_slice(b"trie/");
        key.extend_from_slice(prefix);
        key
    }

    /// `fid/<id>`
    pub fn fid(fid: u64) -> Vec<u8> {
        let mut key = Vec::with_capacity(12);
        key.extend_from_slice(b"fid/");
        key.extend_from_slice(&fid.to_be_bytes());
        key
    }
}
