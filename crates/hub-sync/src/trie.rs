//! Sync trie
//!
//! A byte-radix Merkle trie over sync ids. Every resident message
//! contributes exactly one leaf at depth 36; each node carries the count of
//! leaves below it and an aggregated 20-byte hash:
//!
//! - leaf hash: `H(sync_id)`
//! - internal hash: `H(concat over label-ascending children of
//!   label_byte || child_hash)`
//! - empty trie: the all-zero digest
//!
//! Because the first ten key bytes are a zero-padded decimal timestamp,
//! in-order traversal is chronological, and the rightmost path always leads
//! to the newest leaf. Snapshots fold everything left of that path into
//! per-level exclusion hashes, which is what lets two hubs detect
//! divergence by comparing a handful of digests instead of walking trees.

use std::collections::BTreeMap;

use hub_crypto::hash::{DIGEST_SIZE, EMPTY_DIGEST, blake3_20, blake3_20_concat};

use crate::sync_id::{SYNC_ID_LEN, SyncId};

/// One level of a trie summary: the node's own aggregate plus its direct
/// children, as served over RPC.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeMetadata {
    pub prefix: Vec<u8>,
    pub num_messages: usize,
    pub hash: [u8; DIGEST_SIZE],
    pub children: Vec<NodeMetadata>,
}

/// Exclusion-set summary of the rightmost path under a prefix
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrieSnapshot {
    pub prefix: Vec<u8>,
    /// One entry per level from the root along the rightmost path:
    /// `H(concat of sibling hashes left of the path)`, the zero digest
    /// where the path has no siblings
    pub excluded_hashes: Vec<[u8; DIGEST_SIZE]>,
    pub num_messages: usize,
    pub root_hash: [u8; DIGEST_SIZE],
}

#[derive(Clone, Debug, Default)]
struct TrieNode {
    children: BTreeMap<u8, TrieNode>,
    count: usize,
    hash: [u8; DIGEST_SIZE],
}

impl TrieNode {
    fn recompute_hash(&mut self) {
        if self.count == 0 {
            self.hash = EMPTY_DIGEST;
            return;
        }
        let mut parts: Vec<u8> = Vec::with_capacity(self.children.len() * (DIGEST_SIZE + 1));
        for (label, child) in &self.children {
            parts.push(*label);
            parts.extend_from_slice(&child.hash);
        }
        self.hash = blake3_20(&parts);
    }
}

/// The trie itself. Callers wrap it in a lock; mutation and the CRDT write
/// it mirrors belong to the same critical section.
#[derive(Clone, Debug, Default)]
pub struct MerkleTrie {
    root: TrieNode,
}

impl MerkleTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of resident sync ids
    pub fn len(&self) -> usize {
        self.root.count
    }

    pub fn is_empty(&self) -> bool {
        self.root.count == 0
    }

    pub fn root_hash(&self) -> [u8; DIGEST_SIZE] {
        if self.root.count == 0 {
            EMPTY_DIGEST
        } else {
            self.root.hash
        }
    }

    pub fn contains(&self, id: &SyncId) -> bool {
        let mut node = &self.root;
        for byte in id.as_bytes() {
            match node.children.get(byte) {
                Some(child) => node = child,
                None => return false,
            }
        }
        node.count == 1
    }

    /// Insert a sync id. Returns false when it was already present.
    pub fn insert(&mut self, id: &SyncId) -> bool {
        if self.contains(id) {
            return false;
        }
        Self::insert_rec(&mut self.root, id.as_bytes(), 0);
        true
    }

    fn insert_rec(node: &mut TrieNode, key: &[u8; SYNC_ID_LEN], depth: usize) {
        node.count += 1;
        if depth == SYNC_ID_LEN {
            node.hash = blake3_20(key);
            return;
        }
        let child = node.children.entry(key[depth]).or_default();
        Self::insert_rec(child, key, depth + 1);
        node.recompute_hash();
    }

    /// Remove a sync id. Returns false when it was not present.
    pub fn remove(&mut self, id: &SyncId) -> bool {
        if !self.contains(id) {
            return false;
        }
        Self::remove_rec(&mut self.root, id.as_bytes(), 0);
        true
    }

    fn remove_rec(node: &mut TrieNode, key: &[u8; SYNC_ID_LEN], depth: usize) {
        node.count -= 1;
        if depth == SYNC_ID_LEN {
            return;
        }
        let label = key[depth];
        let child = node
            .children
            .get_mut(&label)
            .expect("presence checked before removal");
        Self::remove_rec(child, key, depth + 1);
        if child.count == 0 {
            node.children.remove(&label);
        }
        node.recompute_hash();
    }

    fn node_at(&self, prefix: &[u8]) -> Option<&TrieNode> {
        let mut node = &self.root;
        for byte in prefix {
            node = node.children.get(byte)?;
        }
        Some(node)
    }

    /// Aggregate of the subtree under a prefix
    pub fn subtree_by_prefix(&self, prefix: &[u8]) -> Option<(usize, [u8; DIGEST_SIZE])> {
        self.node_at(prefix).map(|n| (n.count, n.hash))
    }

    /// Node summary with direct children, one level deep
    pub fn metadata(&self, prefix: &[u8]) -> NodeMetadata {
        match self.node_at(prefix) {
            None => NodeMetadata {
                prefix: prefix.to_vec(),
                num_messages: 0,
                hash: EMPTY_DIGEST,
                children: Vec::new(),
            },
            Some(node) => NodeMetadata {
                prefix: prefix.to_vec(),
                num_messages: node.count,
                hash: node.hash,
                children: node
                    .children
                    .iter()
                    .map(|(label, child)| {
                        let mut child_prefix = prefix.to_vec();
                        child_prefix.push(*label);
                        NodeMetadata {
                            prefix: child_prefix,
                            num_messages: child.count,
                            hash: child.hash,
                            children: Vec::new(),
                        }
                    })
                    .collect(),
            },
        }
    }

    /// All sync ids below a prefix, in chronological (= byte) order
    pub fn sync_ids_by_prefix(&self, prefix: &[u8]) -> Vec<SyncId> {
        let mut out = Vec::new();
        if let Some(node) = self.node_at(prefix) {
            let mut path = prefix.to_vec();
            Self::collect_leaves(node, &mut path, &mut out);
        }
        out
    }

    fn collect_leaves(node: &TrieNode, path: &mut Vec<u8>, out: &mut Vec<SyncId>) {
        if path.len() == SYNC_ID_LEN {
            if let Ok(id) = SyncId::from_bytes(path) {
                out.push(id);
            }
            return;
        }
        for (label, child) in &node.children {
            path.push(*label);
            Self::collect_leaves(child, path, out);
            path.pop();
        }
    }

    /// Exclusion-set snapshot along the rightmost path under `prefix`.
    ///
    /// The walk follows `prefix` while it exists in the trie, then descends
    /// the rightmost edge to the newest leaf. At every level the hashes of
    /// the siblings left behind are folded into one digest; a level with no
    /// siblings contributes the zero digest.
    pub fn snapshot(&self, prefix: &[u8]) -> TrieSnapshot {
        let mut excluded_hashes = Vec::new();
        let mut node = &self.root;
        let mut depth = 0usize;

        loop {
            // Choose the next step: the prefix byte while we are inside the
            // prefix, the rightmost child after it.
            let next = if depth < prefix.len() {
                Some(prefix[depth])
            } else {
                node.children.keys().next_back().copied()
            };
            let Some(label) = next else {
                break;
            };

            let siblings: Vec<&[u8; DIGEST_SIZE]> = node
                .children
                .iter()
                .filter(|(l, _)| **l != label)
                .map(|(_, c)| &c.hash)
                .collect();
            if siblings.is_empty() {
                excluded_hashes.push(EMPTY_DIGEST);
            } else {
                let parts: Vec<&[u8]> = siblings.iter().map(|h| h.as_slice()).collect();
                excluded_hashes.push(blake3_20_concat(&parts));
            }

            match node.children.get(&label) {
                Some(child) => {
                    node = child;
                    depth += 1;
                }
                None => break,
            }
        }

        TrieSnapshot {
            prefix: prefix.to_vec(),
            excluded_hashes,
            num_messages: self
                .node_at(prefix)
                .map(|n| n.count)
                .unwrap_or(0),
            root_hash: self.root_hash(),
        }
    }
}
