//! Store contents held by the in-memory backend
//!
//! Every write is a [`Mutation`]. The state first says whether the mutation
//! is admissible (and whether it changes anything), then applies it.

use std::collections::{BTreeMap, HashMap};

use sumdb_types::{Checkpoint, Leaf, MetadataRecord, NodeHash, Sha256Hash};

use crate::{Error, Result, WatermarkKind};

/// One atomic store mutation
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Mutation {
    Leaf(Leaf),
    Node(NodeHash),
    Metadata {
        leaf_index: u64,
        records: Vec<MetadataRecord>,
    },
    Watermark {
        kind: WatermarkKind,
        value: u64,
    },
    Checkpoint(Checkpoint),
}

#[derive(Debug, Default)]
pub(crate) struct StoreState {
    leaves: Vec<Vec<u8>>,
    nodes: HashMap<(u32, u64), Sha256Hash>,
    metadata: BTreeMap<u64, Vec<MetadataRecord>>,
    watermarks: HashMap<WatermarkKind, u64>,
    checkpoint: Option<Checkpoint>,
}

impl StoreState {
    /// Check an entry against the current contents.
    ///
    /// Returns `Ok(false)` if applying the entry would change nothing.
    pub(crate) fn admit(&self, entry: &Mutation) -> Result<bool> {
        match entry {
            Mutation::Leaf(leaf) => {
                let leaf_count = self.leaves.len() as u64;
                if leaf.index < leaf_count {
                    if self.leaves[leaf.index as usize] != leaf.data {
                        return Err(Error::LeafMismatch { index: leaf.index });
                    }
                    Ok(false)
                } else if leaf.index == leaf_count {
                    Ok(true)
                } else {
                    Err(Error::NonContiguous {
                        index: leaf.index,
                        leaf_count,
                    })
                }
            }
            Mutation::Node(node) => {
                Ok(self.nodes.get(&(node.level, node.index)) != Some(&node.hash))
            }
            Mutation::Metadata {
                leaf_index,
                records,
            } => Ok(self.metadata.get(leaf_index) != Some(records)),
            Mutation::Watermark { kind, value } => Ok(self.watermark(*kind) != *value),
            Mutation::Checkpoint(checkpoint) => {
                Ok(self.checkpoint.as_ref() != Some(checkpoint))
            }
        }
    }

    /// Apply an admitted entry
    pub(crate) fn apply(&mut self, entry: Mutation) {
        match entry {
            Mutation::Leaf(leaf) => {
                if leaf.index == self.leaves.len() as u64 {
                    self.leaves.push(leaf.data);
                }
            }
            Mutation::Node(node) => {
                self.nodes.insert((node.level, node.index), node.hash);
            }
            Mutation::Metadata {
                leaf_index,
                records,
            } => {
                self.metadata.insert(leaf_index, records);
            }
            Mutation::Watermark { kind, value } => {
                self.watermarks.insert(kind, value);
            }
            Mutation::Checkpoint(checkpoint) => {
                self.checkpoint = Some(checkpoint);
            }
        }
    }

    pub(crate) fn leaf(&self, index: u64) -> Option<Vec<u8>> {
        self.leaves.get(usize::try_from(index).ok()?).cloned()
    }

    pub(crate) fn leaf_count(&self) -> u64 {
        self.leaves.len() as u64
    }

    pub(crate) fn node_hash(&self, level: u32, index: u64) -> Option<Sha256Hash> {
        self.nodes.get(&(level, index)).copied()
    }

    pub(crate) fn metadata(&self, leaf_index: u64) -> Vec<MetadataRecord> {
        self.metadata.get(&leaf_index).cloned().unwrap_or_default()
    }

    pub(crate) fn watermark(&self, kind: WatermarkKind) -> u64 {
        self.watermarks.get(&kind).copied().unwrap_or(0)
    }

    pub(crate) fn checkpoint(&self) -> Option<Checkpoint> {
        self.checkpoint.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(index: u64, data: &[u8]) -> Mutation {
        Mutation::Leaf(Leaf::new(index, data))
    }

    #[test]
    fn test_leaves_are_dense_and_immutable() {
        let mut state = StoreState::default();
        assert!(state.admit(&leaf(0, b"a\n")).unwrap());
        state.apply(leaf(0, b"a\n"));

        assert!(!state.admit(&leaf(0, b"a\n")).unwrap());
        assert!(matches!(
            state.admit(&leaf(0, b"b\n")),
            Err(Error::LeafMismatch { index: 0 })
        ));
        assert!(matches!(
            state.admit(&leaf(2, b"c\n")),
            Err(Error::NonContiguous { index: 2, leaf_count: 1 })
        ));
    }

    #[test]
    fn test_unchanged_entries_are_not_admitted() {
        let mut state = StoreState::default();
        let node = Mutation::Node(NodeHash::new(1, 0, Sha256Hash::from_bytes([1; 32])));
        assert!(state.admit(&node).unwrap());
        state.apply(node.clone());
        assert!(!state.admit(&node).unwrap());

        let mark = Mutation::Watermark {
            kind: WatermarkKind::Hashed,
            value: 0,
        };
        assert!(!state.admit(&mark).unwrap());
    }
}
