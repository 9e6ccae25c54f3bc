//! Leaves and derived node hashes

use crate::encoding::{base64_bytes, Sha256Hash};
use serde::{Deserialize, Serialize};

/// One record at the base of the tree
///
/// Indices are 0-based and dense. Once stored, a leaf never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaf {
    /// Position in the log
    pub index: u64,
    /// Raw record bytes, exactly as hashed by the log
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl Leaf {
    /// Create a new leaf
    pub fn new(index: u64, data: impl Into<Vec<u8>>) -> Self {
        Self {
            index,
            data: data.into(),
        }
    }
}

/// The hash of a tree position
///
/// Level 0 holds leaf hashes; level `L + 1` combines two level-`L` children.
/// Node hashes are derived data and can always be rebuilt from leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeHash {
    /// Tree level (0 = leaves)
    pub level: u32,
    /// Position within the level
    pub index: u64,
    /// The hash value
    pub hash: Sha256Hash,
}

impl NodeHash {
    /// Create a new node hash
    pub fn new(level: u32, index: u64, hash: Sha256Hash) -> Self {
        Self { level, index, hash }
    }
}
