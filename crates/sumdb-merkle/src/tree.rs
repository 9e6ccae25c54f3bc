//! Merkle tree hashing utilities
//!
//! Implements RFC 6962 compliant Merkle tree hashing with:
//! - Domain separation via prefixes (0x00 for leaf, 0x01 for node)
//! - SHA-256 hash function
//! - Bottom-up construction where an unpaired rightmost node is carried to
//!   the next level unchanged, which yields exactly the RFC 6962 tree head

use sha2::{Digest, Sha256};
use sumdb_types::Sha256Hash;

/// Prefix for leaf nodes in RFC 6962 Merkle tree
pub const LEAF_HASH_PREFIX: u8 = 0x00;

/// Prefix for internal nodes in RFC 6962 Merkle tree
pub const NODE_HASH_PREFIX: u8 = 0x01;

/// Hash size in bytes (SHA-256)
pub const HASH_SIZE: usize = 32;

/// Hash a leaf node
///
/// Returns: SHA256(0x00 || leaf_data)
pub fn hash_leaf(data: &[u8]) -> Sha256Hash {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_HASH_PREFIX]);
    hasher.update(data);
    Sha256Hash::from_bytes(hasher.finalize().into())
}

/// Hash two child nodes to create a parent node
///
/// Returns: SHA256(0x01 || left || right)
pub fn hash_children(left: &Sha256Hash, right: &Sha256Hash) -> Sha256Hash {
    let mut hasher = Sha256::new();
    hasher.update([NODE_HASH_PREFIX]);
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    Sha256Hash::from_bytes(hasher.finalize().into())
}

/// Root hash of the empty tree: SHA256 of the empty string
pub fn empty_root() -> Sha256Hash {
    Sha256Hash::from_bytes(Sha256::digest(b"").into())
}

/// Compute the next level up from a full level of hashes
///
/// Neighbours are paired left to right; an unpaired last hash is promoted.
pub fn reduce_level(hashes: &[Sha256Hash]) -> Vec<Sha256Hash> {
    hashes
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => hash_children(left, right),
            [single] => *single,
            _ => unreachable!("chunks(2) yields one or two elements"),
        })
        .collect()
}

/// Reduce a level of leaf hashes all the way to the root
pub fn root_from_leaf_hashes(mut hashes: Vec<Sha256Hash>) -> Sha256Hash {
    if hashes.is_empty() {
        return empty_root();
    }
    while hashes.len() > 1 {
        hashes = reduce_level(&hashes);
    }
    hashes[0]
}

/// Streaming root computation over leaf hashes
///
/// Holds one hash per set bit of the number of leaves pushed so far (the
/// roots of the perfect subtrees covering them), so memory stays
/// logarithmic in the tree size.
#[derive(Debug, Clone, Default)]
pub struct RootAccumulator {
    /// Perfect subtree roots, largest first, with their heights
    stack: Vec<(u32, Sha256Hash)>,
    size: u64,
}

impl RootAccumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of leaf hashes pushed
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Append the next leaf hash
    pub fn push(&mut self, leaf_hash: Sha256Hash) {
        let mut node = (0u32, leaf_hash);
        while let Some(&(height, left)) = self.stack.last() {
            if height != node.0 {
                break;
            }
            self.stack.pop();
            node = (height + 1, hash_children(&left, &node.1));
        }
        self.stack.push(node);
        self.size += 1;
    }

    /// Root of the tree over every leaf pushed so far
    pub fn root(&self) -> Sha256Hash {
        let mut nodes = self.stack.iter().rev().map(|(_, hash)| *hash);
        match nodes.next() {
            None => empty_root(),
            Some(last) => nodes.fold(last, |right, left| hash_children(&left, &right)),
        }
    }
}

/// Number of nodes at each level of a tree with `tree_size` leaves
///
/// The first entry is `tree_size` and the last is 1 (the root). An empty
/// tree has no levels.
pub fn level_sizes(tree_size: u64) -> Vec<u64> {
    let mut sizes = Vec::new();
    let mut size = tree_size;
    while size > 0 {
        sizes.push(size);
        if size == 1 {
            break;
        }
        size = size.div_ceil(2);
    }
    sizes
}

/// Level holding the root of a tree with `tree_size` leaves
pub fn root_level(tree_size: u64) -> u32 {
    if tree_size <= 1 {
        0
    } else {
        bit_length(tree_size - 1)
    }
}

/// Calculate the position of the most significant bit
pub fn bit_length(n: u64) -> u32 {
    if n == 0 {
        0
    } else {
        64 - n.leading_zeros()
    }
}
