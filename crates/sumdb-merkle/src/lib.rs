//! RFC 6962 Merkle tree hashing and tile addressing for sumdb-audit
//!
//! This crate implements the one hashing scheme the auditor understands:
//! SHA-256 with RFC 6962 domain separation, odd nodes promoted unchanged,
//! and the tile layout served by Go checksum databases.

pub mod error;
pub mod tile;
pub mod tree;

pub use error::{Error, Result};
pub use tile::{Tile, TileGeometry, TileLevel, DEFAULT_TILE_HEIGHT, MAX_TILE_HEIGHT};
pub use tree::{
    empty_root, hash_children, hash_leaf, level_sizes, reduce_level, root_from_leaf_hashes,
    root_level, RootAccumulator, HASH_SIZE, LEAF_HASH_PREFIX, NODE_HASH_PREFIX,
};
