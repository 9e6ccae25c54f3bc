//! Error types for sumdb-merkle

use thiserror::Error;

/// Errors that can occur in tile addressing
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// Tile height outside the supported range
    #[error("Invalid tile height: {0}")]
    InvalidTileHeight(u8),

    /// Tile width of zero or larger than the tile height allows
    #[error("Invalid tile width {width} for height {height}")]
    InvalidTileWidth { width: u32, height: u8 },

    /// Tile path that cannot be parsed
    #[error("Invalid tile path: {0}")]
    InvalidTilePath(String),
}

/// Result type for Merkle tree operations
pub type Result<T> = std::result::Result<T, Error>;
