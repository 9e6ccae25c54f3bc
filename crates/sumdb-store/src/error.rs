//! Error types for the store crate

/// Result type for store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during store operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A different leaf is already stored at this index
    #[error("leaf {index} is already stored with different contents")]
    LeafMismatch {
        /// Leaf index
        index: u64,
    },

    /// Leaves must be stored densely, in index order
    #[error("cannot store leaf {index}: only {leaf_count} leaves are stored")]
    NonContiguous {
        /// Leaf index that was written
        index: u64,
        /// Current number of leaves
        leaf_count: u64,
    },

    /// The store was used before `init`
    #[error("store is not initialized")]
    NotInitialized,

    /// A stored value cannot be decoded
    #[error("store is corrupt: {0}")]
    Corrupt(String),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// I/O error (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Database(err.to_string())
    }
}
