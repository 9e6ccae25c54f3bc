//! Local storage for a cloned checksum database
//!
//! The auditor keeps everything it learns from the log in a [`LocalStore`]:
//! raw leaves, derived node hashes, decoded metadata records, progress
//! watermarks and the last checkpoint whose root verified. Two backends are
//! provided:
//!
//! - [`FileSystemStore`]: persistent, a RocksDB database in a directory
//! - [`InMemoryStore`]: fast in-process store for tests and one-off runs
//!
//! # Example
//!
//! ```no_run
//! use sumdb_store::{FileSystemStore, LocalStore, WatermarkKind};
//!
//! # async fn example() -> Result<(), sumdb_store::Error> {
//! let store = FileSystemStore::new("./sum.db")?;
//! store.init().await?;
//!
//! store.put_leaf(0, b"golang.org/x/text v0.3.0 h1:...\n".to_vec()).await?;
//! assert_eq!(store.leaf_count().await?, 1);
//! assert_eq!(store.watermark(WatermarkKind::Hashed).await?, 0);
//! # Ok(())
//! # }
//! ```

mod error;
mod filesystem;
mod memory;
mod state;

pub use error::{Error, Result};
pub use filesystem::FileSystemStore;
pub use memory::InMemoryStore;

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use sumdb_types::{Checkpoint, MetadataRecord, Sha256Hash};

/// Boxed future returned by [`LocalStore`] methods
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Persisted progress markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WatermarkKind {
    /// Tree size whose node hashes are complete
    Hashed,
    /// Number of leaves whose metadata has been processed
    Metadata,
}

impl WatermarkKind {
    /// Name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            WatermarkKind::Hashed => "hashed",
            WatermarkKind::Metadata => "metadata",
        }
    }
}

/// Trait for local stores
///
/// Every write is atomic per record: after an interruption the store holds
/// exactly the writes that completed. Leaves are immutable and dense; node
/// hashes, metadata and watermarks may be overwritten.
pub trait LocalStore: Send + Sync {
    /// Prepare the store for use, creating it if absent
    fn init(&self) -> StoreFuture<'_, ()>;

    /// Store a leaf
    ///
    /// Storing identical bytes again is a no-op. Storing different bytes at
    /// an index already held fails with [`Error::LeafMismatch`]; skipping an
    /// index fails with [`Error::NonContiguous`].
    fn put_leaf(&self, index: u64, data: Vec<u8>) -> StoreFuture<'_, ()>;

    /// Get a leaf by index
    fn get_leaf(&self, index: u64) -> StoreFuture<'_, Option<Vec<u8>>>;

    /// Number of leaves stored (they occupy `0..leaf_count`)
    fn leaf_count(&self) -> StoreFuture<'_, u64>;

    /// Store (or replace) the hash of a tree position
    fn put_node_hash(&self, level: u32, index: u64, hash: Sha256Hash) -> StoreFuture<'_, ()>;

    /// Get the hash of a tree position
    fn get_node_hash(&self, level: u32, index: u64) -> StoreFuture<'_, Option<Sha256Hash>>;

    /// Replace the records decoded from one leaf
    fn put_metadata(&self, leaf_index: u64, records: Vec<MetadataRecord>) -> StoreFuture<'_, ()>;

    /// Records decoded from one leaf (empty if none)
    fn get_metadata(&self, leaf_index: u64) -> StoreFuture<'_, Vec<MetadataRecord>>;

    /// Current value of a watermark (0 if never set)
    fn watermark(&self, kind: WatermarkKind) -> StoreFuture<'_, u64>;

    /// Set a watermark
    fn set_watermark(&self, kind: WatermarkKind, value: u64) -> StoreFuture<'_, ()>;

    /// The last checkpoint whose root verified
    fn latest_checkpoint(&self) -> StoreFuture<'_, Option<Checkpoint>>;

    /// Record a verified checkpoint
    fn put_checkpoint(&self, checkpoint: Checkpoint) -> StoreFuture<'_, ()>;
}

// Implement LocalStore for Arc<T> where T: LocalStore
impl<T: LocalStore + ?Sized> LocalStore for Arc<T> {
    fn init(&self) -> StoreFuture<'_, ()> {
        (**self).init()
    }

    fn put_leaf(&self, index: u64, data: Vec<u8>) -> StoreFuture<'_, ()> {
        (**self).put_leaf(index, data)
    }

    fn get_leaf(&self, index: u64) -> StoreFuture<'_, Option<Vec<u8>>> {
        (**self).get_leaf(index)
    }

    fn leaf_count(&self) -> StoreFuture<'_, u64> {
        (**self).leaf_count()
    }

    fn put_node_hash(&self, level: u32, index: u64, hash: Sha256Hash) -> StoreFuture<'_, ()> {
        (**self).put_node_hash(level, index, hash)
    }

    fn get_node_hash(&self, level: u32, index: u64) -> StoreFuture<'_, Option<Sha256Hash>> {
        (**self).get_node_hash(level, index)
    }

    fn put_metadata(&self, leaf_index: u64, records: Vec<MetadataRecord>) -> StoreFuture<'_, ()> {
        (**self).put_metadata(leaf_index, records)
    }

    fn get_metadata(&self, leaf_index: u64) -> StoreFuture<'_, Vec<MetadataRecord>> {
        (**self).get_metadata(leaf_index)
    }

    fn watermark(&self, kind: WatermarkKind) -> StoreFuture<'_, u64> {
        (**self).watermark(kind)
    }

    fn set_watermark(&self, kind: WatermarkKind, value: u64) -> StoreFuture<'_, ()> {
        (**self).set_watermark(kind, value)
    }

    fn latest_checkpoint(&self) -> StoreFuture<'_, Option<Checkpoint>> {
        (**self).latest_checkpoint()
    }

    fn put_checkpoint(&self, checkpoint: Checkpoint) -> StoreFuture<'_, ()> {
        (**self).put_checkpoint(checkpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watermark_kind_as_str() {
        assert_eq!(WatermarkKind::Hashed.as_str(), "hashed");
        assert_eq!(WatermarkKind::Metadata.as_str(), "metadata");
    }

    #[test]
    fn test_watermark_kind_serde() {
        let json = serde_json::to_string(&WatermarkKind::Metadata).unwrap();
        assert_eq!(json, "\"metadata\"");
    }
}
