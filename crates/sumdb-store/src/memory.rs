//! In-memory store implementation

use std::sync::Arc;

use sumdb_types::{Checkpoint, Leaf, MetadataRecord, NodeHash, Sha256Hash};
use tokio::sync::RwLock;

use crate::state::{Mutation, StoreState};
use crate::{LocalStore, Result, StoreFuture, WatermarkKind};

/// In-memory store
///
/// Fast but not persistent across process restarts. Clones share the same
/// contents, so a test can keep a handle while an auditor owns another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    async fn write(&self, entry: Mutation) -> Result<()> {
        let mut state = self.state.write().await;
        if state.admit(&entry)? {
            state.apply(entry);
        }
        Ok(())
    }
}

impl LocalStore for InMemoryStore {
    fn init(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move { Ok(()) })
    }

    fn put_leaf(&self, index: u64, data: Vec<u8>) -> StoreFuture<'_, ()> {
        Box::pin(self.write(Mutation::Leaf(Leaf::new(index, data))))
    }

    fn get_leaf(&self, index: u64) -> StoreFuture<'_, Option<Vec<u8>>> {
        Box::pin(async move { Ok(self.state.read().await.leaf(index)) })
    }

    fn leaf_count(&self) -> StoreFuture<'_, u64> {
        Box::pin(async move { Ok(self.state.read().await.leaf_count()) })
    }

    fn put_node_hash(&self, level: u32, index: u64, hash: Sha256Hash) -> StoreFuture<'_, ()> {
        Box::pin(self.write(Mutation::Node(NodeHash::new(level, index, hash))))
    }

    fn get_node_hash(&self, level: u32, index: u64) -> StoreFuture<'_, Option<Sha256Hash>> {
        Box::pin(async move { Ok(self.state.read().await.node_hash(level, index)) })
    }

    fn put_metadata(&self, leaf_index: u64, records: Vec<MetadataRecord>) -> StoreFuture<'_, ()> {
        Box::pin(self.write(Mutation::Metadata {
            leaf_index,
            records,
        }))
    }

    fn get_metadata(&self, leaf_index: u64) -> StoreFuture<'_, Vec<MetadataRecord>> {
        Box::pin(async move { Ok(self.state.read().await.metadata(leaf_index)) })
    }

    fn watermark(&self, kind: WatermarkKind) -> StoreFuture<'_, u64> {
        Box::pin(async move { Ok(self.state.read().await.watermark(kind)) })
    }

    fn set_watermark(&self, kind: WatermarkKind, value: u64) -> StoreFuture<'_, ()> {
        Box::pin(self.write(Mutation::Watermark { kind, value }))
    }

    fn latest_checkpoint(&self) -> StoreFuture<'_, Option<Checkpoint>> {
        Box::pin(async move { Ok(self.state.read().await.checkpoint()) })
    }

    fn put_checkpoint(&self, checkpoint: Checkpoint) -> StoreFuture<'_, ()> {
        Box::pin(self.write(Mutation::Checkpoint(checkpoint)))
    }
}
