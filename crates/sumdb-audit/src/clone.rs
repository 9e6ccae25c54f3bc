//! Leaf cloning

use futures::stream::{self, StreamExt};
use sumdb_merkle::{hash_leaf, Tile};
use sumdb_types::Checkpoint;
use tracing::{debug, info};

use crate::auditor::Auditor;
use crate::error::{AuditError, ConsistencyError, Result};

/// Outcome of [`Auditor::clone_leaves`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloneReport {
    /// Leaves stored before the run
    pub previous_size: u64,
    /// Leaves stored after the run
    pub new_size: u64,
    /// Data tiles downloaded
    pub tiles_fetched: usize,
}

impl Auditor {
    /// Download every leaf below the checkpoint's tree size into the store
    ///
    /// Starts at the data tile holding the first missing leaf, which may be a
    /// partial tile cloned by an earlier run; its overlap with stored leaves
    /// must match byte for byte. Tiles are fetched concurrently but stored in
    /// index order, so an interrupted run leaves a dense prefix behind.
    pub async fn clone_leaves(&self, checkpoint: &Checkpoint) -> Result<CloneReport> {
        let tree_size = checkpoint.tree_size;
        let previous_size = self.store.leaf_count().await?;

        if previous_size > tree_size {
            return Err(ConsistencyError::LogShrank {
                known: previous_size,
                tree_size,
            }
            .into());
        }
        if previous_size == tree_size {
            debug!(tree_size, "leaves already cloned");
            return Ok(CloneReport {
                previous_size,
                new_size: tree_size,
                tiles_fetched: 0,
            });
        }

        let tiles = self.geometry.tiles_covering_range(0, previous_size, tree_size);
        info!(
            from = previous_size,
            to = tree_size,
            tiles = tiles.len(),
            "cloning leaves"
        );

        let client = &self.client;
        let mut fetches = stream::iter(tiles)
            .map(|tile| async move {
                let leaves = client.fetch_leaves(tile).await?;
                Ok::<_, sumdb_client::Error>((tile, leaves))
            })
            .buffered(self.config.concurrency);

        let mut tiles_fetched = 0;
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(AuditError::Cancelled),
                next = fetches.next() => next,
            };
            let Some(fetched) = next else { break };
            let (tile, leaves) = fetched?;

            self.store_tile_leaves(tile, leaves, previous_size).await?;
            tiles_fetched += 1;
            debug!(tile = tile.index, width = tile.width, "stored data tile");
        }

        let new_size = self.store.leaf_count().await?;
        info!(leaves = new_size, tiles = tiles_fetched, "leaves cloned");
        Ok(CloneReport {
            previous_size,
            new_size,
            tiles_fetched,
        })
    }

    /// Persist one data tile; leaves below `stored` must already match
    async fn store_tile_leaves(&self, tile: Tile, leaves: Vec<Vec<u8>>, stored: u64) -> Result<()> {
        let start = self.geometry.tile_start(&tile);
        for (offset, data) in leaves.into_iter().enumerate() {
            let index = start + offset as u64;
            if index < stored {
                let existing = self.leaf(index).await?;
                if existing != data {
                    return Err(leaf_mismatch(index, &existing, &data));
                }
                continue;
            }

            if let Err(err) = self.store.put_leaf(index, data.clone()).await {
                return Err(match err {
                    sumdb_store::Error::LeafMismatch { .. } => {
                        let existing = self.leaf(index).await?;
                        leaf_mismatch(index, &existing, &data)
                    }
                    other => other.into(),
                });
            }
        }
        Ok(())
    }
}

fn leaf_mismatch(index: u64, stored: &[u8], served: &[u8]) -> AuditError {
    ConsistencyError::LeafMismatch {
        index,
        stored: hash_leaf(stored),
        served: hash_leaf(served),
    }
    .into()
}
