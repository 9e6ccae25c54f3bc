//! Independent re-verification of stored node hashes
//!
//! [`Auditor::verify_tiles`] never reads a cached node to produce a hash: every
//! node it checks is rebuilt from raw leaves. [`Auditor::compare_remote_tiles`]
//! checks the log's own hash tiles against the local tree.

use futures::stream::{self, StreamExt};
use sumdb_merkle::{hash_leaf, reduce_level, root_level, RootAccumulator, TileLevel, HASH_SIZE};
use sumdb_store::WatermarkKind;
use sumdb_types::{Checkpoint, Sha256Hash};
use tracing::{debug, info};

use crate::auditor::Auditor;
use crate::error::{AuditError, ConsistencyError, CorruptionError, Result};

/// Outcome of [`Auditor::verify_tiles`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    /// Tiles whose nodes were rebuilt
    pub tiles_checked: usize,
    /// Stored nodes compared, root included
    pub nodes_checked: u64,
    /// Root rebuilt from all leaves
    pub root: Sha256Hash,
}

/// Outcome of [`Auditor::compare_remote_tiles`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemoteTileReport {
    /// Hash tiles downloaded
    pub tiles_compared: usize,
    /// Hashes compared
    pub nodes_compared: u64,
}

impl Auditor {
    /// Rebuild every tile's nodes from leaves and compare them with the store
    ///
    /// For each tile the bottom row is rebuilt leaf by leaf, then the complete
    /// nodes above it inside the tile are reduced from that row. Finally the
    /// root is rebuilt from all leaves. Any difference, or a missing node, is
    /// reported as [`CorruptionError`].
    pub async fn verify_tiles(&self, checkpoint: &Checkpoint) -> Result<VerifyReport> {
        let tree_size = checkpoint.tree_size;
        self.require_leaves(checkpoint, "leaf cloning").await?;

        let height = self.geometry.height() as u32;
        let mut tiles_checked = 0;
        let mut nodes_checked = 0;

        for tile_level in 0..self.geometry.level_count(tree_size) {
            let base = tile_level * height;
            for tile in self.geometry.tiles_covering(tile_level, tree_size) {
                self.check_cancelled()?;
                let start = self.geometry.tile_start(&tile);

                let mut row = Vec::with_capacity(tile.width as usize);
                for index in start..start + tile.width as u64 {
                    row.push(self.subtree_from_leaves(base, index).await?);
                }

                // Tiles start on a multiple of 2^height, so each reduction
                // keeps positions aligned with the level above.
                let mut level = base;
                let mut first = start;
                let mut complete = tile.width as u64;
                loop {
                    for (offset, expected) in row.iter().take(complete as usize).enumerate() {
                        self.expect_node(level, first + offset as u64, *expected)
                            .await?;
                    }
                    nodes_checked += complete;

                    complete >>= 1;
                    if complete == 0 || level + 1 >= base + height {
                        break;
                    }
                    row = reduce_level(&row);
                    level += 1;
                    first >>= 1;
                }

                tiles_checked += 1;
                debug!(level = tile_level, tile = tile.index, width = tile.width, "tile verified");
            }
        }

        let root = self.root_from_leaves(tree_size).await?;
        if tree_size > 0 {
            self.expect_node(root_level(tree_size), 0, root).await?;
            nodes_checked += 1;
        }

        info!(tiles = tiles_checked, nodes = nodes_checked, root = %root, "tiles verified");
        Ok(VerifyReport {
            tiles_checked,
            nodes_checked,
            root,
        })
    }

    /// Compare the log's hash tiles with locally computed node hashes
    ///
    /// Requires node hashes for the whole checkpoint. A tile of the wrong
    /// length is malformed; a differing hash is a consistency failure.
    pub async fn compare_remote_tiles(&self, checkpoint: &Checkpoint) -> Result<RemoteTileReport> {
        let tree_size = checkpoint.tree_size;
        let hashed = self.store.watermark(WatermarkKind::Hashed).await?;
        if hashed != tree_size {
            return Err(ConsistencyError::Incomplete {
                stage: "hash computation",
                available: hashed,
                tree_size,
            }
            .into());
        }

        let height = self.geometry.height() as u32;
        let mut report = RemoteTileReport::default();

        for tile_level in 0..self.geometry.level_count(tree_size) {
            let base = tile_level * height;
            let tiles = self.geometry.tiles_covering(tile_level, tree_size);

            let client = &self.client;
            let mut fetches = stream::iter(tiles)
                .map(|tile| async move {
                    client
                        .fetch_tile(TileLevel::Hashes(tile_level), tile)
                        .await
                        .map(|data| (tile, data))
                })
                .buffered(self.config.concurrency);

            loop {
                let next = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(AuditError::Cancelled),
                    next = fetches.next() => next,
                };
                let Some(fetched) = next else { break };
                let (tile, data) = fetched?;

                let expected_len = tile.width as usize * HASH_SIZE;
                if data.len() != expected_len {
                    return Err(AuditError::Malformed(format!(
                        "hash tile {}/{} is {} bytes, expected {}",
                        tile_level,
                        tile.index,
                        data.len(),
                        expected_len
                    )));
                }

                let start = self.geometry.tile_start(&tile);
                for (offset, chunk) in data.chunks_exact(HASH_SIZE).enumerate() {
                    let index = start + offset as u64;
                    let served = Sha256Hash::try_from_slice(chunk)
                        .map_err(|err| AuditError::Malformed(err.to_string()))?;
                    let computed = self.node(base, index).await?;
                    if computed != served {
                        return Err(ConsistencyError::RemoteTileMismatch {
                            level: base,
                            index,
                            computed,
                            served,
                        }
                        .into());
                    }
                }

                report.tiles_compared += 1;
                report.nodes_compared += tile.width as u64;
                debug!(level = tile_level, tile = tile.index, "remote tile matches");
            }
        }

        info!(
            tiles = report.tiles_compared,
            nodes = report.nodes_compared,
            "remote hash tiles match"
        );
        Ok(report)
    }

    /// Hash of the complete subtree at (`level`, `index`), from leaves only
    async fn subtree_from_leaves(&self, level: u32, index: u64) -> Result<Sha256Hash> {
        let first = index << level;
        let mut acc = RootAccumulator::new();
        for leaf_index in first..first + (1u64 << level) {
            acc.push(hash_leaf(&self.leaf(leaf_index).await?));
        }
        Ok(acc.root())
    }

    async fn root_from_leaves(&self, tree_size: u64) -> Result<Sha256Hash> {
        let mut acc = RootAccumulator::new();
        for index in 0..tree_size {
            if index % self.geometry.full_width() as u64 == 0 {
                self.check_cancelled()?;
            }
            acc.push(hash_leaf(&self.leaf(index).await?));
        }
        Ok(acc.root())
    }

    async fn expect_node(&self, level: u32, index: u64, expected: Sha256Hash) -> Result<()> {
        let actual = self.store.get_node_hash(level, index).await?;
        if actual != Some(expected) {
            return Err(CorruptionError {
                level,
                index,
                expected,
                actual,
            }
            .into());
        }
        Ok(())
    }
}
