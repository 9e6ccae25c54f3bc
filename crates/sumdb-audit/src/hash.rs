//! Node hash computation
//!
//! Levels are built bottom up. Hashes are cached between runs: a node whose
//! whole tile group lay below the hashed watermark on an earlier run can
//! never change, while nodes from the group holding the watermark onward may
//! have been promoted from an incomplete subtree and are recomputed.

use sumdb_merkle::{hash_children, hash_leaf, level_sizes, Tile};
use sumdb_store::WatermarkKind;
use sumdb_types::{Checkpoint, Sha256Hash};
use tracing::{debug, info};

use crate::auditor::Auditor;
use crate::error::{AuditError, ConsistencyError, Result};

/// Outcome of [`Auditor::compute_hashes`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HashReport {
    /// Number of tree levels, root included
    pub levels: usize,
    /// Node hashes computed in this run
    pub nodes_written: u64,
}

impl Auditor {
    /// Derive every node hash of the checkpoint's tree from stored leaves
    ///
    /// Requires all leaves up to the tree size. Once every level is durable
    /// the hashed watermark moves to the tree size.
    pub async fn compute_hashes(&self, checkpoint: &Checkpoint) -> Result<HashReport> {
        let tree_size = checkpoint.tree_size;
        self.require_leaves(checkpoint, "leaf cloning").await?;

        let hashed = self.store.watermark(WatermarkKind::Hashed).await?;
        if hashed > tree_size {
            return Err(ConsistencyError::LogShrank {
                known: hashed,
                tree_size,
            }
            .into());
        }

        let sizes = level_sizes(tree_size);
        let mut report = HashReport {
            levels: sizes.len(),
            nodes_written: 0,
        };
        if tree_size == 0 {
            return Ok(report);
        }

        for (level, &count) in sizes.iter().enumerate() {
            let level = level as u32;
            let child_count = if level == 0 { 0 } else { sizes[level as usize - 1] };

            // Groups that end at or before the first unsealed position
            let frontier = hashed >> level;
            let sealed_end = (frontier >> self.geometry.height()) << self.geometry.height();

            let mut written = 0;
            for group in self.geometry.tiles_for_positions(0, count) {
                self.check_cancelled()?;
                let end = self.geometry.tile_start(&group) + group.width as u64;
                let sealed = self.geometry.is_full(&group) && end <= sealed_end;
                written += self.hash_group(level, group, sealed, child_count).await?;
            }

            debug!(level, nodes = count, written, "level hashed");
            report.nodes_written += written;
        }

        self.store
            .set_watermark(WatermarkKind::Hashed, tree_size)
            .await?;
        info!(
            tree_size,
            levels = report.levels,
            nodes_written = report.nodes_written,
            "hashes updated"
        );
        Ok(report)
    }

    /// Hash the nodes of one group at `level`, returning how many were written
    ///
    /// In a sealed group only missing nodes are computed.
    async fn hash_group(
        &self,
        level: u32,
        group: Tile,
        sealed: bool,
        child_count: u64,
    ) -> Result<u64> {
        let start = self.geometry.tile_start(&group);
        let mut written = 0;
        for index in start..start + group.width as u64 {
            if sealed && self.store.get_node_hash(level, index).await?.is_some() {
                continue;
            }
            let hash = self.compute_node(level, index, child_count).await?;
            self.store.put_node_hash(level, index, hash).await?;
            written += 1;
        }
        Ok(written)
    }

    /// Hash one node from its children (or its leaf at level 0)
    async fn compute_node(&self, level: u32, index: u64, child_count: u64) -> Result<Sha256Hash> {
        if level == 0 {
            return Ok(hash_leaf(&self.leaf(index).await?));
        }

        let left_index = 2 * index;
        let right_index = left_index + 1;
        let left = self.node(level - 1, left_index).await?;
        if right_index < child_count {
            let right = self.node(level - 1, right_index).await?;
            Ok(hash_children(&left, &right))
        } else {
            Ok(left)
        }
    }

    pub(crate) async fn node(&self, level: u32, index: u64) -> Result<Sha256Hash> {
        self.store
            .get_node_hash(level, index)
            .await?
            .ok_or_else(|| {
                AuditError::Store(format!("node hash ({}, {}) is missing", level, index))
            })
    }
}
