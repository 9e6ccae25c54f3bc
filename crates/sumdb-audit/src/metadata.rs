//! Leaf metadata extraction

use sumdb_store::WatermarkKind;
use sumdb_types::{parse_records, Checkpoint};
use tracing::{debug, info, warn};

use crate::auditor::Auditor;
use crate::error::{DecodeWarning, Result};

/// Outcome of [`Auditor::process_leaves`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataReport {
    /// Leaves decoded in this run (including those that failed to decode)
    pub leaves_processed: u64,
    /// Records stored
    pub records_stored: u64,
    /// Leaves that could not be decoded
    pub warnings: Vec<DecodeWarning>,
}

impl Auditor {
    /// Decode every leaf not yet processed into metadata records
    ///
    /// Malformed payloads are reported as warnings and skipped. The metadata
    /// watermark advances after each tile.
    pub async fn process_leaves(&self, checkpoint: &Checkpoint) -> Result<MetadataReport> {
        let tree_size = checkpoint.tree_size;
        self.require_leaves(checkpoint, "leaf cloning").await?;

        let mut report = MetadataReport::default();
        let start = self.store.watermark(WatermarkKind::Metadata).await?;
        if start >= tree_size {
            debug!(tree_size, "metadata up to date");
            return Ok(report);
        }

        for tile in self.geometry.tiles_covering_range(0, start, tree_size) {
            self.check_cancelled()?;
            let tile_start = self.geometry.tile_start(&tile);
            let end = tile_start + tile.width as u64;

            for index in tile_start.max(start)..end {
                let data = self.leaf(index).await?;
                match parse_records(index, &data) {
                    Ok(records) => {
                        report.records_stored += records.len() as u64;
                        self.store.put_metadata(index, records).await?;
                    }
                    Err(err) => {
                        let warning = match err {
                            sumdb_types::Error::InvalidRecord { line, reason } => DecodeWarning {
                                leaf_index: index,
                                line,
                                reason,
                            },
                            other => DecodeWarning {
                                leaf_index: index,
                                line: 0,
                                reason: other.to_string(),
                            },
                        };
                        warn!(
                            leaf = warning.leaf_index,
                            line = warning.line,
                            reason = %warning.reason,
                            "failed to decode leaf"
                        );
                        report.warnings.push(warning);
                    }
                }
                report.leaves_processed += 1;
            }

            self.store
                .set_watermark(WatermarkKind::Metadata, end)
                .await?;
        }

        info!(
            leaves = report.leaves_processed,
            records = report.records_stored,
            warnings = report.warnings.len(),
            "leaf data processed"
        );
        Ok(report)
    }
}
