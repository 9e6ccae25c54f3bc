//! Root hash check

use sumdb_merkle::{empty_root, root_level};
use sumdb_store::WatermarkKind;
use sumdb_types::{Checkpoint, Sha256Hash};
use tracing::info;

use crate::auditor::Auditor;
use crate::error::{ConsistencyError, Result};

impl Auditor {
    /// Compare the root computed from local leaves with the signed root
    ///
    /// On success the checkpoint becomes the latest verified checkpoint. A
    /// previously verified checkpoint of the same size with a different root
    /// is a fork and fails before anything is compared.
    pub async fn check_root(&self, checkpoint: &Checkpoint) -> Result<Sha256Hash> {
        let tree_size = checkpoint.tree_size;

        let previous = self.store.latest_checkpoint().await?;
        if let Some(previous) = &previous {
            if previous.tree_size == tree_size && previous.root_hash != checkpoint.root_hash {
                return Err(ConsistencyError::Fork {
                    tree_size,
                    verified: previous.root_hash,
                    claimed: checkpoint.root_hash,
                }
                .into());
            }
            if previous.tree_size > tree_size {
                return Err(ConsistencyError::LogShrank {
                    known: previous.tree_size,
                    tree_size,
                }
                .into());
            }
        }

        let level = root_level(tree_size);
        let computed = if tree_size == 0 {
            empty_root()
        } else {
            // Nodes from an older, smaller tree can sit at the same position
            let hashed = self.store.watermark(WatermarkKind::Hashed).await?;
            let stored = if hashed == tree_size {
                self.store.get_node_hash(level, 0).await?
            } else {
                None
            };
            stored.ok_or(ConsistencyError::Incomplete {
                stage: "hash computation",
                available: hashed,
                tree_size,
            })?
        };

        if computed != checkpoint.root_hash {
            return Err(ConsistencyError::RootMismatch {
                tree_size,
                level,
                computed,
                expected: checkpoint.root_hash,
            }
            .into());
        }

        if previous.as_ref() != Some(checkpoint) {
            self.store.put_checkpoint(checkpoint.clone()).await?;
        }
        info!(tree_size, root = %computed, "root hash verified");
        Ok(computed)
    }
}
