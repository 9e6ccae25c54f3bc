//! Audit run context

use std::sync::Arc;

use sumdb_client::LogClient;
use sumdb_merkle::TileGeometry;
use sumdb_store::LocalStore;
use sumdb_types::Checkpoint;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::clone::CloneReport;
use crate::config::AuditConfig;
use crate::error::{AuditError, ConsistencyError, Result};
use crate::hash::HashReport;
use crate::metadata::MetadataReport;
use crate::verify::{RemoteTileReport, VerifyReport};

/// Outcome of a full audit run
#[derive(Debug, Clone)]
pub struct AuditReport {
    /// The checkpoint that was audited
    pub checkpoint: Checkpoint,
    /// Leaf cloning
    pub clone: CloneReport,
    /// Node hash computation
    pub hashes: HashReport,
    /// Metadata processing
    pub metadata: MetadataReport,
    /// Tile re-verification, if enabled
    pub verify: Option<VerifyReport>,
    /// Remote hash tile comparison, if enabled
    pub remote_tiles: Option<RemoteTileReport>,
}

/// Runs the audit stages against one store and one log
///
/// The auditor holds no state of its own between calls: everything it learns
/// goes to the store, and the checkpoint under audit is passed to each stage.
pub struct Auditor {
    pub(crate) store: Arc<dyn LocalStore>,
    pub(crate) client: Arc<dyn LogClient>,
    pub(crate) geometry: TileGeometry,
    pub(crate) config: AuditConfig,
    pub(crate) cancel: CancellationToken,
}

impl Auditor {
    /// Create an auditor
    ///
    /// The client must read the log with the configured tile height.
    pub fn new(
        store: Arc<dyn LocalStore>,
        client: Arc<dyn LogClient>,
        config: AuditConfig,
    ) -> Result<Self> {
        config.validate()?;
        let geometry = config.geometry()?;
        if client.geometry() != geometry {
            return Err(AuditError::Config(format!(
                "client reads tiles of height {}, configuration says {}",
                client.geometry().height(),
                geometry.height()
            )));
        }
        Ok(Self {
            store,
            client,
            geometry,
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels this auditor's stages
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Tile layout in use
    pub fn geometry(&self) -> TileGeometry {
        self.geometry
    }

    /// Configuration in use
    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// The local store
    pub fn store(&self) -> &Arc<dyn LocalStore> {
        &self.store
    }

    /// Fetch and verify the log's latest checkpoint
    pub async fn fetch_checkpoint(&self) -> Result<Checkpoint> {
        self.check_cancelled()?;
        let checkpoint = self.client.fetch_checkpoint().await?;
        info!(
            origin = %checkpoint.origin,
            tree_size = checkpoint.tree_size,
            root = %checkpoint.root_hash,
            "got checkpoint"
        );
        Ok(checkpoint)
    }

    /// Fetch the latest checkpoint and audit the log up to it
    pub async fn run(&self) -> Result<AuditReport> {
        let checkpoint = self.fetch_checkpoint().await?;
        self.run_checkpoint(checkpoint).await
    }

    /// Audit the log up to an already verified checkpoint
    pub async fn run_checkpoint(&self, checkpoint: Checkpoint) -> Result<AuditReport> {
        info!(tree_size = checkpoint.tree_size, "downloading leaves");
        let clone = self.clone_leaves(&checkpoint).await?;

        info!(tree_size = checkpoint.tree_size, "calculating hashes");
        let hashes = self.compute_hashes(&checkpoint).await?;

        self.check_root(&checkpoint).await?;
        info!(
            tree_size = checkpoint.tree_size,
            root = %checkpoint.root_hash,
            "cloned successfully, processing leaf data"
        );

        let metadata = self.process_leaves(&checkpoint).await?;

        let verify = if self.config.extra_verify {
            info!("performing extra validation on tiles");
            Some(self.verify_tiles(&checkpoint).await?)
        } else {
            None
        };

        let remote_tiles = if self.config.remote_tiles {
            info!("comparing hash tiles served by the log");
            Some(self.compare_remote_tiles(&checkpoint).await?)
        } else {
            None
        };

        Ok(AuditReport {
            checkpoint,
            clone,
            hashes,
            metadata,
            verify,
            remote_tiles,
        })
    }

    pub(crate) fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(AuditError::Cancelled);
        }
        Ok(())
    }

    /// Require exactly the checkpoint's leaves to be stored
    pub(crate) async fn require_leaves(
        &self,
        checkpoint: &Checkpoint,
        stage: &'static str,
    ) -> Result<()> {
        let leaf_count = self.store.leaf_count().await?;
        if leaf_count < checkpoint.tree_size {
            return Err(ConsistencyError::Incomplete {
                stage,
                available: leaf_count,
                tree_size: checkpoint.tree_size,
            }
            .into());
        }
        if leaf_count > checkpoint.tree_size {
            return Err(ConsistencyError::LogShrank {
                known: leaf_count,
                tree_size: checkpoint.tree_size,
            }
            .into());
        }
        Ok(())
    }

    pub(crate) async fn leaf(&self, index: u64) -> Result<Vec<u8>> {
        self.store
            .get_leaf(index)
            .await?
            .ok_or_else(|| AuditError::Store(format!("leaf {} is missing", index)))
    }
}

impl std::fmt::Debug for Auditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auditor")
            .field("geometry", &self.geometry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
