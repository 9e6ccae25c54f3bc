//! Independent auditor for tile-based checksum transparency logs
//!
//! The auditor clones every leaf of a log such as `sum.golang.org`,
//! rebuilds the Merkle tree from those leaves and checks that the result is
//! the root the log signed. Anything the log says is re-derived locally
//! rather than trusted.
//!
//! A run is a sequence of stages over one verified checkpoint:
//!
//! 1. [`Auditor::clone_leaves`] downloads data tiles into the local store.
//! 2. [`Auditor::compute_hashes`] derives node hashes level by level.
//! 3. [`Auditor::check_root`] compares the computed root with the checkpoint.
//! 4. [`Auditor::process_leaves`] decodes leaf payloads into metadata.
//! 5. [`Auditor::verify_tiles`] optionally re-checks every tile from leaves.
//! 6. [`Auditor::compare_remote_tiles`] optionally checks the log's own hash
//!    tiles against the local tree.
//!
//! Every stage is resumable: progress lives in the store, so an interrupted
//! run picks up where it stopped.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sumdb_audit::{AuditConfig, Auditor};
//! use sumdb_client::HttpLogClient;
//! use sumdb_store::{FileSystemStore, LocalStore};
//!
//! # async fn example() -> Result<(), sumdb_audit::AuditError> {
//! let config = AuditConfig::default();
//! let store = Arc::new(FileSystemStore::new(&config.db_path)?);
//! store.init().await?;
//! let client = Arc::new(HttpLogClient::new(
//!     config.log_url.clone(),
//!     config.parse_verifier_key()?,
//!     config.geometry()?,
//! ));
//!
//! let auditor = Auditor::new(store, client, config)?;
//! let report = auditor.run().await?;
//! println!("verified {} leaves", report.checkpoint.tree_size);
//! # Ok(())
//! # }
//! ```

mod auditor;
mod clone;
mod config;
mod error;
mod hash;
mod metadata;
mod root;
mod verify;

pub use auditor::{AuditReport, Auditor};
pub use clone::CloneReport;
pub use config::{AuditConfig, DEFAULT_CONCURRENCY, DEFAULT_DB_PATH};
pub use error::{
    AuditError, ConsistencyError, CorruptionError, DecodeWarning, ErrorKind, Result,
};
pub use hash::HashReport;
pub use metadata::MetadataReport;
pub use verify::{RemoteTileReport, VerifyReport};

pub use sumdb_crypto::DEFAULT_VERIFIER_KEY;
