//! Core types and data structures for sumdb-audit
//!
//! This crate provides the data model shared by every stage of the audit:
//! SHA-256 hashes, signed checkpoints, leaves, derived node hashes and the
//! metadata records decoded from leaf payloads.

pub mod checkpoint;
pub mod encoding;
pub mod error;
pub mod leaf;
pub mod record;

pub use checkpoint::{Checkpoint, CheckpointSignature};
pub use encoding::{base64_bytes, Sha256Hash};
pub use error::{Error, Result};
pub use leaf::{Leaf, NodeHash};
pub use record::{parse_records, MetadataRecord, RecordKind};
