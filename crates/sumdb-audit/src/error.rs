//! Error types for sumdb-audit

use std::fmt;

use sumdb_types::Sha256Hash;
use thiserror::Error;

/// Errors that abort an audit run
#[derive(Error, Debug)]
pub enum AuditError {
    /// Network failure; rerunning resumes where this run stopped
    #[error("transport error: {0}")]
    Transport(String),

    /// The checkpoint is not signed by the configured key
    #[error("signature error: {0}")]
    Signature(String),

    /// The log served data that could not be decoded
    #[error("malformed data: {0}")]
    Malformed(String),

    /// The log contradicts itself or what it served before
    #[error("consistency error: {0}")]
    Consistency(#[from] ConsistencyError),

    /// Local data no longer matches what the leaves imply
    #[error("corruption: {0}")]
    Corruption(#[from] CorruptionError),

    /// The log does not serve a resource it should
    #[error("not found: {0}")]
    NotFound(String),

    /// Local store failure
    #[error("store error: {0}")]
    Store(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The run was cancelled
    #[error("audit cancelled")]
    Cancelled,
}

/// Ways the log can be caught contradicting itself
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyError {
    /// A leaf the log serves differs from the copy cloned earlier
    #[error("leaf {index} changed: stored leaf hash {stored}, log now serves {served}")]
    LeafMismatch {
        /// Leaf index
        index: u64,
        /// Leaf hash of the stored copy
        stored: Sha256Hash,
        /// Leaf hash of the newly served copy
        served: Sha256Hash,
    },

    /// The root computed from the leaves is not the signed root
    #[error(
        "root mismatch at tree size {tree_size}: level {level} computes {computed}, checkpoint says {expected}"
    )]
    RootMismatch {
        /// Checkpoint tree size
        tree_size: u64,
        /// Tree level of the root
        level: u32,
        /// Root computed from local leaves
        computed: Sha256Hash,
        /// Root signed in the checkpoint
        expected: Sha256Hash,
    },

    /// The log now claims fewer leaves than are already known
    #[error("log shrank: {known} leaves already known, checkpoint has {tree_size}")]
    LogShrank {
        /// Leaves (or tree size) already known locally
        known: u64,
        /// Checkpoint tree size
        tree_size: u64,
    },

    /// Two signed checkpoints disagree on the root for one size
    #[error("fork at tree size {tree_size}: verified root {verified}, new checkpoint says {claimed}")]
    Fork {
        /// The shared tree size
        tree_size: u64,
        /// Root of the previously verified checkpoint
        verified: Sha256Hash,
        /// Root of the new checkpoint
        claimed: Sha256Hash,
    },

    /// A hash tile served by the log disagrees with its own leaves
    #[error("log serves node ({level}, {index}) = {served}, leaves give {computed}")]
    RemoteTileMismatch {
        /// Tree level
        level: u32,
        /// Position within the level
        index: u64,
        /// Hash computed locally
        computed: Sha256Hash,
        /// Hash served in the tile
        served: Sha256Hash,
    },

    /// A stage ran before the stages it depends on completed
    #[error("{stage} incomplete: {available} of {tree_size} available")]
    Incomplete {
        /// What is missing
        stage: &'static str,
        /// How far the prerequisite got
        available: u64,
        /// Checkpoint tree size
        tree_size: u64,
    },
}

/// A stored node hash that does not match its recomputation from leaves
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct CorruptionError {
    /// Tree level
    pub level: u32,
    /// Position within the level
    pub index: u64,
    /// Hash recomputed from raw leaves
    pub expected: Sha256Hash,
    /// Hash found in the store, if any
    pub actual: Option<Sha256Hash>,
}

impl fmt::Display for CorruptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.actual {
            Some(actual) => write!(
                f,
                "node ({}, {}) is stored as {} but leaves give {}",
                self.level, self.index, actual, self.expected
            ),
            None => write!(
                f,
                "node ({}, {}) is missing, leaves give {}",
                self.level, self.index, self.expected
            ),
        }
    }
}

/// Coarse classification of an [`AuditError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network failure
    Transport,
    /// Checkpoint signature did not verify
    Signature,
    /// Undecodable data from the log
    Malformed,
    /// The log contradicts itself
    Consistency,
    /// Local data is corrupt
    Corruption,
    /// Resource missing from the log
    NotFound,
    /// Local store failure
    Store,
    /// Invalid configuration
    Config,
    /// Cancelled
    Cancelled,
}

impl ErrorKind {
    /// Process exit code for this kind of failure
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::Transport | ErrorKind::NotFound | ErrorKind::Store | ErrorKind::Config => 1,
            ErrorKind::Signature | ErrorKind::Malformed => 2,
            ErrorKind::Consistency => 3,
            ErrorKind::Corruption => 4,
            ErrorKind::Cancelled => 130,
        }
    }

    /// Short label for diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Signature => "signature",
            ErrorKind::Malformed => "malformed",
            ErrorKind::Consistency => "INCONSISTENCY",
            ErrorKind::Corruption => "corruption",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Store => "store",
            ErrorKind::Config => "config",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl AuditError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuditError::Transport(_) => ErrorKind::Transport,
            AuditError::Signature(_) => ErrorKind::Signature,
            AuditError::Malformed(_) => ErrorKind::Malformed,
            AuditError::Consistency(_) => ErrorKind::Consistency,
            AuditError::Corruption(_) => ErrorKind::Corruption,
            AuditError::NotFound(_) => ErrorKind::NotFound,
            AuditError::Store(_) => ErrorKind::Store,
            AuditError::Config(_) => ErrorKind::Config,
            AuditError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl From<sumdb_client::Error> for AuditError {
    fn from(err: sumdb_client::Error) -> Self {
        match err {
            sumdb_client::Error::Http(msg) => AuditError::Transport(msg),
            sumdb_client::Error::NotFound(msg) => AuditError::NotFound(msg),
            sumdb_client::Error::Signature(msg) => AuditError::Signature(msg),
            sumdb_client::Error::Malformed(msg) => AuditError::Malformed(msg),
        }
    }
}

impl From<sumdb_store::Error> for AuditError {
    fn from(err: sumdb_store::Error) -> Self {
        AuditError::Store(err.to_string())
    }
}

impl From<sumdb_merkle::Error> for AuditError {
    fn from(err: sumdb_merkle::Error) -> Self {
        AuditError::Config(err.to_string())
    }
}

/// A leaf whose payload could not be decoded into records
///
/// Never fatal: the leaf stays part of the verified tree, it just
/// contributes no metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeWarning {
    /// Leaf index
    pub leaf_index: u64,
    /// 1-based line within the leaf (0 if the leaf as a whole is unusable)
    pub line: usize,
    /// What was wrong
    pub reason: String,
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "leaf {} line {}: {}", self.leaf_index, self.line, self.reason)
    }
}

/// Result type for audit operations
pub type Result<T> = std::result::Result<T, AuditError>;
