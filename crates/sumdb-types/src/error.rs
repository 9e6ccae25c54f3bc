//! Error types for sumdb-types

use thiserror::Error;

/// Errors that can occur in sumdb-types
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid encoding (hex, base64 or length)
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Invalid checkpoint format
    #[error("Invalid checkpoint format: {0}")]
    InvalidCheckpoint(String),

    /// A leaf payload line that is not a valid checksum record
    #[error("Invalid record on line {line}: {reason}")]
    InvalidRecord { line: usize, reason: String },
}

/// Result type for sumdb-types operations
pub type Result<T> = std::result::Result<T, Error>;
