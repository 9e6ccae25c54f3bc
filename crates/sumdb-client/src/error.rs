//! Error types for sumdb-client

use thiserror::Error;

/// Errors that can occur talking to a checksum database
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error or unexpected status
    #[error("HTTP error: {0}")]
    Http(String),

    /// The requested resource does not exist (yet)
    #[error("not found: {0}")]
    NotFound(String),

    /// The checkpoint is not signed by the configured key
    #[error("signature error: {0}")]
    Signature(String),

    /// The response could not be decoded
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<sumdb_crypto::Error> for Error {
    fn from(err: sumdb_crypto::Error) -> Self {
        if err.is_verification() {
            Error::Signature(err.to_string())
        } else {
            Error::Malformed(err.to_string())
        }
    }
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, Error>;
