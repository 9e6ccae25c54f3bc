//! Error types for sumdb-crypto

use thiserror::Error;

/// Errors that can occur in note and key handling
#[derive(Error, Debug)]
pub enum Error {
    /// Key generation error
    #[error("Key generation error: {0}")]
    KeyGeneration(String),

    /// Signature did not verify, or no signature from the expected key
    #[error("Verification error: {0}")]
    Verification(String),

    /// Invalid verifier or signer key
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    /// Note text or signature lines are malformed
    #[error("Malformed note: {0}")]
    MalformedNote(String),

    /// Base64 error
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The signed body is not a valid checkpoint
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] sumdb_types::Error),
}

impl Error {
    /// Whether the note was well formed but not vouched for by the key
    pub fn is_verification(&self) -> bool {
        matches!(self, Error::Verification(_))
    }
}

impl From<aws_lc_rs::error::KeyRejected> for Error {
    fn from(e: aws_lc_rs::error::KeyRejected) -> Self {
        Error::InvalidKeyFormat(e.to_string())
    }
}

/// Result type for note operations
pub type Result<T> = std::result::Result<T, Error>;
