//! Signed notes and verifier keys for checksum database checkpoints
//!
//! This crate parses the note format of `golang.org/x/mod/sumdb/note`,
//! verifies Ed25519 note signatures using aws-lc-rs as the cryptographic
//! backend, and signs notes for test fixtures.

pub mod error;
pub mod key;
pub mod note;
pub mod signing;

pub use error::{Error, Result};
pub use key::{compute_key_hash, VerifierKey, ALG_ED25519, DEFAULT_VERIFIER_KEY};
pub use note::{open_checkpoint, NoteSignature, SignedNote};
pub use signing::NoteSigner;
