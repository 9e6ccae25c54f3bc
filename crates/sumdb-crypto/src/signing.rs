//! Note signing using aws-lc-rs
//!
//! The auditor never signs anything for a real log; signers exist so that
//! test logs can publish checkpoints that verify like the real thing.

use crate::error::{Error, Result};
use crate::key::{validate_name, VerifierKey};
use crate::note::{NoteSignature, SignedNote};
use aws_lc_rs::{
    rand::SystemRandom,
    signature::{Ed25519KeyPair, KeyPair as AwsKeyPair},
};
use sumdb_types::Sha256Hash;

/// An Ed25519 note signer
pub struct NoteSigner {
    verifier_key: VerifierKey,
    key_pair: Ed25519KeyPair,
}

impl NoteSigner {
    /// Generate a signer with a fresh Ed25519 key
    pub fn generate(name: &str) -> Result<Self> {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng)
            .map_err(|_| Error::KeyGeneration("failed to generate Ed25519 key".to_string()))?;
        Self::from_pkcs8(name, pkcs8.as_ref())
    }

    /// Load a signer from a PKCS#8 encoded Ed25519 key
    pub fn from_pkcs8(name: &str, pkcs8: &[u8]) -> Result<Self> {
        validate_name(name)?;
        let key_pair = Ed25519KeyPair::from_pkcs8(pkcs8)?;
        let verifier_key = VerifierKey::from_public_key(name, key_pair.public_key().as_ref())?;
        Ok(Self {
            verifier_key,
            key_pair,
        })
    }

    /// The key that verifies this signer's notes
    pub fn verifier_key(&self) -> VerifierKey {
        self.verifier_key.clone()
    }

    /// Sign note text, which must be non-empty and end in a newline
    pub fn sign(&self, text: &str) -> Result<SignedNote> {
        if text.is_empty() || !text.ends_with('\n') {
            return Err(Error::MalformedNote(
                "note text must end with a newline".to_string(),
            ));
        }
        if text.contains("\n\n") {
            return Err(Error::MalformedNote(
                "note text must not contain blank lines".to_string(),
            ));
        }

        let signature = self.key_pair.sign(text.as_bytes());
        Ok(SignedNote {
            text: text.to_string(),
            signatures: vec![NoteSignature {
                name: self.verifier_key.name().to_string(),
                key_hash: self.verifier_key.key_hash(),
                signature: signature.as_ref().to_vec(),
            }],
        })
    }

    /// Sign a checkpoint body and return the encoded note
    pub fn sign_checkpoint(
        &self,
        origin: &str,
        tree_size: u64,
        root_hash: &Sha256Hash,
    ) -> Result<String> {
        let body = format!("{}\n{}\n{}\n", origin, tree_size, root_hash.to_base64());
        Ok(self.sign(&body)?.to_text())
    }
}

impl std::fmt::Debug for NoteSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoteSigner")
            .field("verifier_key", &self.verifier_key)
            .finish_non_exhaustive()
    }
}
