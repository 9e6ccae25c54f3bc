//! Verifier keys
//!
//! A verifier key names a signer and carries its public key:
//!
//! ```text
//! <name>+<key_hash_hex>+<base64(algorithm || public_key)>
//! ```
//!
//! The key hash is the first four bytes (big endian) of
//! `SHA-256(name || "\n" || algorithm || public_key)`. It is repeated at the
//! start of every signature so that verifiers can pick the matching key.

use crate::error::{Error, Result};
use aws_lc_rs::digest::{Context, SHA256};
use aws_lc_rs::signature::{UnparsedPublicKey, ED25519};
use base64::Engine;
use std::fmt;
use std::str::FromStr;

/// Algorithm byte for Ed25519 keys
pub const ALG_ED25519: u8 = 0x01;

/// The published verifier key of sum.golang.org
pub const DEFAULT_VERIFIER_KEY: &str =
    "sum.golang.org+033de0ae+Ac4zctda0e5eza+HJyk9SxEdh+s3Ux18htTTAD8OuAn8";

const ED25519_PUBLIC_KEY_LEN: usize = 32;

/// A parsed Ed25519 verifier key
#[derive(Clone, PartialEq, Eq)]
pub struct VerifierKey {
    name: String,
    key_hash: u32,
    public_key: Vec<u8>,
}

impl VerifierKey {
    /// Parse a key in `name+hash+base64` form
    pub fn parse(text: &str) -> Result<Self> {
        let mut parts = text.splitn(3, '+');
        let (name, hash_hex, encoded) = match (parts.next(), parts.next(), parts.next()) {
            (Some(name), Some(hash_hex), Some(encoded)) => (name, hash_hex, encoded),
            _ => {
                return Err(Error::InvalidKeyFormat(format!(
                    "expected <name>+<hash>+<key>, got {:?}",
                    text
                )))
            }
        };

        if hash_hex.len() != 8 {
            return Err(Error::InvalidKeyFormat(format!(
                "key hash must be 8 hex digits, got {:?}",
                hash_hex
            )));
        }
        let key_hash = u32::from_str_radix(hash_hex, 16)
            .map_err(|e| Error::InvalidKeyFormat(format!("invalid key hash: {}", e)))?;

        let raw = base64::engine::general_purpose::STANDARD.decode(encoded)?;
        let (algorithm, public_key) = raw
            .split_first()
            .ok_or_else(|| Error::InvalidKeyFormat("empty key".to_string()))?;
        if *algorithm != ALG_ED25519 {
            return Err(Error::InvalidKeyFormat(format!(
                "unsupported key algorithm {:#04x}",
                algorithm
            )));
        }

        let key = Self::from_public_key(name, public_key)?;
        if key.key_hash != key_hash {
            return Err(Error::InvalidKeyFormat(format!(
                "key hash {:08x} does not match key (expected {:08x})",
                key_hash, key.key_hash
            )));
        }
        Ok(key)
    }

    /// Build a verifier key from a signer name and raw Ed25519 public key
    pub fn from_public_key(name: &str, public_key: &[u8]) -> Result<Self> {
        validate_name(name)?;
        if public_key.len() != ED25519_PUBLIC_KEY_LEN {
            return Err(Error::InvalidKeyFormat(format!(
                "Ed25519 public key must be {} bytes, got {}",
                ED25519_PUBLIC_KEY_LEN,
                public_key.len()
            )));
        }
        Ok(Self {
            name: name.to_string(),
            key_hash: compute_key_hash(name, public_key),
            public_key: public_key.to_vec(),
        })
    }

    /// The signer name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The 32-bit key hash
    pub fn key_hash(&self) -> u32 {
        self.key_hash
    }

    /// Raw Ed25519 public key bytes
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Verify an Ed25519 signature over `message`
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        UnparsedPublicKey::new(&ED25519, &self.public_key)
            .verify(message, signature)
            .map_err(|_| Error::Verification(format!("invalid signature by {}", self.name)))
    }
}

impl fmt::Display for VerifierKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut raw = Vec::with_capacity(1 + self.public_key.len());
        raw.push(ALG_ED25519);
        raw.extend_from_slice(&self.public_key);
        write!(
            f,
            "{}+{:08x}+{}",
            self.name,
            self.key_hash,
            base64::engine::general_purpose::STANDARD.encode(raw)
        )
    }
}

impl fmt::Debug for VerifierKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VerifierKey").field(&self.to_string()).finish()
    }
}

impl FromStr for VerifierKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Compute the key hash of an Ed25519 key
pub fn compute_key_hash(name: &str, public_key: &[u8]) -> u32 {
    let mut context = Context::new(&SHA256);
    context.update(name.as_bytes());
    context.update(b"\n");
    context.update(&[ALG_ED25519]);
    context.update(public_key);
    let digest = context.finish();
    let bytes = digest.as_ref();
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Signer names are non-empty and contain no whitespace or `+`
pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('+') || name.chars().any(char::is_whitespace) {
        return Err(Error::InvalidKeyFormat(format!("invalid signer name {:?}", name)));
    }
    Ok(())
}
