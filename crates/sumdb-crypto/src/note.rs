//! Signed note parsing and verification
//!
//! A note is UTF-8 text followed by a blank line and one or more signature
//! lines:
//!
//! ```text
//! go.sum database tree
//! 3481944
//! wRcv1f0wLpO/l/9jfShS7T/4+MNZ5jOtp1hnMDaKyp4=
//!
//! — sum.golang.org Az3grlgtaBn7bTNyC5nrDUgGP2AQk8YEIbjiZU59ic5eS7rF...
//! ```
//!
//! Signature lines begin with the Unicode em dash (U+2014), not an ASCII
//! hyphen. Each decoded signature is a 4-byte big-endian key hash followed by
//! the signature bytes. The signed message is the text up to and including
//! the newline before the blank line.

use crate::error::{Error, Result};
use crate::key::{validate_name, VerifierKey};
use base64::Engine;
use sumdb_types::{Checkpoint, CheckpointSignature};

const SIGNATURE_PREFIX: &str = "\u{2014} ";

const ED25519_SIGNATURE_LEN: usize = 64;

/// A single signature line of a note
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteSignature {
    /// The name of the signer
    pub name: String,

    /// Key hash decoded from the first four signature bytes
    pub key_hash: u32,

    /// The signature bytes (after the key hash)
    pub signature: Vec<u8>,
}

impl NoteSignature {
    /// Parse a signature line, without its trailing newline
    pub fn from_line(line: &str) -> Result<Self> {
        let rest = line.strip_prefix(SIGNATURE_PREFIX).ok_or_else(|| {
            Error::MalformedNote(format!(
                "signature line must start with an em dash: {:?}",
                line
            ))
        })?;

        let (name, encoded) = rest.split_once(' ').ok_or_else(|| {
            Error::MalformedNote("signature line must have format: — <name> <base64>".to_string())
        })?;
        validate_name(name)
            .map_err(|_| Error::MalformedNote(format!("invalid signer name {:?}", name)))?;

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| Error::MalformedNote(format!("invalid signature base64: {}", e)))?;
        if decoded.len() < 5 {
            return Err(Error::MalformedNote(
                "signature too short (need a 4-byte key hash and a signature)".to_string(),
            ));
        }

        let key_hash = u32::from_be_bytes([decoded[0], decoded[1], decoded[2], decoded[3]]);
        Ok(NoteSignature {
            name: name.to_string(),
            key_hash,
            signature: decoded[4..].to_vec(),
        })
    }

    /// Encode as a signature line (without trailing newline)
    pub fn to_line(&self) -> String {
        let mut raw = Vec::with_capacity(4 + self.signature.len());
        raw.extend_from_slice(&self.key_hash.to_be_bytes());
        raw.extend_from_slice(&self.signature);
        format!(
            "{}{} {}",
            SIGNATURE_PREFIX,
            self.name,
            base64::engine::general_purpose::STANDARD.encode(raw)
        )
    }
}

/// A note split into its signed text and its signatures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedNote {
    /// The signed text, ending in a newline
    pub text: String,

    /// The signatures, in note order
    pub signatures: Vec<NoteSignature>,
}

impl SignedNote {
    /// Parse a signed note.
    ///
    /// The note is split at the last blank line; everything after it must be
    /// newline-terminated signature lines.
    pub fn from_bytes(note: &[u8]) -> Result<Self> {
        let note = std::str::from_utf8(note)
            .map_err(|e| Error::MalformedNote(format!("note is not UTF-8: {}", e)))?;
        Self::from_text(note)
    }

    /// Parse a signed note from text
    pub fn from_text(note: &str) -> Result<Self> {
        if note.chars().any(|c| c.is_control() && c != '\n') {
            return Err(Error::MalformedNote(
                "note contains control characters".to_string(),
            ));
        }

        let split = note
            .rfind("\n\n")
            .ok_or_else(|| Error::MalformedNote("missing blank line separator".to_string()))?;
        let text = &note[..split + 1];
        let signature_block = &note[split + 2..];

        if !signature_block.ends_with('\n') {
            return Err(Error::MalformedNote(
                "signature block is not newline terminated".to_string(),
            ));
        }

        let signatures = signature_block
            .lines()
            .map(NoteSignature::from_line)
            .collect::<Result<Vec<_>>>()?;
        if signatures.is_empty() {
            return Err(Error::MalformedNote("no signatures found".to_string()));
        }

        Ok(SignedNote {
            text: text.to_string(),
            signatures,
        })
    }

    /// Find the signature made by `key`, matched on name and key hash
    pub fn find_signature(&self, key: &VerifierKey) -> Option<&NoteSignature> {
        self.signatures
            .iter()
            .find(|sig| sig.name == key.name() && sig.key_hash == key.key_hash())
    }

    /// Verify the note against `key` and return the signature that vouched
    /// for it.
    ///
    /// Signatures from other keys are ignored; the note must carry a valid
    /// signature from `key`.
    pub fn verify(&self, key: &VerifierKey) -> Result<&NoteSignature> {
        let signature = self.find_signature(key).ok_or_else(|| {
            Error::Verification(format!(
                "no signature from {}+{:08x}",
                key.name(),
                key.key_hash()
            ))
        })?;
        if signature.signature.len() != ED25519_SIGNATURE_LEN {
            return Err(Error::Verification(format!(
                "Ed25519 signature must be {} bytes, got {}",
                ED25519_SIGNATURE_LEN,
                signature.signature.len()
            )));
        }
        key.verify(self.text.as_bytes(), &signature.signature)?;
        tracing::debug!(signer = %key.name(), "note signature verified");
        Ok(signature)
    }

    /// Verify the note and decode its text as a checkpoint
    pub fn verify_checkpoint(&self, key: &VerifierKey) -> Result<Checkpoint> {
        let signature = self.verify(key)?;
        let checkpoint = Checkpoint::from_body(
            &self.text,
            CheckpointSignature {
                name: signature.name.clone(),
                key_hash: signature.key_hash,
                signature: signature.signature.clone(),
            },
        )?;
        Ok(checkpoint)
    }

    /// Encode the note back into its wire form
    pub fn to_text(&self) -> String {
        let mut note = format!("{}\n", self.text);
        for signature in &self.signatures {
            note.push_str(&signature.to_line());
            note.push('\n');
        }
        note
    }
}

/// Parse a signed note and return the checkpoint it vouches for
pub fn open_checkpoint(note: &[u8], key: &VerifierKey) -> Result<Checkpoint> {
    SignedNote::from_bytes(note)?.verify_checkpoint(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const NOTE: &str = "go.sum database tree\n3481944\nwRcv1f0wLpO/l/9jfShS7T/4+MNZ5jOtp1hnMDaKyp4=\n\n\u{2014} sum.golang.org Az3grlgtaBn7bTNyC5nrDUgGP2AQk8YEIbjiZU59ic5eS7rFlpwOrp9vOu8I5SJcYc6aUJ5YXvgXaA3bIkW8ejVuTwQ=\n";

    #[test]
    fn test_parse_signed_note() {
        let note = SignedNote::from_text(NOTE).unwrap();
        assert_eq!(
            note.text,
            "go.sum database tree\n3481944\nwRcv1f0wLpO/l/9jfShS7T/4+MNZ5jOtp1hnMDaKyp4=\n"
        );
        assert_eq!(note.signatures.len(), 1);
        assert_eq!(note.signatures[0].name, "sum.golang.org");
        assert_eq!(note.signatures[0].key_hash, 0x033de0ae);
        assert_eq!(note.signatures[0].signature.len(), 64);
        assert_eq!(note.to_text(), NOTE);
    }

    #[test]
    fn test_signature_line_roundtrip() {
        let line = NOTE.lines().last().unwrap();
        let signature = NoteSignature::from_line(line).unwrap();
        assert_eq!(signature.to_line(), line);
    }

    #[rstest]
    #[case::no_separator("go.sum database tree\n1\n")]
    #[case::ascii_dash("text\n\n- sum.golang.org Az3grlgt\n")]
    #[case::no_trailing_newline("text\n\n\u{2014} sum.golang.org Az3grlgtaBn7bTNy")]
    #[case::empty_signature_block("text\n\n")]
    #[case::short_signature("text\n\n\u{2014} sum.golang.org AAAA\n")]
    #[case::control_character("te\rxt\n\n\u{2014} sum.golang.org Az3grlgtaBn7bTNy\n")]
    fn test_reject_malformed_note(#[case] note: &str) {
        let err = SignedNote::from_text(note).unwrap_err();
        assert!(matches!(err, Error::MalformedNote(_)), "{:?}", err);
    }

    #[test]
    fn test_unknown_key_is_verification_error() {
        let note = SignedNote::from_text(NOTE).unwrap();
        let signer = crate::NoteSigner::generate("example.com/log").unwrap();
        let err = note.verify(&signer.verifier_key()).unwrap_err();
        assert!(err.is_verification());
    }
}
