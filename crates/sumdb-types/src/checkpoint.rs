//! Checkpoint (signed tree head) types
//!
//! A checkpoint is the log's signed statement of its current size and root
//! hash. The body is the text format used by `golang.org/x/mod/sumdb/tlog`:
//!
//! ```text
//! <origin>
//! <tree_size>
//! <root_hash_base64>
//! [other_content...]
//! ```

use crate::encoding::{base64_bytes, Sha256Hash};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// A checkpoint whose signature has been verified against a known key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// The origin string identifying the log (e.g. "go.sum database tree")
    pub origin: String,
    /// Tree size (number of leaves)
    pub tree_size: u64,
    /// Root hash of the Merkle tree
    pub root_hash: Sha256Hash,
    /// Extension lines following the root hash
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other_content: Vec<String>,
    /// The signature that was verified
    pub signature: CheckpointSignature,
}

/// The signature line that vouched for a checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointSignature {
    /// Signer name (e.g. "sum.golang.org")
    pub name: String,
    /// Key hash identifying the signing key
    pub key_hash: u32,
    /// Raw signature bytes (without the key hash prefix)
    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
}

impl Checkpoint {
    /// Build a checkpoint from a note body and the signature that verified it
    pub fn from_body(body: &str, signature: CheckpointSignature) -> Result<Self> {
        let mut lines = body.lines();

        let origin = lines
            .next()
            .filter(|line| !line.is_empty())
            .ok_or_else(|| Error::InvalidCheckpoint("missing origin".to_string()))?
            .to_string();

        let tree_size_str = lines
            .next()
            .ok_or_else(|| Error::InvalidCheckpoint("missing tree size".to_string()))?;
        let tree_size = parse_tree_size(tree_size_str)?;

        let root_hash_b64 = lines
            .next()
            .ok_or_else(|| Error::InvalidCheckpoint("missing root hash".to_string()))?;
        let root_hash = Sha256Hash::from_base64(root_hash_b64)
            .map_err(|e| Error::InvalidCheckpoint(format!("invalid root hash: {}", e)))?;

        let mut other_content = Vec::new();
        for line in lines {
            if line.is_empty() {
                return Err(Error::InvalidCheckpoint(
                    "unexpected blank line in checkpoint body".to_string(),
                ));
            }
            other_content.push(line.to_string());
        }

        Ok(Checkpoint {
            origin,
            tree_size,
            root_hash,
            other_content,
            signature,
        })
    }

    /// Encode the checkpoint body (the signed text, without signatures)
    pub fn to_signed_note_body(&self) -> String {
        let mut result = format!(
            "{}\n{}\n{}\n",
            self.origin,
            self.tree_size,
            self.root_hash.to_base64()
        );

        for line in &self.other_content {
            result.push_str(line);
            result.push('\n');
        }

        result
    }

    /// Whether the checkpoint describes the empty tree
    pub fn is_empty(&self) -> bool {
        self.tree_size == 0
    }
}

/// Tree sizes are canonical decimal: no sign, no leading zeros.
fn parse_tree_size(s: &str) -> Result<u64> {
    let canonical = !s.is_empty()
        && s.bytes().all(|b| b.is_ascii_digit())
        && (s == "0" || !s.starts_with('0'));
    if !canonical {
        return Err(Error::InvalidCheckpoint(format!("invalid tree size: {:?}", s)));
    }
    s.parse()
        .map_err(|_| Error::InvalidCheckpoint(format!("tree size out of range: {}", s)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn signature() -> CheckpointSignature {
        CheckpointSignature {
            name: "sum.golang.org".to_string(),
            key_hash: 0x033de0ae,
            signature: vec![7u8; 64],
        }
    }

    #[test]
    fn test_parse_checkpoint_body() {
        let body = "go.sum database tree\n3481944\nwRcv1f0wLpO/l/9jfShS7T/4+MNZ5jOtp1hnMDaKyp4=\n";

        let checkpoint = Checkpoint::from_body(body, signature()).unwrap();
        assert_eq!(checkpoint.origin, "go.sum database tree");
        assert_eq!(checkpoint.tree_size, 3481944);
        assert!(checkpoint.other_content.is_empty());
        assert_eq!(checkpoint.to_signed_note_body(), body);
    }

    #[test]
    fn test_parse_checkpoint_extension_lines() {
        let body = "example.com/log\n7\n47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=\nTimestamp: 1689177396\n";

        let checkpoint = Checkpoint::from_body(body, signature()).unwrap();
        assert_eq!(checkpoint.other_content, vec!["Timestamp: 1689177396"]);
        assert_eq!(checkpoint.to_signed_note_body(), body);
    }

    #[rstest]
    #[case::missing_origin("")]
    #[case::missing_size("go.sum database tree\n")]
    #[case::negative_size("go.sum database tree\n-1\n47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=\n")]
    #[case::leading_zero("go.sum database tree\n07\n47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=\n")]
    #[case::short_hash("go.sum database tree\n7\nAAAA\n")]
    #[case::missing_hash("go.sum database tree\n7\n")]
    fn test_reject_malformed_body(#[case] body: &str) {
        assert!(Checkpoint::from_body(body, signature()).is_err());
    }

    #[test]
    fn test_checkpoint_serde_roundtrip() {
        let body = "go.sum database tree\n0\n47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=\n";
        let checkpoint = Checkpoint::from_body(body, signature()).unwrap();
        assert!(checkpoint.is_empty());

        let json = serde_json::to_string(&checkpoint).unwrap();
        let decoded: Checkpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, checkpoint);
    }
}
