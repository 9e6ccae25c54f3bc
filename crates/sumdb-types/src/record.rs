//! Checksum records decoded from leaf payloads
//!
//! Each leaf of a checksum database is a short text block, one line per
//! hashed artifact:
//!
//! ```text
//! golang.org/x/text v0.3.0 h1:g61tztE5qeGQ89tm6NTjjM9VPIm088od1l6aSorWRWg=
//! golang.org/x/text v0.3.0/go.mod h1:NqM8EUOU14njkJ3fqMW+pc6Ldnwhi/IjpwHt7yyuwOQ=
//! ```

use crate::encoding::Sha256Hash;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Hash algorithm prefix accepted in records
const HASH_PREFIX: &str = "h1:";

/// Version suffix marking a go.mod-only record
const GO_MOD_SUFFIX: &str = "/go.mod";

/// What a record line hashes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordKind {
    /// The full module zip
    Module,
    /// Only the module's go.mod file
    GoMod,
}

/// One decoded line of a leaf payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    /// Leaf the record was decoded from
    pub leaf_index: u64,
    /// Module path
    pub module: String,
    /// Module version, without the `/go.mod` suffix
    pub version: String,
    /// Which artifact the hash covers
    pub kind: RecordKind,
    /// The `h1:` hash value
    pub value_hash: Sha256Hash,
}

/// Decode a leaf payload into its records
///
/// The payload must be UTF-8 and newline terminated. A leaf either decodes
/// completely or not at all; the error names the first offending line
/// (1-based).
pub fn parse_records(leaf_index: u64, data: &[u8]) -> Result<Vec<MetadataRecord>> {
    let text = std::str::from_utf8(data).map_err(|e| Error::InvalidRecord {
        line: 0,
        reason: format!("payload is not UTF-8: {}", e),
    })?;

    if text.is_empty() {
        return Err(Error::InvalidRecord {
            line: 0,
            reason: "empty payload".to_string(),
        });
    }
    if !text.ends_with('\n') {
        return Err(Error::InvalidRecord {
            line: text.lines().count(),
            reason: "payload is not newline terminated".to_string(),
        });
    }

    text.lines()
        .enumerate()
        .map(|(i, line)| {
            parse_line(leaf_index, line).map_err(|reason| Error::InvalidRecord {
                line: i + 1,
                reason,
            })
        })
        .collect()
}

fn parse_line(leaf_index: u64, line: &str) -> std::result::Result<MetadataRecord, String> {
    let fields: Vec<&str> = line.split(' ').collect();
    if fields.len() != 3 || fields.iter().any(|f| f.is_empty()) {
        return Err(format!(
            "expected `<module> <version> h1:<hash>`, got {:?}",
            line
        ));
    }

    let module = fields[0];
    let (version, kind) = match fields[1].strip_suffix(GO_MOD_SUFFIX) {
        Some(version) => (version, RecordKind::GoMod),
        None => (fields[1], RecordKind::Module),
    };
    if version.is_empty() {
        return Err("empty version".to_string());
    }

    let encoded = fields[2]
        .strip_prefix(HASH_PREFIX)
        .ok_or_else(|| format!("unsupported hash algorithm in {:?}", fields[2]))?;
    let value_hash = Sha256Hash::from_base64(encoded).map_err(|e| e.to_string())?;

    Ok(MetadataRecord {
        leaf_index,
        module: module.to_string(),
        version: version.to_string(),
        kind,
        value_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const TEXT_LEAF: &str = "golang.org/x/text v0.3.0 h1:g61tztE5qeGQ89tm6NTjjM9VPIm088od1l6aSorWRWg=\n\
golang.org/x/text v0.3.0/go.mod h1:NqM8EUOU14njkJ3fqMW+pc6Ldnwhi/IjpwHt7yyuwOQ=\n";

    #[test]
    fn test_parse_module_and_go_mod() {
        let records = parse_records(42, TEXT_LEAF.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].leaf_index, 42);
        assert_eq!(records[0].module, "golang.org/x/text");
        assert_eq!(records[0].version, "v0.3.0");
        assert_eq!(records[0].kind, RecordKind::Module);
        assert_eq!(
            records[0].value_hash.to_base64(),
            "g61tztE5qeGQ89tm6NTjjM9VPIm088od1l6aSorWRWg="
        );

        assert_eq!(records[1].version, "v0.3.0");
        assert_eq!(records[1].kind, RecordKind::GoMod);
    }

    #[rstest]
    #[case::not_terminated(b"golang.org/x/text v0.3.0 h1:g61tztE5qeGQ89tm6NTjjM9VPIm088od1l6aSorWRWg=".as_slice(), 1)]
    #[case::wrong_algorithm(b"golang.org/x/text v0.3.0 h2:g61tztE5qeGQ89tm6NTjjM9VPIm088od1l6aSorWRWg=\n".as_slice(), 1)]
    #[case::short_hash(b"golang.org/x/text v0.3.0 h1:AAAA\n".as_slice(), 1)]
    #[case::missing_field(b"golang.org/x/text h1:g61tztE5qeGQ89tm6NTjjM9VPIm088od1l6aSorWRWg=\n".as_slice(), 1)]
    #[case::bad_second_line(b"golang.org/x/text v0.3.0 h1:g61tztE5qeGQ89tm6NTjjM9VPIm088od1l6aSorWRWg=\ngarbage\n".as_slice(), 2)]
    #[case::not_utf8(b"\xff\xfe\n".as_slice(), 0)]
    #[case::empty(b"".as_slice(), 0)]
    fn test_reject_malformed(#[case] data: &[u8], #[case] expected_line: usize) {
        match parse_records(0, data) {
            Err(Error::InvalidRecord { line, .. }) => assert_eq!(line, expected_line),
            other => panic!("expected InvalidRecord, got {:?}", other),
        }
    }
}
