//! Data tile framing
//!
//! A data tile is the concatenation of its leaf records, each of which ends
//! in a newline, with one extra newline between records. Splitting on the
//! blank lines and restoring the newline the split consumed yields the exact
//! bytes the log hashed.

use crate::error::{Error, Result};

/// Split a data tile into exactly `width` leaves
pub fn decode_data_tile(data: &[u8], width: u32) -> Result<Vec<Vec<u8>>> {
    if data.is_empty() || !data.ends_with(b"\n") {
        return Err(Error::Malformed(
            "data tile must end with a newline".to_string(),
        ));
    }

    let mut leaves = Vec::with_capacity(width as usize);
    let mut start = 0;
    let mut i = 0;
    while i + 1 < data.len() {
        if data[i] == b'\n' && data[i + 1] == b'\n' {
            leaves.push(data[start..=i].to_vec());
            start = i + 2;
            i += 2;
        } else {
            i += 1;
        }
    }
    if start >= data.len() {
        return Err(Error::Malformed(
            "data tile ends with an empty record".to_string(),
        ));
    }
    leaves.push(data[start..].to_vec());

    if leaves.len() != width as usize {
        return Err(Error::Malformed(format!(
            "data tile holds {} leaves, expected {}",
            leaves.len(),
            width
        )));
    }
    Ok(leaves)
}

/// Join leaves into a data tile
///
/// Every leaf must be non-empty and newline terminated.
pub fn encode_data_tile<T: AsRef<[u8]>>(leaves: &[T]) -> Vec<u8> {
    let mut data = Vec::new();
    for (i, leaf) in leaves.iter().enumerate() {
        if i > 0 {
            data.push(b'\n');
        }
        data.extend_from_slice(leaf.as_ref());
    }
    data
}
