//! The sample store: an append-only, compressed, time-indexed log.
//!
//! One (index, data) file pair per calendar day. The index stream is
//! back-to-back 24-byte little-endian records `{timestamp, offset, length}`;
//! the data stream is back-to-back per-sample zstd frames. Compression is
//! per sample, so random access never touches unrelated frames.
//!
//! Exactly one writer appends to the current day's pair; any number of
//! reader handles may open the same files with their own cursor. A reader
//! follows a live writer by re-reading newly appended index records.

mod codec;
pub mod export;
mod store;

pub use codec::{decode_sample, encode_sample};
pub use export::{export_range, ExportResult};
pub use store::{RetentionResult, SampleStore};

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Size of one on-disk index record.
pub const INDEX_ENTRY_SIZE: usize = 24;

/// Fixed-size index record locating one compressed sample in the data file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    /// Sample timestamp (seconds since epoch). Non-decreasing within a file.
    pub timestamp: i64,
    /// Byte offset of the compressed frame in the data file.
    pub offset: i64,
    /// Length of the compressed frame in bytes.
    pub length: i64,
}

impl IndexEntry {
    /// Serializes the entry as 24 little-endian bytes.
    pub fn to_bytes(self) -> [u8; INDEX_ENTRY_SIZE] {
        let mut buf = [0u8; INDEX_ENTRY_SIZE];
        buf[0..8].copy_from_slice(&self.timestamp.to_le_bytes());
        buf[8..16].copy_from_slice(&self.offset.to_le_bytes());
        buf[16..24].copy_from_slice(&self.length.to_le_bytes());
        buf
    }

    /// Parses one entry from 24 little-endian bytes.
    pub fn from_bytes(buf: &[u8; INDEX_ENTRY_SIZE]) -> Self {
        Self {
            timestamp: i64::from_le_bytes(buf[0..8].try_into().unwrap()),
            offset: i64::from_le_bytes(buf[8..16].try_into().unwrap()),
            length: i64::from_le_bytes(buf[16..24].try_into().unwrap()),
        }
    }
}

/// Error type for store operations.
#[derive(Debug)]
pub enum StoreError {
    /// The requested cursor position does not exist. A normal boundary
    /// condition: callers stop iterating, they do not report a failure.
    OutOfRange,
    /// Index/data mismatch or decode failure. Unrecoverable for that entry;
    /// the read operation aborts rather than skipping silently.
    Corrupt {
        file: PathBuf,
        offset: i64,
        reason: String,
    },
    /// Filesystem error, propagated without internal retries.
    Io(io::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::OutOfRange => write!(f, "position out of range"),
            StoreError::Corrupt {
                file,
                offset,
                reason,
            } => write!(
                f,
                "corrupt entry in {} at offset {}: {}",
                file.display(),
                offset,
                reason
            ),
            StoreError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        StoreError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_entry_round_trip() {
        let e = IndexEntry {
            timestamp: 1_700_000_000,
            offset: 4096,
            length: 517,
        };
        assert_eq!(IndexEntry::from_bytes(&e.to_bytes()), e);
    }

    #[test]
    fn index_entry_is_24_bytes_little_endian() {
        let e = IndexEntry {
            timestamp: 1,
            offset: 2,
            length: 3,
        };
        let buf = e.to_bytes();
        assert_eq!(buf.len(), INDEX_ENTRY_SIZE);
        assert_eq!(buf[0], 1);
        assert_eq!(buf[8], 2);
        assert_eq!(buf[16], 3);
    }
}
