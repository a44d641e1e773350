//! Per-sample encoding: bincode for structure, zstd for compression.
//!
//! Each sample becomes one independent zstd frame. This costs a few percent
//! of ratio versus whole-file compression but gives O(1) seek to any sample.

use std::io;

use crate::model::Sample;

/// zstd level for sample frames. Level 3 balances ratio against the
/// per-interval CPU budget of a background recorder.
const COMPRESSION_LEVEL: i32 = 3;

/// Serializes and compresses one sample into a standalone frame.
pub fn encode_sample(sample: &Sample) -> io::Result<Vec<u8>> {
    let raw = bincode::serialize(sample).map_err(io::Error::other)?;
    zstd::encode_all(&raw[..], COMPRESSION_LEVEL)
}

/// Decompresses and deserializes one sample frame.
pub fn decode_sample(data: &[u8]) -> io::Result<Sample> {
    let raw = zstd::decode_all(data)?;
    bincode::deserialize(&raw).map_err(io::Error::other)
}
