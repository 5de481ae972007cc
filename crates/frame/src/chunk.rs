//! Payload chunking
//!
//! Splits a payload into `data_shards` shards of exactly `chunk_size`
//! bytes, zero-padding on the right. The padding count travels out of band;
//! no length field is written into the shards.

use tracing::trace;

use crate::params::CodecParams;
use crate::{FrameError, Result};

/// Split `payload` into data shards, returning the shards and the number of padding bytes.
pub fn chunk(params: &CodecParams, payload: &[u8]) -> Result<(Vec<Vec<u8>>, usize)> {
    params.validate()?;
    if payload.is_empty() {
        return Err(FrameError::EmptyInput);
    }
    let capacity = params.capacity();
    if payload.len() > capacity {
        return Err(FrameError::PayloadTooLarge { len: payload.len(), capacity });
    }

    let mut padded = payload.to_vec();
    padded.resize(capacity, 0);
    let shards = padded.chunks_exact(params.chunk_size).map(<[u8]>::to_vec).collect();
    let bytes_padded = capacity - payload.len();

    trace!(len = payload.len(), bytes_padded, "chunked payload");
    Ok((shards, bytes_padded))
}

/// Concatenate shards into one flat buffer.
pub fn deflate_blocks<S: AsRef<[u8]>>(shards: &[S]) -> Vec<u8> {
    shards.iter().flat_map(|s| s.as_ref().iter().copied()).collect()
}

/// Split a flat buffer back into shards of `chunk_size` bytes.
pub fn inflate_blocks(data: &[u8], chunk_size: usize) -> Result<Vec<Vec<u8>>> {
    if chunk_size == 0 {
        return Err(FrameError::InvalidFecParameters {
            msg: "chunk_size must be at least 1".to_string(),
        });
    }
    if data.len() % chunk_size != 0 {
        return Err(FrameError::InvalidFormat {
            msg: format!("Data length {} not multiple of shard size {}", data.len(), chunk_size),
        });
    }
    Ok(data.chunks_exact(chunk_size).map(<[u8]>::to_vec).collect())
}
