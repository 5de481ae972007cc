//! udarp frame - forward error correction for the FEC link
//!
//! This crate provides chunking, Reed-Solomon erasure coding, byte
//! interleaving, the erasure-pattern search decoder and a convolutional
//! (Viterbi) codec. Everything here is synchronous and stateless per call,
//! apart from the [`PatternCache`](pattern::PatternCache).

pub mod chunk;
pub mod convolutional;
pub mod envelope;
pub mod error;
pub mod fec;
pub mod interleave;
pub mod params;
pub mod pattern;
pub mod search;
pub mod shard;

pub use error::{FrameError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        chunk::{chunk, deflate_blocks, inflate_blocks},
        convolutional::{ConvolutionalCodec, ConvolutionalParams},
        envelope::{ByteOrder, CrcPlacement, IntegrityEnvelope},
        error::{FrameError, Result},
        fec::{decode_data_only, decode_full, encode, ReedSolomonCodec, ShardDecoder},
        interleave::{deinterleave, interleave, BlockInterleaver, Interleaver},
        params::{CodecParams, MAX_SEARCH_SHARDS},
        pattern::{ErasurePattern, PatternCache, PatternOrder},
        search::{Acceptance, SearchDecoder, SearchOutcome},
        shard::Shard,
    };
}
