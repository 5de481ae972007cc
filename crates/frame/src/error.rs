//! Error types for udarp frame

use thiserror::Error;

/// Frame processing error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Empty input")]
    EmptyInput,

    #[error("Payload of {len} bytes exceeds capacity of {capacity} bytes")]
    PayloadTooLarge { len: usize, capacity: usize },

    #[error("Post-encode parity verification failed")]
    VerificationFailed,

    #[error("Reconstruction failed: {msg}")]
    ReconstructionFailed { msg: String },

    #[error(
        "Decode exhausted after {patterns_tried} erasure patterns \
         ({reconstruction_failures} reconstruction failures, {crc_failures} CRC failures)"
    )]
    DecodeExhausted {
        patterns_tried: usize,
        reconstruction_failures: usize,
        crc_failures: usize,
    },

    #[error("CRC mismatch")]
    CrcMismatch,

    #[error("Invalid FEC parameters: {msg}")]
    InvalidFecParameters { msg: String },

    #[error("Erasure pattern space too large: {shards} shards exceeds maximum of {max}")]
    PatternSpaceTooLarge { shards: usize, max: usize },

    #[error("Interleaving error: {msg}")]
    InterleavingError { msg: String },

    #[error("Frame size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Invalid frame format: {msg}")]
    InvalidFormat { msg: String },

    #[error("Core error: {0}")]
    Core(#[from] udarp_core::CoreError),
}

/// Result type for udarp frame operations
pub type Result<T> = std::result::Result<T, FrameError>;
