//! Error types for the simulation harness

use thiserror::Error;
use udarp_core::CoreError;
use udarp_frame::FrameError;
use udarp_modem::ModemError;

/// Harness errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HarnessError {
    /// A trial reported success with a payload that differs from the one
    /// sent. The integrity check let a wrong candidate through.
    #[error("Pipeline {pipeline} decoded wrong data in {count} trial(s), first at trial {first_trial}")]
    DecodedDataMismatch {
        pipeline: String,
        first_trial: usize,
        count: usize,
    },

    #[error("Invalid configuration: {msg}")]
    InvalidConfig { msg: String },

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Modem error: {0}")]
    Modem(#[from] ModemError),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

/// Result type for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;
