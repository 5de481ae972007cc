//! Error types for udarp modem

use thiserror::Error;

/// Modem error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModemError {
    #[error("Constraint {constraint} exceeds the {samples} available samples")]
    ConstraintExceedsData { constraint: usize, samples: usize },

    #[error("Invalid demodulation parameters: {msg}")]
    InvalidParameters { msg: String },

    #[error("Core error: {0}")]
    Core(#[from] udarp_core::CoreError),
}

/// Result type for udarp modem operations
pub type Result<T> = std::result::Result<T, ModemError>;
