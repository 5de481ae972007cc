//! Error types for udarp core

use thiserror::Error;

/// Core error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid bit character {found:?} at position {position}")]
    InvalidBitChar { found: char, position: usize },

    #[error("Invalid bit value {value} at position {position}")]
    InvalidBitValue { value: u8, position: usize },

    #[error("Bit length {len} is not a multiple of {unit}")]
    UnalignedBits { len: usize, unit: usize },

    #[error("Buffer size mismatch: expected {expected}, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("Cannot flip {requested} positions in a buffer of {available}")]
    FlipCountExceedsLength { requested: usize, available: usize },
}

/// Result type for udarp core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let e = CoreError::FlipCountExceedsLength { requested: 9, available: 8 };
        assert_eq!(e.to_string(), "Cannot flip 9 positions in a buffer of 8");
        let e = CoreError::UnalignedBits { len: 3, unit: 8 };
        assert_eq!(e.to_string(), "Bit length 3 is not a multiple of 8");
    }
}
