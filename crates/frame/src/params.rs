//! Block code parameters

use serde::{Deserialize, Serialize};

use crate::{FrameError, Result};

/// Largest shard count the erasure-pattern search will accept.
///
/// The search is exponential in the shard count; 2^20 patterns is about a
/// million Reed-Solomon attempts in the worst case.
pub const MAX_SEARCH_SHARDS: usize = 20;

/// GF(2^8) limits a Reed-Solomon code to 256 shards.
pub const MAX_RS_SHARDS: usize = 256;

/// Shape of a Reed-Solomon protected frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodecParams {
    /// Number of data shards
    pub data_shards: usize,
    /// Number of parity shards
    pub parity_shards: usize,
    /// Bytes per shard
    pub chunk_size: usize,
}

impl CodecParams {
    /// Create validated parameters
    pub fn new(data_shards: usize, parity_shards: usize, chunk_size: usize) -> Result<Self> {
        let params = Self { data_shards, parity_shards, chunk_size };
        params.validate()?;
        Ok(params)
    }

    /// Check the invariants; parameters loaded through serde skip [`CodecParams::new`].
    pub fn validate(&self) -> Result<()> {
        if self.data_shards == 0 {
            return Err(FrameError::InvalidFecParameters {
                msg: "data_shards must be at least 1".to_string(),
            });
        }
        if self.chunk_size == 0 {
            return Err(FrameError::InvalidFecParameters {
                msg: "chunk_size must be at least 1".to_string(),
            });
        }
        if self.total_shards() > MAX_RS_SHARDS {
            return Err(FrameError::InvalidFecParameters {
                msg: format!(
                    "{} data + {} parity shards exceeds the GF(2^8) limit of {}",
                    self.data_shards, self.parity_shards, MAX_RS_SHARDS
                ),
            });
        }
        Ok(())
    }

    /// Like [`validate`](Self::validate), additionally bounding the shard
    /// count for exhaustive erasure-pattern search.
    pub fn validate_searchable(&self) -> Result<()> {
        self.validate()?;
        if self.total_shards() > MAX_SEARCH_SHARDS {
            return Err(FrameError::PatternSpaceTooLarge {
                shards: self.total_shards(),
                max: MAX_SEARCH_SHARDS,
            });
        }
        Ok(())
    }

    pub fn total_shards(&self) -> usize {
        self.data_shards + self.parity_shards
    }

    /// Payload bytes that fit in the data shards
    pub fn capacity(&self) -> usize {
        self.data_shards * self.chunk_size
    }

    /// Bytes on the wire for one encoded frame
    pub fn encoded_len(&self) -> usize {
        self.total_shards() * self.chunk_size
    }

    pub fn code_rate(&self) -> f64 {
        self.data_shards as f64 / self.total_shards() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_creation() {
        let params = CodecParams::new(5, 8, 2).unwrap();
        assert_eq!(params.total_shards(), 13);
        assert_eq!(params.capacity(), 10);
        assert_eq!(params.encoded_len(), 26);
        assert!((params.code_rate() - 5.0 / 13.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_params() {
        assert!(CodecParams::new(0, 2, 4).is_err());
        assert!(CodecParams::new(2, 2, 0).is_err());
        assert!(CodecParams::new(200, 57, 1).is_err());
        assert!(CodecParams::new(3, 0, 1).is_ok());
    }

    #[test]
    fn test_search_bound() {
        assert!(CodecParams::new(10, 10, 1).unwrap().validate_searchable().is_ok());
        assert_eq!(
            CodecParams::new(10, 11, 1).unwrap().validate_searchable(),
            Err(FrameError::PatternSpaceTooLarge { shards: 21, max: MAX_SEARCH_SHARDS })
        );
    }

    #[test]
    fn test_params_serde() {
        let params = CodecParams::new(5, 3, 2).unwrap();
        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"data_shards":5,"parity_shards":3,"chunk_size":2}"#);
        let back: CodecParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }
}
