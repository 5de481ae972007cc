//! Forward Error Correction (FEC) implementations
//!
//! [`ReedSolomonCodec`] wraps a systematic GF(2^8) Reed-Solomon erasure
//! code. Erasures are explicit [`Shard::Erased`] entries; a shard that is
//! present but bit-corrupted is indistinguishable from a good one at this
//! level and poisons whatever it is used to reconstruct.

use reed_solomon_erasure::galois_8::ReedSolomon;
use tracing::{debug, trace};

use crate::chunk::{deflate_blocks, inflate_blocks};
use crate::params::CodecParams;
use crate::shard::Shard;
use crate::{FrameError, Result};

/// Data-only shard reconstruction, the primitive the erasure-pattern search calls
pub trait ShardDecoder {
    fn params(&self) -> &CodecParams;

    /// Recover the concatenated data shards (padding included) from a shard set with erasures
    fn decode_data_only(&self, shards: Vec<Shard>) -> Result<Vec<u8>>;

    /// Re-encode concatenated data shard bytes into a complete shard set
    fn encode_data(&self, data: &[u8]) -> Result<Vec<Vec<u8>>>;
}

/// Reed-Solomon erasure codec for one [`CodecParams`] shape
pub struct ReedSolomonCodec {
    params: CodecParams,
    // `None` when there are no parity shards; the code is then the identity.
    rs: Option<ReedSolomon>,
}

fn rs_error(e: reed_solomon_erasure::Error) -> FrameError {
    FrameError::ReconstructionFailed { msg: format!("{:?}", e) }
}

impl ReedSolomonCodec {
    /// Create a new Reed-Solomon codec
    pub fn new(params: CodecParams) -> Result<Self> {
        params.validate()?;
        let rs = if params.parity_shards == 0 {
            None
        } else {
            let rs = ReedSolomon::new(params.data_shards, params.parity_shards).map_err(|e| {
                FrameError::InvalidFecParameters { msg: format!("{:?}", e) }
            })?;
            Some(rs)
        };

        Ok(Self { params, rs })
    }

    pub fn params(&self) -> &CodecParams {
        &self.params
    }

    /// Append parity shards to `data_shards` and verify the result.
    pub fn encode(&self, data_shards: Vec<Vec<u8>>) -> Result<Vec<Vec<u8>>> {
        if data_shards.len() != self.params.data_shards {
            return Err(FrameError::SizeMismatch {
                expected: self.params.data_shards,
                actual: data_shards.len(),
            });
        }
        self.check_shard_sizes(data_shards.iter().map(Vec::as_slice))?;

        let mut shards = data_shards;
        shards.resize(self.params.total_shards(), vec![0u8; self.params.chunk_size]);

        if let Some(rs) = &self.rs {
            rs.encode(&mut shards).map_err(|e| FrameError::InvalidFormat {
                msg: format!("Reed-Solomon encode failed: {:?}", e),
            })?;
            if !rs.verify(&shards).map_err(|_| FrameError::VerificationFailed)? {
                return Err(FrameError::VerificationFailed);
            }
        }

        trace!(
            data_shards = self.params.data_shards,
            parity_shards = self.params.parity_shards,
            chunk_size = self.params.chunk_size,
            "encoded shard set"
        );
        Ok(shards)
    }

    /// Check whether a complete shard set satisfies its parity equations.
    pub fn verify(&self, shards: &[Vec<u8>]) -> Result<bool> {
        if shards.len() != self.params.total_shards() {
            return Err(FrameError::SizeMismatch {
                expected: self.params.total_shards(),
                actual: shards.len(),
            });
        }
        self.check_shard_sizes(shards.iter().map(Vec::as_slice))?;
        match &self.rs {
            Some(rs) => rs.verify(shards).map_err(rs_error),
            None => Ok(true),
        }
    }

    /// Fill every erased shard in place, returning how many were rebuilt.
    ///
    /// Rebuilt shards are marked [`Shard::Reconstructed`].
    pub fn reconstruct(&self, shards: &mut [Shard]) -> Result<usize> {
        let erased = self.check_erasures(shards)?;
        let rebuilt = erased.iter().filter(|&&e| e).count();
        if rebuilt == 0 {
            return Ok(0);
        }
        let rs = self.rs.as_ref().ok_or_else(|| FrameError::ReconstructionFailed {
            msg: "no parity shards to reconstruct from".to_string(),
        })?;

        let previously_rebuilt: Vec<bool> =
            shards.iter().map(|s| matches!(s, Shard::Reconstructed(_))).collect();
        let mut slots: Vec<Option<Vec<u8>>> = shards
            .iter_mut()
            .map(|s| std::mem::replace(s, Shard::Erased).into_bytes())
            .collect();

        let outcome = rs.reconstruct(&mut slots);

        for (i, (shard, slot)) in shards.iter_mut().zip(slots).enumerate() {
            *shard = match slot {
                Some(bytes) if erased[i] || previously_rebuilt[i] => Shard::Reconstructed(bytes),
                Some(bytes) => Shard::Present(bytes),
                None => Shard::Erased,
            };
        }
        outcome.map_err(rs_error)?;

        Ok(rebuilt)
    }

    /// Reconstruct all shards, verify parity, and return the data shard bytes.
    ///
    /// The result is `data_shards * chunk_size` long; trailing padding is
    /// left for the caller to strip.
    pub fn decode_full(&self, shards: Vec<Shard>) -> Result<Vec<u8>> {
        let mut shards = shards;
        let rebuilt = self.reconstruct(&mut shards)?;

        let complete: Vec<Vec<u8>> = shards
            .into_iter()
            .map(|s| {
                s.into_bytes().ok_or_else(|| FrameError::ReconstructionFailed {
                    msg: "shard still missing after reconstruction".to_string(),
                })
            })
            .collect::<Result<_>>()?;

        if !self.verify(&complete)? {
            return Err(FrameError::ReconstructionFailed {
                msg: "parity does not verify after reconstruction".to_string(),
            });
        }

        debug!(rebuilt, "full decode succeeded");
        Ok(deflate_blocks(&complete[..self.params.data_shards]))
    }

    /// Reconstruct only the data shards and return their bytes.
    ///
    /// Parity shards are not repaired and nothing is verified; a corrupted
    /// present shard yields wrong bytes rather than an error.
    pub fn decode_data_only(&self, shards: Vec<Shard>) -> Result<Vec<u8>> {
        let erased = self.check_erasures(&shards)?;
        let data_shards = self.params.data_shards;

        let mut slots: Vec<Option<Vec<u8>>> = shards.into_iter().map(Shard::into_bytes).collect();
        if erased[..data_shards].iter().any(|&e| e) {
            let rs = self.rs.as_ref().ok_or_else(|| FrameError::ReconstructionFailed {
                msg: "no parity shards to reconstruct from".to_string(),
            })?;
            rs.reconstruct_data(&mut slots).map_err(rs_error)?;
        }

        let mut data = Vec::with_capacity(self.params.capacity());
        for slot in slots.into_iter().take(data_shards) {
            let bytes = slot.ok_or_else(|| FrameError::ReconstructionFailed {
                msg: "data shard still missing after reconstruction".to_string(),
            })?;
            data.extend_from_slice(&bytes);
        }
        Ok(data)
    }

    fn check_shard_sizes<'a>(&self, shards: impl Iterator<Item = &'a [u8]>) -> Result<()> {
        for shard in shards {
            if shard.len() != self.params.chunk_size {
                return Err(FrameError::InvalidFormat {
                    msg: format!(
                        "Shard of {} bytes, expected {}",
                        shard.len(),
                        self.params.chunk_size
                    ),
                });
            }
        }
        Ok(())
    }

    /// Validate shape and erasure budget, returning the erased flags.
    fn check_erasures(&self, shards: &[Shard]) -> Result<Vec<bool>> {
        if shards.len() != self.params.total_shards() {
            return Err(FrameError::SizeMismatch {
                expected: self.params.total_shards(),
                actual: shards.len(),
            });
        }
        self.check_shard_sizes(shards.iter().filter_map(Shard::bytes))?;

        let erased: Vec<bool> = shards.iter().map(Shard::is_erased).collect();
        let count = erased.iter().filter(|&&e| e).count();
        if count > self.params.parity_shards {
            return Err(FrameError::ReconstructionFailed {
                msg: format!(
                    "{} shards erased, at most {} recoverable",
                    count, self.params.parity_shards
                ),
            });
        }
        Ok(erased)
    }
}

impl ShardDecoder for ReedSolomonCodec {
    fn params(&self) -> &CodecParams {
        &self.params
    }

    fn decode_data_only(&self, shards: Vec<Shard>) -> Result<Vec<u8>> {
        ReedSolomonCodec::decode_data_only(self, shards)
    }

    fn encode_data(&self, data: &[u8]) -> Result<Vec<Vec<u8>>> {
        if data.len() != self.params.capacity() {
            return Err(FrameError::SizeMismatch { expected: self.params.capacity(), actual: data.len() });
        }
        ReedSolomonCodec::encode(self, inflate_blocks(data, self.params.chunk_size)?)
    }
}

/// Append parity shards for `params`; see [`ReedSolomonCodec::encode`].
pub fn encode(params: &CodecParams, data_shards: Vec<Vec<u8>>) -> Result<Vec<Vec<u8>>> {
    ReedSolomonCodec::new(*params)?.encode(data_shards)
}

/// Full reconstruction for `params`; see [`ReedSolomonCodec::decode_full`].
pub fn decode_full(params: &CodecParams, shards: Vec<Shard>) -> Result<Vec<u8>> {
    ReedSolomonCodec::new(*params)?.decode_full(shards)
}

/// Data-only reconstruction for `params`; see [`ReedSolomonCodec::decode_data_only`].
pub fn decode_data_only(params: &CodecParams, shards: Vec<Shard>) -> Result<Vec<u8>> {
    ReedSolomonCodec::new(*params)?.decode_data_only(shards)
}
