//! Euclidean soft-decision decoding of single-parity-check blocks
//!
//! A block of `constraint` samples carries `constraint - 1` data bits and
//! one XOR parity bit. Each block decodes to the valid codeword with the
//! smallest sum of squared differences to the samples, so no fixed 0/1
//! cut-off is ever applied. Samples past the last whole block are not
//! decoded.

use tracing::trace;

use crate::{ModemError, Result};

pub const MIN_CONSTRAINT: usize = 2;
pub const MAX_CONSTRAINT: usize = 16;

fn check_constraint(constraint: usize) -> Result<()> {
    if !(MIN_CONSTRAINT..=MAX_CONSTRAINT).contains(&constraint) {
        return Err(ModemError::InvalidParameters {
            msg: format!(
                "Constraint {} outside {}..={}",
                constraint, MIN_CONSTRAINT, MAX_CONSTRAINT
            ),
        });
    }
    Ok(())
}

/// Every `constraint`-bit codeword: `constraint - 1` data bits followed by
/// their XOR parity. Codeword `i` carries bit `j` of `i` at position `j`.
pub fn generate_codewords(constraint: usize) -> Result<Vec<Vec<u8>>> {
    check_constraint(constraint)?;
    let data_bits = constraint - 1;
    Ok((0..1u32 << data_bits)
        .map(|i| {
            let mut word: Vec<u8> = (0..data_bits).map(|j| ((i >> j) & 1) as u8).collect();
            word.push((i.count_ones() & 1) as u8);
            word
        })
        .collect())
}

/// Append a parity bit after every `constraint - 1` data bits.
pub fn spc_encode(bits: &[u8], constraint: usize) -> Result<Vec<u8>> {
    check_constraint(constraint)?;
    let data_bits = constraint - 1;
    if bits.len() % data_bits != 0 {
        return Err(ModemError::InvalidParameters {
            msg: format!("{} bits is not a multiple of {} data bits", bits.len(), data_bits),
        });
    }
    let mut out = Vec::with_capacity(bits.len() / data_bits * constraint);
    for group in bits.chunks_exact(data_bits) {
        out.extend_from_slice(group);
        out.push(group.iter().fold(0, |p, &b| p ^ (b & 1)));
    }
    Ok(out)
}

/// Drop the parity bit of every decoded block.
pub fn spc_data_bits(decoded: &[u8], constraint: usize) -> Result<Vec<u8>> {
    check_constraint(constraint)?;
    if decoded.len() % constraint != 0 {
        return Err(ModemError::InvalidParameters {
            msg: format!("{} bits is not a multiple of block size {}", decoded.len(), constraint),
        });
    }
    Ok(decoded
        .chunks_exact(constraint)
        .flat_map(|block| block[..constraint - 1].iter().copied())
        .collect())
}

/// Decision for one block
#[derive(Debug, Clone, PartialEq)]
pub struct BlockDecision {
    /// Index into the decoder's codeword table
    pub codeword: usize,
    /// Sum of squared differences to the chosen codeword
    pub distance: f64,
}

/// Nearest-codeword decoder for one block size
#[derive(Debug, Clone)]
pub struct SoftDecoder {
    constraint: usize,
    codewords: Vec<Vec<u8>>,
}

impl SoftDecoder {
    pub fn new(constraint: usize) -> Result<Self> {
        Ok(Self { constraint, codewords: generate_codewords(constraint)? })
    }

    pub fn constraint(&self) -> usize {
        self.constraint
    }

    pub fn codewords(&self) -> &[Vec<u8>] {
        &self.codewords
    }

    /// Decide every whole block of samples.
    pub fn decide(&self, samples: &[f64]) -> Result<Vec<BlockDecision>> {
        if self.constraint > samples.len() {
            return Err(ModemError::ConstraintExceedsData {
                constraint: self.constraint,
                samples: samples.len(),
            });
        }

        let decisions: Vec<BlockDecision> = samples
            .chunks_exact(self.constraint)
            .map(|block| self.nearest(block))
            .collect();
        trace!(
            blocks = decisions.len(),
            trailing = samples.len() % self.constraint,
            "soft decisions made"
        );
        Ok(decisions)
    }

    /// Decode samples into hard bits, parity bits included.
    pub fn decode(&self, samples: &[f64]) -> Result<Vec<u8>> {
        Ok(self
            .decide(samples)?
            .into_iter()
            .flat_map(|d| self.codewords[d.codeword].iter().copied())
            .collect())
    }

    fn nearest(&self, block: &[f64]) -> BlockDecision {
        let mut best = BlockDecision { codeword: 0, distance: f64::INFINITY };
        for (index, word) in self.codewords.iter().enumerate() {
            let distance: f64 = word
                .iter()
                .zip(block)
                .map(|(&bit, &sample)| {
                    let d = sample - bit as f64;
                    d * d
                })
                .sum();
            if distance < best.distance {
                best = BlockDecision { codeword: index, distance };
            }
        }
        best
    }
}

/// Decode `samples` block by block; see [`SoftDecoder`].
pub fn soft_decode(constraint: usize, samples: &[f64]) -> Result<Vec<u8>> {
    SoftDecoder::new(constraint)?.decode(samples)
}

/// Baseline hard decision: 1 where a sample exceeds the mean of all samples.
pub fn mean_threshold_decode(samples: &[f64]) -> Vec<u8> {
    if samples.is_empty() {
        return Vec::new();
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    samples.iter().map(|&s| u8::from(s > mean)).collect()
}
