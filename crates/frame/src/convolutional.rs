//! Rate 1/n convolutional code with hard-decision Viterbi decoding
//!
//! The encoder state holds the previous `K-1` input bits. Each input bit
//! forms a `K`-bit register `state | bit << (K-1)`, emits one output bit per
//! generator polynomial (parity of `register & taps`) and moves to state
//! `register >> 1`. `K-1` zero bits flush the encoder back to state 0, where
//! the decoder starts its traceback. Bytes are serialized MSB first.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use udarp_core::bits::{bits_to_bytes, bytes_to_bits, BitOrder};

use crate::envelope::IntegrityEnvelope;
use crate::{FrameError, Result};

pub const MIN_CONSTRAINT_LENGTH: usize = 2;
pub const MAX_CONSTRAINT_LENGTH: usize = 16;
pub const MAX_POLYNOMIALS: usize = 8;

const UNREACHABLE: u32 = u32::MAX / 2;

/// Encoder/decoder configuration, shared by both directions of a link
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConvolutionalParams {
    /// Register length K, giving 2^(K-1) trellis states
    pub constraint_length: usize,
    /// One generator polynomial per output bit
    pub polynomials: Vec<u32>,
    /// Bit-reverse each polynomial over K bits before use as taps
    #[serde(default)]
    pub reverse_polynomials: bool,
}

impl Default for ConvolutionalParams {
    fn default() -> Self {
        Self { constraint_length: 7, polynomials: vec![79, 109], reverse_polynomials: false }
    }
}

impl ConvolutionalParams {
    pub fn new(constraint_length: usize, polynomials: Vec<u32>, reverse_polynomials: bool) -> Self {
        Self { constraint_length, polynomials, reverse_polynomials }
    }

    pub fn validate(&self) -> Result<()> {
        let k = self.constraint_length;
        if !(MIN_CONSTRAINT_LENGTH..=MAX_CONSTRAINT_LENGTH).contains(&k) {
            return Err(FrameError::InvalidFecParameters {
                msg: format!(
                    "Constraint length {} outside {}..={}",
                    k, MIN_CONSTRAINT_LENGTH, MAX_CONSTRAINT_LENGTH
                ),
            });
        }
        if self.polynomials.is_empty() || self.polynomials.len() > MAX_POLYNOMIALS {
            return Err(FrameError::InvalidFecParameters {
                msg: format!(
                    "Need 1..={} generator polynomials, got {}",
                    MAX_POLYNOMIALS,
                    self.polynomials.len()
                ),
            });
        }
        for &poly in &self.polynomials {
            if poly == 0 || poly >= 1 << k {
                return Err(FrameError::InvalidFecParameters {
                    msg: format!("Polynomial {} invalid for constraint length {}", poly, k),
                });
            }
        }
        Ok(())
    }
}

fn reverse_bits(width: usize, value: u32) -> u32 {
    value.reverse_bits() >> (32 - width)
}

/// Convolutional encoder/decoder
pub struct ConvolutionalCodec {
    params: ConvolutionalParams,
    // output bits for every K-bit register value, bit j from polynomial j
    outputs: Vec<u8>,
}

impl ConvolutionalCodec {
    /// Create a new convolutional codec
    pub fn new(params: ConvolutionalParams) -> Result<Self> {
        params.validate()?;
        let k = params.constraint_length;
        let taps: Vec<u32> = params
            .polynomials
            .iter()
            .map(|&p| if params.reverse_polynomials { reverse_bits(k, p) } else { p })
            .collect();

        let outputs = (0..1u32 << k)
            .map(|register| {
                taps.iter()
                    .enumerate()
                    .fold(0u8, |out, (j, &t)| out | ((((register & t).count_ones() & 1) as u8) << j))
            })
            .collect();

        Ok(Self { params, outputs })
    }

    pub fn params(&self) -> &ConvolutionalParams {
        &self.params
    }

    /// Output bits per input bit
    pub fn rate_denominator(&self) -> usize {
        self.params.polynomials.len()
    }

    /// Input bits per output bit, ignoring the flush tail
    pub fn code_rate(&self) -> f64 {
        1.0 / self.rate_denominator() as f64
    }

    fn state_count(&self) -> usize {
        1 << (self.params.constraint_length - 1)
    }

    /// Encoded bit count for `data_len` raw bytes
    pub fn raw_encoded_len(&self, data_len: usize) -> usize {
        (data_len * 8 + self.params.constraint_length - 1) * self.rate_denominator()
    }

    /// Encoded bit count for a `payload_len` payload, CRC included
    pub fn encoded_len(&self, payload_len: usize) -> usize {
        self.raw_encoded_len(payload_len + IntegrityEnvelope::TRAILER.overhead())
    }

    /// Encode bytes to integer bits, without any CRC.
    pub fn encode_raw(&self, data: &[u8]) -> Vec<u8> {
        let k = self.params.constraint_length;
        let n = self.rate_denominator();
        let mut bits = bytes_to_bits(data, BitOrder::Msb0);
        bits.resize(bits.len() + k - 1, 0);

        let mut out = Vec::with_capacity(bits.len() * n);
        let mut state = 0usize;
        for bit in bits {
            let register = state | ((bit as usize) << (k - 1));
            let symbol = self.outputs[register];
            out.extend((0..n).map(|j| (symbol >> j) & 1));
            state = register >> 1;
        }
        out
    }

    /// Viterbi-decode integer bits produced by [`encode_raw`](Self::encode_raw).
    pub fn decode_raw(&self, bits: &[u8]) -> Result<Vec<u8>> {
        self.viterbi(bits).map(|(bytes, _)| bytes)
    }

    /// Append a CRC-16 trailer and encode.
    pub fn encode(&self, payload: &[u8]) -> Result<Vec<u8>> {
        if payload.is_empty() {
            return Err(FrameError::EmptyInput);
        }
        Ok(self.encode_raw(&IntegrityEnvelope::TRAILER.seal(payload)))
    }

    /// Decode and check the CRC-16 trailer.
    pub fn decode(&self, bits: &[u8]) -> Result<Vec<u8>> {
        let (decoded, metric) = self.viterbi(bits)?;
        let payload = IntegrityEnvelope::TRAILER.open(&decoded)?;
        debug!(bits = bits.len(), path_metric = metric, "convolutional decode verified");
        Ok(payload.to_vec())
    }

    fn viterbi(&self, bits: &[u8]) -> Result<(Vec<u8>, u32)> {
        let k = self.params.constraint_length;
        let n = self.rate_denominator();
        if bits.len() % n != 0 {
            return Err(FrameError::InvalidFormat {
                msg: format!("{} bits is not a whole number of {}-bit symbols", bits.len(), n),
            });
        }
        let steps = bits.len() / n;
        if steps < k - 1 || (steps - (k - 1)) % 8 != 0 {
            return Err(FrameError::InvalidFormat {
                msg: format!("{} trellis steps do not hold whole bytes plus {} tail bits", steps, k - 1),
            });
        }

        let states = self.state_count();
        let top = k - 2;
        let mut metrics = vec![UNREACHABLE; states];
        metrics[0] = 0;
        let mut next = vec![UNREACHABLE; states];
        let mut decisions = vec![0u8; steps * states];

        for (step, symbol_bits) in bits.chunks_exact(n).enumerate() {
            let received = symbol_bits.iter().enumerate().try_fold(0u8, |acc, (j, &b)| match b {
                0 | 1 => Ok(acc | (b << j)),
                value => Err(udarp_core::CoreError::InvalidBitValue { value, position: step * n + j }),
            })?;

            let row = &mut decisions[step * states..(step + 1) * states];
            for (state, slot) in next.iter_mut().enumerate() {
                let mut best = UNREACHABLE;
                let mut choice = 0u8;
                for dropped in 0..2usize {
                    let register = (state << 1) | dropped;
                    let prev = register & (states - 1);
                    let branch = (self.outputs[register] ^ received).count_ones();
                    let candidate = metrics[prev].saturating_add(branch);
                    if candidate < best {
                        best = candidate;
                        choice = dropped as u8;
                    }
                }
                *slot = best;
                row[state] = choice;
            }
            std::mem::swap(&mut metrics, &mut next);
        }

        let metric = metrics[0];
        let mut decoded = Vec::with_capacity(steps);
        let mut state = 0usize;
        for step in (0..steps).rev() {
            decoded.push(((state >> top) & 1) as u8);
            let register = (state << 1) | decisions[step * states + state] as usize;
            state = register & (states - 1);
        }
        decoded.reverse();
        decoded.truncate(steps - (k - 1));

        trace!(steps, path_metric = metric, "viterbi traceback complete");
        Ok((bits_to_bytes(&decoded, BitOrder::Msb0)?, metric))
    }
}
