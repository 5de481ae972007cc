//! FEC pipelines the harness compares
//!
//! Each pipeline takes a payload through its transmit chain, flips a fixed
//! number of bits on the wire, runs the receive chain and reports what came
//! out. A pipeline never compares against the original payload itself; that
//! is the harness's job.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::Serialize;
use tracing::{debug, trace};

use udarp_core::bits::{bits_to_bytes, bytes_to_bits, BitOrder};
use udarp_core::corrupt::{compare_int_bits, flip_int_bits};
use udarp_frame::prelude::*;
use udarp_modem::prelude::*;

use crate::config::{PipelineConfig, PipelineKind, SoftConfig};
use crate::error::{HarnessError, Result};

/// Inputs of one trial
#[derive(Debug, Clone, Copy)]
pub struct TestParams<'a> {
    pub payload: &'a [u8],
    pub bits_to_corrupt: usize,
    pub seed: u64,
    pub patterns: &'a PatternCache,
    pub order: PatternOrder,
    pub acceptance: Acceptance,
}

/// Result of one trial
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// The receive chain accepted a payload
    pub pass: bool,
    /// Bits on the wire
    pub total_bits: usize,
    pub corrupt_bits: usize,
    pub total_blocks: usize,
    /// Blocks with at least one flipped bit
    pub corrupt_blocks: usize,
    /// Decode candidates tried, up to success or exhaustion
    pub attempts: usize,
    /// Payload as accepted by the receiver
    pub decoded: Option<Vec<u8>>,
}

impl RunStats {
    fn new(total_bits: usize, corrupt_bits: usize, total_blocks: usize, corrupt_blocks: usize) -> Self {
        Self {
            pass: false,
            total_bits,
            corrupt_bits,
            total_blocks,
            corrupt_blocks,
            attempts: 0,
            decoded: None,
        }
    }

    fn accepted(mut self, decoded: Vec<u8>, attempts: usize) -> Self {
        self.pass = true;
        self.decoded = Some(decoded);
        self.attempts = attempts;
        self
    }

    fn rejected(mut self, attempts: usize) -> Self {
        self.attempts = attempts;
        self
    }
}

/// A transmit, corrupt, receive chain
pub trait Pipeline: Send + Sync {
    fn name(&self) -> &str;

    /// One-line description of the stack
    fn describe(&self) -> String;

    /// Shard count the erasure-pattern search will need, if any
    fn search_shards(&self) -> Option<usize> {
        None
    }

    fn run(&self, params: &TestParams<'_>) -> Result<RunStats>;
}

/// Build the pipeline an entry describes.
pub fn build_pipeline(config: &PipelineConfig) -> Result<Box<dyn Pipeline>> {
    let name = config.name.clone();
    let convolutional = || config.convolutional.clone().unwrap_or_default();
    let codec = || {
        config.codec.ok_or_else(|| HarnessError::InvalidConfig {
            msg: format!("Pipeline '{}' needs codec parameters", config.name),
        })
    };
    let soft = config.soft.unwrap_or_default();

    let pipeline: Box<dyn Pipeline> = match config.kind {
        PipelineKind::Viterbi => Box::new(ViterbiPipeline {
            name,
            codec: ConvolutionalCodec::new(convolutional())?,
        }),
        PipelineKind::ReedSolomon => Box::new(ReedSolomonPipeline {
            name,
            stack: ShardStack::new(codec()?, config.interleave)?,
        }),
        PipelineKind::RsViterbi => Box::new(RsViterbiPipeline {
            name,
            stack: ShardStack::new(codec()?, config.interleave)?,
            conv: ConvolutionalCodec::new(convolutional())?,
        }),
        PipelineKind::SoftParity => Box::new(ParityPipeline::new(name, soft, false)?),
        PipelineKind::HardThreshold => Box::new(ParityPipeline::new(name, soft, true)?),
    };
    Ok(pipeline)
}

fn corrupt_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// CRC-16 trailer, then a convolutional code
pub struct ViterbiPipeline {
    name: String,
    codec: ConvolutionalCodec,
}

impl Pipeline for ViterbiPipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn describe(&self) -> String {
        let p = self.codec.params();
        format!("CRC-16 + convolutional K={} polys {:?}", p.constraint_length, p.polynomials)
    }

    fn run(&self, params: &TestParams<'_>) -> Result<RunStats> {
        let bits = self.codec.encode(params.payload)?;
        let mut rng = corrupt_rng(params.seed);
        let corrupted = flip_int_bits(&bits, params.bits_to_corrupt, &mut rng)?;

        let flipped = compare_int_bits(&bits, &corrupted)?;
        let stats = RunStats::new(bits.len(), flipped, 1, usize::from(flipped > 0));
        match self.codec.decode(&corrupted) {
            Ok(payload) => Ok(stats.accepted(payload, 1)),
            Err(e) => {
                debug!(pipeline = %self.name, error = %e, "viterbi decode rejected");
                Ok(stats.rejected(1))
            }
        }
    }
}

/// CRC-sealed payload in Reed-Solomon shards, optionally interleaved
struct ShardStack {
    codec: ReedSolomonCodec,
    interleave: bool,
}

struct SentFrame {
    shards: Vec<Vec<u8>>,
    wire: Vec<u8>,
    bytes_padded: usize,
}

impl ShardStack {
    fn new(params: CodecParams, interleave: bool) -> Result<Self> {
        params.validate_searchable()?;
        Ok(Self { codec: ReedSolomonCodec::new(params)?, interleave })
    }

    fn params(&self) -> &CodecParams {
        self.codec.params()
    }

    fn describe(&self) -> String {
        let p = self.params();
        format!(
            "CRC-16 + RS({}+{}) x {} bytes{}",
            p.data_shards,
            p.parity_shards,
            p.chunk_size,
            if self.interleave { ", interleaved" } else { "" }
        )
    }

    fn transmit(&self, payload: &[u8]) -> Result<SentFrame> {
        let sealed = IntegrityEnvelope::RS_FRAME.seal(payload);
        let (data, bytes_padded) = chunk(self.params(), &sealed)?;
        let shards = self.codec.encode(data)?;
        let wire = if self.interleave {
            deflate_blocks(&interleave(&shards)?)
        } else {
            deflate_blocks(&shards)
        };
        Ok(SentFrame { shards, wire, bytes_padded })
    }

    fn receive(&self, wire: &[u8]) -> Result<Vec<Vec<u8>>> {
        let params = self.params();
        let shards = if self.interleave {
            deinterleave(&inflate_blocks(wire, params.total_shards())?)?
        } else {
            inflate_blocks(wire, params.chunk_size)?
        };
        Ok(shards)
    }

    /// Search the received shards; returns the payload and patterns tried.
    fn search(
        &self,
        params: &TestParams<'_>,
        sent: &SentFrame,
        received: Vec<Vec<u8>>,
    ) -> Result<(Option<Vec<u8>>, usize)> {
        let search = SearchDecoder::new(&self.codec, params.patterns, params.order)?
            .with_acceptance(params.acceptance);
        match search.decode(&Shard::all_present(received), sent.bytes_padded) {
            Ok(outcome) => {
                trace!(
                    mask_index = outcome.mask_index,
                    attempts = outcome.attempts,
                    skipped = outcome.skipped,
                    "search accepted"
                );
                Ok((Some(outcome.payload), outcome.mask_index + 1))
            }
            Err(FrameError::DecodeExhausted { patterns_tried, .. }) => Ok((None, patterns_tried)),
            Err(e) => Err(e.into()),
        }
    }
}

fn corrupt_shards(sent: &[Vec<u8>], received: &[Vec<u8>]) -> usize {
    sent.iter().zip(received).filter(|(a, b)| a != b).count()
}

/// Reed-Solomon shards sent as raw bits
pub struct ReedSolomonPipeline {
    name: String,
    stack: ShardStack,
}

impl Pipeline for ReedSolomonPipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn describe(&self) -> String {
        self.stack.describe()
    }

    fn search_shards(&self) -> Option<usize> {
        Some(self.stack.params().total_shards())
    }

    fn run(&self, params: &TestParams<'_>) -> Result<RunStats> {
        let sent = self.stack.transmit(params.payload)?;
        let bits = bytes_to_bits(&sent.wire, BitOrder::Lsb0);
        let mut rng = corrupt_rng(params.seed);
        let corrupted = flip_int_bits(&bits, params.bits_to_corrupt, &mut rng)?;

        let received = self.stack.receive(&bits_to_bytes(&corrupted, BitOrder::Lsb0)?)?;
        let stats = RunStats::new(
            bits.len(),
            compare_int_bits(&bits, &corrupted)?,
            sent.shards.len(),
            corrupt_shards(&sent.shards, &received),
        );
        Ok(match self.stack.search(params, &sent, received)? {
            (Some(payload), attempts) => stats.accepted(payload, attempts),
            (None, attempts) => stats.rejected(attempts),
        })
    }
}

/// Reed-Solomon shards carried inside a convolutional code
pub struct RsViterbiPipeline {
    name: String,
    stack: ShardStack,
    conv: ConvolutionalCodec,
}

impl Pipeline for RsViterbiPipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn describe(&self) -> String {
        let p = self.conv.params();
        format!(
            "{} + convolutional K={} polys {:?}",
            self.stack.describe(),
            p.constraint_length,
            p.polynomials
        )
    }

    fn search_shards(&self) -> Option<usize> {
        Some(self.stack.params().total_shards())
    }

    fn run(&self, params: &TestParams<'_>) -> Result<RunStats> {
        let sent = self.stack.transmit(params.payload)?;
        let bits = self.conv.encode_raw(&sent.wire);
        let mut rng = corrupt_rng(params.seed);
        let corrupted = flip_int_bits(&bits, params.bits_to_corrupt, &mut rng)?;

        let received = self.stack.receive(&self.conv.decode_raw(&corrupted)?)?;
        let stats = RunStats::new(
            bits.len(),
            compare_int_bits(&bits, &corrupted)?,
            sent.shards.len(),
            corrupt_shards(&sent.shards, &received),
        );
        Ok(match self.stack.search(params, &sent, received)? {
            (Some(payload), attempts) => stats.accepted(payload, attempts),
            (None, attempts) => stats.rejected(attempts),
        })
    }
}

/// CRC-16 trailer in single-parity blocks over a noisy analog channel
pub struct ParityPipeline {
    name: String,
    channel: SoftConfig,
    noise: Normal<f64>,
    decoder: SoftDecoder,
    hard: bool,
}

impl ParityPipeline {
    pub fn new(name: String, channel: SoftConfig, hard: bool) -> Result<Self> {
        let noise = Normal::new(0.0, channel.noise_sigma).map_err(|e| HarnessError::InvalidConfig {
            msg: format!("Noise sigma {}: {}", channel.noise_sigma, e),
        })?;
        Ok(Self { name, channel, noise, decoder: SoftDecoder::new(channel.constraint)?, hard })
    }

    fn modulate(&self, bits: &[u8], rng: &mut StdRng) -> Vec<f64> {
        bits.iter()
            .map(|&b| self.channel.offset + self.channel.gain * f64::from(b) + self.noise.sample(rng))
            .collect()
    }
}

impl Pipeline for ParityPipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn describe(&self) -> String {
        format!(
            "CRC-16 + parity every {} bits, {} decision, sigma {}",
            self.channel.constraint - 1,
            if self.hard { "mean threshold" } else { "soft" },
            self.channel.noise_sigma
        )
    }

    fn run(&self, params: &TestParams<'_>) -> Result<RunStats> {
        let constraint = self.channel.constraint;
        let sealed = IntegrityEnvelope::TRAILER.seal(params.payload);
        let mut data_bits = bytes_to_bits(&sealed, BitOrder::Lsb0);
        let sent_len = data_bits.len();
        let group = constraint - 1;
        data_bits.resize(sent_len.div_ceil(group) * group, 0);

        let encoded = spc_encode(&data_bits, constraint)?;
        let mut rng = corrupt_rng(params.seed);
        let corrupted = flip_int_bits(&encoded, params.bits_to_corrupt, &mut rng)?;
        let samples = self.modulate(&corrupted, &mut rng);

        let corrupt_blocks = encoded
            .chunks(constraint)
            .zip(corrupted.chunks(constraint))
            .filter(|(a, b)| a != b)
            .count();
        let stats = RunStats::new(
            encoded.len(),
            compare_int_bits(&encoded, &corrupted)?,
            encoded.len() / constraint,
            corrupt_blocks,
        );

        let decided = if self.hard {
            mean_threshold_decode(&samples)
        } else {
            self.decoder.decode(&samples)?
        };
        let mut received = spc_data_bits(&decided, constraint)?;
        received.truncate(sent_len);
        let bytes = bits_to_bytes(&received, BitOrder::Lsb0)?;

        Ok(match IntegrityEnvelope::TRAILER.open(&bytes) {
            Ok(payload) => stats.accepted(payload.to_vec(), 1),
            Err(_) => stats.rejected(1),
        })
    }
}
