//! Erasure-pattern search decoder
//!
//! The channel's own erasures are not trusted to be the only bad shards.
//! For every erasure pattern in order, the kept shards are handed to the
//! data-only Reed-Solomon decoder and the result is accepted as soon as its
//! integrity envelope verifies. Cost is `O(2^n)` reconstructions in the
//! worst case, so `n` is capped at [`MAX_SEARCH_SHARDS`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::envelope::IntegrityEnvelope;
use crate::fec::ShardDecoder;
use crate::params::MAX_SEARCH_SHARDS;
use crate::pattern::{ErasurePattern, PatternCache, PatternOrder};
use crate::shard::Shard;
use crate::{FrameError, Result};

/// Rule for accepting a reconstructed candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Acceptance {
    /// The integrity envelope verifies. With a 16-bit CRC, an exhausted
    /// search over hundreds of candidates accepts a wrong payload often
    /// enough to matter.
    Crc,
    /// The envelope verifies, at least one kept shard was not needed for
    /// reconstruction, and every kept shard matches the re-encoded frame.
    /// Never accepts a pattern that keeps exactly `data_shards` shards.
    #[default]
    CrcAndSpareShard,
}

/// A successful search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    /// Verified payload with checksum and padding removed
    pub payload: Vec<u8>,
    /// Position of the accepted pattern in the search order
    pub mask_index: usize,
    pub pattern: ErasurePattern,
    /// Reed-Solomon reconstructions actually run
    pub attempts: usize,
    pub reconstruction_failures: usize,
    pub crc_failures: usize,
    /// CRC-passing candidates rejected by [`Acceptance::CrcAndSpareShard`]
    pub consistency_failures: usize,
    /// Patterns passed over without decoding: duplicates of an earlier
    /// pattern once channel erasures are applied, or too few kept shards
    pub skipped: usize,
}

/// Search decoder bound to one shard decoder and pattern order
pub struct SearchDecoder<'a, D: ShardDecoder + ?Sized> {
    decoder: &'a D,
    patterns: Arc<[ErasurePattern]>,
    envelope: IntegrityEnvelope,
    order: PatternOrder,
    acceptance: Acceptance,
}

impl<'a, D: ShardDecoder + ?Sized> SearchDecoder<'a, D> {
    /// Bind to `decoder`, fetching the pattern list from `cache`.
    ///
    /// Fails with [`FrameError::PatternSpaceTooLarge`] for more than
    /// [`MAX_SEARCH_SHARDS`] shards.
    pub fn new(decoder: &'a D, cache: &PatternCache, order: PatternOrder) -> Result<Self> {
        decoder.params().validate_searchable()?;
        let patterns = cache.get(decoder.params().total_shards(), order)?;
        Ok(Self {
            decoder,
            patterns,
            envelope: IntegrityEnvelope::RS_FRAME,
            order,
            acceptance: Acceptance::default(),
        })
    }

    pub fn with_envelope(mut self, envelope: IntegrityEnvelope) -> Self {
        self.envelope = envelope;
        self
    }

    pub fn with_acceptance(mut self, acceptance: Acceptance) -> Self {
        self.acceptance = acceptance;
        self
    }

    pub fn acceptance(&self) -> Acceptance {
        self.acceptance
    }

    pub fn order(&self) -> PatternOrder {
        self.order
    }

    pub fn envelope(&self) -> &IntegrityEnvelope {
        &self.envelope
    }

    /// Number of patterns a failed search walks through
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Search for a pattern whose reconstruction verifies.
    ///
    /// `bytes_padded` is the chunker's padding count; it is stripped before
    /// the envelope is checked.
    pub fn decode(&self, shards: &[Shard], bytes_padded: usize) -> Result<SearchOutcome> {
        let params = self.decoder.params();
        if shards.len() != params.total_shards() {
            return Err(FrameError::SizeMismatch {
                expected: params.total_shards(),
                actual: shards.len(),
            });
        }
        let needed = bytes_padded.checked_add(self.envelope.overhead());
        if needed.map_or(true, |n| n > params.capacity()) {
            return Err(FrameError::InvalidFormat {
                msg: format!(
                    "{} padding bytes leave no room for the checksum in {} bytes",
                    bytes_padded,
                    params.capacity()
                ),
            });
        }
        debug_assert!(shards.len() <= MAX_SEARCH_SHARDS);

        let channel_erased: u32 = shards
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_erased())
            .fold(0, |mask, (i, _)| mask | (1 << i));

        let mut attempts = 0;
        let mut reconstruction_failures = 0;
        let mut crc_failures = 0;
        let mut consistency_failures = 0;
        let mut skipped = 0;
        let min_kept = match self.acceptance {
            Acceptance::Crc => params.data_shards,
            Acceptance::CrcAndSpareShard => params.data_shards + 1,
        };

        for (mask_index, pattern) in self.patterns.iter().enumerate() {
            // Dropping a shard the channel already lost repeats an earlier pattern.
            let effective_keep = pattern.keep_mask() & !channel_erased;
            if pattern.drop_mask() & channel_erased != 0
                || (effective_keep.count_ones() as usize) < min_kept
            {
                skipped += 1;
                continue;
            }

            let trial: Vec<Shard> = shards
                .iter()
                .enumerate()
                .map(|(i, s)| if pattern.keeps(i) { s.clone() } else { Shard::Erased })
                .collect();

            attempts += 1;
            let data = match self.decoder.decode_data_only(trial) {
                Ok(data) => data,
                Err(e) => {
                    trace!(mask_index, error = %e, "reconstruction failed");
                    reconstruction_failures += 1;
                    continue;
                }
            };

            let payload = match self.envelope.open_padded(&data, bytes_padded) {
                Ok(payload) => payload,
                Err(_) => {
                    crc_failures += 1;
                    continue;
                }
            };

            if self.acceptance == Acceptance::CrcAndSpareShard
                && !self.kept_shards_agree(shards, pattern, &data)
            {
                trace!(mask_index, "candidate passed CRC but contradicts kept shards");
                consistency_failures += 1;
                continue;
            }

            debug!(
                mask_index,
                kept = pattern.kept_count(),
                attempts,
                crc_failures,
                "erasure pattern verified"
            );
            return Ok(SearchOutcome {
                payload: payload.to_vec(),
                mask_index,
                pattern: *pattern,
                attempts,
                reconstruction_failures,
                crc_failures,
                consistency_failures,
                skipped,
            });
        }

        debug!(
            patterns = self.patterns.len(),
            attempts,
            reconstruction_failures,
            crc_failures,
            "erasure pattern search exhausted"
        );
        Err(FrameError::DecodeExhausted {
            patterns_tried: self.patterns.len(),
            reconstruction_failures,
            crc_failures: crc_failures + consistency_failures,
        })
    }

    fn kept_shards_agree(&self, shards: &[Shard], pattern: &ErasurePattern, data: &[u8]) -> bool {
        let Ok(codeword) = self.decoder.encode_data(data) else {
            return false;
        };
        shards
            .iter()
            .zip(&codeword)
            .enumerate()
            .filter(|(i, _)| pattern.keeps(*i))
            .all(|(_, (shard, expected))| shard.bytes().map_or(true, |b| b == expected.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk;
    use crate::fec::ReedSolomonCodec;
    use crate::params::CodecParams;

    fn sealed_frame(params: CodecParams, payload: &[u8]) -> (Vec<Vec<u8>>, usize) {
        let sealed = IntegrityEnvelope::RS_FRAME.seal(payload);
        let (data, padded) = chunk(&params, &sealed).unwrap();
        let codec = ReedSolomonCodec::new(params).unwrap();
        (codec.encode(data).unwrap(), padded)
    }

    #[test]
    fn test_clean_frame_accepts_first_pattern() {
        let params = CodecParams::new(5, 8, 2).unwrap();
        let (shards, padded) = sealed_frame(params, &[0xFF; 8]);
        let codec = ReedSolomonCodec::new(params).unwrap();
        let cache = PatternCache::new();
        let search = SearchDecoder::new(&codec, &cache, PatternOrder::Positional).unwrap();

        let outcome = search.decode(&Shard::all_present(shards), padded).unwrap();
        assert_eq!(outcome.payload, vec![0xFF; 8]);
        assert_eq!(outcome.mask_index, 0);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.pattern.kept_count(), 13);
    }

    #[test]
    fn test_corrupted_shard_is_discarded() {
        let params = CodecParams::new(3, 2, 4).unwrap();
        let (mut shards, padded) = sealed_frame(params, b"search me");
        shards[1][2] ^= 0x5A;
        let codec = ReedSolomonCodec::new(params).unwrap();
        let cache = PatternCache::new();

        for order in [PatternOrder::Positional, PatternOrder::MostTrustedFirst] {
            let search = SearchDecoder::new(&codec, &cache, order).unwrap();
            let outcome = search.decode(&Shard::all_present(shards.clone()), padded).unwrap();
            assert_eq!(outcome.payload, b"search me");
            assert!(!outcome.pattern.keeps(1));
            assert!(outcome.crc_failures >= 1);
        }
    }

    #[test]
    fn test_channel_erasures_are_honoured() {
        let params = CodecParams::new(3, 3, 2).unwrap();
        let (shards, padded) = sealed_frame(params, b"abc");
        let mut received = Shard::all_present(shards);
        received[0] = Shard::Erased;
        received[4] = Shard::Erased;

        let codec = ReedSolomonCodec::new(params).unwrap();
        let cache = PatternCache::new();
        let search = SearchDecoder::new(&codec, &cache, PatternOrder::Positional).unwrap();
        let outcome = search.decode(&received, padded).unwrap();
        assert_eq!(outcome.payload, b"abc");
        assert_eq!(outcome.mask_index, 0);
    }

    #[test]
    fn test_unrecoverable_frame_is_exhausted() {
        let params = CodecParams::new(2, 1, 2).unwrap();
        let (mut shards, padded) = sealed_frame(params, b"xy");
        shards[0][0] ^= 0x01;
        shards[1][1] ^= 0x80;
        let codec = ReedSolomonCodec::new(params).unwrap();
        let cache = PatternCache::new();
        let search = SearchDecoder::new(&codec, &cache, PatternOrder::Positional).unwrap();

        match search.decode(&Shard::all_present(shards), padded) {
            Err(FrameError::DecodeExhausted { patterns_tried, .. }) => assert_eq!(patterns_tried, 8),
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }

    #[test]
    fn test_search_is_deterministic() {
        let params = CodecParams::new(4, 4, 3).unwrap();
        let (mut shards, padded) = sealed_frame(params, b"determined");
        shards[0][0] ^= 0xFF;
        shards[5][1] ^= 0x0F;
        let received = Shard::all_present(shards);
        let codec = ReedSolomonCodec::new(params).unwrap();
        let cache = PatternCache::new();
        let search = SearchDecoder::new(&codec, &cache, PatternOrder::Positional).unwrap();

        let first = search.decode(&received, padded).unwrap();
        let second = search.decode(&received, padded).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.payload, b"determined");
    }

    #[test]
    fn test_spare_shard_acceptance() {
        let params = CodecParams::new(3, 2, 4).unwrap();
        let (mut shards, padded) = sealed_frame(params, b"search me");
        shards[1][0] ^= 0x01;
        let codec = ReedSolomonCodec::new(params).unwrap();
        let cache = PatternCache::new();
        let search = SearchDecoder::new(&codec, &cache, PatternOrder::Positional)
            .unwrap()
            .with_acceptance(Acceptance::CrcAndSpareShard);

        let outcome = search.decode(&Shard::all_present(shards), padded).unwrap();
        assert_eq!(outcome.payload, b"search me");
        assert_eq!(outcome.pattern.to_bits(), vec![1, 0, 1, 1, 1]);
        assert_eq!(outcome.consistency_failures, 0);
    }

    #[test]
    fn test_spare_shard_acceptance_needs_redundancy() {
        let params = CodecParams::new(2, 1, 3).unwrap();
        let (shards, padded) = sealed_frame(params, b"abcd");
        let mut received = Shard::all_present(shards);
        received[0] = Shard::Erased;
        let codec = ReedSolomonCodec::new(params).unwrap();
        let cache = PatternCache::new();

        let strict = SearchDecoder::new(&codec, &cache, PatternOrder::Positional).unwrap();
        assert_eq!(strict.acceptance(), Acceptance::CrcAndSpareShard);
        assert!(matches!(strict.decode(&received, padded), Err(FrameError::DecodeExhausted { .. })));

        let lenient = strict.with_acceptance(Acceptance::Crc);
        assert_eq!(lenient.decode(&received, padded).unwrap().payload, b"abcd");
    }

    #[test]
    fn test_configuration_errors() {
        let cache = PatternCache::new();
        let big = ReedSolomonCodec::new(CodecParams::new(12, 9, 1).unwrap()).unwrap();
        assert!(matches!(
            SearchDecoder::new(&big, &cache, PatternOrder::Positional),
            Err(FrameError::PatternSpaceTooLarge { shards: 21, .. })
        ));

        let codec = ReedSolomonCodec::new(CodecParams::new(2, 1, 2).unwrap()).unwrap();
        let search = SearchDecoder::new(&codec, &cache, PatternOrder::Positional).unwrap();
        assert!(matches!(
            search.decode(&[Shard::Erased], 0),
            Err(FrameError::SizeMismatch { expected: 3, actual: 1 })
        ));
        assert!(matches!(
            search.decode(&[Shard::Erased, Shard::Erased, Shard::Erased], 3),
            Err(FrameError::InvalidFormat { .. })
        ));
        assert!(matches!(
            search.decode(&[Shard::Erased, Shard::Erased, Shard::Erased], usize::MAX),
            Err(FrameError::InvalidFormat { .. })
        ));
    }
}
