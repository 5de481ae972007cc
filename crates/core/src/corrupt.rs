//! Random bit-flip channel
//!
//! Each function flips an exact number of distinct positions chosen without
//! repetition, so the number of differing bits between input and output is
//! known in advance. The random source is injected so tests can seed it.

use rand::seq::index::sample;
use rand::Rng;
use tracing::trace;

use crate::bits::string_to_int_bits;
use crate::{CoreError, Result};

fn check_count(requested: usize, available: usize) -> Result<()> {
    if requested > available {
        return Err(CoreError::FlipCountExceedsLength { requested, available });
    }
    Ok(())
}

/// Flip `count` distinct integer bits.
pub fn flip_int_bits<R: Rng + ?Sized>(bits: &[u8], count: usize, rng: &mut R) -> Result<Vec<u8>> {
    check_count(count, bits.len())?;

    let mut out = bits.to_vec();
    for position in sample(rng, bits.len(), count) {
        out[position] ^= 1;
    }
    trace!(count, len = bits.len(), "flipped integer bits");
    Ok(out)
}

/// Flip `count` distinct characters of a `'0'`/`'1'` string.
pub fn flip_string_bits<R: Rng + ?Sized>(s: &str, count: usize, rng: &mut R) -> Result<String> {
    let bits = string_to_int_bits(s)?;
    let flipped = flip_int_bits(&bits, count, rng)?;
    Ok(flipped.into_iter().map(|b| if b == 1 { '1' } else { '0' }).collect())
}

/// Flip one random bit in each of `count` distinct bytes.
pub fn flip_byte_bits<R: Rng + ?Sized>(bytes: &[u8], count: usize, rng: &mut R) -> Result<Vec<u8>> {
    check_count(count, bytes.len())?;

    let mut out = bytes.to_vec();
    for position in sample(rng, bytes.len(), count) {
        out[position] ^= 1 << rng.gen_range(0..8);
    }
    Ok(out)
}

/// Flip `count` distinct bits anywhere in a byte buffer.
pub fn flip_bits_in_bytes<R: Rng + ?Sized>(bytes: &[u8], count: usize, rng: &mut R) -> Result<Vec<u8>> {
    check_count(count, bytes.len() * 8)?;

    let mut out = bytes.to_vec();
    for position in sample(rng, bytes.len() * 8, count) {
        out[position / 8] ^= 1 << (position % 8);
    }
    Ok(out)
}

/// Count differing bits between two byte buffers of equal length.
pub fn compare_byte_bits(a: &[u8], b: &[u8]) -> Result<usize> {
    if a.len() != b.len() {
        return Err(CoreError::BufferSizeMismatch { expected: a.len(), actual: b.len() });
    }
    Ok(a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones() as usize).sum())
}

/// Count differing positions between two integer-bit sequences.
pub fn compare_int_bits(a: &[u8], b: &[u8]) -> Result<usize> {
    if a.len() != b.len() {
        return Err(CoreError::BufferSizeMismatch { expected: a.len(), actual: b.len() });
    }
    Ok(a.iter().zip(b).filter(|(x, y)| x != y).count())
}

/// Count differing characters between two bit strings.
pub fn compare_string_bits(a: &str, b: &str) -> Result<usize> {
    compare_int_bits(&string_to_int_bits(a)?, &string_to_int_bits(b)?)
}
