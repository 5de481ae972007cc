//! Bit and byte conversions
//!
//! Bits are carried as `u8` values that are either 0 or 1 ("integer bits")
//! or as strings of `'0'`/`'1'` characters. Every conversion takes an
//! explicit [`BitOrder`] so the transmit and receive side cannot disagree
//! about which end of a byte goes out first.

use serde::{Deserialize, Serialize};

use crate::{CoreError, Result};

/// Order in which the bits of a byte are laid out in a bit sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitOrder {
    /// Least significant bit first
    #[default]
    Lsb0,
    /// Most significant bit first
    Msb0,
}

impl BitOrder {
    #[inline]
    fn shift(self, index: usize) -> usize {
        match self {
            BitOrder::Lsb0 => index,
            BitOrder::Msb0 => 7 - index,
        }
    }
}

/// Expand bytes into one `u8` (0 or 1) per bit.
pub fn bytes_to_bits(bytes: &[u8], order: BitOrder) -> Vec<u8> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        for i in 0..8 {
            bits.push((byte >> order.shift(i)) & 1);
        }
    }
    bits
}

/// Pack integer bits back into bytes.
///
/// The bit count must be a multiple of 8 and every element must be 0 or 1.
pub fn bits_to_bytes(bits: &[u8], order: BitOrder) -> Result<Vec<u8>> {
    if bits.len() % 8 != 0 {
        return Err(CoreError::UnalignedBits { len: bits.len(), unit: 8 });
    }

    bits.chunks_exact(8)
        .enumerate()
        .map(|(chunk_index, chunk)| {
            chunk.iter().enumerate().try_fold(0u8, |byte, (i, &bit)| match bit {
                0 => Ok(byte),
                1 => Ok(byte | (1 << order.shift(i))),
                value => Err(CoreError::InvalidBitValue {
                    value,
                    position: chunk_index * 8 + i,
                }),
            })
        })
        .collect()
}

/// Render bytes as a string of `'0'`/`'1'` characters.
pub fn bits_to_string(bytes: &[u8], order: BitOrder) -> String {
    bytes_to_bits(bytes, order)
        .into_iter()
        .map(|bit| if bit == 1 { '1' } else { '0' })
        .collect()
}

/// Parse a string of `'0'`/`'1'` characters into bytes.
pub fn string_to_bits(s: &str, order: BitOrder) -> Result<Vec<u8>> {
    let bits = string_to_int_bits(s)?;
    bits_to_bytes(&bits, order)
}

/// Parse a string of `'0'`/`'1'` characters into integer bits without packing.
pub fn string_to_int_bits(s: &str) -> Result<Vec<u8>> {
    s.chars()
        .enumerate()
        .map(|(position, c)| match c {
            '0' => Ok(0),
            '1' => Ok(1),
            found => Err(CoreError::InvalidBitChar { found, position }),
        })
        .collect()
}

/// Render integer bits as a `'0'`/`'1'` string.
pub fn int_bits_to_string(bits: &[u8]) -> Result<String> {
    bits.iter()
        .enumerate()
        .map(|(position, &bit)| match bit {
            0 => Ok('0'),
            1 => Ok('1'),
            value => Err(CoreError::InvalidBitValue { value, position }),
        })
        .collect()
}

#[inline]
pub fn set_bit(value: u32, pos: u32) -> u32 {
    value | (1 << pos)
}

#[inline]
pub fn clear_bit(value: u32, pos: u32) -> u32 {
    value & !(1 << pos)
}

#[inline]
pub fn flip_bit(value: u32, pos: u32) -> u32 {
    value ^ (1 << pos)
}

#[inline]
pub fn has_bit(value: u32, pos: u32) -> bool {
    value & (1 << pos) != 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_bit_order() {
        assert_eq!(bytes_to_bits(&[0x01], BitOrder::Lsb0), vec![1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(bytes_to_bits(&[0x01], BitOrder::Msb0), vec![0, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_string_conversion() {
        assert_eq!(bits_to_string(&[0xA5], BitOrder::Msb0), "10100101");
        assert_eq!(string_to_bits("10100101", BitOrder::Msb0).unwrap(), vec![0xA5]);
        assert_eq!(string_to_bits("10100101", BitOrder::Lsb0).unwrap(), vec![0xA5]);
        assert_eq!(bits_to_string(&[0x0F], BitOrder::Lsb0), "11110000");
    }

    #[test]
    fn test_invalid_input() {
        assert_eq!(
            string_to_bits("0102", BitOrder::Lsb0),
            Err(CoreError::InvalidBitChar { found: '2', position: 3 })
        );
        assert_eq!(
            bits_to_bytes(&[0, 1, 0], BitOrder::Lsb0),
            Err(CoreError::UnalignedBits { len: 3, unit: 8 })
        );
        assert!(matches!(
            bits_to_bytes(&[0, 0, 0, 0, 0, 0, 0, 2], BitOrder::Msb0),
            Err(CoreError::InvalidBitValue { value: 2, position: 7 })
        ));
    }

    #[test]
    fn test_single_bit_ops() {
        assert_eq!(set_bit(0, 3), 8);
        assert_eq!(clear_bit(0xFF, 0), 0xFE);
        assert_eq!(flip_bit(flip_bit(0x55, 6), 6), 0x55);
        assert!(has_bit(0b100, 2));
        assert!(!has_bit(0b100, 1));
    }

    #[quickcheck]
    fn prop_bytes_roundtrip_lsb(bytes: Vec<u8>) -> bool {
        bits_to_bytes(&bytes_to_bits(&bytes, BitOrder::Lsb0), BitOrder::Lsb0).unwrap() == bytes
    }

    #[quickcheck]
    fn prop_bytes_roundtrip_msb(bytes: Vec<u8>) -> bool {
        bits_to_bytes(&bytes_to_bits(&bytes, BitOrder::Msb0), BitOrder::Msb0).unwrap() == bytes
    }

    #[quickcheck]
    fn prop_string_roundtrip(bytes: Vec<u8>) -> bool {
        let s = bits_to_string(&bytes, BitOrder::Msb0);
        s.len() == bytes.len() * 8 && string_to_bits(&s, BitOrder::Msb0).unwrap() == bytes
    }
}
