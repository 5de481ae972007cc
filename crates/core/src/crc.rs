//! CRC-8/16/32 checksums
//!
//! * CRC-8: polynomial 0x07, init 0x00, MSB first, no final xor.
//! * CRC-16: MODBUS variant, reflected polynomial 0xA001, init 0xFFFF.
//! * CRC-32: IEEE 802.3 as computed by `crc32fast`.

use serde::{Deserialize, Serialize};
use tracing::trace;

const CRC8_POLY: u8 = 0x07;
const CRC16_POLY_REFLECTED: u16 = 0xA001;
const CRC16_INIT: u16 = 0xFFFF;

/// Checksum width selector for integrity envelopes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrcKind {
    Crc8,
    Crc16,
    Crc32,
}

impl CrcKind {
    /// Width of the checksum in bytes
    pub fn width(self) -> usize {
        match self {
            CrcKind::Crc8 => 1,
            CrcKind::Crc16 => 2,
            CrcKind::Crc32 => 4,
        }
    }

    /// Compute the checksum, widened to `u32`
    pub fn checksum(self, data: &[u8]) -> u32 {
        match self {
            CrcKind::Crc8 => crc8(data) as u32,
            CrcKind::Crc16 => crc16(data) as u32,
            CrcKind::Crc32 => crc32(data),
        }
    }

    pub fn matches(self, data: &[u8], expected: u32) -> bool {
        self.checksum(data) == expected
    }
}

pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ CRC8_POLY
            } else {
                crc << 1
            };
        }
    }
    crc
}

pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = CRC16_INIT;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ CRC16_POLY_REFLECTED
            } else {
                crc >> 1
            };
        }
    }
    crc
}

pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

pub fn matches8(data: &[u8], expected: u8) -> bool {
    crc8(data) == expected
}

pub fn matches16(data: &[u8], expected: u16) -> bool {
    crc16(data) == expected
}

pub fn matches32(data: &[u8], expected: u32) -> bool {
    crc32(data) == expected
}

/// Prefix a CRC-8 byte to `data`.
pub fn prepend_crc8(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 1);
    out.push(crc8(data));
    out.extend_from_slice(data);
    out
}

/// Strip and check a CRC-8 prefix, returning the body if it verifies.
pub fn strip_crc8(data: &[u8]) -> Option<&[u8]> {
    let (&expected, body) = data.split_first()?;
    matches8(body, expected).then_some(body)
}

/// Result of checking a set of CRC-8 protected chunks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkCheck {
    /// Chunk bodies, `None` where the CRC did not verify
    pub chunks: Vec<Option<Vec<u8>>>,
    /// Number of chunks that failed verification
    pub corrupt: usize,
}

impl ChunkCheck {
    pub fn all_corrupt(&self) -> bool {
        self.corrupt == self.chunks.len()
    }
}

/// Prefix every chunk with its own CRC-8.
pub fn protect_chunks_crc8<C: AsRef<[u8]>>(chunks: &[C]) -> Vec<Vec<u8>> {
    chunks.iter().map(|c| prepend_crc8(c.as_ref())).collect()
}

/// Verify chunks produced by [`protect_chunks_crc8`], nulling the ones that fail.
pub fn verify_chunks_crc8<C: AsRef<[u8]>>(chunks: &[C]) -> ChunkCheck {
    let mut corrupt = 0;
    let chunks = chunks
        .iter()
        .enumerate()
        .map(|(index, chunk)| match strip_crc8(chunk.as_ref()) {
            Some(body) => Some(body.to_vec()),
            None => {
                trace!(index, "chunk failed CRC-8");
                corrupt += 1;
                None
            }
        })
        .collect();

    ChunkCheck { chunks, corrupt }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    const CHECK: &[u8] = b"123456789";

    #[test]
    fn test_check_values() {
        assert_eq!(crc8(CHECK), 0xF4);
        assert_eq!(crc16(CHECK), 0x4B37);
        assert_eq!(crc32(CHECK), 0xCBF4_3926);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(crc8(&[]), 0);
        assert_eq!(crc16(&[]), 0xFFFF);
        assert_eq!(crc32(&[]), 0);
    }

    #[test]
    fn test_crc_kind() {
        assert_eq!(CrcKind::Crc8.width(), 1);
        assert_eq!(CrcKind::Crc16.width(), 2);
        assert_eq!(CrcKind::Crc32.width(), 4);
        assert_eq!(CrcKind::Crc16.checksum(CHECK), 0x4B37);
        assert!(CrcKind::Crc32.matches(CHECK, 0xCBF4_3926));
    }

    #[test]
    fn test_crc8_prefix() {
        let protected = prepend_crc8(b"hello");
        assert_eq!(strip_crc8(&protected), Some(&b"hello"[..]));

        let mut damaged = protected.clone();
        damaged[2] ^= 0x10;
        assert_eq!(strip_crc8(&damaged), None);
        assert_eq!(strip_crc8(&[]), None);
    }

    #[test]
    fn test_chunk_check() {
        let chunks = vec![b"ab".to_vec(), b"cd".to_vec(), b"ef".to_vec()];
        let mut protected = protect_chunks_crc8(&chunks);
        protected[1][1] ^= 0x01;

        let check = verify_chunks_crc8(&protected);
        assert_eq!(check.corrupt, 1);
        assert_eq!(check.chunks[0].as_deref(), Some(&b"ab"[..]));
        assert_eq!(check.chunks[1], None);
        assert!(!check.all_corrupt());
    }

    #[quickcheck]
    fn prop_crc16_detects_checksum_flip(data: Vec<u8>, bit: u8) -> bool {
        let checksum = crc16(&data);
        let flipped = checksum ^ (1 << (bit % 16));
        matches16(&data, checksum) && !matches16(&data, flipped)
    }

    #[quickcheck]
    fn prop_crc8_detects_checksum_flip(data: Vec<u8>, bit: u8) -> bool {
        let checksum = crc8(&data);
        matches8(&data, checksum) && !matches8(&data, checksum ^ (1 << (bit % 8)))
    }

    #[quickcheck]
    fn prop_crc32_detects_checksum_flip(data: Vec<u8>, bit: u8) -> bool {
        let checksum = crc32(&data);
        matches32(&data, checksum) && !matches32(&data, checksum ^ (1 << (bit % 32)))
    }

    #[quickcheck]
    fn prop_crc16_detects_payload_flip(data: Vec<u8>, pos: usize) -> bool {
        if data.is_empty() {
            return true;
        }
        let checksum = crc16(&data);
        let mut damaged = data.clone();
        let bit = pos % (data.len() * 8);
        damaged[bit / 8] ^= 1 << (bit % 8);
        !matches16(&damaged, checksum)
    }
}
