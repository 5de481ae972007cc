//! CRC integrity envelope around a payload

use serde::{Deserialize, Serialize};
use udarp_core::crc::CrcKind;

use crate::{FrameError, Result};

/// Where the checksum sits relative to the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrcPlacement {
    Prefix,
    Suffix,
}

/// Byte order of the stored checksum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    Little,
    Big,
}

/// Checksum layout used to accept or reject a decoded candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntegrityEnvelope {
    pub kind: CrcKind,
    pub placement: CrcPlacement,
    pub byte_order: ByteOrder,
}

impl Default for IntegrityEnvelope {
    fn default() -> Self {
        Self::RS_FRAME
    }
}

impl IntegrityEnvelope {
    /// CRC-16 little-endian prefix, used in front of Reed-Solomon frames
    pub const RS_FRAME: Self = Self::new(CrcKind::Crc16, CrcPlacement::Prefix, ByteOrder::Little);

    /// CRC-16 big-endian suffix, used behind convolutionally coded payloads
    pub const TRAILER: Self = Self::new(CrcKind::Crc16, CrcPlacement::Suffix, ByteOrder::Big);

    pub const fn new(kind: CrcKind, placement: CrcPlacement, byte_order: ByteOrder) -> Self {
        Self { kind, placement, byte_order }
    }

    /// Bytes the checksum adds to a payload
    pub fn overhead(&self) -> usize {
        self.kind.width()
    }

    fn checksum_bytes(&self, checksum: u32) -> Vec<u8> {
        let width = self.kind.width();
        match self.byte_order {
            ByteOrder::Little => checksum.to_le_bytes()[..width].to_vec(),
            ByteOrder::Big => checksum.to_be_bytes()[4 - width..].to_vec(),
        }
    }

    fn read_checksum(&self, bytes: &[u8]) -> u32 {
        let fold = |acc: u32, &b: &u8| (acc << 8) | b as u32;
        match self.byte_order {
            ByteOrder::Little => bytes.iter().rev().fold(0, fold),
            ByteOrder::Big => bytes.iter().fold(0, fold),
        }
    }

    /// Attach the checksum of `payload`.
    pub fn seal(&self, payload: &[u8]) -> Vec<u8> {
        let checksum = self.checksum_bytes(self.kind.checksum(payload));
        let mut out = Vec::with_capacity(payload.len() + checksum.len());
        match self.placement {
            CrcPlacement::Prefix => {
                out.extend_from_slice(&checksum);
                out.extend_from_slice(payload);
            }
            CrcPlacement::Suffix => {
                out.extend_from_slice(payload);
                out.extend_from_slice(&checksum);
            }
        }
        out
    }

    /// Check and remove the checksum, returning the payload.
    pub fn open<'a>(&self, sealed: &'a [u8]) -> Result<&'a [u8]> {
        let width = self.kind.width();
        if sealed.len() < width {
            return Err(FrameError::InvalidFormat {
                msg: format!("{} bytes cannot hold a {}-byte checksum", sealed.len(), width),
            });
        }
        let (stored, payload) = match self.placement {
            CrcPlacement::Prefix => {
                let (crc, body) = sealed.split_at(width);
                (crc, body)
            }
            CrcPlacement::Suffix => {
                let (body, crc) = sealed.split_at(sealed.len() - width);
                (crc, body)
            }
        };

        if self.kind.matches(payload, self.read_checksum(stored)) {
            Ok(payload)
        } else {
            Err(FrameError::CrcMismatch)
        }
    }

    /// Drop `bytes_padded` trailing pad bytes, then [`open`](Self::open).
    pub fn open_padded<'a>(&self, data: &'a [u8], bytes_padded: usize) -> Result<&'a [u8]> {
        if bytes_padded > data.len() {
            return Err(FrameError::InvalidFormat {
                msg: format!("{} padding bytes exceed {} decoded bytes", bytes_padded, data.len()),
            });
        }
        self.open(&data[..data.len() - bytes_padded])
    }

    /// Upper bound on the chance that one wrong candidate passes the check
    pub fn false_accept_probability(&self) -> f64 {
        0.5f64.powi(8 * self.kind.width() as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use udarp_core::crc::crc16;

    #[test]
    fn test_rs_frame_layout() {
        let sealed = IntegrityEnvelope::RS_FRAME.seal(b"123456789");
        assert_eq!(&sealed[..2], &[0x37, 0x4B]);
        assert_eq!(&sealed[2..], b"123456789");
        assert_eq!(IntegrityEnvelope::RS_FRAME.open(&sealed).unwrap(), b"123456789");
    }

    #[test]
    fn test_trailer_layout() {
        let sealed = IntegrityEnvelope::TRAILER.seal(b"123456789");
        assert_eq!(&sealed[9..], &crc16(b"123456789").to_be_bytes());
        assert_eq!(IntegrityEnvelope::TRAILER.open(&sealed).unwrap(), b"123456789");
    }

    #[test]
    fn test_crc8_and_crc32_envelopes() {
        for kind in [CrcKind::Crc8, CrcKind::Crc32] {
            let env = IntegrityEnvelope::new(kind, CrcPlacement::Suffix, ByteOrder::Little);
            let sealed = env.seal(b"data");
            assert_eq!(sealed.len(), 4 + kind.width());
            assert_eq!(env.open(&sealed).unwrap(), b"data");
        }
    }

    #[test]
    fn test_open_rejects() {
        let env = IntegrityEnvelope::RS_FRAME;
        let mut sealed = env.seal(b"abc");
        sealed[3] ^= 0x02;
        assert_eq!(env.open(&sealed), Err(FrameError::CrcMismatch));
        assert!(matches!(env.open(&[0x01]), Err(FrameError::InvalidFormat { .. })));
    }

    #[test]
    fn test_open_padded() {
        let env = IntegrityEnvelope::RS_FRAME;
        let mut data = env.seal(b"hi");
        data.extend_from_slice(&[0, 0, 0]);
        assert_eq!(env.open_padded(&data, 3).unwrap(), b"hi");
        assert!(env.open_padded(&data, 2).is_err());
        assert!(env.open_padded(&data, 99).is_err());
    }

    #[test]
    fn test_false_accept_probability() {
        assert_eq!(IntegrityEnvelope::RS_FRAME.false_accept_probability(), 1.0 / 65536.0);
    }

    #[quickcheck]
    fn prop_single_bit_flip_is_rejected(payload: Vec<u8>, bit: usize) -> bool {
        let env = IntegrityEnvelope::TRAILER;
        let mut sealed = env.seal(&payload);
        let bit = bit % (sealed.len() * 8);
        sealed[bit / 8] ^= 1 << (bit % 8);
        env.open(&sealed).is_err()
    }
}
