//! udarp core - bit level primitives for the FEC link
//!
//! This crate provides bit/byte conversions, CRC checksums and the
//! random bit-flip channel used to exercise the decoders.

pub mod bits;
pub mod corrupt;
pub mod crc;
pub mod error;

pub use error::{CoreError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        bits::{bits_to_bytes, bits_to_string, bytes_to_bits, string_to_bits, BitOrder},
        corrupt::{compare_byte_bits, compare_int_bits, flip_byte_bits, flip_int_bits},
        crc::{crc16, crc32, crc8, matches16, matches32, matches8, CrcKind},
        error::{CoreError, Result},
    };
}
