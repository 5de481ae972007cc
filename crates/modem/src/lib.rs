//! udarp modem - soft-decision demodulation
//!
//! Turns real-valued per-bit magnitude estimates into hard bits by
//! nearest-codeword search over single-parity-check blocks.

pub mod error;
pub mod soft;

pub use error::{ModemError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        error::{ModemError, Result},
        soft::{
            generate_codewords, mean_threshold_decode, soft_decode, spc_data_bits, spc_encode,
            BlockDecision, SoftDecoder,
        },
    };
}
