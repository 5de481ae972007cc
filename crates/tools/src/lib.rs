//! udarp tools library
//!
//! Simulation harness comparing FEC pipelines under a fixed bit-corruption
//! budget, plus the configuration plumbing behind the `udarp-sim` binary.

pub mod common;
pub mod config;
pub mod error;
pub mod harness;
pub mod pipeline;

pub use common::{init_logging, GlobalConfig, ProgressReporter};
pub use config::{HarnessConfig, PayloadConfig, PipelineConfig, PipelineKind, SoftConfig};
pub use error::{HarnessError, Result};
pub use harness::{Harness, HarnessReport, PipelineSummary};
pub use pipeline::{build_pipeline, Pipeline, RunStats, TestParams};
