//! Configuration for harness runs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use udarp_frame::prelude::{Acceptance, CodecParams, ConvolutionalParams, PatternOrder};

use crate::common::{load_config, save_config};
use crate::error::HarnessError;

/// Harness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Trials per pipeline
    pub total_runs: usize,
    /// Bits flipped on the wire in every trial
    pub bits_to_corrupt: usize,
    /// Base seed; trial `t` corrupts with `seed + t`
    pub seed: u64,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub pattern_order: PatternOrder,
    #[serde(default)]
    pub acceptance: Acceptance,
    /// Duration of one transmitted bit, for air time estimates
    pub dit_length_ms: f64,
    pub payload: PayloadConfig,
    pub pipelines: Vec<PipelineConfig>,
}

/// Test payload: explicit hex bytes, or `size` copies of `fill`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadConfig {
    #[serde(default)]
    pub fill: u8,
    #[serde(default)]
    pub size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hex: Option<String>,
}

impl PayloadConfig {
    pub fn bytes(&self) -> std::result::Result<Vec<u8>, HarnessError> {
        let bytes = match &self.hex {
            Some(hex) => parse_hex(hex)?,
            None => vec![self.fill; self.size],
        };
        if bytes.is_empty() {
            return Err(HarnessError::InvalidConfig { msg: "Payload is empty".to_string() });
        }
        Ok(bytes)
    }
}

fn parse_hex(s: &str) -> std::result::Result<Vec<u8>, HarnessError> {
    let digits: Vec<char> = s.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err(HarnessError::InvalidConfig {
            msg: format!("Hex payload has odd length {}", digits.len()),
        });
    }
    digits
        .chunks(2)
        .map(|pair| {
            let text: String = pair.iter().collect();
            u8::from_str_radix(&text, 16).map_err(|_| HarnessError::InvalidConfig {
                msg: format!("Invalid hex byte '{}'", text),
            })
        })
        .collect()
}

/// Kind of FEC stack a pipeline runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    /// CRC-16 trailer and convolutional code
    Viterbi,
    /// CRC-16 prefix, Reed-Solomon shards, erasure-pattern search
    ReedSolomon,
    /// Reed-Solomon shards carried inside a convolutional code
    RsViterbi,
    /// Single-parity blocks decoded by nearest codeword
    SoftParity,
    /// Single-parity blocks sliced at the sample mean
    HardThreshold,
}

/// Analog channel for the single-parity pipelines
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoftConfig {
    pub constraint: usize,
    pub offset: f64,
    pub gain: f64,
    pub noise_sigma: f64,
}

impl Default for SoftConfig {
    fn default() -> Self {
        Self { constraint: 5, offset: 0.1, gain: 0.8, noise_sigma: 0.15 }
    }
}

/// One pipeline entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub kind: PipelineKind,
    #[serde(default)]
    pub interleave: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<CodecParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convolutional: Option<ConvolutionalParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soft: Option<SoftConfig>,
}

impl PipelineConfig {
    fn new(name: &str, kind: PipelineKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            interleave: false,
            codec: None,
            convolutional: None,
            soft: None,
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        let rs_frame = CodecParams { data_shards: 5, parity_shards: 8, chunk_size: 2 };
        let rs_inner = CodecParams { data_shards: 5, parity_shards: 3, chunk_size: 2 };

        let k15 = ConvolutionalParams::new(15, vec![91, 109, 121], false);

        let viterbi = PipelineConfig {
            convolutional: Some(k15.clone()),
            ..PipelineConfig::new("viterbi", PipelineKind::Viterbi)
        };
        let rs_crc = PipelineConfig {
            interleave: true,
            codec: Some(rs_frame),
            ..PipelineConfig::new("rs-crc", PipelineKind::ReedSolomon)
        };
        let rs_viterbi = PipelineConfig {
            interleave: true,
            codec: Some(rs_inner),
            convolutional: Some(k15),
            ..PipelineConfig::new("rs-viterbi", PipelineKind::RsViterbi)
        };
        let rs_viterbi_plain = PipelineConfig {
            name: "rs-viterbi-plain".to_string(),
            interleave: false,
            ..rs_viterbi.clone()
        };
        let soft = PipelineConfig {
            soft: Some(SoftConfig::default()),
            ..PipelineConfig::new("soft-parity", PipelineKind::SoftParity)
        };
        let hard = PipelineConfig {
            soft: Some(SoftConfig::default()),
            ..PipelineConfig::new("hard-threshold", PipelineKind::HardThreshold)
        };

        Self {
            total_runs: 10,
            bits_to_corrupt: 80,
            seed: 0,
            parallel: false,
            pattern_order: PatternOrder::Positional,
            acceptance: Acceptance::default(),
            dit_length_ms: 300.0,
            payload: PayloadConfig { fill: 0xFF, size: 8, hex: None },
            pipelines: vec![viterbi, rs_crc, rs_viterbi, rs_viterbi_plain, soft, hard],
        }
    }
}

impl HarnessConfig {
    /// Load configuration from a TOML or JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let config: Self = load_config(path)?;
        config.validate().context("Invalid harness configuration")?;
        Ok(config)
    }

    /// Save configuration to a TOML or JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        save_config(self, path)
    }

    pub fn validate(&self) -> std::result::Result<(), HarnessError> {
        if self.total_runs == 0 {
            return Err(HarnessError::InvalidConfig { msg: "total_runs must be positive".to_string() });
        }
        if !(self.dit_length_ms.is_finite() && self.dit_length_ms >= 0.0) {
            return Err(HarnessError::InvalidConfig {
                msg: format!("Invalid dit length {}", self.dit_length_ms),
            });
        }
        if self.pipelines.is_empty() {
            return Err(HarnessError::InvalidConfig { msg: "No pipelines configured".to_string() });
        }
        for (i, p) in self.pipelines.iter().enumerate() {
            if self.pipelines[..i].iter().any(|q| q.name == p.name) {
                return Err(HarnessError::InvalidConfig {
                    msg: format!("Duplicate pipeline name '{}'", p.name),
                });
            }
        }
        self.payload.bytes()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{Builder, NamedTempFile};

    fn temp_config(suffix: &str) -> NamedTempFile {
        Builder::new().suffix(suffix).tempfile().unwrap()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = HarnessConfig::default();
        config.validate().unwrap();
        assert_eq!(config.pipelines.len(), 6);
        assert_eq!(config.payload.bytes().unwrap(), vec![0xFF; 8]);
        assert!(!config.pipelines[3].interleave);
        assert_eq!(config.pipelines[3].codec, config.pipelines[2].codec);
    }

    #[test]
    fn test_default_convolutional_pipelines_share_k15() {
        let config = HarnessConfig::default();
        let k15 = ConvolutionalParams::new(15, vec![91, 109, 121], false);
        let convolutional: Vec<_> = config
            .pipelines
            .iter()
            .filter(|p| matches!(p.kind, PipelineKind::Viterbi | PipelineKind::RsViterbi))
            .collect();
        assert_eq!(convolutional.len(), 3);
        for pipeline in convolutional {
            assert_eq!(pipeline.convolutional.as_ref(), Some(&k15), "{}", pipeline.name);
        }
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let config = HarnessConfig::default();
        let temp_file = temp_config(".toml");
        let path = temp_file.path().to_path_buf();

        config.save_to_file(&path).unwrap();
        let loaded = HarnessConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_json_roundtrip() {
        let mut config = HarnessConfig::default();
        config.payload = PayloadConfig { fill: 0, size: 0, hex: Some("de ad be ef".to_string()) };
        let temp_file = temp_config(".json");
        let path = temp_file.path().to_path_buf();

        config.save_to_file(&path).unwrap();
        let loaded = HarnessConfig::from_file(&path).unwrap();
        assert_eq!(loaded.payload.bytes().unwrap(), vec![0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn test_minimal_toml() {
        let text = r#"
            total_runs = 3
            bits_to_corrupt = 4
            seed = 7
            dit_length_ms = 60.0

            [payload]
            hex = "0102"

            [[pipelines]]
            name = "rs"
            kind = "reed_solomon"
            codec = { data_shards = 4, parity_shards = 4, chunk_size = 1 }
        "#;
        let config: HarnessConfig = toml::from_str(text).unwrap();
        config.validate().unwrap();
        assert_eq!(config.acceptance, Acceptance::CrcAndSpareShard);
        assert_eq!(config.pattern_order, PatternOrder::Positional);
        assert!(!config.pipelines[0].interleave);
    }

    #[test]
    fn test_invalid_configs() {
        let mut config = HarnessConfig::default();
        config.total_runs = 0;
        assert!(config.validate().is_err());

        let mut config = HarnessConfig::default();
        config.payload.hex = Some("abc".to_string());
        assert!(config.validate().is_err());

        let mut config = HarnessConfig::default();
        config.payload.hex = Some("zz".to_string());
        assert!(config.validate().is_err());

        let mut config = HarnessConfig::default();
        let first = config.pipelines[0].clone();
        config.pipelines.push(first);
        assert!(config.validate().is_err());
    }
}
