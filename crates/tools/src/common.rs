//! Common utilities for the udarp tools

use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Global options shared by every subcommand
#[derive(Debug, Clone, Default, Serialize, Deserialize, Args)]
pub struct GlobalConfig {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,
}

impl GlobalConfig {
    pub fn log_level(&self) -> tracing::Level {
        if self.debug {
            tracing::Level::DEBUG
        } else if self.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        }
    }
}

/// Install the fmt subscriber at the level the flags select.
pub fn init_logging(config: &GlobalConfig) {
    tracing_subscriber::fmt()
        .with_max_level(config.log_level())
        .with_target(false)
        .init();
}

/// On-disk configuration format, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension; anything but `.json` is TOML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => ConfigFormat::Json,
            _ => ConfigFormat::Toml,
        }
    }
}

/// Load configuration from file
pub fn load_config<T: for<'a> Deserialize<'a>>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    match ConfigFormat::from_path(path) {
        ConfigFormat::Json => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON config: {:?}", path)),
        ConfigFormat::Toml => toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {:?}", path)),
    }
}

/// Save configuration to file
pub fn save_config<T: Serialize>(config: &T, path: &Path) -> Result<()> {
    let content = match ConfigFormat::from_path(path) {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config).context("Failed to serialize config")?,
    };

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;
    Ok(())
}

/// Progress reporter for long-running operations
pub struct ProgressReporter {
    label: String,
    total: usize,
    current: usize,
    last_percent: usize,
}

impl ProgressReporter {
    pub fn new(label: impl Into<String>, total: usize) -> Self {
        Self { label: label.into(), total, current: 0, last_percent: 0 }
    }

    /// Advance by one unit, logging at every tenth of the total
    pub fn tick(&mut self) {
        self.current += 1;
        if self.total == 0 {
            return;
        }
        let percent = self.current * 100 / self.total;
        if percent / 10 > self.last_percent / 10 {
            info!(label = %self.label, percent, "progress");
            self.last_percent = percent;
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_config_format_detection() {
        assert_eq!(ConfigFormat::from_path(&PathBuf::from("sim.json")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(&PathBuf::from("sim.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(&PathBuf::from("sim")), ConfigFormat::Toml);
    }

    #[test]
    fn test_log_level() {
        let mut config = GlobalConfig::default();
        assert_eq!(config.log_level(), tracing::Level::WARN);
        config.verbose = true;
        assert_eq!(config.log_level(), tracing::Level::INFO);
        config.debug = true;
        assert_eq!(config.log_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_progress_reporter() {
        let mut reporter = ProgressReporter::new("trials", 20);
        for _ in 0..20 {
            reporter.tick();
        }
        assert_eq!(reporter.current(), 20);
        assert_eq!(reporter.last_percent, 100);
    }
}
