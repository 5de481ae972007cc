//! udarp-sim - compare FEC pipelines under synthetic bit corruption

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use udarp_frame::prelude::PatternOrder;
use udarp_tools::{init_logging, GlobalConfig, Harness, HarnessConfig};

/// udarp FEC simulation harness
#[derive(Parser)]
#[command(name = "udarp-sim")]
#[command(about = "Compare FEC pipelines under a fixed bit-corruption budget")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every configured pipeline and print the ranking
    Run(RunArgs),
    /// Write the default configuration to a file
    InitConfig {
        /// Output file (.toml or .json)
        output: PathBuf,
    },
    /// List configured pipelines
    Pipelines {
        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Parser)]
struct RunArgs {
    /// Configuration file (.toml or .json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Trials per pipeline
    #[arg(long)]
    runs: Option<usize>,

    /// Bits flipped per trial
    #[arg(long)]
    bits: Option<usize>,

    /// Base corruption seed
    #[arg(long)]
    seed: Option<u64>,

    /// Try the most-trusted erasure patterns first
    #[arg(long)]
    trusted_first: bool,

    /// Run trials in parallel
    #[arg(long)]
    parallel: bool,

    /// Also write the report as JSON
    #[arg(long)]
    json: Option<PathBuf>,
}

fn load(path: Option<&PathBuf>) -> Result<HarnessConfig> {
    match path {
        Some(path) => HarnessConfig::from_file(path),
        None => Ok(HarnessConfig::default()),
    }
}

fn run(args: RunArgs) -> Result<()> {
    let mut config = load(args.config.as_ref())?;
    if let Some(runs) = args.runs {
        config.total_runs = runs;
    }
    if let Some(bits) = args.bits {
        config.bits_to_corrupt = bits;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if args.trusted_first {
        config.pattern_order = PatternOrder::MostTrustedFirst;
    }
    config.parallel |= args.parallel;

    let harness = Harness::new(config).context("Failed to set up harness")?;
    info!(pipelines = harness.pipelines().count(), "harness ready");
    let report = harness.run()?;

    print!("{}", report.render_text());
    if let Some(path) = &args.json {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write report: {:?}", path))?;
        println!("report written to {:?}", path);
    }

    report.ensure_consistent()?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.global);

    match cli.command {
        Commands::Run(args) => run(args)?,

        Commands::InitConfig { output } => {
            HarnessConfig::default().save_to_file(&output)?;
            println!("default configuration written to {:?}", output);
        }

        Commands::Pipelines { config } => {
            let harness = Harness::new(load(config.as_ref())?)?;
            let config = harness.config();
            println!(
                "{} runs, {} bits corrupted, seed {}",
                config.total_runs, config.bits_to_corrupt, config.seed
            );
            for pipeline in harness.pipelines() {
                println!("  {:<18} {}", pipeline.name(), pipeline.describe());
            }
        }
    }

    Ok(())
}
