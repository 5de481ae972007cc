//! Simulation harness
//!
//! Runs every configured pipeline for a fixed number of trials with the same
//! payload and corruption budget, then ranks them. Trial `t` of every
//! pipeline corrupts with seed `seed + t`, so results do not depend on
//! whether trials run in parallel.

use serde::Serialize;
use std::fmt::Write as _;
use tracing::{error, info};

use udarp_frame::prelude::PatternCache;

use crate::common::ProgressReporter;
use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};
use crate::pipeline::{build_pipeline, Pipeline, RunStats, TestParams};

/// Aggregate over one pipeline's trials
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineSummary {
    pub name: String,
    pub description: String,
    pub runs: usize,
    pub passes: usize,
    pub pass_ratio: f64,
    pub avg_total_bits: f64,
    pub avg_corrupt_bits: f64,
    /// Corrupted bits per wire bit
    pub error_rate: f64,
    /// Wire bits per payload bit
    pub bit_growth: f64,
    /// Seconds on air at one dit per bit
    pub air_time_secs: f64,
    /// Mean attempts over passing trials only
    pub avg_attempts: Option<f64>,
    pub total_blocks: usize,
    pub corrupt_blocks: usize,
    /// Passing trials whose payload was wrong
    pub mismatches: usize,
    #[serde(skip)]
    first_mismatch: Option<usize>,
}

impl PipelineSummary {
    fn from_runs(pipeline: &dyn Pipeline, payload: &[u8], runs: &[RunStats], dit_length_ms: f64) -> Self {
        let n = runs.len().max(1) as f64;
        let mut passes = 0;
        let mut attempts = 0;
        let mut mismatches = 0;
        let mut first_mismatch = None;

        for (trial, stats) in runs.iter().enumerate() {
            match &stats.decoded {
                Some(decoded) if decoded.as_slice() != payload => {
                    error!(
                        pipeline = pipeline.name(),
                        trial,
                        "trial passed with a payload that differs from the one sent"
                    );
                    mismatches += 1;
                    first_mismatch.get_or_insert(trial);
                }
                Some(_) if stats.pass => {
                    passes += 1;
                    attempts += stats.attempts;
                }
                _ => {}
            }
        }

        let avg_total_bits = runs.iter().map(|r| r.total_bits).sum::<usize>() as f64 / n;
        let avg_corrupt_bits = runs.iter().map(|r| r.corrupt_bits).sum::<usize>() as f64 / n;
        let payload_bits = (payload.len() * 8) as f64;

        Self {
            name: pipeline.name().to_string(),
            description: pipeline.describe(),
            runs: runs.len(),
            passes,
            pass_ratio: passes as f64 / n,
            avg_total_bits,
            avg_corrupt_bits,
            error_rate: if avg_total_bits > 0.0 { avg_corrupt_bits / avg_total_bits } else { 0.0 },
            bit_growth: avg_total_bits / payload_bits,
            air_time_secs: avg_total_bits * dit_length_ms / 1000.0,
            avg_attempts: (passes > 0).then(|| attempts as f64 / passes as f64),
            total_blocks: runs.iter().map(|r| r.total_blocks).sum(),
            corrupt_blocks: runs.iter().map(|r| r.corrupt_blocks).sum(),
            mismatches,
            first_mismatch,
        }
    }
}

/// Ranked results of a harness run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HarnessReport {
    pub runs_per_pipeline: usize,
    pub bits_to_corrupt: usize,
    pub payload_len: usize,
    /// Best first
    pub summaries: Vec<PipelineSummary>,
}

impl HarnessReport {
    /// Pipeline with the most passes
    pub fn best(&self) -> Option<&PipelineSummary> {
        self.summaries.first().filter(|s| s.passes > 0)
    }

    /// Fail if any pipeline accepted a wrong payload.
    pub fn ensure_consistent(&self) -> Result<()> {
        match self.summaries.iter().find(|s| s.mismatches > 0) {
            Some(s) => Err(HarnessError::DecodedDataMismatch {
                pipeline: s.name.clone(),
                first_trial: s.first_mismatch.unwrap_or_default(),
                count: s.mismatches,
            }),
            None => Ok(()),
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} runs per pipeline, {} bits corrupted, {} byte payload",
            self.runs_per_pipeline, self.bits_to_corrupt, self.payload_len
        );
        let _ = writeln!(
            out,
            "{:<18} {:>6} {:>9} {:>8} {:>7} {:>9} {:>9}  {}",
            "pipeline", "pass", "bits", "err%", "growth", "air(s)", "attempts", "stack"
        );
        for s in &self.summaries {
            let attempts = s.avg_attempts.map_or_else(|| "-".to_string(), |a| format!("{:.1}", a));
            let _ = writeln!(
                out,
                "{:<18} {:>3}/{:<2} {:>9.1} {:>8.2} {:>7.2} {:>9.1} {:>9}  {}",
                s.name,
                s.passes,
                s.runs,
                s.avg_total_bits,
                s.error_rate * 100.0,
                s.bit_growth,
                s.air_time_secs,
                attempts,
                s.description
            );
        }
        match self.best() {
            Some(best) => {
                let _ = writeln!(out, "best: {} ({} of {} passed)", best.name, best.passes, best.runs);
            }
            None => {
                let _ = writeln!(out, "best: none, no pipeline passed");
            }
        }
        out
    }
}

/// Order by passes, then by tolerated error rate, then by smaller bit growth.
fn rank(summaries: &mut [PipelineSummary]) {
    summaries.sort_by(|a, b| {
        b.passes
            .cmp(&a.passes)
            .then(b.error_rate.total_cmp(&a.error_rate))
            .then(a.bit_growth.total_cmp(&b.bit_growth))
    });
}

/// Runs configured pipelines against a shared pattern cache
pub struct Harness {
    config: HarnessConfig,
    payload: Vec<u8>,
    pipelines: Vec<Box<dyn Pipeline>>,
    patterns: PatternCache,
}

impl Harness {
    pub fn new(config: HarnessConfig) -> Result<Self> {
        config.validate()?;
        let payload = config.payload.bytes()?;
        let pipelines = config
            .pipelines
            .iter()
            .map(build_pipeline)
            .collect::<Result<Vec<_>>>()?;

        // built before any trial so parallel trials only read the cache
        let patterns = PatternCache::new();
        for shards in pipelines.iter().filter_map(|p| p.search_shards()) {
            patterns.warm(shards, config.pattern_order)?;
        }

        Ok(Self { config, payload, pipelines, patterns })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn pipelines(&self) -> impl Iterator<Item = &dyn Pipeline> {
        self.pipelines.iter().map(|p| p.as_ref())
    }

    /// Run every pipeline and rank the results. Wrong-payload trials are
    /// counted in the report; see [`HarnessReport::ensure_consistent`].
    pub fn run(&self) -> Result<HarnessReport> {
        let mut summaries = Vec::with_capacity(self.pipelines.len());
        for pipeline in &self.pipelines {
            info!(pipeline = pipeline.name(), runs = self.config.total_runs, "running pipeline");
            let runs = self.trials(pipeline.as_ref())?;
            let summary =
                PipelineSummary::from_runs(pipeline.as_ref(), &self.payload, &runs, self.config.dit_length_ms);
            info!(
                pipeline = pipeline.name(),
                passes = summary.passes,
                mismatches = summary.mismatches,
                "pipeline finished"
            );
            summaries.push(summary);
        }
        rank(&mut summaries);

        Ok(HarnessReport {
            runs_per_pipeline: self.config.total_runs,
            bits_to_corrupt: self.config.bits_to_corrupt,
            payload_len: self.payload.len(),
            summaries,
        })
    }

    fn params(&self, trial: usize) -> TestParams<'_> {
        TestParams {
            payload: &self.payload,
            bits_to_corrupt: self.config.bits_to_corrupt,
            seed: self.config.seed.wrapping_add(trial as u64),
            patterns: &self.patterns,
            order: self.config.pattern_order,
            acceptance: self.config.acceptance,
        }
    }

    fn trials(&self, pipeline: &dyn Pipeline) -> Result<Vec<RunStats>> {
        if self.config.parallel {
            self.parallel_trials(pipeline)
        } else {
            self.sequential_trials(pipeline)
        }
    }

    fn sequential_trials(&self, pipeline: &dyn Pipeline) -> Result<Vec<RunStats>> {
        let mut progress = ProgressReporter::new(pipeline.name(), self.config.total_runs);
        (0..self.config.total_runs)
            .map(|trial| {
                let stats = pipeline.run(&self.params(trial));
                progress.tick();
                stats
            })
            .collect()
    }

    #[cfg(feature = "parallel")]
    fn parallel_trials(&self, pipeline: &dyn Pipeline) -> Result<Vec<RunStats>> {
        use rayon::prelude::*;
        (0..self.config.total_runs)
            .into_par_iter()
            .map(|trial| pipeline.run(&self.params(trial)))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn parallel_trials(&self, pipeline: &dyn Pipeline) -> Result<Vec<RunStats>> {
        tracing::warn!("built without the parallel feature, running trials sequentially");
        self.sequential_trials(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PayloadConfig, PipelineConfig, PipelineKind};
    use udarp_frame::prelude::{CodecParams, ConvolutionalParams};

    struct Liar;

    impl Pipeline for Liar {
        fn name(&self) -> &str {
            "liar"
        }

        fn describe(&self) -> String {
            "always accepts zeros".to_string()
        }

        fn run(&self, params: &TestParams<'_>) -> Result<RunStats> {
            Ok(RunStats {
                pass: true,
                total_bits: 8,
                corrupt_bits: 0,
                total_blocks: 1,
                corrupt_blocks: 0,
                attempts: 1,
                decoded: Some(vec![0; params.payload.len()]),
            })
        }
    }

    fn small_config() -> HarnessConfig {
        HarnessConfig {
            total_runs: 6,
            bits_to_corrupt: 2,
            seed: 99,
            payload: PayloadConfig { fill: 0xA5, size: 6, hex: None },
            pipelines: vec![
                PipelineConfig {
                    name: "viterbi".to_string(),
                    kind: PipelineKind::Viterbi,
                    interleave: false,
                    codec: None,
                    convolutional: Some(ConvolutionalParams::new(7, vec![0o171, 0o133], false)),
                    soft: None,
                },
                PipelineConfig {
                    name: "rs".to_string(),
                    kind: PipelineKind::ReedSolomon,
                    interleave: true,
                    codec: Some(CodecParams { data_shards: 4, parity_shards: 4, chunk_size: 2 }),
                    convolutional: None,
                    soft: None,
                },
            ],
            ..HarnessConfig::default()
        }
    }

    #[test]
    fn test_run_produces_ranked_report() {
        let harness = Harness::new(small_config()).unwrap();
        let report = harness.run().unwrap();
        report.ensure_consistent().unwrap();

        assert_eq!(report.summaries.len(), 2);
        assert_eq!(report.runs_per_pipeline, 6);
        assert!(report.summaries[0].passes >= report.summaries[1].passes);
        for s in &report.summaries {
            assert_eq!(s.runs, 6);
            assert_eq!(s.avg_corrupt_bits, 2.0);
            assert!(s.bit_growth > 1.0);
            assert_eq!(s.mismatches, 0);
        }
        let text = report.render_text();
        assert!(text.contains("viterbi"));
        assert!(text.contains("best:"));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let sequential = Harness::new(small_config()).unwrap().run().unwrap();
        let parallel = Harness::new(HarnessConfig { parallel: true, ..small_config() })
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_wrong_payload_is_flagged() {
        let mut harness = Harness::new(small_config()).unwrap();
        harness.pipelines.push(Box::new(Liar));
        let report = harness.run().unwrap();

        let liar = report.summaries.iter().find(|s| s.name == "liar").unwrap();
        assert_eq!(liar.passes, 0);
        assert_eq!(liar.mismatches, 6);
        assert_eq!(
            report.ensure_consistent(),
            Err(HarnessError::DecodedDataMismatch {
                pipeline: "liar".to_string(),
                first_trial: 0,
                count: 6
            })
        );
    }

    #[test]
    fn test_summary_arithmetic() {
        let runs = vec![
            RunStats {
                pass: true,
                total_bits: 100,
                corrupt_bits: 10,
                total_blocks: 4,
                corrupt_blocks: 1,
                attempts: 3,
                decoded: Some(vec![7; 2]),
            },
            RunStats {
                pass: false,
                total_bits: 100,
                corrupt_bits: 10,
                total_blocks: 4,
                corrupt_blocks: 3,
                attempts: 64,
                decoded: None,
            },
        ];
        let summary = PipelineSummary::from_runs(&Liar, &[7, 7], &runs, 300.0);
        assert_eq!(summary.passes, 1);
        assert_eq!(summary.pass_ratio, 0.5);
        assert_eq!(summary.error_rate, 0.1);
        assert_eq!(summary.bit_growth, 100.0 / 16.0);
        assert_eq!(summary.air_time_secs, 30.0);
        assert_eq!(summary.avg_attempts, Some(3.0));
        assert_eq!(summary.corrupt_blocks, 4);
    }

    #[test]
    fn test_ranking_breaks_ties_on_error_rate() {
        let mut a = PipelineSummary::from_runs(&Liar, &[0], &[], 0.0);
        a.name = "a".to_string();
        a.passes = 3;
        a.error_rate = 0.1;
        let mut b = a.clone();
        b.name = "b".to_string();
        b.error_rate = 0.2;
        let mut c = a.clone();
        c.name = "c".to_string();
        c.passes = 5;

        let mut summaries = vec![a, b, c];
        rank(&mut summaries);
        let names: Vec<&str> = summaries.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["c", "b", "a"]);
    }

    #[test]
    fn test_report_serializes_to_json() {
        let report = Harness::new(small_config()).unwrap().run().unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["summaries"].as_array().unwrap().len(), 2);
        assert!(json["summaries"][0].get("first_mismatch").is_none());
    }
}
