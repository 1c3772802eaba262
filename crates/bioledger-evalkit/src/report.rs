//! Persisted evaluation artifacts.
//!
//! Four files make a run reproducible: the generated materials plan, a
//! per-material CSV of expected and observed outcomes, a summary with
//! exact counts and fail-reason histograms, and the benchmark report.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::bench::BenchReport;
use crate::harness::EvaluationSummary;
use crate::workload::Dataset;

/// Writes run artifacts into one directory.
pub struct ReportWriter {
    out_dir: PathBuf,
}

impl ReportWriter {
    /// Create a writer; the directory is created if absent.
    pub fn new(out_dir: impl Into<PathBuf>) -> io::Result<Self> {
        let out_dir = out_dir.into();
        fs::create_dir_all(&out_dir)?;
        Ok(Self { out_dir })
    }

    /// The full generated dataset, including ground truth.
    pub fn write_materials_json(&self, dataset: &Dataset) -> io::Result<PathBuf> {
        let path = self.out_dir.join(format!("{}-materials.json", dataset.config.name));
        let json = serde_json::to_string_pretty(dataset)?;
        fs::write(&path, json)?;
        info!(path = %path.display(), "wrote materials plan");
        Ok(path)
    }

    /// One CSV row per material: ground truth and both verdicts.
    pub fn write_expectations_csv(&self, summary: &EvaluationSummary) -> io::Result<PathBuf> {
        let path = self.out_dir.join(format!("{}-expectations.csv", summary.dataset));

        let mut csv = String::from(
            "material_id,ground_truth,on_chain_pass,on_chain_reasons,full_pass,full_reasons\n",
        );
        for outcome in &summary.materials {
            let truth: Vec<&str> = outcome.ground_truth.iter().map(|a| a.label()).collect();
            let on_chain: Vec<&str> = outcome.on_chain_reasons.iter().map(|r| r.as_str()).collect();
            let full: Vec<&str> = outcome.full_reasons.iter().map(|r| r.as_str()).collect();
            let _ = writeln!(
                csv,
                "{},{},{},{},{},{}",
                outcome.material_id,
                truth.join("|"),
                outcome.on_chain_pass,
                on_chain.join("|"),
                outcome.full_pass,
                full.join("|"),
            );
        }

        fs::write(&path, csv)?;
        info!(path = %path.display(), rows = summary.materials.len(), "wrote expectations csv");
        Ok(path)
    }

    /// Counts, rates, histograms, and confusion statistics.
    pub fn write_summary_json(&self, summary: &EvaluationSummary) -> io::Result<PathBuf> {
        let path = self.out_dir.join(format!("{}-summary.json", summary.dataset));
        let json = serde_json::to_string_pretty(summary)?;
        fs::write(&path, json)?;
        info!(path = %path.display(), "wrote evaluation summary");
        Ok(path)
    }

    /// Latency, throughput, and scaling measurements.
    pub fn write_benchmark_json(&self, report: &BenchReport) -> io::Result<PathBuf> {
        let path = self.out_dir.join("benchmark.json");
        let json = serde_json::to_string_pretty(report)?;
        fs::write(&path, json)?;
        info!(path = %path.display(), "wrote benchmark report");
        Ok(path)
    }

    /// Where the artifacts land.
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }
}
