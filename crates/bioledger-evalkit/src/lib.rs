//! # bioledger-evalkit
//!
//! Reproducible measurement for the bioledger registry: deterministic
//! labelled workloads, a materialization and evaluation harness, latency
//! and throughput benchmarks, and the persisted artifacts that make a
//! run auditable.
//!
//! Also home to the shared [`TestBench`] fixture and proptest
//! [`generators`] used across the workspace's tests.

pub mod bench;
pub mod fixtures;
pub mod generators;
pub mod harness;
pub mod metrics;
pub mod report;
pub mod workload;

pub use bench::{run as run_benchmarks, BenchConfig, BenchReport, ScalePoint, ThroughputPoint};
pub use fixtures::TestBench;
pub use harness::{
    evaluate, materialize, ClassOutcome, EvaluationSummary, HarnessError, MaterialOutcome,
    MaterializedDataset,
};
pub use metrics::{ConfusionMatrix, DerivedRates, LatencyStats};
pub use report::ReportWriter;
pub use workload::{generate, Anomaly, CredentialPlan, Dataset, DatasetConfig, MaterialPlan};
