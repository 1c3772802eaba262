//! Registry performance measurement.
//!
//! Latency is measured around the await of each registry call, i.e.
//! submission through committed receipt; every write receipt is checked
//! for finality before its sample counts. Throughput runs a mixed
//! read/write workload at fixed concurrency over a read pool frozen
//! before the run. Scaling runs register materials incrementally
//! (`target - previous`) so earlier scale points do not re-register
//! their population.

use std::collections::BTreeMap;
use std::time::Instant;

use bioledger_core::{CredentialType, MaterialId, MaterialStatus, Sha256Hash};
use bioledger_registry::unix_now;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::fixtures::TestBench;
use crate::harness::Result;
use crate::metrics::LatencyStats;

/// Benchmark configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Samples per operation in the latency runs.
    pub iterations: usize,
    /// Worker counts for the throughput runs.
    pub concurrency_levels: Vec<usize>,
    /// Operations each worker performs per throughput run.
    pub ops_per_worker: usize,
    /// Fraction of reads in the mixed workload.
    pub read_fraction: f64,
    /// Material counts for the scaling run, ascending.
    pub scaling_targets: Vec<usize>,
    pub seed: u64,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            concurrency_levels: vec![1, 4, 16],
            ops_per_worker: 50,
            read_fraction: 0.7,
            scaling_targets: vec![100, 200, 400],
            seed: 7,
        }
    }
}

/// One throughput measurement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThroughputPoint {
    pub concurrency: usize,
    pub total_ops: usize,
    pub reads: usize,
    pub writes: usize,
    pub elapsed_ms: f64,
    pub ops_per_sec: f64,
}

/// Read latencies at one registry size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalePoint {
    pub registered_total: usize,
    pub newly_registered: usize,
    pub verify_material: LatencyStats,
    pub get_material: LatencyStats,
    pub history_slice: LatencyStats,
}

/// Full benchmark output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchReport {
    pub config: BenchConfig,
    /// Operation name -> latency summary.
    pub latency: BTreeMap<String, LatencyStats>,
    pub throughput: Vec<ThroughputPoint>,
    pub scaling: Vec<ScalePoint>,
}

/// Run the complete benchmark suite against a fresh bench.
pub async fn run(bench: &TestBench, config: &BenchConfig) -> Result<BenchReport> {
    bench.authorize_default_issuers().await?;

    let latency = run_latency(bench, config).await?;

    // Freeze the read pool before any throughput measurement; later
    // registrations must not grow the population mid-run.
    let pool = register_pool(bench, config.iterations.max(32)).await?;
    let mut throughput = Vec::new();
    for &level in &config.concurrency_levels {
        throughput.push(run_throughput(bench, config, &pool, level).await?);
    }

    let scaling = run_scaling(bench, config).await?;

    info!("benchmark suite complete");
    Ok(BenchReport { config: config.clone(), latency, throughput, scaling })
}

/// Per-operation latency, sampled `config.iterations` times each.
pub async fn run_latency(
    bench: &TestBench,
    config: &BenchConfig,
) -> Result<BTreeMap<String, LatencyStats>> {
    let owner = bench.owner.address();
    let recipient = bench.recipient.address();
    let qc = bench.qc_issuer.address();
    let n = config.iterations;
    if n == 0 {
        return Ok(BTreeMap::new());
    }

    let mut samples: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    let mut ids: Vec<MaterialId> = Vec::with_capacity(n);

    for i in 0..n {
        let start = Instant::now();
        let (id, receipt) = bench
            .registry
            .register_material(owner, "CELL_LINE", Sha256Hash::hash(&i.to_be_bytes()), "bench-org")
            .await?;
        let elapsed = start.elapsed();
        receipt.ensure_finalized()?;
        samples.entry("register_material").or_default().push(micros(elapsed));
        ids.push(id);
    }

    let mut credential_ids = Vec::with_capacity(n);
    for (i, id) in ids.iter().enumerate() {
        let start = Instant::now();
        let (cred, receipt) = bench
            .registry
            .issue_credential(
                qc,
                *id,
                CredentialType::QcMyco,
                Sha256Hash::hash(&[i as u8, 1]),
                0,
                &format!("bench-artifact:{i}"),
                Sha256Hash::hash(&[i as u8, 2]),
                "qc-works",
            )
            .await?;
        let elapsed = start.elapsed();
        receipt.ensure_finalized()?;
        samples.entry("issue_credential").or_default().push(micros(elapsed));
        credential_ids.push(cred);
    }

    for cred in &credential_ids {
        let start = Instant::now();
        let receipt = bench.registry.revoke_credential(qc, *cred).await?;
        let elapsed = start.elapsed();
        receipt.ensure_finalized()?;
        samples.entry("revoke_credential").or_default().push(micros(elapsed));
    }

    for (i, id) in ids.iter().enumerate() {
        let status = if i % 2 == 0 { MaterialStatus::Quarantined } else { MaterialStatus::Active };
        let start = Instant::now();
        let receipt = bench
            .registry
            .set_status_by_owner(owner, *id, status, Sha256Hash::hash(b"bench"))
            .await?;
        let elapsed = start.elapsed();
        receipt.ensure_finalized()?;
        samples.entry("set_status_by_owner").or_default().push(micros(elapsed));
    }

    // Transfers ping-pong between owner and recipient so each iteration
    // starts from a clean, active, pending-free material.
    let transfer_material = match ids.iter().enumerate().find(|(i, _)| i % 2 == 1) {
        // Odd indices ended the status loop ACTIVE
        Some((_, id)) => *id,
        None => {
            // Single-iteration runs left their only material quarantined
            let receipt = bench
                .registry
                .set_status_by_owner(owner, ids[0], MaterialStatus::Active, Sha256Hash::hash(b"bench"))
                .await?;
            receipt.ensure_finalized()?;
            ids[0]
        }
    };
    let mut holder = owner;
    let mut next = recipient;
    for i in 0..n {
        let start = Instant::now();
        let (_, receipt) = bench
            .registry
            .initiate_transfer(holder, transfer_material, next, "bench-org", Sha256Hash::hash(&[i as u8]))
            .await?;
        let elapsed = start.elapsed();
        receipt.ensure_finalized()?;
        samples.entry("initiate_transfer").or_default().push(micros(elapsed));

        let start = Instant::now();
        let receipt = bench.registry.accept_transfer(next, transfer_material).await?;
        let elapsed = start.elapsed();
        receipt.ensure_finalized()?;
        samples.entry("accept_transfer").or_default().push(micros(elapsed));

        std::mem::swap(&mut holder, &mut next);
    }

    for id in &ids {
        let start = Instant::now();
        let _ = bench.registry.verify_material(id).await?;
        samples.entry("verify_material").or_default().push(micros(start.elapsed()));

        let start = Instant::now();
        let _ = bench.registry.get_material(id).await;
        samples.entry("get_material").or_default().push(micros(start.elapsed()));

        let start = Instant::now();
        let _ = bench.registry.get_history_slice(0, 64).await;
        samples.entry("get_history_slice").or_default().push(micros(start.elapsed()));
    }

    Ok(samples
        .into_iter()
        .filter_map(|(name, s)| LatencyStats::from_samples(s).map(|st| (name.to_string(), st)))
        .collect())
}

/// Mixed 70/30 read/write workload at one concurrency level.
pub async fn run_throughput(
    bench: &TestBench,
    config: &BenchConfig,
    frozen_pool: &[MaterialId],
    concurrency: usize,
) -> Result<ThroughputPoint> {
    let qc = bench.qc_issuer.address();
    let at_time = unix_now();
    let started = Instant::now();

    let mut workers = Vec::with_capacity(concurrency);
    for worker in 0..concurrency {
        let registry = bench.registry.clone();
        let pool: Vec<MaterialId> = frozen_pool.to_vec();
        let ops = config.ops_per_worker;
        let read_fraction = config.read_fraction;
        let mut rng = StdRng::seed_from_u64(config.seed ^ (worker as u64) << 32);

        workers.push(tokio::spawn(async move {
            let mut reads = 0usize;
            let mut writes = 0usize;
            for i in 0..ops {
                let id = pool[rng.gen_range(0..pool.len())];
                if rng.gen_bool(read_fraction) {
                    let _ = registry.verify_material_at(&id, at_time).await?;
                    reads += 1;
                } else {
                    // All writes funnel through the single-writer queue;
                    // no identifier collisions at any concurrency.
                    let (_, receipt) = registry
                        .issue_credential(
                            qc,
                            id,
                            CredentialType::QcMyco,
                            Sha256Hash::hash(&[worker as u8, i as u8, 1]),
                            0,
                            &format!("tp:{worker}:{i}"),
                            Sha256Hash::hash(&[worker as u8, i as u8, 2]),
                            "qc-works",
                        )
                        .await?;
                    receipt.ensure_finalized()?;
                    writes += 1;
                }
            }
            Ok::<(usize, usize), crate::harness::HarnessError>((reads, writes))
        }));
    }

    let mut reads = 0;
    let mut writes = 0;
    for worker in workers {
        let (r, w) = worker
            .await
            .map_err(|e| crate::harness::HarnessError::Plan(format!("worker panicked: {e}")))??;
        reads += r;
        writes += w;
    }

    let elapsed = started.elapsed();
    let total_ops = reads + writes;
    let elapsed_ms = elapsed.as_secs_f64() * 1e3;
    Ok(ThroughputPoint {
        concurrency,
        total_ops,
        reads,
        writes,
        elapsed_ms,
        ops_per_sec: total_ops as f64 / elapsed.as_secs_f64().max(1e-9),
    })
}

/// Read latency at increasing registry sizes. Each point registers only
/// the increment over the previous one.
pub async fn run_scaling(bench: &TestBench, config: &BenchConfig) -> Result<Vec<ScalePoint>> {
    let mut points = Vec::new();
    let mut registered: Vec<MaterialId> = Vec::new();
    let samples = config.iterations.min(50).max(10);
    let mut rng = StdRng::seed_from_u64(config.seed);

    for &target in &config.scaling_targets {
        let newly = target.saturating_sub(registered.len());
        for i in 0..newly {
            let (id, _) = bench
                .registry
                .register_material(
                    bench.owner.address(),
                    "PLASMID",
                    Sha256Hash::hash(&(registered.len() + i).to_be_bytes()),
                    "scale-org",
                )
                .await?;
            registered.push(id);
        }

        let mut verify_samples = Vec::with_capacity(samples);
        let mut get_samples = Vec::with_capacity(samples);
        let mut slice_samples = Vec::with_capacity(samples);
        for _ in 0..samples {
            let id = registered[rng.gen_range(0..registered.len())];

            let start = Instant::now();
            let _ = bench.registry.verify_material(&id).await?;
            verify_samples.push(micros(start.elapsed()));

            let start = Instant::now();
            let _ = bench.registry.get_material(&id).await;
            get_samples.push(micros(start.elapsed()));

            let start = Instant::now();
            let _ = bench.registry.get_history_slice(0, 64).await;
            slice_samples.push(micros(start.elapsed()));
        }

        points.push(ScalePoint {
            registered_total: registered.len(),
            newly_registered: newly,
            verify_material: LatencyStats::from_samples(verify_samples)
                .unwrap_or_else(zero_stats),
            get_material: LatencyStats::from_samples(get_samples).unwrap_or_else(zero_stats),
            history_slice: LatencyStats::from_samples(slice_samples).unwrap_or_else(zero_stats),
        });
    }

    Ok(points)
}

async fn register_pool(bench: &TestBench, count: usize) -> Result<Vec<MaterialId>> {
    let mut pool = Vec::with_capacity(count);
    for i in 0..count {
        let (id, _) = bench
            .registry
            .register_material(
                bench.owner.address(),
                "CELL_LINE",
                Sha256Hash::hash(format!("pool:{i}").as_bytes()),
                "pool-org",
            )
            .await?;
        pool.push(id);
    }
    Ok(pool)
}

fn micros(d: std::time::Duration) -> f64 {
    d.as_secs_f64() * 1e6
}

fn zero_stats() -> LatencyStats {
    LatencyStats {
        count: 0,
        mean_us: 0.0,
        stddev_us: 0.0,
        p50_us: 0.0,
        p95_us: 0.0,
        p99_us: 0.0,
        min_us: 0.0,
        max_us: 0.0,
    }
}
