//! Deterministic labelled workload generation.
//!
//! A dataset is a seeded plan of materials, credentials, status changes,
//! and transfers, together with a ground-truth anomaly multiset per
//! material. Ground truth is derived from the *realized* plan, not the
//! nominal injection rates: if the unauthorized-issuer path fires, the
//! material simply ends up without a QC credential and is labelled
//! `MISSING_QC`.

use bioledger_core::{MaterialStatus, MaterialType};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// One day in seconds.
pub const DAY: u64 = 86_400;

/// An injectable anomaly class. Labels follow the dataset vocabulary,
/// which overlaps the verifier's reason codes only through the alias
/// table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Anomaly {
    Revoked,
    Quarantined,
    MissingQc,
    ExpiredQc,
    TamperedArtifact,
    PendingTransfer,
}

impl Anomaly {
    /// All classes, in report order.
    pub const ALL: [Anomaly; 6] = [
        Anomaly::Revoked,
        Anomaly::Quarantined,
        Anomaly::MissingQc,
        Anomaly::ExpiredQc,
        Anomaly::TamperedArtifact,
        Anomaly::PendingTransfer,
    ];

    /// Dataset label for this class.
    pub fn label(self) -> &'static str {
        match self {
            Self::Revoked => "REVOKED",
            Self::Quarantined => "QUARANTINED",
            Self::MissingQc => "MISSING_QC",
            Self::ExpiredQc => "EXPIRED_QC",
            Self::TamperedArtifact => "TAMPERED_ARTIFACT",
            Self::PendingTransfer => "PENDING_TRANSFER",
        }
    }

    /// Whether the on-chain predicate alone can see this class.
    pub fn on_chain_detectable(self) -> bool {
        !matches!(self, Self::TamperedArtifact)
    }
}

/// Generator configuration. Rates are independent per-material draw
/// probabilities; the status anomalies are exclusive (revoked wins).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub name: String,
    pub materials: usize,
    /// Fraction of cell lines; the rest are plasmids.
    pub cell_line_fraction: f64,
    pub revoked_rate: f64,
    pub quarantined_rate: f64,
    pub missing_qc_rate: f64,
    pub expired_qc_rate: f64,
    pub tampered_artifact_rate: f64,
    pub pending_transfer_rate: f64,
    /// Validity window of healthy QC credentials, days.
    pub qc_validity_days: u64,
    /// Seed for the deterministic rng.
    pub seed: u64,
}

impl DatasetConfig {
    /// Mostly healthy population with rare anomalies.
    pub fn normal() -> Self {
        Self {
            name: "normal".into(),
            materials: 500,
            cell_line_fraction: 0.7,
            revoked_rate: 0.01,
            quarantined_rate: 0.02,
            missing_qc_rate: 0.02,
            expired_qc_rate: 0.03,
            tampered_artifact_rate: 0.01,
            pending_transfer_rate: 0.02,
            qc_validity_days: 90,
            seed: 11,
        }
    }

    /// Elevated expiry and quarantine pressure, short QC windows.
    pub fn drift() -> Self {
        Self {
            name: "drift".into(),
            materials: 500,
            cell_line_fraction: 0.6,
            revoked_rate: 0.04,
            quarantined_rate: 0.08,
            missing_qc_rate: 0.06,
            expired_qc_rate: 0.15,
            tampered_artifact_rate: 0.04,
            pending_transfer_rate: 0.08,
            qc_validity_days: 30,
            seed: 22,
        }
    }

    /// Heavy anomaly mix; tuned so the on-chain verify-fail rate lands
    /// inside [0.55, 0.80].
    pub fn adversarial() -> Self {
        Self {
            name: "adversarial".into(),
            materials: 500,
            cell_line_fraction: 0.5,
            revoked_rate: 0.15,
            quarantined_rate: 0.15,
            missing_qc_rate: 0.20,
            expired_qc_rate: 0.22,
            tampered_artifact_rate: 0.25,
            pending_transfer_rate: 0.18,
            qc_validity_days: 90,
            seed: 33,
        }
    }
}

/// Plan for one credential: payload claims, validity, and the artifact
/// bytes as committed vs as actually stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPlan {
    pub artifact_cid: String,
    /// Bytes the commitment is computed over.
    pub artifact_body: Vec<u8>,
    /// Bytes the blob store will actually hold. Differs when tampered.
    pub stored_body: Vec<u8>,
    /// Unix seconds; 0 means no expiry.
    pub valid_until: u64,
    /// Attested claims for the payload.
    pub claims: serde_json::Value,
}

impl CredentialPlan {
    /// Whether the stored bytes diverge from the committed bytes.
    pub fn is_tampered(&self) -> bool {
        self.stored_body != self.artifact_body
    }
}

/// Plan for the (single) transfer of a material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferPlan {
    pub to_org: String,
    pub accepted: bool,
}

/// Full plan for one material, with its derived ground truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialPlan {
    pub index: usize,
    pub material_type: MaterialType,
    pub metadata: serde_json::Value,
    pub owner_org: String,
    pub identity: CredentialPlan,
    /// QC credentials in issuance order; the last is the latest.
    /// Empty models the rejected-unauthorized-issuer path.
    pub qc: Vec<CredentialPlan>,
    /// When `qc` is empty, the harness attempts issuance from an
    /// unauthorized issuer and observes the rejection.
    pub attempt_unauthorized_qc: bool,
    /// Final status applied after credentials and transfers.
    pub status: MaterialStatus,
    pub transfer: Option<TransferPlan>,
    /// Ground-truth anomalies, sorted and deduplicated.
    pub ground_truth: Vec<Anomaly>,
}

impl MaterialPlan {
    pub fn has_anomaly(&self, anomaly: Anomaly) -> bool {
        self.ground_truth.contains(&anomaly)
    }

    /// Expected on-chain outcome: fails iff any on-chain-detectable
    /// anomaly is present.
    pub fn expected_on_chain_pass(&self) -> bool {
        !self.ground_truth.iter().any(|a| a.on_chain_detectable())
    }

    /// Expected full outcome: fails iff any anomaly is present.
    pub fn expected_full_pass(&self) -> bool {
        self.ground_truth.is_empty()
    }
}

/// A labelled dataset ready for materialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub config: DatasetConfig,
    /// Wall time the plan was generated against, Unix seconds.
    pub base_time: u64,
    /// Time at which verification is evaluated. Chosen so short-window
    /// QCs have expired while healthy windows are still open.
    pub eval_time: u64,
    pub materials: Vec<MaterialPlan>,
}

impl Dataset {
    /// Fraction of materials whose on-chain verification must fail.
    pub fn expected_on_chain_fail_rate(&self) -> f64 {
        if self.materials.is_empty() {
            return 0.0;
        }
        let failing = self.materials.iter().filter(|m| !m.expected_on_chain_pass()).count();
        failing as f64 / self.materials.len() as f64
    }
}

/// Window given to QCs that must be expired at `eval_time`. Generous
/// enough that the registry's monotone write clock cannot outrun it
/// during materialization.
const SHORT_QC_WINDOW: u64 = 6 * 60 * 60;

/// Gap between generation and evaluation.
const EVAL_HORIZON: u64 = 7 * DAY;

/// Generate a labelled dataset at the given wall time.
///
/// Deterministic: the same config and `now` produce the identical plan.
pub fn generate(config: &DatasetConfig, now: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let eval_time = now + EVAL_HORIZON;

    let materials = (0..config.materials)
        .map(|index| generate_material(config, index, now, eval_time, &mut rng))
        .collect();

    Dataset { config: config.clone(), base_time: now, eval_time, materials }
}

fn generate_material(
    config: &DatasetConfig,
    index: usize,
    now: u64,
    eval_time: u64,
    rng: &mut StdRng,
) -> MaterialPlan {
    let material_type = if rng.gen_bool(config.cell_line_fraction) {
        MaterialType::CellLine
    } else {
        MaterialType::Plasmid
    };

    // Status anomalies are exclusive: revoked wins over quarantined.
    let status = if rng.gen_bool(config.revoked_rate) {
        MaterialStatus::Revoked
    } else if rng.gen_bool(config.quarantined_rate) {
        MaterialStatus::Quarantined
    } else {
        MaterialStatus::Active
    };

    let missing_qc = rng.gen_bool(config.missing_qc_rate);
    let expired_qc = !missing_qc && rng.gen_bool(config.expired_qc_rate);
    let tampered = rng.gen_bool(config.tampered_artifact_rate);
    let pending_transfer = rng.gen_bool(config.pending_transfer_rate);
    // Transfers start while the material is still ACTIVE; the final
    // status is applied after them, so any combination is realizable.
    let transfer = if pending_transfer {
        Some(TransferPlan { to_org: org_name(rng), accepted: false })
    } else if rng.gen_bool(0.3) {
        Some(TransferPlan { to_org: org_name(rng), accepted: true })
    } else {
        None
    };

    let owner_org = org_name(rng);
    let metadata = json!({
        "name": format!("{}-{}", material_type.id_segment(), index),
        "passage": rng.gen_range(1..40),
        "source": owner_org.clone(),
    });

    let identity = credential_plan(
        &config.name,
        index,
        "identity",
        // Identity credentials live long or forever.
        if rng.gen_bool(0.5) { 0 } else { now + 365 * DAY },
        false,
        rng,
    );

    let mut qc = Vec::new();
    if !missing_qc {
        let healthy_until = now + config.qc_validity_days * DAY + EVAL_HORIZON;
        if expired_qc {
            // Half the expired cases also carry an older, still-open QC:
            // the latest-QC rule must not let it mask the expiry.
            if rng.gen_bool(0.5) {
                qc.push(credential_plan(&config.name, index, "qc-old", healthy_until, false, rng));
            }
            qc.push(credential_plan(
                &config.name,
                index,
                "qc",
                now + SHORT_QC_WINDOW,
                tampered,
                rng,
            ));
        } else {
            qc.push(credential_plan(&config.name, index, "qc", healthy_until, tampered, rng));
        }
    }
    // With no QC lane, tampering lands on the identity artifact.
    let identity = if tampered && missing_qc {
        CredentialPlan { stored_body: mutate(&identity.artifact_body), ..identity }
    } else {
        identity
    };

    let mut ground_truth = Vec::new();
    match status {
        MaterialStatus::Revoked => ground_truth.push(Anomaly::Revoked),
        MaterialStatus::Quarantined => ground_truth.push(Anomaly::Quarantined),
        MaterialStatus::Active => {}
    }
    if qc.is_empty() {
        ground_truth.push(Anomaly::MissingQc);
    } else if qc.last().is_some_and(|c| c.valid_until != 0 && c.valid_until < eval_time) {
        ground_truth.push(Anomaly::ExpiredQc);
    }
    if identity.is_tampered() || qc.iter().any(CredentialPlan::is_tampered) {
        ground_truth.push(Anomaly::TamperedArtifact);
    }
    if pending_transfer {
        ground_truth.push(Anomaly::PendingTransfer);
    }
    ground_truth.sort();
    ground_truth.dedup();

    MaterialPlan {
        index,
        material_type,
        metadata,
        owner_org,
        identity,
        attempt_unauthorized_qc: missing_qc,
        qc,
        status,
        transfer,
        ground_truth,
    }
}

fn credential_plan(
    dataset: &str,
    index: usize,
    lane: &str,
    valid_until: u64,
    tampered: bool,
    rng: &mut StdRng,
) -> CredentialPlan {
    let mut body = vec![0u8; 64 + rng.gen_range(0..192)];
    rng.fill(body.as_mut_slice());

    let stored_body = if tampered { mutate(&body) } else { body.clone() };

    CredentialPlan {
        artifact_cid: format!("artifact:{dataset}:{index}:{lane}"),
        artifact_body: body,
        stored_body,
        valid_until,
        claims: json!({ "lane": lane, "result": "pass" }),
    }
}

/// Flip one byte so the stored body no longer matches the commitment.
fn mutate(body: &[u8]) -> Vec<u8> {
    let mut out = body.to_vec();
    if let Some(first) = out.first_mut() {
        *first ^= 0xFF;
    } else {
        out.push(0xFF);
    }
    out
}

fn org_name(rng: &mut StdRng) -> String {
    const ORGS: [&str; 6] = [
        "helix-labs",
        "crick-institute",
        "broad-street-bio",
        "mendel-works",
        "pasteur-annex",
        "cold-harbor",
    ];
    ORGS[rng.gen_range(0..ORGS.len())].to_string()
}
