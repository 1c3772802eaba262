//! Dataset materialization and evaluation.
//!
//! [`materialize`] replays a generated plan onto a live registry:
//! registration, credential issuance in ascending `issued_at` order,
//! artifact uploads (tampered where the plan says so), transfers, and
//! status changes. Every receipt is checked for finality; a receipt
//! without it aborts the run as a transport failure.
//!
//! [`evaluate`] then queries verification for every material and folds
//! the outcomes into per-class confusion matrices, using the alias table
//! to match dataset labels against reason codes.

use std::collections::BTreeMap;

use bioledger_core::{
    sign_payload, CoreError, CredentialPayload, CredentialType, MaterialId, MaterialStatus,
    Sha256Hash,
};
use bioledger_registry::{ReasonCode, RegistryError, TxReceipt};
use bioledger_store::{verify_material_full, ObjectStore};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::fixtures::TestBench;
use crate::metrics::{ConfusionMatrix, DerivedRates};
use crate::workload::{Anomaly, CredentialPlan, Dataset, MaterialPlan};

/// Errors that abort a harness run.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("object store error: {0}")]
    Store(#[from] bioledger_store::StoreError),

    #[error("plan violation: {0}")]
    Plan(String),
}

/// Result alias for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Ids assigned during materialization, index-aligned with the plan.
#[derive(Debug, Clone)]
pub struct MaterializedDataset {
    pub material_ids: Vec<MaterialId>,
}

/// Replay a dataset onto the bench's registry and blob store.
pub async fn materialize(bench: &TestBench, dataset: &Dataset) -> Result<MaterializedDataset> {
    bench.authorize_default_issuers().await?;

    let mut material_ids = Vec::with_capacity(dataset.materials.len());
    for plan in &dataset.materials {
        let id = materialize_material(bench, dataset, plan).await?;
        material_ids.push(id);
    }

    info!(
        dataset = %dataset.config.name,
        materials = material_ids.len(),
        "dataset materialized"
    );
    Ok(MaterializedDataset { material_ids })
}

async fn materialize_material(
    bench: &TestBench,
    dataset: &Dataset,
    plan: &MaterialPlan,
) -> Result<MaterialId> {
    let owner = bench.owner.address();
    let metadata_hash = bioledger_core::canonical_hash(&plan.metadata)
        .map_err(CoreError::Canonical)?;

    let (material_id, receipt) = bench
        .registry
        .register_material(owner, plan.material_type.as_str(), metadata_hash, &plan.owner_org)
        .await?;
    finalized(&receipt)?;

    // Credentials: identity first, then QCs in plan order so the
    // registry's latest-by-issued_at is the plan's last entry.
    issue_planned_credential(bench, dataset, material_id, CredentialType::Identity, &plan.identity)
        .await?;
    for qc in &plan.qc {
        issue_planned_credential(bench, dataset, material_id, CredentialType::QcMyco, qc).await?;
    }

    // The unauthorized-issuer path: the attempt must be rejected, which
    // is exactly what leaves the material without a QC credential.
    if plan.attempt_unauthorized_qc {
        let outcome = bench
            .registry
            .issue_credential(
                bench.rogue_issuer.address(),
                material_id,
                CredentialType::QcMyco,
                Sha256Hash::hash(b"rogue"),
                0,
                "rogue-cid",
                Sha256Hash::hash(b"rogue-artifact"),
                "rogue-org",
            )
            .await;
        match outcome {
            Err(RegistryError::NotApprovedIssuer) => {}
            Err(e) => return Err(e.into()),
            Ok(_) => {
                return Err(HarnessError::Plan(
                    "unauthorized issuer was allowed to issue a credential".into(),
                ))
            }
        }
    }

    if let Some(transfer) = &plan.transfer {
        let (_, receipt) = bench
            .registry
            .initiate_transfer(
                owner,
                material_id,
                bench.recipient.address(),
                &transfer.to_org,
                Sha256Hash::hash(format!("shipment:{}", plan.index).as_bytes()),
            )
            .await?;
        finalized(&receipt)?;

        if transfer.accepted {
            let receipt = bench
                .registry
                .accept_transfer(bench.recipient.address(), material_id)
                .await?;
            finalized(&receipt)?;
        }
    }

    // Acceptance moved ownership; owner-gated status changes must come
    // from the current holder.

    let current_owner = match &plan.transfer {
        Some(t) if t.accepted => bench.recipient.address(),
        _ => owner,
    };
    match plan.status {
        MaterialStatus::Active => {}
        MaterialStatus::Quarantined => {
            let receipt = bench
                .registry
                .set_status_by_owner(
                    current_owner,
                    material_id,
                    MaterialStatus::Quarantined,
                    Sha256Hash::hash(b"routine-hold"),
                )
                .await?;
            finalized(&receipt)?;
        }
        MaterialStatus::Revoked => {
            let receipt = bench
                .registry
                .set_status_by_authority(
                    bench.admin_address(),
                    material_id,
                    MaterialStatus::Revoked,
                    Sha256Hash::hash(b"compliance-revocation"),
                )
                .await?;
            finalized(&receipt)?;
        }
    }

    debug!(material_id = %material_id, index = plan.index, "material materialized");
    Ok(material_id)
}

async fn issue_planned_credential(
    bench: &TestBench,
    dataset: &Dataset,
    material_id: MaterialId,
    credential_type: CredentialType,
    plan: &CredentialPlan,
) -> Result<()> {
    let (issuer, issuer_org) = match credential_type {
        CredentialType::Identity => (&bench.identity_issuer, "identity-bureau"),
        CredentialType::QcMyco => (&bench.qc_issuer, "qc-works"),
        CredentialType::UsageRights => (&bench.identity_issuer, "identity-bureau"),
    };

    let artifact_hash = Sha256Hash::hash(&plan.artifact_body);
    let payload = CredentialPayload {
        material_id,
        credential_type,
        issuer_org: issuer_org.to_string(),
        issued_at: dataset.base_time,
        valid_until: plan.valid_until,
        artifact_cid: plan.artifact_cid.clone(),
        artifact_hash,
        claims: plan.claims.clone(),
    };
    let commitment = payload.commitment()?;
    // Signature distribution is out-of-band; computing it here keeps the
    // issuance flow honest about what issuers sign.
    let _signature = sign_payload(issuer, &payload.to_value())?;

    let (_, receipt) = bench
        .registry
        .issue_credential(
            issuer.address(),
            material_id,
            credential_type,
            commitment,
            plan.valid_until,
            &plan.artifact_cid,
            artifact_hash,
            issuer_org,
        )
        .await?;
    finalized(&receipt)?;

    bench
        .store
        .put(&plan.artifact_cid, Bytes::from(plan.stored_body.clone()))
        .await?;
    Ok(())
}

fn finalized(receipt: &TxReceipt) -> Result<()> {
    receipt.ensure_finalized()?;
    Ok(())
}

/// Verification outcomes for one material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialOutcome {
    pub material_id: MaterialId,
    pub ground_truth: Vec<Anomaly>,
    pub on_chain_pass: bool,
    pub on_chain_reasons: Vec<ReasonCode>,
    pub full_pass: bool,
    pub full_reasons: Vec<ReasonCode>,
}

/// Confusion matrix plus derived rates for one anomaly class.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClassOutcome {
    pub matrix: ConfusionMatrix,
    pub rates: DerivedRates,
}

/// Aggregated evaluation results over a materialized dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub dataset: String,
    pub eval_time: u64,
    pub total_materials: usize,
    pub on_chain_fail_count: usize,
    pub on_chain_fail_rate: f64,
    pub full_fail_count: usize,
    pub full_fail_rate: f64,
    /// Reason string -> occurrences across on-chain verdicts.
    pub on_chain_reason_histogram: BTreeMap<String, usize>,
    /// Reason string -> occurrences across full verdicts.
    pub full_reason_histogram: BTreeMap<String, usize>,
    /// Anomaly label -> on-chain detection quality.
    pub on_chain_classes: BTreeMap<String, ClassOutcome>,
    /// Anomaly label -> full detection quality.
    pub full_classes: BTreeMap<String, ClassOutcome>,
    pub materials: Vec<MaterialOutcome>,
}

/// Verify every material and compute confusion statistics.
pub async fn evaluate(
    bench: &TestBench,
    dataset: &Dataset,
    materialized: &MaterializedDataset,
) -> Result<EvaluationSummary> {
    let mut outcomes = Vec::with_capacity(dataset.materials.len());

    for (plan, material_id) in dataset.materials.iter().zip(&materialized.material_ids) {
        let on_chain = bench
            .registry
            .verify_material_at(material_id, dataset.eval_time)
            .await?;
        let full =
            verify_material_full(&bench.registry, &bench.checker, material_id, dataset.eval_time)
                .await?;

        outcomes.push(MaterialOutcome {
            material_id: *material_id,
            ground_truth: plan.ground_truth.clone(),
            on_chain_pass: on_chain.pass,
            on_chain_reasons: on_chain.reasons,
            full_pass: full.pass,
            full_reasons: full.reasons,
        });
    }

    Ok(summarize(dataset, outcomes))
}

fn summarize(dataset: &Dataset, outcomes: Vec<MaterialOutcome>) -> EvaluationSummary {
    let total = outcomes.len();
    let on_chain_fail_count = outcomes.iter().filter(|o| !o.on_chain_pass).count();
    let full_fail_count = outcomes.iter().filter(|o| !o.full_pass).count();

    let mut on_chain_reason_histogram = BTreeMap::new();
    let mut full_reason_histogram = BTreeMap::new();
    for outcome in &outcomes {
        for reason in &outcome.on_chain_reasons {
            *on_chain_reason_histogram.entry(reason.as_str().to_string()).or_insert(0) += 1;
        }
        for reason in &outcome.full_reasons {
            *full_reason_histogram.entry(reason.as_str().to_string()).or_insert(0) += 1;
        }
    }

    let mut on_chain_classes = BTreeMap::new();
    let mut full_classes = BTreeMap::new();
    for anomaly in Anomaly::ALL {
        let mut on_chain_matrix = ConfusionMatrix::default();
        let mut full_matrix = ConfusionMatrix::default();
        for outcome in &outcomes {
            let truth = outcome.ground_truth.contains(&anomaly);
            on_chain_matrix.record(truth, class_predicted(anomaly, &outcome.on_chain_reasons));
            full_matrix.record(truth, class_predicted(anomaly, &outcome.full_reasons));
        }
        on_chain_classes.insert(
            anomaly.label().to_string(),
            ClassOutcome { matrix: on_chain_matrix, rates: DerivedRates::from(&on_chain_matrix) },
        );
        full_classes.insert(
            anomaly.label().to_string(),
            ClassOutcome { matrix: full_matrix, rates: DerivedRates::from(&full_matrix) },
        );
    }

    EvaluationSummary {
        dataset: dataset.config.name.clone(),
        eval_time: dataset.eval_time,
        total_materials: total,
        on_chain_fail_count,
        on_chain_fail_rate: if total == 0 { 0.0 } else { on_chain_fail_count as f64 / total as f64 },
        full_fail_count,
        full_fail_rate: if total == 0 { 0.0 } else { full_fail_count as f64 / total as f64 },
        on_chain_reason_histogram,
        full_reason_histogram,
        on_chain_classes,
        full_classes,
        materials: outcomes,
    }
}

/// Alias-table matching with exact-string fallback: a dataset label
/// counts as predicted when its aliased reason code (or, failing that,
/// the literal string) appears in the reason set.
fn class_predicted(anomaly: Anomaly, reasons: &[ReasonCode]) -> bool {
    match ReasonCode::parse(anomaly.label()) {
        Some(code) => reasons.contains(&code),
        None => reasons.iter().any(|r| r.as_str() == anomaly.label()),
    }
}
