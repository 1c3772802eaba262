//! The on-chain verification predicate.
//!
//! A deterministic two-valued decision over the committed registry
//! snapshot. Domain failures are not errors: they accumulate as reason
//! codes in a fixed evaluation order, and a material passes exactly when
//! the reason set is empty.
//!
//! Only the latest QC credential (by `issued_at`) determines QC validity.
//! An older still-unexpired QC can never shadow a newer expired one.

use bioledger_core::{Credential, CredentialType, MaterialId, MaterialStatus};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RegistryError, Result};
use crate::state::RegistryState;

/// A verification failure cause. The canonical strings are the wire
/// vocabulary; [`ReasonCode::parse`] additionally accepts the published
/// interoperability aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReasonCode {
    MaterialRevoked,
    MaterialQuarantined,
    MissingIdentity,
    QcMissing,
    QcExpired,
    QcIssuerRevoked,
    TransferPending,
    ArtifactTampered,
    ArtifactUnavailable,
}

impl ReasonCode {
    /// The canonical wire string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MaterialRevoked => "MATERIAL_REVOKED",
            Self::MaterialQuarantined => "MATERIAL_QUARANTINED",
            Self::MissingIdentity => "MISSING_IDENTITY",
            Self::QcMissing => "QC_MISSING",
            Self::QcExpired => "QC_EXPIRED",
            Self::QcIssuerRevoked => "QC_ISSUER_REVOKED",
            Self::TransferPending => "TRANSFER_PENDING",
            Self::ArtifactTampered => "ARTIFACT_TAMPERED",
            Self::ArtifactUnavailable => "ARTIFACT_UNAVAILABLE",
        }
    }

    /// Parse a canonical string or a published alias.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "MATERIAL_REVOKED" | "REVOKED" | "STATUS_REVOKED" => Some(Self::MaterialRevoked),
            "MATERIAL_QUARANTINED" | "QUARANTINED" | "STATUS_QUARANTINED" => {
                Some(Self::MaterialQuarantined)
            }
            "MISSING_IDENTITY" => Some(Self::MissingIdentity),
            "QC_MISSING" | "MISSING_QC" => Some(Self::QcMissing),
            "QC_EXPIRED" | "CREDENTIAL_EXPIRED" | "EXPIRED_QC" => Some(Self::QcExpired),
            "QC_ISSUER_REVOKED" => Some(Self::QcIssuerRevoked),
            "TRANSFER_PENDING" | "PENDING_TRANSFER" => Some(Self::TransferPending),
            "ARTIFACT_TAMPERED" | "HASH_MISMATCH" | "INTEGRITY_FAILED" | "TAMPERED_ARTIFACT" => {
                Some(Self::ArtifactTampered)
            }
            "ARTIFACT_UNAVAILABLE" => Some(Self::ArtifactUnavailable),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of verifying one material: pass iff no reasons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub pass: bool,
    /// Deduplicated, in canonical evaluation order.
    pub reasons: Vec<ReasonCode>,
}

impl Verdict {
    /// A passing verdict.
    pub fn pass() -> Self {
        Self { pass: true, reasons: Vec::new() }
    }

    /// Add a reason unless already present; clears `pass`.
    pub fn push(&mut self, reason: ReasonCode) {
        if !self.reasons.contains(&reason) {
            self.reasons.push(reason);
        }
        self.pass = false;
    }

    /// Whether a reason is present.
    pub fn has(&self, reason: ReasonCode) -> bool {
        self.reasons.contains(&reason)
    }
}

/// Evaluate the on-chain policy for a material at a given time.
///
/// Evaluation order: status, identity, latest QC, transfer continuity.
/// A missing material is the one condition reported as an error rather
/// than a reason: there is nothing to verify.
pub fn verify_material_at(
    state: &RegistryState,
    material_id: &MaterialId,
    at_time: u64,
) -> Result<Verdict> {
    let material = state
        .get_material(material_id)
        .ok_or(RegistryError::MaterialNotFound(*material_id))?;

    let mut verdict = Verdict::pass();

    // 1. Status
    match material.status {
        MaterialStatus::Revoked => verdict.push(ReasonCode::MaterialRevoked),
        MaterialStatus::Quarantined => verdict.push(ReasonCode::MaterialQuarantined),
        MaterialStatus::Active => {}
    }

    let credentials = state.get_credentials(material_id);

    // 2. Identity: at least one non-revoked identity credential from an
    // issuer that was not revoked before it was issued.
    let has_valid_identity = credentials.iter().any(|c| {
        c.credential_type == CredentialType::Identity
            && !c.revoked
            && !issued_after_issuer_revocation(state, c)
    });
    if !has_valid_identity {
        verdict.push(ReasonCode::MissingIdentity);
    }

    // 3. Latest QC only. Ties on issued_at resolve to the later admission.
    let latest_qc = credentials
        .iter()
        .copied()
        .filter(|c| c.credential_type == CredentialType::QcMyco && !c.revoked)
        .fold(None::<&Credential>, |best, c| match best {
            Some(b) if b.issued_at > c.issued_at => best,
            _ => Some(c),
        });
    match latest_qc {
        None => verdict.push(ReasonCode::QcMissing),
        Some(qc) => {
            if issued_after_issuer_revocation(state, qc) {
                verdict.push(ReasonCode::QcIssuerRevoked);
            } else if qc.expired_at(at_time) {
                verdict.push(ReasonCode::QcExpired);
            }
        }
    }

    // 4. Transfer continuity
    if state.get_transfers(material_id).iter().any(|t| !t.accepted) {
        verdict.push(ReasonCode::TransferPending);
    }

    debug!(
        material_id = %material_id,
        pass = verdict.pass,
        reasons = verdict.reasons.len(),
        "evaluated on-chain policy"
    );
    Ok(verdict)
}

/// A credential issued at or after its issuer's revocation does not count.
/// Credentials issued strictly before the revocation remain valid.
fn issued_after_issuer_revocation(state: &RegistryState, credential: &Credential) -> bool {
    state
        .issuer_permission(&credential.issuer_address)
        .is_some_and(|p| p.revoked_at != 0 && credential.issued_at >= p.revoked_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{RegistryConfig, RegistryState};
    use bioledger_core::{Address, Sha256Hash};

    const T0: u64 = 1_700_000_000;
    const DAY: u64 = 86_400;

    fn addr(tag: u8) -> Address {
        Address::from_bytes([tag; 20])
    }

    struct Setup {
        state: RegistryState,
        owner: Address,
        identity_issuer: Address,
        qc_issuer: Address,
        mid: MaterialId,
    }

    /// S1 baseline: registered cell line with a valid identity and a
    /// valid in-window QC.
    fn happy_path() -> Setup {
        let admin = addr(0xAD);
        let owner = addr(1);
        let identity_issuer = addr(2);
        let qc_issuer = addr(3);
        let mut state = RegistryState::new(RegistryConfig { admin });

        state
            .authorize_issuer(admin, identity_issuer, true, false, false, T0)
            .unwrap();
        state
            .authorize_issuer(admin, qc_issuer, false, true, false, T0)
            .unwrap();
        let (mid, _) = state
            .register_material(owner, "CELL_LINE", Sha256Hash::hash(b"HeLa v1"), "lab-a", T0)
            .unwrap();
        state
            .issue_credential(
                identity_issuer,
                mid,
                CredentialType::Identity,
                Sha256Hash::hash(b"identity-payload"),
                T0 + 365 * DAY,
                "cid-identity",
                Sha256Hash::hash(b"identity-report"),
                "idlab",
                T0,
            )
            .unwrap();
        state
            .issue_credential(
                qc_issuer,
                mid,
                CredentialType::QcMyco,
                Sha256Hash::hash(b"qc-payload"),
                T0 + 90 * DAY,
                "cid-qc",
                Sha256Hash::hash(b"qc-report"),
                "qclab",
                T0,
            )
            .unwrap();

        Setup { state, owner, identity_issuer, qc_issuer, mid }
    }

    #[test]
    fn test_happy_path_passes() {
        let s = happy_path();
        let verdict = verify_material_at(&s.state, &s.mid, T0 + DAY).unwrap();
        assert!(verdict.pass);
        assert!(verdict.reasons.is_empty());
    }

    #[test]
    fn test_missing_material_is_an_error() {
        let s = happy_path();
        let missing = MaterialId::parse("bio:plasmid:999").unwrap();
        assert!(matches!(
            verify_material_at(&s.state, &missing, T0),
            Err(RegistryError::MaterialNotFound(_))
        ));
    }

    #[test]
    fn test_newer_expired_qc_shadows_older_valid_one() {
        // An attacker holding an older in-window QC cannot bypass a newer
        // expired QC: only the latest counts.
        let mut s = happy_path();
        s.state
            .issue_credential(
                s.qc_issuer,
                s.mid,
                CredentialType::QcMyco,
                Sha256Hash::hash(b"qc-2"),
                T0 + 2 * DAY,
                "cid-qc-2",
                Sha256Hash::hash(b"qc-report-2"),
                "qclab",
                T0 + DAY,
            )
            .unwrap();

        let verdict = verify_material_at(&s.state, &s.mid, T0 + 3 * DAY).unwrap();
        assert!(!verdict.pass);
        assert_eq!(verdict.reasons, vec![ReasonCode::QcExpired]);
    }

    #[test]
    fn test_revoking_latest_qc_falls_back_to_previous() {
        let mut s = happy_path();
        let (newer, _) = s
            .state
            .issue_credential(
                s.qc_issuer,
                s.mid,
                CredentialType::QcMyco,
                Sha256Hash::hash(b"qc-2"),
                T0 + 2 * DAY,
                "cid-qc-2",
                Sha256Hash::hash(b"qc-report-2"),
                "qclab",
                T0 + DAY,
            )
            .unwrap();

        // With the newer (short-window) QC revoked, the original QC is
        // the latest non-revoked one again and it is still in window.
        s.state.revoke_credential(s.qc_issuer, newer, T0 + DAY).unwrap();
        let verdict = verify_material_at(&s.state, &s.mid, T0 + 3 * DAY).unwrap();
        assert!(verdict.pass);
    }

    #[test]
    fn test_issuer_revocation_preserves_past_credentials() {
        let mut s = happy_path();
        s.state.revoke_issuer(addr(0xAD), s.qc_issuer, T0 + DAY).unwrap();

        let verdict = verify_material_at(&s.state, &s.mid, T0 + 2 * DAY).unwrap();
        assert!(verdict.pass, "credentials issued before revocation stay valid");
    }

    #[test]
    fn test_qc_from_issuer_revoked_after_issuance_stays_valid() {
        // The boundary of the issuer-revocation rule: issued strictly
        // before revoked_at counts, so revoking the issuer afterwards
        // must not flag the credential.
        let mut s = happy_path();
        let late_qc = addr(4);
        s.state
            .authorize_issuer(addr(0xAD), late_qc, false, true, false, T0 + DAY)
            .unwrap();
        s.state
            .issue_credential(
                late_qc,
                s.mid,
                CredentialType::QcMyco,
                Sha256Hash::hash(b"qc-3"),
                T0 + 90 * DAY,
                "cid-qc-3",
                Sha256Hash::hash(b"qc-report-3"),
                "qclab2",
                T0 + 2 * DAY,
            )
            .unwrap();
        s.state.revoke_issuer(addr(0xAD), late_qc, T0 + 3 * DAY).unwrap();

        let verdict = verify_material_at(&s.state, &s.mid, T0 + 4 * DAY).unwrap();
        assert!(verdict.pass);
    }

    #[test]
    fn test_qc_issued_at_or_after_issuer_revocation_is_flagged() {
        // Snapshots ingested from a foreign chain can contain a QC whose
        // issued_at lands at or past the issuer's revoked_at; the
        // predicate must flag it even though local admission forbids it.
        let mut s = happy_path();
        let qc = s
            .state
            .get_credentials(&s.mid)
            .iter()
            .find(|c| c.credential_type == CredentialType::QcMyco)
            .map(|c| (c.issuer_address, c.issued_at))
            .unwrap();
        s.state.backdate_issuer_revocation(&qc.0, qc.1);

        let verdict = verify_material_at(&s.state, &s.mid, T0 + DAY).unwrap();
        assert_eq!(verdict.reasons, vec![ReasonCode::QcIssuerRevoked]);
    }

    #[test]
    fn test_missing_identity_flagged() {
        let mut s = happy_path();
        // Revoke the only identity credential
        let identity_id = s
            .state
            .get_credentials(&s.mid)
            .iter()
            .find(|c| c.credential_type == CredentialType::Identity)
            .map(|c| c.id)
            .unwrap();
        s.state
            .revoke_credential(s.identity_issuer, identity_id, T0 + DAY)
            .unwrap();

        let verdict = verify_material_at(&s.state, &s.mid, T0 + 2 * DAY).unwrap();
        assert_eq!(verdict.reasons, vec![ReasonCode::MissingIdentity]);
    }

    #[test]
    fn test_status_reasons_precede_credential_reasons() {
        let mut s = happy_path();
        s.state
            .set_status_by_owner(
                s.owner,
                s.mid,
                bioledger_core::MaterialStatus::Quarantined,
                Sha256Hash::hash(b"contamination suspected"),
                T0 + DAY,
            )
            .unwrap();
        // Also revoke the identity so two reasons accumulate
        let identity_id = s.state.get_credentials(&s.mid)[0].id;
        s.state
            .revoke_credential(s.identity_issuer, identity_id, T0 + DAY)
            .unwrap();

        let verdict = verify_material_at(&s.state, &s.mid, T0 + 2 * DAY).unwrap();
        assert_eq!(
            verdict.reasons,
            vec![ReasonCode::MaterialQuarantined, ReasonCode::MissingIdentity]
        );
    }

    #[test]
    fn test_pending_transfer_blocks_validity() {
        let mut s = happy_path();
        s.state
            .initiate_transfer(s.owner, s.mid, addr(7), "lab-b", Sha256Hash::hash(b"ship"), T0 + DAY)
            .unwrap();

        let verdict = verify_material_at(&s.state, &s.mid, T0 + 2 * DAY).unwrap();
        assert_eq!(verdict.reasons, vec![ReasonCode::TransferPending]);

        // Acceptance clears the reason
        s.state.accept_transfer(addr(7), s.mid, T0 + 2 * DAY).unwrap();
        let verdict = verify_material_at(&s.state, &s.mid, T0 + 3 * DAY).unwrap();
        assert!(verdict.pass);
    }

    #[test]
    fn test_verification_is_pure() {
        let s = happy_path();
        let v1 = verify_material_at(&s.state, &s.mid, T0 + DAY).unwrap();
        let v2 = verify_material_at(&s.state, &s.mid, T0 + DAY).unwrap();
        assert_eq!(v1, v2);
    }

    #[test]
    fn test_reason_code_strings_and_aliases() {
        assert_eq!(ReasonCode::QcExpired.as_str(), "QC_EXPIRED");
        assert_eq!(ReasonCode::parse("QC_EXPIRED"), Some(ReasonCode::QcExpired));
        assert_eq!(ReasonCode::parse("CREDENTIAL_EXPIRED"), Some(ReasonCode::QcExpired));
        assert_eq!(ReasonCode::parse("HASH_MISMATCH"), Some(ReasonCode::ArtifactTampered));
        assert_eq!(ReasonCode::parse("INTEGRITY_FAILED"), Some(ReasonCode::ArtifactTampered));
        assert_eq!(ReasonCode::parse("STATUS_REVOKED"), Some(ReasonCode::MaterialRevoked));
        assert_eq!(ReasonCode::parse("QUARANTINED"), Some(ReasonCode::MaterialQuarantined));
        assert_eq!(ReasonCode::parse("NOT_A_CODE"), None);

        // Round-trip every canonical string
        for code in [
            ReasonCode::MaterialRevoked,
            ReasonCode::MaterialQuarantined,
            ReasonCode::MissingIdentity,
            ReasonCode::QcMissing,
            ReasonCode::QcExpired,
            ReasonCode::QcIssuerRevoked,
            ReasonCode::TransferPending,
            ReasonCode::ArtifactTampered,
            ReasonCode::ArtifactUnavailable,
        ] {
            assert_eq!(ReasonCode::parse(code.as_str()), Some(code));
        }
    }

    #[test]
    fn test_verdict_deduplicates() {
        let mut verdict = Verdict::pass();
        verdict.push(ReasonCode::QcExpired);
        verdict.push(ReasonCode::QcExpired);
        assert_eq!(verdict.reasons.len(), 1);
        assert!(!verdict.pass);
    }
}
