//! Registry records: materials, credentials, transfers, issuer permissions.
//!
//! These are closed tagged structs with fixed field sets. Cross-entity
//! links go by ID only; no record owns another.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::canonical::canonical_hash;
use crate::crypto::{Address, Sha256Hash};
use crate::error::CoreError;
use crate::ids::{CredentialId, MaterialId, TransferId};

/// The kind of tracked material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MaterialType {
    /// An immortalized cell line.
    CellLine,
    /// A plasmid construct.
    Plasmid,
}

impl MaterialType {
    /// Canonical vocabulary string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CellLine => "CELL_LINE",
            Self::Plasmid => "PLASMID",
        }
    }

    /// Segment used inside material ids (`bio:<segment>:<n>`).
    pub fn id_segment(self) -> &'static str {
        match self {
            Self::CellLine => "cell_line",
            Self::Plasmid => "plasmid",
        }
    }

    /// Parse from the canonical vocabulary. The vocabulary is closed;
    /// anything else is an invalid material type.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CELL_LINE" => Some(Self::CellLine),
            "PLASMID" => Some(Self::Plasmid),
            _ => None,
        }
    }
}

/// Lifecycle status of a material. `Revoked` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaterialStatus {
    Active,
    Quarantined,
    Revoked,
}

impl MaterialStatus {
    /// Canonical vocabulary string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Quarantined => "QUARANTINED",
            Self::Revoked => "REVOKED",
        }
    }

    /// Parse from the canonical vocabulary.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(Self::Active),
            "QUARANTINED" => Some(Self::Quarantined),
            "REVOKED" => Some(Self::Revoked),
            _ => None,
        }
    }
}

/// The kind of attestation a credential carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialType {
    /// Authenticated identity of the material.
    Identity,
    /// Mycoplasma QC test result.
    QcMyco,
    /// Usage-rights attestation. Recorded but not consulted by verification.
    UsageRights,
}

impl CredentialType {
    /// Canonical vocabulary string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Identity => "IDENTITY",
            Self::QcMyco => "QC_MYCO",
            Self::UsageRights => "USAGE_RIGHTS",
        }
    }

    /// Parse from the canonical vocabulary.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "IDENTITY" => Some(Self::Identity),
            "QC_MYCO" => Some(Self::QcMyco),
            "USAGE_RIGHTS" => Some(Self::UsageRights),
            _ => None,
        }
    }
}

/// A tracked biological material.
///
/// Created by registration; mutated only by status transitions and
/// transfer acceptance; never destroyed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    pub id: MaterialId,
    pub material_type: MaterialType,
    /// Commitment to the off-chain metadata document. Non-zero.
    pub metadata_hash: Sha256Hash,
    pub owner_address: Address,
    pub owner_org: String,
    pub status: MaterialStatus,
    /// Unix seconds.
    pub created_at: u64,
    /// Unix seconds; bumped on every mutation of this record.
    pub updated_at: u64,
}

/// An attested statement about a material. Append-only; `revoked` may
/// transition false -> true exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub id: CredentialId,
    pub material_id: MaterialId,
    pub credential_type: CredentialType,
    /// SHA-256 over the canonical payload. Non-zero.
    pub commitment_hash: Sha256Hash,
    pub issuer_address: Address,
    pub issuer_org: String,
    /// Unix seconds.
    pub issued_at: u64,
    /// Unix seconds; 0 means no expiry, otherwise strictly after `issued_at`.
    pub valid_until: u64,
    /// Opaque locator of the off-chain artifact.
    pub artifact_cid: String,
    /// Commitment to the artifact bytes. Non-zero.
    pub artifact_hash: Sha256Hash,
    pub revoked: bool,
}

impl Credential {
    /// Whether this credential carries an expiry and it precedes `at_time`.
    pub fn expired_at(&self, at_time: u64) -> bool {
        self.valid_until != 0 && self.valid_until < at_time
    }
}

/// A custody handoff between organizations. Append-only; `accepted`
/// transitions false -> true exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    pub material_id: MaterialId,
    pub from_address: Address,
    pub from_org: String,
    pub to_address: Address,
    pub to_org: String,
    pub shipment_hash: Sha256Hash,
    /// Unix seconds.
    pub timestamp: u64,
    pub accepted: bool,
}

/// Capability record for an issuer, keyed by address in the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerPermission {
    pub is_approved: bool,
    pub can_issue_identity: bool,
    pub can_issue_qc: bool,
    pub can_issue_usage_rights: bool,
    /// Unix seconds; 0 means not revoked.
    pub revoked_at: u64,
}

impl IssuerPermission {
    /// Whether this issuer may issue the given credential type.
    /// Capability checks compose as independent predicates.
    pub fn can_issue(&self, credential_type: CredentialType) -> bool {
        match credential_type {
            CredentialType::Identity => self.can_issue_identity,
            CredentialType::QcMyco => self.can_issue_qc,
            CredentialType::UsageRights => self.can_issue_usage_rights,
        }
    }

    /// Approved and not revoked.
    pub fn is_active(&self) -> bool {
        self.is_approved && self.revoked_at == 0
    }
}

/// The signable payload of a credential, committed on-chain by its
/// canonical hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPayload {
    pub material_id: MaterialId,
    pub credential_type: CredentialType,
    pub issuer_org: String,
    /// Unix seconds.
    pub issued_at: u64,
    /// Unix seconds; 0 means no expiry.
    pub valid_until: u64,
    pub artifact_cid: String,
    pub artifact_hash: Sha256Hash,
    /// Free-form attested claims (canonical JSON subset).
    pub claims: Value,
}

impl CredentialPayload {
    /// The JSON value whose canonical bytes are signed and committed.
    pub fn to_value(&self) -> Value {
        json!({
            "material_id": self.material_id.to_string(),
            "credential_type": self.credential_type.as_str(),
            "issuer_org": self.issuer_org,
            "issued_at": self.issued_at,
            "valid_until": self.valid_until,
            "artifact_cid": self.artifact_cid,
            "artifact_hash": self.artifact_hash.to_hex(),
            "claims": self.claims,
        })
    }

    /// The on-chain commitment: SHA-256 over the canonical payload bytes.
    pub fn commitment(&self) -> Result<Sha256Hash, CoreError> {
        Ok(canonical_hash(&self.to_value())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::MaterialId;

    #[test]
    fn test_vocabulary_roundtrip() {
        for t in [MaterialType::CellLine, MaterialType::Plasmid] {
            assert_eq!(MaterialType::parse(t.as_str()), Some(t));
        }
        for s in [
            MaterialStatus::Active,
            MaterialStatus::Quarantined,
            MaterialStatus::Revoked,
        ] {
            assert_eq!(MaterialStatus::parse(s.as_str()), Some(s));
        }
        for c in [
            CredentialType::Identity,
            CredentialType::QcMyco,
            CredentialType::UsageRights,
        ] {
            assert_eq!(CredentialType::parse(c.as_str()), Some(c));
        }
        assert_eq!(MaterialType::parse("ORGANOID"), None);
    }

    #[test]
    fn test_capability_predicates() {
        let perm = IssuerPermission {
            is_approved: true,
            can_issue_identity: true,
            can_issue_qc: false,
            can_issue_usage_rights: false,
            revoked_at: 0,
        };
        assert!(perm.is_active());
        assert!(perm.can_issue(CredentialType::Identity));
        assert!(!perm.can_issue(CredentialType::QcMyco));

        let revoked = IssuerPermission { revoked_at: 100, ..perm };
        assert!(!revoked.is_active());
    }

    #[test]
    fn test_expiry_window() {
        let cred = Credential {
            id: crate::ids::CredentialId(1),
            material_id: MaterialId::new(MaterialType::CellLine, 1).unwrap(),
            credential_type: CredentialType::QcMyco,
            commitment_hash: Sha256Hash::hash(b"c"),
            issuer_address: Address::ZERO,
            issuer_org: "lab".into(),
            issued_at: 1_000,
            valid_until: 2_000,
            artifact_cid: "cid".into(),
            artifact_hash: Sha256Hash::hash(b"a"),
            revoked: false,
        };
        assert!(!cred.expired_at(1_500));
        assert!(!cred.expired_at(2_000));
        assert!(cred.expired_at(2_001));

        let no_expiry = Credential { valid_until: 0, ..cred };
        assert!(!no_expiry.expired_at(u64::MAX));
    }

    #[test]
    fn test_payload_commitment_deterministic() {
        let payload = CredentialPayload {
            material_id: MaterialId::new(MaterialType::CellLine, 1).unwrap(),
            credential_type: CredentialType::Identity,
            issuer_org: "atcc".into(),
            issued_at: 1_700_000_000,
            valid_until: 0,
            artifact_cid: "bafy-report-1".into(),
            artifact_hash: Sha256Hash::hash(b"report"),
            claims: serde_json::json!({"sts_profile": "match", "passage": 12}),
        };
        let c1 = payload.commitment().unwrap();
        let c2 = payload.commitment().unwrap();
        assert_eq!(c1, c2);
        assert!(!c1.is_zero());
    }
}
