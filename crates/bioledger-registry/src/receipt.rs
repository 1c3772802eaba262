//! Transaction receipts and event logs.
//!
//! Every committed mutation yields a [`TxReceipt`] carrying the block
//! height at which it was finalized and the events it emitted. A receipt
//! without finality markers is a transport-layer anomaly, not a domain
//! outcome.

use bioledger_core::{
    canonical_hash, Address, CredentialId, MaterialId, MaterialStatus, Sha256Hash, TransferId,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{RegistryError, Result};

/// Finality status of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    /// Applied and visible to all subsequent reads.
    Committed,
    /// Never produced by the in-process registry; present so transports
    /// that surface reverted transactions have a lane to report them.
    Reverted,
}

/// An event emitted by a committed registry mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogEvent {
    IssuerAuthorized {
        issuer: Address,
    },
    IssuerRevoked {
        issuer: Address,
        revoked_at: u64,
    },
    MaterialRegistered {
        material_id: MaterialId,
        owner: Address,
    },
    CredentialIssued {
        credential_id: CredentialId,
        material_id: MaterialId,
        issuer: Address,
    },
    CredentialRevoked {
        credential_id: CredentialId,
        material_id: MaterialId,
    },
    StatusChanged {
        material_id: MaterialId,
        status: MaterialStatus,
        reason_hash: Sha256Hash,
    },
    TransferInitiated {
        transfer_id: TransferId,
        material_id: MaterialId,
        to: Address,
    },
    TransferAccepted {
        transfer_id: TransferId,
        material_id: MaterialId,
        new_owner: Address,
    },
}

impl LogEvent {
    /// Short tag naming the event, also used in history digests.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::IssuerAuthorized { .. } => "issuer_authorized",
            Self::IssuerRevoked { .. } => "issuer_revoked",
            Self::MaterialRegistered { .. } => "material_registered",
            Self::CredentialIssued { .. } => "credential_issued",
            Self::CredentialRevoked { .. } => "credential_revoked",
            Self::StatusChanged { .. } => "status_changed",
            Self::TransferInitiated { .. } => "transfer_initiated",
            Self::TransferAccepted { .. } => "transfer_accepted",
        }
    }

    /// The material this event touches, if any.
    pub fn material_id(&self) -> Option<MaterialId> {
        match self {
            Self::MaterialRegistered { material_id, .. }
            | Self::CredentialIssued { material_id, .. }
            | Self::CredentialRevoked { material_id, .. }
            | Self::StatusChanged { material_id, .. }
            | Self::TransferInitiated { material_id, .. }
            | Self::TransferAccepted { material_id, .. } => Some(*material_id),
            Self::IssuerAuthorized { .. } | Self::IssuerRevoked { .. } => None,
        }
    }
}

/// Receipt for a committed registry transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    /// Content-derived transaction id.
    pub tx_id: Sha256Hash,
    /// Height at which the write was committed (1-indexed, monotone).
    pub block_height: u64,
    pub status: TxStatus,
    pub logs: Vec<LogEvent>,
}

impl TxReceipt {
    /// Build a committed receipt for a single event.
    pub(crate) fn committed(block_height: u64, actor: Address, event: LogEvent) -> Self {
        // tx_id commits to the height, actor, and event content
        let value = json!({
            "block_height": block_height,
            "actor": actor.to_hex(),
            "tag": event.tag(),
            "event": serde_json::to_value(&event).unwrap_or_default(),
        });
        let tx_id = canonical_hash(&value).unwrap_or(Sha256Hash::ZERO);
        Self {
            tx_id,
            block_height,
            status: TxStatus::Committed,
            logs: vec![event],
        }
    }

    /// Latency and throughput measurements must reflect finality, not
    /// submission. Fails `MissingFinality` if the receipt lacks a block
    /// height or a committed status.
    pub fn ensure_finalized(&self) -> Result<()> {
        if self.block_height == 0 || self.status != TxStatus::Committed {
            return Err(RegistryError::MissingFinality);
        }
        Ok(())
    }
}
