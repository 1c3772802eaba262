//! The registry state machine.
//!
//! [`RegistryState`] owns every entity: materials, credentials, transfers,
//! issuer permissions, the identifier minter, and the history chain.
//! External components reference entities by ID only.
//!
//! Mutations are atomic: validation happens up front, and only a fully
//! validated operation commits (bumping the block height and appending
//! exactly one history entry). Timestamps are strictly monotone per
//! committed write, so admission order and `issued_at` order coincide.

use std::collections::HashMap;

use bioledger_core::{
    canonical_hash, Address, Credential, CredentialId, CredentialType, IdMinter, IssuerPermission,
    Material, MaterialId, MaterialStatus, MaterialType, Sha256Hash, Transfer, TransferId,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RegistryError, Result};
use crate::history::HistoryLog;
use crate::receipt::{LogEvent, TxReceipt};

/// Configuration for a registry instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// The admin account: may manage issuers, revoke credentials, and set
    /// any material status.
    pub admin: Address,
}

/// Authoritative state over materials, credentials, transfers, issuer
/// permissions, and append-only history.
#[derive(Debug, Clone)]
pub struct RegistryState {
    admin: Address,
    minter: IdMinter,
    materials: HashMap<MaterialId, Material>,
    material_order: Vec<MaterialId>,
    credentials: HashMap<CredentialId, Credential>,
    material_credentials: HashMap<MaterialId, Vec<CredentialId>>,
    transfers: HashMap<TransferId, Transfer>,
    material_transfers: HashMap<MaterialId, Vec<TransferId>>,
    issuers: HashMap<Address, IssuerPermission>,
    history: HistoryLog,
    block_height: u64,
    last_timestamp: u64,
}

impl RegistryState {
    /// Create an empty registry with the given admin.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            admin: config.admin,
            minter: IdMinter::new(),
            materials: HashMap::new(),
            material_order: Vec::new(),
            credentials: HashMap::new(),
            material_credentials: HashMap::new(),
            transfers: HashMap::new(),
            material_transfers: HashMap::new(),
            issuers: HashMap::new(),
            history: HistoryLog::new(),
            block_height: 0,
            last_timestamp: 0,
        }
    }

    /// The admin account.
    pub fn admin(&self) -> Address {
        self.admin
    }

    /// Height of the last committed write.
    pub fn block_height(&self) -> u64 {
        self.block_height
    }

    /// Strictly monotone write timestamp: never behind the last commit.
    fn effective_now(&self, wall: u64) -> u64 {
        wall.max(self.last_timestamp + 1)
    }

    /// Commit a validated mutation: bump height, chain history, receipt.
    fn commit(&mut self, actor: Address, now: u64, event: LogEvent) -> TxReceipt {
        self.block_height += 1;
        self.last_timestamp = now;

        let args_digest = serde_json::to_value(&event)
            .ok()
            .and_then(|v| canonical_hash(&v).ok())
            .unwrap_or(Sha256Hash::ZERO);
        self.history
            .append(event.tag(), actor, args_digest, now, event.material_id());

        debug!(
            block_height = self.block_height,
            tag = event.tag(),
            actor = %actor,
            "committed registry write"
        );
        TxReceipt::committed(self.block_height, actor, event)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Issuer management
    // ─────────────────────────────────────────────────────────────────────

    /// Approve an issuer with the given capability flags. Admin only.
    /// Clears any previous revocation; idempotent in content.
    pub fn authorize_issuer(
        &mut self,
        caller: Address,
        issuer: Address,
        can_identity: bool,
        can_qc: bool,
        can_usage: bool,
        wall: u64,
    ) -> Result<TxReceipt> {
        if caller != self.admin {
            return Err(RegistryError::AdminOnly);
        }
        let now = self.effective_now(wall);

        self.issuers.insert(
            issuer,
            IssuerPermission {
                is_approved: true,
                can_issue_identity: can_identity,
                can_issue_qc: can_qc,
                can_issue_usage_rights: can_usage,
                revoked_at: 0,
            },
        );

        Ok(self.commit(caller, now, LogEvent::IssuerAuthorized { issuer }))
    }

    /// Revoke an issuer. Admin only. Credentials issued strictly before
    /// the revocation timestamp remain valid; nothing new may be issued.
    pub fn revoke_issuer(&mut self, caller: Address, issuer: Address, wall: u64) -> Result<TxReceipt> {
        if caller != self.admin {
            return Err(RegistryError::AdminOnly);
        }
        let now = self.effective_now(wall);

        let perm = self
            .issuers
            .get_mut(&issuer)
            .ok_or(RegistryError::NotApprovedIssuer)?;
        if perm.revoked_at != 0 {
            return Err(RegistryError::IssuerRevoked);
        }
        perm.is_approved = false;
        perm.revoked_at = now;

        Ok(self.commit(caller, now, LogEvent::IssuerRevoked { issuer, revoked_at: now }))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Materials
    // ─────────────────────────────────────────────────────────────────────

    /// Register a new material. Any caller; the caller becomes the owner.
    pub fn register_material(
        &mut self,
        caller: Address,
        material_type: &str,
        metadata_hash: Sha256Hash,
        owner_org: &str,
        wall: u64,
    ) -> Result<(MaterialId, TxReceipt)> {
        let kind = MaterialType::parse(material_type)
            .ok_or_else(|| RegistryError::InvalidMaterialType(material_type.into()))?;
        if metadata_hash.is_zero() {
            return Err(RegistryError::InvalidCommitmentHash);
        }
        let now = self.effective_now(wall);

        let id = self.minter.next_material(kind);
        if self.materials.contains_key(&id) {
            return Err(RegistryError::IdCollision(id.to_string()));
        }

        self.materials.insert(
            id,
            Material {
                id,
                material_type: kind,
                metadata_hash,
                owner_address: caller,
                owner_org: owner_org.to_string(),
                status: MaterialStatus::Active,
                created_at: now,
                updated_at: now,
            },
        );
        self.material_order.push(id);

        let receipt = self.commit(
            caller,
            now,
            LogEvent::MaterialRegistered { material_id: id, owner: caller },
        );
        Ok((id, receipt))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Credentials
    // ─────────────────────────────────────────────────────────────────────

    /// Issue a credential against a material. The caller must be an
    /// approved, non-revoked issuer with the capability for the requested
    /// credential type.
    #[allow(clippy::too_many_arguments)]
    pub fn issue_credential(
        &mut self,
        caller: Address,
        material_id: MaterialId,
        credential_type: CredentialType,
        commitment_hash: Sha256Hash,
        valid_until: u64,
        artifact_cid: &str,
        artifact_hash: Sha256Hash,
        issuer_org: &str,
        wall: u64,
    ) -> Result<(CredentialId, TxReceipt)> {
        // Authorization ladder, in order: approval, revocation, capability.
        let perm = match self.issuers.get(&caller) {
            None => return Err(RegistryError::NotApprovedIssuer),
            Some(p) if p.revoked_at != 0 => return Err(RegistryError::IssuerRevoked),
            Some(p) if !p.is_approved => return Err(RegistryError::NotApprovedIssuer),
            Some(p) => *p,
        };
        if !perm.can_issue(credential_type) {
            return Err(RegistryError::NotAuthorizedForCredentialType);
        }
        if !self.materials.contains_key(&material_id) {
            return Err(RegistryError::MaterialNotFound(material_id));
        }
        if commitment_hash.is_zero() {
            return Err(RegistryError::InvalidCommitmentHash);
        }
        if artifact_hash.is_zero() {
            return Err(RegistryError::InvalidArtifactHash);
        }
        let now = self.effective_now(wall);
        if valid_until != 0 && valid_until <= now {
            return Err(RegistryError::InvalidValidUntil);
        }

        let id = self.minter.next_credential();
        self.credentials.insert(
            id,
            Credential {
                id,
                material_id,
                credential_type,
                commitment_hash,
                issuer_address: caller,
                issuer_org: issuer_org.to_string(),
                issued_at: now,
                valid_until,
                artifact_cid: artifact_cid.to_string(),
                artifact_hash,
                revoked: false,
            },
        );
        self.material_credentials
            .entry(material_id)
            .or_default()
            .push(id);

        let receipt = self.commit(
            caller,
            now,
            LogEvent::CredentialIssued { credential_id: id, material_id, issuer: caller },
        );
        Ok((id, receipt))
    }

    /// Revoke a credential. Only the original issuer or the admin.
    /// A second revocation fails.
    pub fn revoke_credential(
        &mut self,
        caller: Address,
        credential_id: CredentialId,
        wall: u64,
    ) -> Result<TxReceipt> {
        let cred = self
            .credentials
            .get(&credential_id)
            .ok_or(RegistryError::CredentialNotFound(credential_id))?;
        if caller != cred.issuer_address && caller != self.admin {
            return Err(RegistryError::NotIssuerOrAdmin);
        }
        if cred.revoked {
            return Err(RegistryError::CredentialAlreadyRevoked(credential_id));
        }
        let now = self.effective_now(wall);
        let material_id = cred.material_id;

        // Re-borrow mutably; existence was just checked.
        if let Some(c) = self.credentials.get_mut(&credential_id) {
            c.revoked = true;
        }

        Ok(self.commit(
            caller,
            now,
            LogEvent::CredentialRevoked { credential_id, material_id },
        ))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Status transitions
    // ─────────────────────────────────────────────────────────────────────

    /// Owner-gated status change. Owners move materials between ACTIVE and
    /// QUARANTINED only; REVOKED is reserved for authorities.
    pub fn set_status_by_owner(
        &mut self,
        caller: Address,
        material_id: MaterialId,
        new_status: MaterialStatus,
        reason_hash: Sha256Hash,
        wall: u64,
    ) -> Result<TxReceipt> {
        let material = self
            .materials
            .get(&material_id)
            .ok_or(RegistryError::MaterialNotFound(material_id))?;
        if caller != material.owner_address {
            return Err(RegistryError::NotOwner(material_id));
        }
        if new_status == MaterialStatus::Revoked {
            return Err(RegistryError::NotAuthorizedForStatus);
        }
        if material.status == MaterialStatus::Revoked {
            return Err(RegistryError::MaterialRevoked(material_id));
        }
        self.apply_status(caller, material_id, new_status, reason_hash, wall)
    }

    /// Authority-gated status change: the admin, or a currently approved
    /// non-revoked QC-capable issuer. May set any status, including the
    /// terminal REVOKED.
    pub fn set_status_by_authority(
        &mut self,
        caller: Address,
        material_id: MaterialId,
        new_status: MaterialStatus,
        reason_hash: Sha256Hash,
        wall: u64,
    ) -> Result<TxReceipt> {
        let material = self
            .materials
            .get(&material_id)
            .ok_or(RegistryError::MaterialNotFound(material_id))?;

        let is_authority = caller == self.admin
            || self
                .issuers
                .get(&caller)
                .is_some_and(|p| p.is_active() && p.can_issue_qc);
        if !is_authority {
            return Err(RegistryError::NotAuthorizedForStatus);
        }
        if material.status == MaterialStatus::Revoked {
            return Err(RegistryError::MaterialRevoked(material_id));
        }
        self.apply_status(caller, material_id, new_status, reason_hash, wall)
    }

    fn apply_status(
        &mut self,
        caller: Address,
        material_id: MaterialId,
        new_status: MaterialStatus,
        reason_hash: Sha256Hash,
        wall: u64,
    ) -> Result<TxReceipt> {
        let now = self.effective_now(wall);
        if let Some(m) = self.materials.get_mut(&material_id) {
            m.status = new_status;
            m.updated_at = now;
        }
        Ok(self.commit(
            caller,
            now,
            LogEvent::StatusChanged { material_id, status: new_status, reason_hash },
        ))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transfers
    // ─────────────────────────────────────────────────────────────────────

    /// Open a custody handoff. The caller must own the material, the
    /// material must be ACTIVE, and no other transfer may be pending.
    pub fn initiate_transfer(
        &mut self,
        caller: Address,
        material_id: MaterialId,
        to_address: Address,
        to_org: &str,
        shipment_hash: Sha256Hash,
        wall: u64,
    ) -> Result<(TransferId, TxReceipt)> {
        let material = self
            .materials
            .get(&material_id)
            .ok_or(RegistryError::MaterialNotFound(material_id))?;
        if caller != material.owner_address {
            return Err(RegistryError::NotOwner(material_id));
        }
        if material.status != MaterialStatus::Active {
            return Err(RegistryError::MaterialNotActive);
        }
        if self.latest_pending_transfer(&material_id).is_some() {
            return Err(RegistryError::PendingTransferExists(material_id));
        }
        let now = self.effective_now(wall);
        let from_org = material.owner_org.clone();

        let id = self.minter.next_transfer();
        self.transfers.insert(
            id,
            Transfer {
                id,
                material_id,
                from_address: caller,
                from_org,
                to_address,
                to_org: to_org.to_string(),
                shipment_hash,
                timestamp: now,
                accepted: false,
            },
        );
        self.material_transfers
            .entry(material_id)
            .or_default()
            .push(id);

        let receipt = self.commit(
            caller,
            now,
            LogEvent::TransferInitiated { transfer_id: id, material_id, to: to_address },
        );
        Ok((id, receipt))
    }

    /// Accept the pending transfer on a material. The caller must be its
    /// recipient; ownership moves on success.
    pub fn accept_transfer(
        &mut self,
        caller: Address,
        material_id: MaterialId,
        wall: u64,
    ) -> Result<TxReceipt> {
        if !self.materials.contains_key(&material_id) {
            return Err(RegistryError::MaterialNotFound(material_id));
        }
        let pending = self
            .latest_pending_transfer(&material_id)
            .ok_or(RegistryError::TransferNotFound(material_id))?;
        if caller != pending.to_address {
            return Err(RegistryError::NotTransferRecipient);
        }
        let now = self.effective_now(wall);
        let transfer_id = pending.id;
        let new_owner = pending.to_address;
        let new_org = pending.to_org.clone();

        if let Some(t) = self.transfers.get_mut(&transfer_id) {
            t.accepted = true;
        }
        if let Some(m) = self.materials.get_mut(&material_id) {
            m.owner_address = new_owner;
            m.owner_org = new_org;
            m.updated_at = now;
        }

        Ok(self.commit(
            caller,
            now,
            LogEvent::TransferAccepted { transfer_id, material_id, new_owner },
        ))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────

    /// Look up a material.
    pub fn get_material(&self, material_id: &MaterialId) -> Option<&Material> {
        self.materials.get(material_id)
    }

    /// All materials in registration order.
    pub fn materials(&self) -> impl Iterator<Item = &Material> {
        self.material_order
            .iter()
            .filter_map(|id| self.materials.get(id))
    }

    /// Number of registered materials.
    pub fn material_count(&self) -> usize {
        self.material_order.len()
    }

    /// Look up a credential.
    pub fn get_credential(&self, credential_id: &CredentialId) -> Option<&Credential> {
        self.credentials.get(credential_id)
    }

    /// Credentials on a material, in insertion order.
    pub fn get_credentials(&self, material_id: &MaterialId) -> Vec<&Credential> {
        self.material_credentials
            .get(material_id)
            .map(|ids| ids.iter().filter_map(|id| self.credentials.get(id)).collect())
            .unwrap_or_default()
    }

    /// Transfers on a material, in insertion order.
    pub fn get_transfers(&self, material_id: &MaterialId) -> Vec<&Transfer> {
        self.material_transfers
            .get(material_id)
            .map(|ids| ids.iter().filter_map(|id| self.transfers.get(id)).collect())
            .unwrap_or_default()
    }

    /// The most recent transfer if it has not been accepted yet.
    /// At most one transfer per material can ever be pending.
    pub fn latest_pending_transfer(&self, material_id: &MaterialId) -> Option<&Transfer> {
        self.material_transfers
            .get(material_id)
            .and_then(|ids| ids.last())
            .and_then(|id| self.transfers.get(id))
            .filter(|t| !t.accepted)
    }

    /// Permission record for an issuer, if any.
    pub fn issuer_permission(&self, issuer: &Address) -> Option<&IssuerPermission> {
        self.issuers.get(issuer)
    }

    /// The history log.
    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    /// Total history length.
    pub fn get_history_count(&self) -> usize {
        self.history.count()
    }

    /// History entry at a global index.
    pub fn get_history_at(&self, index: usize) -> Option<Sha256Hash> {
        self.history.at(index)
    }

    /// Paginated history slice.
    pub fn get_history_slice(&self, offset: usize, limit: usize) -> Vec<Sha256Hash> {
        self.history.slice(offset, limit)
    }

    /// Force an issuer's revocation timestamp, bypassing the monotone
    /// clock. Local admission can never produce a credential issued at or
    /// after its issuer's revocation; snapshots from elsewhere can, and
    /// the verifier branch for them needs exercising.
    #[cfg(test)]
    pub(crate) fn backdate_issuer_revocation(&mut self, issuer: &Address, revoked_at: u64) {
        if let Some(p) = self.issuers.get_mut(issuer) {
            p.is_approved = false;
            p.revoked_at = revoked_at;
        }
    }
}
