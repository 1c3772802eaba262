//! The async registry handle.
//!
//! The logical registry is a single-threaded serial log: every
//! state-changing operation is totally ordered. This handle enforces that
//! with a single-writer queue. One spawned task owns all mutations, and
//! every write entry point enqueues a command and awaits its receipt.
//! Reads run concurrently against the committed snapshot.
//!
//! Writes run to completion once admitted to the queue; cancellation of
//! the awaiting caller does not abort the committed mutation. Reads are
//! freely cancellable.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bioledger_core::{
    Address, Credential, CredentialId, CredentialType, Material, MaterialId, MaterialStatus,
    Sha256Hash, Transfer, TransferId,
};
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, info};

use crate::error::{RegistryError, Result};
use crate::receipt::TxReceipt;
use crate::state::{RegistryConfig, RegistryState};
use crate::verify::{verify_material_at, Verdict};

/// Capacity of the write queue. Writers briefly block when the queue is
/// full, which is the intended backpressure.
const WRITE_QUEUE_DEPTH: usize = 256;

type Reply<T> = oneshot::Sender<Result<T>>;

enum Command {
    AuthorizeIssuer {
        caller: Address,
        issuer: Address,
        can_identity: bool,
        can_qc: bool,
        can_usage: bool,
        reply: Reply<TxReceipt>,
    },
    RevokeIssuer {
        caller: Address,
        issuer: Address,
        reply: Reply<TxReceipt>,
    },
    RegisterMaterial {
        caller: Address,
        material_type: String,
        metadata_hash: Sha256Hash,
        owner_org: String,
        reply: Reply<(MaterialId, TxReceipt)>,
    },
    IssueCredential {
        caller: Address,
        material_id: MaterialId,
        credential_type: CredentialType,
        commitment_hash: Sha256Hash,
        valid_until: u64,
        artifact_cid: String,
        artifact_hash: Sha256Hash,
        issuer_org: String,
        reply: Reply<(CredentialId, TxReceipt)>,
    },
    RevokeCredential {
        caller: Address,
        credential_id: CredentialId,
        reply: Reply<TxReceipt>,
    },
    SetStatusByOwner {
        caller: Address,
        material_id: MaterialId,
        new_status: MaterialStatus,
        reason_hash: Sha256Hash,
        reply: Reply<TxReceipt>,
    },
    SetStatusByAuthority {
        caller: Address,
        material_id: MaterialId,
        new_status: MaterialStatus,
        reason_hash: Sha256Hash,
        reply: Reply<TxReceipt>,
    },
    InitiateTransfer {
        caller: Address,
        material_id: MaterialId,
        to_address: Address,
        to_org: String,
        shipment_hash: Sha256Hash,
        reply: Reply<(TransferId, TxReceipt)>,
    },
    AcceptTransfer {
        caller: Address,
        material_id: MaterialId,
        reply: Reply<TxReceipt>,
    },
}

/// Handle to a running registry. Cheap to clone; all clones share the
/// same state and the same write queue.
#[derive(Clone)]
pub struct Registry {
    state: Arc<RwLock<RegistryState>>,
    writer: mpsc::Sender<Command>,
}

impl Registry {
    /// Start a registry and its writer task on the current runtime.
    pub fn spawn(config: RegistryConfig) -> Self {
        let state = Arc::new(RwLock::new(RegistryState::new(config)));
        let (tx, rx) = mpsc::channel(WRITE_QUEUE_DEPTH);

        let writer_state = Arc::clone(&state);
        tokio::spawn(async move {
            run_writer(writer_state, rx).await;
        });

        info!("registry writer started");
        Self { state, writer: tx }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Writes (serialized through the queue)
    // ─────────────────────────────────────────────────────────────────────

    pub async fn authorize_issuer(
        &self,
        caller: Address,
        issuer: Address,
        can_identity: bool,
        can_qc: bool,
        can_usage: bool,
    ) -> Result<TxReceipt> {
        self.submit(|reply| Command::AuthorizeIssuer {
            caller,
            issuer,
            can_identity,
            can_qc,
            can_usage,
            reply,
        })
        .await
    }

    pub async fn revoke_issuer(&self, caller: Address, issuer: Address) -> Result<TxReceipt> {
        self.submit(|reply| Command::RevokeIssuer { caller, issuer, reply })
            .await
    }

    pub async fn register_material(
        &self,
        caller: Address,
        material_type: &str,
        metadata_hash: Sha256Hash,
        owner_org: &str,
    ) -> Result<(MaterialId, TxReceipt)> {
        self.submit(|reply| Command::RegisterMaterial {
            caller,
            material_type: material_type.to_string(),
            metadata_hash,
            owner_org: owner_org.to_string(),
            reply,
        })
        .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn issue_credential(
        &self,
        caller: Address,
        material_id: MaterialId,
        credential_type: CredentialType,
        commitment_hash: Sha256Hash,
        valid_until: u64,
        artifact_cid: &str,
        artifact_hash: Sha256Hash,
        issuer_org: &str,
    ) -> Result<(CredentialId, TxReceipt)> {
        self.submit(|reply| Command::IssueCredential {
            caller,
            material_id,
            credential_type,
            commitment_hash,
            valid_until,
            artifact_cid: artifact_cid.to_string(),
            artifact_hash,
            issuer_org: issuer_org.to_string(),
            reply,
        })
        .await
    }

    pub async fn revoke_credential(
        &self,
        caller: Address,
        credential_id: CredentialId,
    ) -> Result<TxReceipt> {
        self.submit(|reply| Command::RevokeCredential { caller, credential_id, reply })
            .await
    }

    pub async fn set_status_by_owner(
        &self,
        caller: Address,
        material_id: MaterialId,
        new_status: MaterialStatus,
        reason_hash: Sha256Hash,
    ) -> Result<TxReceipt> {
        self.submit(|reply| Command::SetStatusByOwner {
            caller,
            material_id,
            new_status,
            reason_hash,
            reply,
        })
        .await
    }

    pub async fn set_status_by_authority(
        &self,
        caller: Address,
        material_id: MaterialId,
        new_status: MaterialStatus,
        reason_hash: Sha256Hash,
    ) -> Result<TxReceipt> {
        self.submit(|reply| Command::SetStatusByAuthority {
            caller,
            material_id,
            new_status,
            reason_hash,
            reply,
        })
        .await
    }

    pub async fn initiate_transfer(
        &self,
        caller: Address,
        material_id: MaterialId,
        to_address: Address,
        to_org: &str,
        shipment_hash: Sha256Hash,
    ) -> Result<(TransferId, TxReceipt)> {
        self.submit(|reply| Command::InitiateTransfer {
            caller,
            material_id,
            to_address,
            to_org: to_org.to_string(),
            shipment_hash,
            reply,
        })
        .await
    }

    pub async fn accept_transfer(&self, caller: Address, material_id: MaterialId) -> Result<TxReceipt> {
        self.submit(|reply| Command::AcceptTransfer { caller, material_id, reply })
            .await
    }

    async fn submit<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.writer
            .send(build(reply_tx))
            .await
            .map_err(|_| RegistryError::WriterGone)?;
        reply_rx.await.map_err(|_| RegistryError::WriterGone)?
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reads (concurrent, against the committed snapshot)
    // ─────────────────────────────────────────────────────────────────────

    /// Run a closure against the committed snapshot.
    pub async fn with_state<R>(&self, f: impl FnOnce(&RegistryState) -> R) -> R {
        let guard = self.state.read().await;
        f(&guard)
    }

    pub async fn get_material(&self, material_id: &MaterialId) -> Option<Material> {
        self.with_state(|s| s.get_material(material_id).cloned()).await
    }

    pub async fn get_credentials(&self, material_id: &MaterialId) -> Vec<Credential> {
        self.with_state(|s| s.get_credentials(material_id).into_iter().cloned().collect())
            .await
    }

    pub async fn get_transfers(&self, material_id: &MaterialId) -> Vec<Transfer> {
        self.with_state(|s| s.get_transfers(material_id).into_iter().cloned().collect())
            .await
    }

    pub async fn get_history_count(&self) -> usize {
        self.with_state(RegistryState::get_history_count).await
    }

    pub async fn get_history_at(&self, index: usize) -> Option<Sha256Hash> {
        self.with_state(|s| s.get_history_at(index)).await
    }

    pub async fn get_history_slice(&self, offset: usize, limit: usize) -> Vec<Sha256Hash> {
        self.with_state(|s| s.get_history_slice(offset, limit)).await
    }

    pub async fn get_material_history_count(&self, material_id: &MaterialId) -> usize {
        self.with_state(|s| s.history().material_count(material_id)).await
    }

    pub async fn get_material_history_slice(
        &self,
        material_id: &MaterialId,
        offset: usize,
        limit: usize,
    ) -> Vec<Sha256Hash> {
        self.with_state(|s| s.history().material_slice(material_id, offset, limit))
            .await
    }

    /// On-chain verification at the current wall clock.
    pub async fn verify_material(&self, material_id: &MaterialId) -> Result<Verdict> {
        self.verify_material_at(material_id, unix_now()).await
    }

    /// On-chain verification at an explicit evaluation time.
    pub async fn verify_material_at(&self, material_id: &MaterialId, at_time: u64) -> Result<Verdict> {
        self.with_state(|s| verify_material_at(s, material_id, at_time))
            .await
    }
}

/// The writer task: applies commands in arrival order, one at a time.
/// State updates commit before the reply is sent, so a caller observing
/// its receipt is guaranteed to see the write in any later read.
async fn run_writer(state: Arc<RwLock<RegistryState>>, mut rx: mpsc::Receiver<Command>) {
    while let Some(command) = rx.recv().await {
        let wall = unix_now();
        let mut guard = state.write().await;
        match command {
            Command::AuthorizeIssuer { caller, issuer, can_identity, can_qc, can_usage, reply } => {
                let result =
                    guard.authorize_issuer(caller, issuer, can_identity, can_qc, can_usage, wall);
                let _ = reply.send(result);
            }
            Command::RevokeIssuer { caller, issuer, reply } => {
                let _ = reply.send(guard.revoke_issuer(caller, issuer, wall));
            }
            Command::RegisterMaterial { caller, material_type, metadata_hash, owner_org, reply } => {
                let result =
                    guard.register_material(caller, &material_type, metadata_hash, &owner_org, wall);
                let _ = reply.send(result);
            }
            Command::IssueCredential {
                caller,
                material_id,
                credential_type,
                commitment_hash,
                valid_until,
                artifact_cid,
                artifact_hash,
                issuer_org,
                reply,
            } => {
                let result = guard.issue_credential(
                    caller,
                    material_id,
                    credential_type,
                    commitment_hash,
                    valid_until,
                    &artifact_cid,
                    artifact_hash,
                    &issuer_org,
                    wall,
                );
                let _ = reply.send(result);
            }
            Command::RevokeCredential { caller, credential_id, reply } => {
                let _ = reply.send(guard.revoke_credential(caller, credential_id, wall));
            }
            Command::SetStatusByOwner { caller, material_id, new_status, reason_hash, reply } => {
                let result =
                    guard.set_status_by_owner(caller, material_id, new_status, reason_hash, wall);
                let _ = reply.send(result);
            }
            Command::SetStatusByAuthority { caller, material_id, new_status, reason_hash, reply } => {
                let result =
                    guard.set_status_by_authority(caller, material_id, new_status, reason_hash, wall);
                let _ = reply.send(result);
            }
            Command::InitiateTransfer {
                caller,
                material_id,
                to_address,
                to_org,
                shipment_hash,
                reply,
            } => {
                let result = guard.initiate_transfer(
                    caller,
                    material_id,
                    to_address,
                    &to_org,
                    shipment_hash,
                    wall,
                );
                let _ = reply.send(result);
            }
            Command::AcceptTransfer { caller, material_id, reply } => {
                let _ = reply.send(guard.accept_transfer(caller, material_id, wall));
            }
        }
    }
    debug!("registry writer drained and stopped");
}

/// Current wall clock, Unix seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
