//! Error types for registry operations.
//!
//! Mutations fail atomically: an error means no state change and no
//! history append. Verification does not use these for domain outcomes;
//! those are reason codes in a successful [`Verdict`](crate::Verdict).

use bioledger_core::{CredentialId, MaterialId};
use thiserror::Error;

/// Errors raised by registry operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    // ── authorization ────────────────────────────────────────────────────
    #[error("admin only")]
    AdminOnly,

    #[error("caller does not own material {0}")]
    NotOwner(MaterialId),

    #[error("caller is not an approved issuer")]
    NotApprovedIssuer,

    #[error("issuer was revoked")]
    IssuerRevoked,

    #[error("issuer lacks capability for the requested credential type")]
    NotAuthorizedForCredentialType,

    #[error("caller may not set the requested status")]
    NotAuthorizedForStatus,

    #[error("caller is not the recipient of the pending transfer")]
    NotTransferRecipient,

    #[error("only the issuing address or the admin may revoke a credential")]
    NotIssuerOrAdmin,

    // ── invalid input ────────────────────────────────────────────────────
    #[error("invalid material type: {0}")]
    InvalidMaterialType(String),

    #[error("commitment hash must be non-zero")]
    InvalidCommitmentHash,

    #[error("artifact hash must be non-zero")]
    InvalidArtifactHash,

    #[error("valid_until must be 0 or strictly in the future")]
    InvalidValidUntil,

    // ── not found ────────────────────────────────────────────────────────
    #[error("material not found: {0}")]
    MaterialNotFound(MaterialId),

    #[error("credential not found: {0}")]
    CredentialNotFound(CredentialId),

    #[error("no pending transfer on material {0}")]
    TransferNotFound(MaterialId),

    // ── state conflict ───────────────────────────────────────────────────
    #[error("credential already revoked: {0}")]
    CredentialAlreadyRevoked(CredentialId),

    #[error("a pending transfer already exists on material {0}")]
    PendingTransferExists(MaterialId),

    #[error("material {0} is revoked; its status is terminal")]
    MaterialRevoked(MaterialId),

    #[error("material is not active")]
    MaterialNotActive,

    #[error("identifier collision: {0}")]
    IdCollision(String),

    // ── transport ────────────────────────────────────────────────────────
    #[error("registry writer is gone")]
    WriterGone,

    #[error("receipt is missing finality markers")]
    MissingFinality,
}

/// Result alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
