//! Error types for bioledger-core.

use thiserror::Error;

/// Errors from the core primitive layer.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid secret key")]
    InvalidSecretKey,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    #[error("canonicalization failed: {0}")]
    Canonical(#[from] crate::canonical::CanonicalError),
}
