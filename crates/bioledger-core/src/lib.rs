//! # bioledger-core
//!
//! Pure primitives for the bioledger provenance registry: canonical
//! commitments, identifiers, domain records, and the issuer key layer.
//!
//! This crate contains no I/O, no storage, no runtime. It is pure
//! computation over cryptographic data structures.
//!
//! ## Key Types
//!
//! - [`Sha256Hash`] - 32-byte commitment digest
//! - [`Address`] - 20-byte account identity
//! - [`MaterialId`] / [`CredentialId`] / [`TransferId`] - typed identifiers
//! - [`Material`] / [`Credential`] / [`Transfer`] - registry records
//!
//! ## Canonicalization
//!
//! Commitments are SHA-256 over a canonical JSON byte string. See the
//! [`canonical`] module for the exact profile.

pub mod canonical;
pub mod crypto;
pub mod error;
pub mod ids;
pub mod types;

pub use canonical::{canonical_bytes, canonical_hash, canonical_string, is_canonical, CanonicalError};
pub use crypto::{sign_payload, verify_payload, Address, Keypair, PublicKey, Sha256Hash, Signature};
pub use error::CoreError;
pub use ids::{CredentialId, IdMinter, MaterialId, TransferId};
pub use types::{
    Credential, CredentialPayload, CredentialType, IssuerPermission, Material, MaterialStatus,
    MaterialType, Transfer,
};
