//! # bioledger-registry
//!
//! The registry state machine for the bioledger provenance system:
//! authoritative state over materials, credentials, transfers, and issuer
//! permissions, with an append-only history chain and a deterministic
//! on-chain verification predicate.
//!
//! ## Architecture
//!
//! - [`RegistryState`] - the synchronous state machine; every mutation is
//!   atomic and appends exactly one history entry
//! - [`Registry`] - the async handle; a single-writer queue totally
//!   orders mutations while readers run against committed snapshots
//! - [`verify_material_at`] - the on-chain policy: a pure function from
//!   snapshot to a [`Verdict`] of ordered reason codes
//!
//! Artifact integrity (the off-chain half of full verification) lives in
//! `bioledger-store`.

pub mod error;
pub mod history;
pub mod receipt;
pub mod registry;
pub mod state;
pub mod verify;

pub use error::{RegistryError, Result};
pub use history::HistoryLog;
pub use receipt::{LogEvent, TxReceipt, TxStatus};
pub use registry::{unix_now, Registry};
pub use state::{RegistryConfig, RegistryState};
pub use verify::{verify_material_at, ReasonCode, Verdict};
