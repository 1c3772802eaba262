//! # bioledger-store
//!
//! Object storage and artifact integrity for the bioledger provenance
//! registry.
//!
//! The registry commits to artifact bytes by SHA-256; this crate holds
//! the bytes and the checker that compares freshly computed digests
//! against those commitments. The policy is fail-closed: anything that
//! prevents the comparison resolves to a failure.
//!
//! ## Backends
//!
//! - [`MemoryObjectStore`] - tests and evaluation runs, with fault injection
//! - [`SqliteObjectStore`] - durable local storage

pub mod error;
pub mod integrity;
pub mod memory;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use integrity::{
    constant_time_eq, verify_material_full, IntegrityChecker, IntegrityStatus,
    DEFAULT_FETCH_TIMEOUT,
};
pub use memory::MemoryObjectStore;
pub use sqlite::SqliteObjectStore;
pub use traits::ObjectStore;
