//! ObjectStore trait: the abstract interface for artifact persistence.
//!
//! The registry core consumes object storage only through this integrity
//! contract: `get(key) -> bytes | NotFound`. Implementations include
//! SQLite (durable) and in-memory (tests and evaluation runs).

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Async interface for artifact blob storage.
///
/// # Design Notes
///
/// - **Opaque keys**: keys are the credential's `artifact_cid`; the store
///   assigns them no structure.
/// - **Bytes in, bytes out**: no metadata crosses this boundary. The
///   integrity checker never trusts anything but the returned bytes.
/// - **Overwrite allowed**: `put` replaces silently; commitments live
///   on-chain, not in the store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store bytes under a key, replacing any previous object.
    async fn put(&self, key: &str, bytes: Bytes) -> Result<()>;

    /// Fetch the bytes under a key. Fails `NotFound` if absent.
    async fn get(&self, key: &str) -> Result<Bytes>;

    /// Whether a key exists.
    async fn has(&self, key: &str) -> Result<bool>;

    /// Number of stored objects.
    async fn count(&self) -> Result<usize>;
}
