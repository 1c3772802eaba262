//! Artifact integrity checking and full verification.
//!
//! The off-chain half of the verification predicate: fetch the artifact
//! bytes referenced by a credential, hash them, and compare against the
//! on-chain commitment. Fail-closed: an artifact that cannot be fetched
//! (missing, outage, timeout) counts as a failure, never as valid. No
//! store-returned metadata is trusted; only the bytes are.

use std::sync::Arc;
use std::time::Duration;

use bioledger_core::{Credential, MaterialId, Sha256Hash};
use bioledger_registry::{ReasonCode, Registry, RegistryError, Verdict};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::traits::ObjectStore;

/// Default artifact fetch timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of one artifact integrity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrityStatus {
    /// Fetched bytes hash to the on-chain commitment.
    Valid,
    /// Fetched bytes do not match the commitment.
    Tampered,
    /// Bytes could not be fetched within the timeout.
    Unavailable,
}

/// Checks credential artifacts against their on-chain commitments.
pub struct IntegrityChecker<S: ObjectStore> {
    store: Arc<S>,
    fetch_timeout: Duration,
}

impl<S: ObjectStore> IntegrityChecker<S> {
    /// Create a checker over the given store with the default timeout.
    pub fn new(store: Arc<S>) -> Self {
        Self { store, fetch_timeout: DEFAULT_FETCH_TIMEOUT }
    }

    /// Override the fetch timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Check one credential's artifact.
    pub async fn check(&self, credential: &Credential) -> IntegrityStatus {
        let fetched = tokio::time::timeout(
            self.fetch_timeout,
            self.store.get(&credential.artifact_cid),
        )
        .await;

        let bytes = match fetched {
            Err(_) => {
                warn!(
                    credential_id = %credential.id,
                    cid = %credential.artifact_cid,
                    "artifact fetch timed out"
                );
                return IntegrityStatus::Unavailable;
            }
            Ok(Err(e)) => {
                warn!(
                    credential_id = %credential.id,
                    cid = %credential.artifact_cid,
                    error = %e,
                    "artifact fetch failed"
                );
                return IntegrityStatus::Unavailable;
            }
            Ok(Ok(bytes)) => bytes,
        };

        let computed = Sha256Hash::hash(&bytes);
        if constant_time_eq(computed.as_bytes(), credential.artifact_hash.as_bytes()) {
            IntegrityStatus::Valid
        } else {
            debug!(
                credential_id = %credential.id,
                expected = %credential.artifact_hash,
                actual = %computed,
                "artifact hash mismatch"
            );
            IntegrityStatus::Tampered
        }
    }
}

/// Full verification: the on-chain verdict extended with an integrity
/// check for every non-revoked credential on the material. Revoked
/// credentials no longer participate in policy, so their artifacts are
/// not consulted.
pub async fn verify_material_full<S: ObjectStore>(
    registry: &Registry,
    checker: &IntegrityChecker<S>,
    material_id: &MaterialId,
    at_time: u64,
) -> Result<Verdict, RegistryError> {
    let mut verdict = registry.verify_material_at(material_id, at_time).await?;
    let credentials = registry.get_credentials(material_id).await;

    for credential in credentials.iter().filter(|c| !c.revoked) {
        match checker.check(credential).await {
            IntegrityStatus::Valid => {}
            IntegrityStatus::Tampered => verdict.push(ReasonCode::ArtifactTampered),
            IntegrityStatus::Unavailable => verdict.push(ReasonCode::ArtifactUnavailable),
        }
    }
    Ok(verdict)
}

/// Constant-time byte comparison. Length mismatch returns false
/// immediately; lengths are public here (both are 32-byte digests).
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
