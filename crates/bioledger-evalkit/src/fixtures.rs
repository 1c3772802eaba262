//! Shared test fixtures.
//!
//! Common setup for integration tests and evaluation runs: a registry
//! with its writer task, a blob store with integrity checking, and a
//! deterministic cast of actors.

use std::sync::Arc;

use bioledger_core::{Address, Keypair};
use bioledger_registry::{Registry, RegistryConfig};
use bioledger_store::{IntegrityChecker, MemoryObjectStore};

/// A registry, a blob store, and the keypairs of every actor the
/// workloads need. Keys are derived from fixed seeds, so addresses are
/// stable across runs.
pub struct TestBench {
    pub admin: Keypair,
    pub owner: Keypair,
    pub recipient: Keypair,
    pub identity_issuer: Keypair,
    pub qc_issuer: Keypair,
    /// Never authorized; exercises the rejection paths.
    pub rogue_issuer: Keypair,
    pub registry: Registry,
    pub store: Arc<MemoryObjectStore>,
    pub checker: IntegrityChecker<MemoryObjectStore>,
}

impl TestBench {
    /// Spawn a registry and build the standard cast.
    ///
    /// Must run inside a tokio runtime (the registry writer is spawned).
    pub fn new() -> Self {
        let admin = keypair_from_tag(0xA0);
        let registry = Registry::spawn(RegistryConfig { admin: admin.address() });
        let store = Arc::new(MemoryObjectStore::new());
        let checker = IntegrityChecker::new(Arc::clone(&store));

        Self {
            admin,
            owner: keypair_from_tag(0x01),
            recipient: keypair_from_tag(0x02),
            identity_issuer: keypair_from_tag(0x10),
            qc_issuer: keypair_from_tag(0x11),
            rogue_issuer: keypair_from_tag(0x66),
            registry,
            store,
            checker,
        }
    }

    /// Approve the identity and QC issuers with their single capability.
    pub async fn authorize_default_issuers(&self) -> bioledger_registry::Result<()> {
        self.registry
            .authorize_issuer(
                self.admin.address(),
                self.identity_issuer.address(),
                true,
                false,
                false,
            )
            .await?;
        self.registry
            .authorize_issuer(self.admin.address(), self.qc_issuer.address(), false, true, false)
            .await?;
        Ok(())
    }

    pub fn admin_address(&self) -> Address {
        self.admin.address()
    }
}

impl Default for TestBench {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic keypair from a one-byte tag. The seed is a valid
/// secp256k1 scalar for every non-zero tag.
fn keypair_from_tag(tag: u8) -> Keypair {
    let mut seed = [0u8; 32];
    seed[31] = tag;
    seed[0] = 0x01;
    Keypair::from_seed(&seed).expect("fixture seed is a valid scalar")
}
