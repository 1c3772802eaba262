//! Append-only history log.
//!
//! Every committed mutation appends exactly one 32-byte digest encoding
//! `(event_tag, actor, salient_argument_digest, timestamp)`. Entries form
//! a hash chain: each digest commits to its predecessor, so any rewrite
//! of earlier history invalidates everything after it.
//!
//! The log is global and append-only; material-scoped views are index
//! vectors into it. No pruning, no reordering, no modification.

use bioledger_core::{canonical_hash, Address, MaterialId, Sha256Hash};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

/// The append-only digest chain with per-material views.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct HistoryLog {
    entries: Vec<Sha256Hash>,
    by_material: HashMap<MaterialId, Vec<usize>>,
}

impl HistoryLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry. Returns the digest just appended.
    ///
    /// The first entry chains from the zero digest.
    pub fn append(
        &mut self,
        event_tag: &str,
        actor: Address,
        args_digest: Sha256Hash,
        timestamp: u64,
        material_id: Option<MaterialId>,
    ) -> Sha256Hash {
        let prev = self.entries.last().copied().unwrap_or(Sha256Hash::ZERO);
        let value = json!({
            "tag": event_tag,
            "actor": actor.to_hex(),
            "args": args_digest.to_hex(),
            "timestamp": timestamp,
            "prev": prev.to_hex(),
        });
        // The value is built from the canonical subset; hashing cannot fail.
        let digest = canonical_hash(&value).unwrap_or(Sha256Hash::ZERO);

        let index = self.entries.len();
        self.entries.push(digest);
        if let Some(id) = material_id {
            self.by_material.entry(id).or_default().push(index);
        }
        digest
    }

    /// Total number of entries.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Entry at a global index.
    pub fn at(&self, index: usize) -> Option<Sha256Hash> {
        self.entries.get(index).copied()
    }

    /// Paginated slice of the global log.
    pub fn slice(&self, offset: usize, limit: usize) -> Vec<Sha256Hash> {
        self.entries
            .iter()
            .skip(offset)
            .take(limit)
            .copied()
            .collect()
    }

    /// Number of entries touching one material.
    pub fn material_count(&self, material_id: &MaterialId) -> usize {
        self.by_material.get(material_id).map_or(0, Vec::len)
    }

    /// Paginated slice of one material's entries, in program order.
    pub fn material_slice(
        &self,
        material_id: &MaterialId,
        offset: usize,
        limit: usize,
    ) -> Vec<Sha256Hash> {
        self.by_material
            .get(material_id)
            .map(|indices| {
                indices
                    .iter()
                    .skip(offset)
                    .take(limit)
                    .filter_map(|&i| self.entries.get(i).copied())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Full per-material history.
    ///
    /// Deprecated convenience: unpaginated reads scale with history length.
    /// Use [`HistoryLog::material_slice`].
    pub fn material_entries(&self, material_id: &MaterialId) -> Vec<Sha256Hash> {
        self.material_slice(material_id, 0, usize::MAX)
    }
}
