//! In-memory implementation of the ObjectStore trait.
//!
//! Primarily for tests and evaluation runs. Same semantics as the SQLite
//! backend, plus fault injection: individual keys can be knocked out to
//! simulate an unreachable blob store.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{Result, StoreError};
use crate::traits::ObjectStore;

/// In-memory object store. Thread-safe via RwLock.
#[derive(Default)]
pub struct MemoryObjectStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    objects: HashMap<String, Bytes>,
    offline_keys: HashSet<String>,
}

impl MemoryObjectStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a key behave as unreachable: `get` returns `Unavailable`
    /// even though the bytes are present.
    pub fn set_offline(&self, key: &str, offline: bool) {
        let mut inner = self.inner.write().unwrap();
        if offline {
            inner.offline_keys.insert(key.to_string());
        } else {
            inner.offline_keys.remove(key);
        }
    }

    /// Overwrite the stored bytes without going through `put`, simulating
    /// tampering behind the store's back.
    pub fn tamper(&self, key: &str, bytes: Bytes) {
        let mut inner = self.inner.write().unwrap();
        inner.objects.insert(key.to_string(), bytes);
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, bytes: Bytes) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.objects.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let inner = self.inner.read().unwrap();
        if inner.offline_keys.contains(key) {
            return Err(StoreError::Unavailable(key.to_string()));
        }
        inner
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn has(&self, key: &str) -> Result<bool> {
        let inner = self.inner.read().unwrap();
        Ok(inner.objects.contains_key(key))
    }

    async fn count(&self) -> Result<usize> {
        let inner = self.inner.read().unwrap();
        Ok(inner.objects.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = MemoryObjectStore::new();
        store.put("k1", Bytes::from_static(b"hello")).await.unwrap();

        assert_eq!(store.get("k1").await.unwrap(), Bytes::from_static(b"hello"));
        assert!(store.has("k1").await.unwrap());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_key_is_not_found() {
        let store = MemoryObjectStore::new();
        assert!(matches!(
            store.get("nope").await,
            Err(StoreError::NotFound(_))
        ));
        assert!(!store.has("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = MemoryObjectStore::new();
        store.put("k", Bytes::from_static(b"v1")).await.unwrap();
        store.put("k", Bytes::from_static(b"v2")).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Bytes::from_static(b"v2"));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_offline_key_unavailable() {
        let store = MemoryObjectStore::new();
        store.put("k", Bytes::from_static(b"v")).await.unwrap();

        store.set_offline("k", true);
        assert!(matches!(
            store.get("k").await,
            Err(StoreError::Unavailable(_))
        ));

        store.set_offline("k", false);
        assert!(store.get("k").await.is_ok());
    }
}
