//! SQLite implementation of the ObjectStore trait.
//!
//! The durable backend: rusqlite with bundled SQLite, wrapped in async
//! via `tokio::task::spawn_blocking` so blob I/O never blocks the
//! runtime.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, StoreError};
use crate::traits::ObjectStore;

/// SQLite-backed object store.
///
/// Thread-safe via internal Mutex; every call runs on the blocking pool.
pub struct SqliteObjectStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteObjectStore {
    /// Open a database at the given path, creating the schema if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Open an in-memory database. Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS objects (
                key  TEXT PRIMARY KEY,
                body BLOB NOT NULL
            );",
        )?;
        Ok(())
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("mutex poisoned: {e}")))?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("blocking task failed: {e}")))?
    }
}

#[async_trait]
impl ObjectStore for SqliteObjectStore {
    async fn put(&self, key: &str, bytes: Bytes) -> Result<()> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO objects (key, body) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET body = excluded.body",
                params![key, bytes.as_ref()],
            )?;
            Ok(())
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let body: Option<Vec<u8>> = conn
                .query_row("SELECT body FROM objects WHERE key = ?1", params![key], |row| {
                    row.get(0)
                })
                .optional()?;
            body.map(Bytes::from).ok_or(StoreError::NotFound(key))
        })
        .await
    }

    async fn has(&self, key: &str) -> Result<bool> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let found: Option<i64> = conn
                .query_row("SELECT 1 FROM objects WHERE key = ?1", params![key], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }

    async fn count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM objects", [], |row| row.get(0))?;
            Ok(n as usize)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip_in_memory() {
        let store = SqliteObjectStore::open_memory().unwrap();
        store.put("cid-1", Bytes::from_static(b"report")).await.unwrap();

        assert_eq!(store.get("cid-1").await.unwrap(), Bytes::from_static(b"report"));
        assert!(store.has("cid-1").await.unwrap());
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(matches!(store.get("cid-2").await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_overwrite() {
        let store = SqliteObjectStore::open_memory().unwrap();
        store.put("k", Bytes::from_static(b"v1")).await.unwrap();
        store.put("k", Bytes::from_static(b"v2")).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Bytes::from_static(b"v2"));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("objects.db");

        {
            let store = SqliteObjectStore::open(&path).unwrap();
            store.put("k", Bytes::from_static(b"durable")).await.unwrap();
        }

        let store = SqliteObjectStore::open(&path).unwrap();
        assert_eq!(store.get("k").await.unwrap(), Bytes::from_static(b"durable"));
    }
}
