//! SQLite Persistent Storage
//!
//! Durable key-value storage that survives restarts, so interrupted
//! consolidation runs can be resumed. Uses connection pooling via r2d2.

use async_trait::async_trait;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::path::Path;

use super::traits::{KeyValueStore, StorageError, StorageResult};

/// SQLite-backed key-value store with connection pooling
pub struct SqliteKvStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteKvStore {
    /// Create a new store with the given database path
    ///
    /// Creates the database file and runs migrations if needed.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StorageError> {
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Connection(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations()?;

        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations()?;

        Ok(store)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StorageError> {
        self.pool
            .get()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    fn run_migrations(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_sync(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.conn()?;

        conn.query_row(
            "SELECT value FROM kv_store WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| StorageError::Database(e.to_string()))
    }

    fn put_sync(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value, chrono::Utc::now().timestamp()],
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    fn delete_sync(&self, key: &str) -> Result<bool, StorageError> {
        let conn = self.conn()?;

        let affected = conn
            .execute("DELETE FROM kv_store WHERE key = ?1", params![key])
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(affected > 0)
    }
}

#[async_trait]
impl KeyValueStore for SqliteKvStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.get_sync(key)
    }

    async fn put(&self, key: &str, value: &str) -> StorageResult<()> {
        self.put_sync(key, value)
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        self.delete_sync(key)
    }
}
