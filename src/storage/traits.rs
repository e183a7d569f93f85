//! Storage Trait Definitions
//!
//! A small string key-value interface. Consolidation progress and the
//! wallet identity cache sit on top of it as JSON documents.
//! Implementations can use SQLite (production) or in-memory (testing).

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Key-value storage interface
///
/// Implementations:
/// - `SqliteKvStore` - Production storage with SQLite
/// - `MemoryKvStore` - In-memory storage for testing
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Insert or overwrite a value
    async fn put(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove a value, returning whether it existed
    async fn delete(&self, key: &str) -> StorageResult<bool>;
}

/// Read and deserialize a JSON document
pub async fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> StorageResult<Option<T>> {
    match store.get(key).await? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StorageError::InvalidData(format!("{}: {}", key, e))),
        None => Ok(None),
    }
}

/// Serialize and store a JSON document
pub async fn save_json<T: Serialize + Sync>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> StorageResult<()> {
    let raw =
        serde_json::to_string(value).map_err(|e| StorageError::InvalidData(e.to_string()))?;
    store.put(key, &raw).await
}
