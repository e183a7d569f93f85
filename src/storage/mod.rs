//! Storage Layer Module
//!
//! Provides persistence for consolidation progress and cached identities.
//!
//! This module contains:
//! - Storage trait definitions for abstraction
//! - SQLite implementation for production
//! - In-memory implementation for testing

pub mod identity;
pub mod memory;
pub mod sqlite;
pub mod traits;

// Re-exports for convenience
pub use identity::{CachedIdentity, IdentityCache, IdentityCacheError};
pub use memory::MemoryKvStore;
pub use sqlite::SqliteKvStore;
pub use traits::{load_json, save_json, KeyValueStore, StorageError, StorageResult};
