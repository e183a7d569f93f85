//! Engine Error Types
//!
//! Top-level error the CLI and embedding services deal with. Each component
//! keeps its own error enum; they all convert into [`EngineError`].

use thiserror::Error;

use crate::bridge::BridgeError;
use crate::consolidation::ConsolidationError;
use crate::descriptors::ReconcileError;
use crate::keys::KeyError;
use crate::rpc::RpcError;
use crate::storage::{IdentityCacheError, StorageError};

/// Root error type for the wallet engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),

    #[error("logging error: {0}")]
    Logging(#[from] super::logging::LoggingError),

    /// Mnemonic, derivation and encoding failures
    #[error("key error: {0}")]
    Key(#[from] KeyError),

    #[error("node RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("consolidation error: {0}")]
    Consolidation(#[from] ConsolidationError),

    #[error("identity cache error: {0}")]
    IdentityCache(#[from] IdentityCacheError),

    /// Bad operator input
    #[error("validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Rpc(e) => e.is_retryable(),
            EngineError::Consolidation(ConsolidationError::Remote(e)) => e.is_retryable(),
            EngineError::Storage(StorageError::Connection(_)) => true,
            EngineError::Io(_) => true,
            _ => false,
        }
    }

    /// Stable code for logs and CLI exit reporting
    pub fn error_code(&self) -> &'static str {
        match self {
            EngineError::Config(_) => "CONFIG_ERROR",
            EngineError::Logging(_) => "LOGGING_ERROR",
            EngineError::Key(_) => "KEY_ERROR",
            EngineError::Rpc(_) => "RPC_ERROR",
            EngineError::Storage(_) => "STORAGE_ERROR",
            EngineError::Bridge(_) => "BRIDGE_ERROR",
            EngineError::Reconcile(_) => "RECONCILE_ERROR",
            EngineError::Consolidation(_) => "CONSOLIDATION_ERROR",
            EngineError::IdentityCache(_) => "IDENTITY_CACHE_ERROR",
            EngineError::Validation(_) => "VALIDATION_ERROR",
            EngineError::Io(_) => "IO_ERROR",
        }
    }
}

/// Result type alias using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;
