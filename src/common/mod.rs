//! Common Infrastructure Module
//!
//! Environment configuration, structured logging and the engine-wide error
//! type shared by every component.

pub mod config;
pub mod error;
pub mod logging;

// Re-exports for convenience
pub use config::{ConfigError, EngineConfig, Network, RpcSettings};
pub use error::{EngineError, Result};
pub use logging::{
    generate_correlation_id, init_from_config, init_logging, log_bridge_event,
    log_consolidation_event, log_reconcile_event, ErrorDetails, EventCategory, LogEvent, LogLevel,
    LoggingError,
};
