//! Structured Logging
//!
//! Provides structured logging with:
//! - JSON output for log aggregation
//! - Correlation IDs tying together the steps of one bridge or consolidation run
//! - Durations for long-running reconciliation
//!
//! # Usage
//!
//! ```rust,ignore
//! use bridgewallet::common::logging::{init_logging, LogLevel};
//!
//! init_logging(LogLevel::Info, true)?; // JSON mode for production
//!
//! tracing::info!(target: "bridgewallet::bridge", wallet_id = %id, "Building transaction");
//! ```

use std::str::FromStr;

use serde::Serialize;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Application log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(LoggingError::UnknownLevel(other.to_string())),
        }
    }
}

impl LogLevel {
    /// Directive for the `bridgewallet` target
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

// ============================================================================
// Structured Event Types
// ============================================================================

/// Event categories for structured logging
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Descriptor reconciliation against the node
    Reconcile,
    /// Bridge transaction construction
    Bridge,
    /// UTXO consolidation runs
    Consolidation,
}

/// Structured log event
#[derive(Debug, Serialize)]
pub struct LogEvent {
    /// Event timestamp (ISO 8601)
    pub timestamp: String,
    pub level: String,
    pub category: EventCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

/// Error details for error events
#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl LogEvent {
    pub fn new(level: LogLevel, category: EventCategory, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level: level.as_filter().to_uppercase(),
            category,
            message: message.into(),
            correlation_id: None,
            data: None,
            duration_ms: None,
            error: None,
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_error(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.error = Some(ErrorDetails {
            code: code.into(),
            message: message.into(),
        });
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "{{\"error\": \"failed to serialize log\", \"message\": \"{}\"}}",
                self.message
            )
        })
    }
}

// ============================================================================
// Domain Event Logging
// ============================================================================

fn emit(target: Target, event: LogEvent) {
    let json = event.to_json();
    let failed = event.error.is_some();

    // tracing targets must be literals
    match (target, failed) {
        (Target::Bridge, false) => tracing::info!(target: "bridgewallet::bridge", "{}", json),
        (Target::Bridge, true) => tracing::error!(target: "bridgewallet::bridge", "{}", json),
        (Target::Consolidation, false) => {
            tracing::info!(target: "bridgewallet::consolidation", "{}", json)
        }
        (Target::Consolidation, true) => {
            tracing::error!(target: "bridgewallet::consolidation", "{}", json)
        }
        (Target::Reconcile, false) => tracing::info!(target: "bridgewallet::reconcile", "{}", json),
        (Target::Reconcile, true) => tracing::error!(target: "bridgewallet::reconcile", "{}", json),
    }
}

#[derive(Clone, Copy)]
enum Target {
    Bridge,
    Consolidation,
    Reconcile,
}

fn level_for(error: Option<&str>) -> LogLevel {
    if error.is_some() {
        LogLevel::Error
    } else {
        LogLevel::Info
    }
}

/// Bridge build or broadcast outcome
pub fn log_bridge_event(
    event_type: &str,
    correlation_id: &str,
    wallet_id: &str,
    amount_sats: u64,
    error: Option<&str>,
) {
    let mut event = LogEvent::new(level_for(error), EventCategory::Bridge, event_type)
        .with_correlation_id(correlation_id)
        .with_data(serde_json::json!({
            "wallet_id": wallet_id,
            "amount_sats": amount_sats,
        }));

    if let Some(err) = error {
        event = event.with_error("BRIDGE_ERROR", err);
    }
    emit(Target::Bridge, event);
}

/// One consolidation step; `txid` is set for broadcasts
pub fn log_consolidation_event(
    event_type: &str,
    correlation_id: &str,
    wallet_name: &str,
    consolidation_count: u32,
    txid: Option<&str>,
    error: Option<&str>,
) {
    let mut event = LogEvent::new(level_for(error), EventCategory::Consolidation, event_type)
        .with_correlation_id(correlation_id)
        .with_data(serde_json::json!({
            "wallet": wallet_name,
            "consolidation_count": consolidation_count,
            "txid": txid,
        }));

    if let Some(err) = error {
        event = event.with_error("CONSOLIDATION_ERROR", err);
    }
    emit(Target::Consolidation, event);
}

pub fn log_reconcile_event(
    event_type: &str,
    imported: usize,
    deactivated: usize,
    retries: u32,
    duration_ms: u64,
    error: Option<&str>,
) {
    let mut event = LogEvent::new(level_for(error), EventCategory::Reconcile, event_type)
        .with_duration(duration_ms)
        .with_data(serde_json::json!({
            "imported": imported,
            "deactivated": deactivated,
            "retries": retries,
        }));

    if let Some(err) = error {
        event = event.with_error("RECONCILE_ERROR", err);
    }
    emit(Target::Reconcile, event);
}

// ============================================================================
// Initialization
// ============================================================================

/// Initialize the logging system
///
/// `RUST_LOG` overrides `level` when set.
pub fn init_logging(level: LogLevel, json_format: bool) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("bridgewallet={}", level.as_filter())));

    if json_format {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::CLOSE),
        );

        subscriber
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    } else {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_span_events(FmtSpan::CLOSE),
        );

        subscriber
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    }

    Ok(())
}

/// Initialize logging from EngineConfig, falling back to info on an unknown level
pub fn init_from_config(config: &super::config::EngineConfig) -> Result<(), LoggingError> {
    let level = config.log_level.parse().unwrap_or_default();
    init_logging(level, config.log_json)
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to initialize logging: {0}")]
    InitFailed(String),

    #[error("unknown log level '{0}'")]
    UnknownLevel(String),
}

/// Generate a unique correlation ID for one engine operation
pub fn generate_correlation_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event_serialization() {
        let event = LogEvent::new(LogLevel::Info, EventCategory::Bridge, "tx_built")
            .with_correlation_id("run-123")
            .with_data(serde_json::json!({"inputs": 3}))
            .with_duration(42);

        let json = event.to_json();
        assert!(json.contains("tx_built"));
        assert!(json.contains("run-123"));
        assert!(json.contains("\"bridge\""));
        assert!(json.contains("42"));
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!(" INFO ".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!(matches!(
            "loud".parse::<LogLevel>(),
            Err(LoggingError::UnknownLevel(_))
        ));
    }

    #[test]
    fn test_correlation_ids_are_unique() {
        let id1 = generate_correlation_id();
        let id2 = generate_correlation_id();

        assert_eq!(id1.len(), 32);
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_error_details_included() {
        let event = LogEvent::new(LogLevel::Error, EventCategory::Consolidation, "aborted")
            .with_error("CONSOLIDATION_ERROR", "signing incomplete");

        let json = event.to_json();
        assert!(json.contains("CONSOLIDATION_ERROR"));
        assert!(json.contains("signing incomplete"));
    }
}
