//! Environment-based Configuration
//!
//! All settings come from environment variables (a `.env` file is honoured
//! by the binary). Secrets such as the mnemonic and RPC password are never
//! defaulted outside regtest.
//!
//! # Environment Variables
//!
//! ## Node
//! - `BRIDGEWALLET_NETWORK` - "mainnet", "testnet" or "regtest" (default: "regtest")
//! - `BRIDGEWALLET_RPC_URL` - Node JSON-RPC endpoint
//! - `BRIDGEWALLET_RPC_USER` / `BRIDGEWALLET_RPC_PASSWORD` - Basic auth
//! - `BRIDGEWALLET_WALLET_NAME` - Wallet on the node (default: "bridge")
//! - `BRIDGEWALLET_RPC_TIMEOUT_SECS` - HTTP timeout (default: 30)
//!
//! ## Keys
//! - `BRIDGEWALLET_MNEMONIC` - Wallet mnemonic
//!
//! ## Engine
//! - `BRIDGEWALLET_DB_PATH` - SQLite file for persisted state
//! - `BRIDGEWALLET_RECONCILE_MAX_RETRIES` (default: 3)
//! - `BRIDGEWALLET_RECONCILE_BACKOFF_MS` (default: 2000)
//! - `BRIDGEWALLET_SCAN_POLL_MS` (default: 5000)
//! - `BRIDGEWALLET_BRIDGE_FEE_SATS` (default: 100000)
//! - `BRIDGEWALLET_CONSOLIDATION_MAX_INPUTS` (default: 900)
//! - `BRIDGEWALLET_CONSOLIDATION_FEE_RATE` - sat/byte (default: 1000)
//! - `BRIDGEWALLET_CONSOLIDATION_DELAY_SECS` (default: 10)
//! - `BRIDGEWALLET_SYNC_INTERVAL_SECS` (default: 10)
//!
//! ## Logging
//! - `BRIDGEWALLET_LOG_LEVEL` - trace, debug, info, warn, error (default: info)
//! - `BRIDGEWALLET_LOG_JSON` - "1" for JSON log lines

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Bitcoin network the node runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" | "bitcoin" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            "regtest" | "local" => Ok(Network::Regtest),
            _ => Err(ConfigError::InvalidValue(
                "BRIDGEWALLET_NETWORK".to_string(),
                format!("unknown network: {}", s),
            )),
        }
    }
}

impl Network {
    /// Default node RPC endpoint for this network
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "http://127.0.0.1:8332",
            Network::Testnet => "http://127.0.0.1:18332",
            Network::Regtest => "http://127.0.0.1:18443",
        }
    }
}

/// Node connection settings
#[derive(Clone)]
pub struct RpcSettings {
    pub url: String,
    pub user: String,
    pub password: String,
    pub wallet_name: String,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for RpcSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcSettings")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("wallet_name", &self.wallet_name)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

/// Main configuration struct
#[derive(Clone)]
pub struct EngineConfig {
    pub network: Network,

    pub rpc: RpcSettings,

    /// Wallet mnemonic, if provided through the environment
    pub mnemonic: Option<String>,

    /// SQLite path for persisted state; in-memory when unset
    pub db_path: Option<String>,

    pub reconcile_max_retries: u32,
    pub reconcile_backoff: Duration,
    pub scan_poll_interval: Duration,

    pub bridge_fee_sats: u64,

    pub consolidation_max_inputs: usize,
    /// sat/byte
    pub consolidation_fee_rate: u64,
    pub consolidation_delay: Duration,

    pub sync_interval: Duration,

    pub log_level: String,
    pub log_json: bool,
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let network: Network = lookup("BRIDGEWALLET_NETWORK")
            .unwrap_or_else(|| "regtest".to_string())
            .parse()?;

        let url = lookup("BRIDGEWALLET_RPC_URL")
            .unwrap_or_else(|| network.default_rpc_url().to_string());

        let rpc = RpcSettings {
            url,
            user: required_or_regtest_default(&lookup, "BRIDGEWALLET_RPC_USER", "user", network)?,
            password: required_or_regtest_default(
                &lookup,
                "BRIDGEWALLET_RPC_PASSWORD",
                "pass",
                network,
            )?,
            wallet_name: lookup("BRIDGEWALLET_WALLET_NAME").unwrap_or_else(|| "bridge".to_string()),
            timeout_secs: parse_or(&lookup, "BRIDGEWALLET_RPC_TIMEOUT_SECS", 30)?,
        };

        Ok(Self {
            network,
            rpc,
            mnemonic: lookup("BRIDGEWALLET_MNEMONIC").filter(|m| !m.trim().is_empty()),
            db_path: lookup("BRIDGEWALLET_DB_PATH"),
            reconcile_max_retries: parse_or(&lookup, "BRIDGEWALLET_RECONCILE_MAX_RETRIES", 3)?,
            reconcile_backoff: Duration::from_millis(parse_or(
                &lookup,
                "BRIDGEWALLET_RECONCILE_BACKOFF_MS",
                2_000,
            )?),
            scan_poll_interval: Duration::from_millis(parse_or(
                &lookup,
                "BRIDGEWALLET_SCAN_POLL_MS",
                5_000,
            )?),
            bridge_fee_sats: parse_or(&lookup, "BRIDGEWALLET_BRIDGE_FEE_SATS", 100_000)?,
            consolidation_max_inputs: parse_or(
                &lookup,
                "BRIDGEWALLET_CONSOLIDATION_MAX_INPUTS",
                900,
            )?,
            consolidation_fee_rate: parse_or(&lookup, "BRIDGEWALLET_CONSOLIDATION_FEE_RATE", 1_000)?,
            consolidation_delay: Duration::from_secs(parse_or(
                &lookup,
                "BRIDGEWALLET_CONSOLIDATION_DELAY_SECS",
                10,
            )?),
            sync_interval: Duration::from_secs(parse_or(
                &lookup,
                "BRIDGEWALLET_SYNC_INTERVAL_SECS",
                10,
            )?),
            log_level: lookup("BRIDGEWALLET_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_json: lookup("BRIDGEWALLET_LOG_JSON")
                .map(|v| v == "1")
                .unwrap_or(false),
        })
    }

    /// The mnemonic, or an error naming the variable to set
    pub fn require_mnemonic(&self) -> Result<&str, ConfigError> {
        self.mnemonic
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("BRIDGEWALLET_MNEMONIC".to_string()))
    }

    /// Print configuration summary (hiding sensitive values)
    pub fn print_summary(&self) {
        println!("=== Bridge Wallet Configuration ===");
        println!("Network: {:?}", self.network);
        println!("RPC URL: {}", self.rpc.url);
        println!("Wallet: {}", self.rpc.wallet_name);
        println!(
            "Mnemonic: {}",
            if self.mnemonic.is_some() { "set" } else { "not set" }
        );
        println!(
            "State DB: {}",
            self.db_path.as_deref().unwrap_or("(in-memory)")
        );
        println!("Bridge Fee: {} sats", self.bridge_fee_sats);
        println!(
            "Consolidation: {} inputs/tx, {} sat/byte",
            self.consolidation_max_inputs, self.consolidation_fee_rate
        );
        println!("Log Level: {}", self.log_level);
        println!("===================================");
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("network", &self.network)
            .field("rpc", &self.rpc)
            .field("db_path", &self.db_path)
            .field("log_level", &self.log_level)
            .finish_non_exhaustive()
    }
}

/// Get required variable, or use default on regtest only
fn required_or_regtest_default<F>(
    lookup: &F,
    var_name: &str,
    regtest_default: &str,
    network: Network,
) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var_name) {
        Some(value) => Ok(value),
        None if network == Network::Regtest => Ok(regtest_default.to_string()),
        None => Err(ConfigError::MissingEnvVar(var_name.to_string())),
    }
}

fn parse_or<F, T>(lookup: &F, var_name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var_name) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            ConfigError::InvalidValue(var_name.to_string(), format!("cannot parse '{}'", raw))
        }),
        None => Ok(default),
    }
}
