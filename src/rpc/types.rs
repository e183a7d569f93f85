//! Wallet node request and response shapes.

use bitcoin::Amount;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

// =============================================================================
// Descriptors
// =============================================================================

/// Entry returned by `listdescriptors`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedDescriptor {
    pub desc: String,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default)]
    pub active: bool,
    /// Only defined for active descriptors
    #[serde(default)]
    pub internal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<(u32, u32)>,
}

/// `getdescriptorinfo` result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorInfo {
    pub descriptor: String,
    pub checksum: String,
    #[serde(default)]
    pub isrange: bool,
    #[serde(default)]
    pub issolvable: bool,
    #[serde(default)]
    pub hasprivatekeys: bool,
}

/// One item of an `importdescriptors` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportRequest {
    pub desc: String,
    pub active: bool,
    pub internal: bool,
    /// Rescan start, unix seconds
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<(u32, u32)>,
}

impl ImportRequest {
    /// Same descriptor with identical activation, role and rescan point
    pub fn matches(&self, listed: &ListedDescriptor) -> bool {
        self.desc == listed.desc
            && self.active == listed.active
            && self.internal == listed.internal
            && self.timestamp == listed.timestamp
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

/// Per-item `importdescriptors` outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    pub success: bool,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

impl ImportResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            warnings: Vec::new(),
            error: None,
        }
    }

    pub fn failed(code: i64, message: &str) -> Self {
        Self {
            success: false,
            warnings: Vec::new(),
            error: Some(RpcErrorObject {
                code,
                message: message.to_string(),
            }),
        }
    }
}

// =============================================================================
// Coins
// =============================================================================

/// `listunspent` query options
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryOptions {
    #[serde(
        rename = "minimumAmount",
        with = "bitcoin::amount::serde::as_btc::opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub minimum_amount: Option<Amount>,
    #[serde(
        rename = "maximumAmount",
        with = "bitcoin::amount::serde::as_btc::opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub maximum_amount: Option<Amount>,
    #[serde(rename = "maximumCount", skip_serializing_if = "Option::is_none")]
    pub maximum_count: Option<u32>,
    #[serde(
        rename = "minimumSumAmount",
        with = "bitcoin::amount::serde::as_btc::opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub minimum_sum_amount: Option<Amount>,
}

/// Full `listunspent` parameter set
#[derive(Debug, Clone, PartialEq)]
pub struct ListUnspentQuery {
    pub min_confirmations: u32,
    pub max_confirmations: u32,
    pub addresses: Vec<String>,
    pub include_unsafe: bool,
    pub options: QueryOptions,
}

impl ListUnspentQuery {
    pub fn confirmed(min_confirmations: u32, max_confirmations: u32) -> Self {
        Self {
            min_confirmations,
            max_confirmations,
            addresses: Vec::new(),
            include_unsafe: false,
            options: QueryOptions::default(),
        }
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    /// Positional JSON-RPC params
    pub fn to_params(&self) -> serde_json::Value {
        serde_json::json!([
            self.min_confirmations,
            self.max_confirmations,
            self.addresses,
            self.include_unsafe,
            self.options,
        ])
    }
}

/// Spendable output from `listunspent`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utxo {
    pub txid: String,
    pub vout: u32,
    #[serde(with = "bitcoin::amount::serde::as_btc")]
    pub amount: Amount,
    #[serde(default)]
    pub confirmations: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, rename = "scriptPubKey", skip_serializing_if = "Option::is_none")]
    pub script_pub_key: Option<String>,
    #[serde(default)]
    pub spendable: bool,
}

impl Utxo {
    pub fn outpoint(&self) -> TxInput {
        TxInput {
            txid: self.txid.clone(),
            vout: self.vout,
        }
    }
}

// =============================================================================
// Transactions
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub txid: String,
    pub vout: u32,
}

/// `createrawtransaction` output entry
///
/// Serialized as a single-key object, either `{address: btc}` or
/// `{"data": hex}`. The node keeps the array order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutput {
    Payment { address: String, amount: Amount },
    Data(String),
}

impl TxOutput {
    pub fn payment(address: impl Into<String>, amount: Amount) -> Self {
        TxOutput::Payment {
            address: address.into(),
            amount,
        }
    }

    pub fn amount(&self) -> Amount {
        match self {
            TxOutput::Payment { amount, .. } => *amount,
            TxOutput::Data(_) => Amount::ZERO,
        }
    }
}

impl Serialize for TxOutput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            TxOutput::Payment { address, amount } => {
                map.serialize_entry(address, &amount.to_btc())?
            }
            TxOutput::Data(hex) => map.serialize_entry("data", hex)?,
        }
        map.end()
    }
}

/// `signrawtransactionwithwallet` result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub hex: String,
    pub complete: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressType {
    Legacy,
    P2shSegwit,
    Bech32,
    Bech32m,
}

// =============================================================================
// Node state
// =============================================================================

/// `scanning` field of `getwalletinfo`: `false` or `{duration, progress}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScanStatus {
    Scanning { duration: u64, progress: f64 },
    Idle(bool),
}

impl Default for ScanStatus {
    fn default() -> Self {
        ScanStatus::Idle(false)
    }
}

impl ScanStatus {
    pub fn is_scanning(&self) -> bool {
        matches!(self, ScanStatus::Scanning { .. })
    }

    /// Progress in [0, 1] while scanning
    pub fn progress(&self) -> Option<f64> {
        match self {
            ScanStatus::Scanning { progress, .. } => Some(*progress),
            ScanStatus::Idle(_) => None,
        }
    }

    /// Seconds since the scan started
    pub fn duration_secs(&self) -> Option<u64> {
        match self {
            ScanStatus::Scanning { duration, .. } => Some(*duration),
            ScanStatus::Idle(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletInfo {
    pub walletname: String,
    #[serde(default)]
    pub txcount: u64,
    #[serde(default)]
    pub scanning: ScanStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockchainInfo {
    #[serde(default)]
    pub chain: String,
    pub blocks: u64,
    pub headers: u64,
    #[serde(default)]
    pub verificationprogress: f64,
    #[serde(default)]
    pub initialblockdownload: bool,
}

/// Node still downloading or validating blocks
pub fn chain_is_syncing(blocks: u64, headers: u64, initial_block_download: bool) -> bool {
    initial_block_download || blocks < headers
}

impl BlockchainInfo {
    pub fn is_syncing(&self) -> bool {
        chain_is_syncing(self.blocks, self.headers, self.initialblockdownload)
    }

    pub fn is_caught_up(&self) -> bool {
        !self.is_syncing()
    }
}
