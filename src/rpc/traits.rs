//! Wallet node interface.

use async_trait::async_trait;
use thiserror::Error;

use super::types::{
    AddressType, BlockchainInfo, DescriptorInfo, ImportRequest, ImportResult, ListUnspentQuery,
    ListedDescriptor, SignedTransaction, TxInput, TxOutput, Utxo, WalletInfo,
};

/// Remote request failures
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("remote error {code}: {message}")]
    Remote { code: i64, message: String },

    #[error("decode error: {0}")]
    Decode(String),
}

/// Node error code for "wallet already loaded"
pub const RPC_WALLET_ALREADY_LOADED: i64 = -35;

/// Node error code for a broadcast whose transaction is already confirmed
pub const RPC_VERIFY_ALREADY_IN_CHAIN: i64 = -27;

const ALREADY_BROADCAST_REASONS: &[&str] = &[
    "txn-already-in-mempool",
    "txn-already-known",
    "already in mempool",
    "txn-mempool-conflict",
    "already in block chain",
];

impl RpcError {
    pub fn remote(code: i64, message: impl Into<String>) -> Self {
        RpcError::Remote {
            code,
            message: message.into(),
        }
    }

    fn message_contains(&self, needle: &str) -> bool {
        match self {
            RpcError::Remote { message, .. } => message.to_lowercase().contains(needle),
            _ => false,
        }
    }

    /// Loading a wallet that is already loaded is benign
    pub fn is_already_loaded(&self) -> bool {
        matches!(self, RpcError::Remote { code, .. } if *code == RPC_WALLET_ALREADY_LOADED)
            || self.message_contains("already loaded")
    }

    /// The wallet is busy rescanning and cannot accept imports yet
    pub fn is_already_rescanning(&self) -> bool {
        self.message_contains("rescanning")
    }

    /// A broadcast was refused because the node already holds this transaction
    /// or one spending the same inputs
    pub fn is_already_broadcast(&self) -> bool {
        matches!(self, RpcError::Remote { code, .. } if *code == RPC_VERIFY_ALREADY_IN_CHAIN)
            || ALREADY_BROADCAST_REASONS
                .iter()
                .any(|reason| self.message_contains(reason))
    }

    /// Whether retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, RpcError::Transport(_)) || self.is_already_rescanning()
    }
}

/// Result type for wallet node calls
pub type RpcResult<T> = Result<T, RpcError>;

/// Operations the engine needs from a descriptor wallet node
///
/// Implementations:
/// - `JsonRpcClient` - HTTP JSON-RPC against a running node
/// - `MockWalletRpc` - generated for unit tests
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WalletRpc: Send + Sync {
    /// Wallets currently loaded on the node
    async fn list_wallets(&self) -> RpcResult<Vec<String>>;

    async fn load_wallet(&self, name: &str) -> RpcResult<()>;

    /// Create a blank descriptor wallet with private keys enabled
    async fn create_wallet(&self, name: &str) -> RpcResult<()>;

    async fn list_descriptors(&self, private: bool) -> RpcResult<Vec<ListedDescriptor>>;

    async fn get_descriptor_info(&self, descriptor: &str) -> RpcResult<DescriptorInfo>;

    async fn import_descriptors(&self, requests: &[ImportRequest]) -> RpcResult<Vec<ImportResult>>;

    async fn list_unspent(&self, query: &ListUnspentQuery) -> RpcResult<Vec<Utxo>>;

    async fn get_raw_change_address(&self, address_type: AddressType) -> RpcResult<String>;

    async fn create_raw_transaction(
        &self,
        inputs: &[TxInput],
        outputs: &[TxOutput],
    ) -> RpcResult<String>;

    async fn sign_raw_transaction_with_wallet(&self, hex: &str) -> RpcResult<SignedTransaction>;

    /// Broadcast, rejecting fee rates above `max_fee_rate` BTC/kvB
    async fn send_raw_transaction(&self, hex: &str, max_fee_rate: f64) -> RpcResult<String>;

    async fn get_wallet_info(&self) -> RpcResult<WalletInfo>;

    async fn get_blockchain_info(&self) -> RpcResult<BlockchainInfo>;
}
