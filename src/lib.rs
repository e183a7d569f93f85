//! bridgewallet - Deterministic Bridge Wallet Engine
//!
//! Derives every key, identity and output descriptor of a wallet from one
//! mnemonic, keeps a remote wallet node's descriptor set in sync with it,
//! and builds the transactions that move value across the bridge.
//!
//! ## Components
//!
//! 1. **Keys** - mnemonic codec, master/child derivation, xprv, Ethereum
//!    address, wallet id
//! 2. **Descriptors** - the four account descriptors, node reconciliation and
//!    background sync monitoring
//! 3. **Bridge** - UTXO selection and signed bridge transactions carrying the
//!    redemption payload
//! 4. **Consolidation** - resumable batch sweeping of fragmented UTXO sets
//!
//! The node is reached only through [`rpc::WalletRpc`]; persisted state only
//! through [`storage::KeyValueStore`].

pub mod bridge;
pub mod common;
pub mod consolidation;
pub mod descriptors;
pub mod keys;
pub mod rpc;
pub mod storage;
pub mod units;

// Re-exports: keys
pub use keys::{
    derive_wallet_keys, generate_wallet, DerivationPath, ExtendedPrivateKey, KeyError,
    MasterKeyPair, WalletIdentity, WalletKeys,
};

// Re-exports: descriptors
pub use descriptors::{
    derive_descriptors, Descriptor, DescriptorReconciler, ReconcileError, ReconcileReport,
    ReconcilerConfig, ScriptType, SyncMonitor, SyncObserver, SyncStatus,
};

// Re-exports: bridge
pub use bridge::{BridgeConfig, BridgeError, BridgeRequest, BridgeTransaction, BridgeTxBuilder};

// Re-exports: consolidation
pub use consolidation::{
    ConsolidationError, ConsolidationState, ConsolidationStore, ConsolidatorConfig,
    UtxoConsolidator,
};

// Re-exports: node and storage
pub use rpc::{JsonRpcClient, RpcError, WalletRpc};
pub use storage::{KeyValueStore, MemoryKvStore, SqliteKvStore, StorageError};

// Re-exports: infrastructure
pub use common::{EngineConfig, EngineError};
