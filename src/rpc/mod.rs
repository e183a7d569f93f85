//! Wallet Node RPC
//!
//! Everything the engine reads or writes on the node goes through
//! [`WalletRpc`], so reconciliation, bridge construction and consolidation
//! can be exercised against mocks.

pub mod client;
pub mod traits;
pub mod types;

pub use client::JsonRpcClient;
pub use traits::{RpcError, RpcResult, WalletRpc};
pub use types::*;

/// Make sure `wallet_name` is loaded, creating a blank descriptor wallet if
/// the node has never seen it. Returns true when a new wallet was created.
pub async fn ensure_wallet_loaded(rpc: &dyn WalletRpc, wallet_name: &str) -> RpcResult<bool> {
    let loaded = rpc.list_wallets().await?;
    if loaded.iter().any(|w| w == wallet_name) {
        return Ok(false);
    }

    match rpc.load_wallet(wallet_name).await {
        Ok(()) => {
            tracing::info!(wallet = %wallet_name, "Wallet loaded");
            Ok(false)
        }
        Err(e) if e.is_already_loaded() => Ok(false),
        Err(load_err) => {
            tracing::info!(wallet = %wallet_name, "Wallet not loadable ({}), creating", load_err);
            match rpc.create_wallet(wallet_name).await {
                Ok(()) => Ok(true),
                Err(e) if e.is_already_loaded() => Ok(false),
                Err(e) => Err(e),
            }
        }
    }
}
