//! JSON-RPC Client for the Wallet Node
//!
//! Speaks JSON-RPC 1.0 over HTTP with basic auth. Wallet-scoped calls go to
//! `/wallet/<name>`, node-level calls (wallet loading, chain state) to `/`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::traits::{RpcError, RpcResult, WalletRpc};
use super::types::{
    AddressType, BlockchainInfo, DescriptorInfo, ImportRequest, ImportResult, ListUnspentQuery,
    ListedDescriptor, RpcErrorObject, SignedTransaction, TxInput, TxOutput, Utxo, WalletInfo,
};
use crate::common::config::RpcSettings;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct ListDescriptorsResponse {
    descriptors: Vec<ListedDescriptor>,
}

/// Wallet node HTTP client
#[derive(Debug, Clone)]
pub struct JsonRpcClient {
    client: Client,
    base_url: String,
    user: String,
    password: String,
    wallet: String,
}

impl JsonRpcClient {
    pub fn new(
        base_url: &str,
        user: &str,
        password: &str,
        wallet: &str,
        timeout: Duration,
    ) -> RpcResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user: user.to_string(),
            password: password.to_string(),
            wallet: wallet.to_string(),
        })
    }

    pub fn from_settings(settings: &RpcSettings) -> RpcResult<Self> {
        Self::new(
            &settings.url,
            &settings.user,
            &settings.password,
            &settings.wallet_name,
            Duration::from_secs(settings.timeout_secs),
        )
    }

    /// Same connection, different wallet
    pub fn for_wallet(&self, wallet: &str) -> Self {
        Self {
            wallet: wallet.to_string(),
            ..self.clone()
        }
    }

    pub fn wallet_name(&self) -> &str {
        &self.wallet
    }

    fn wallet_url(&self) -> String {
        format!("{}/wallet/{}", self.base_url, self.wallet)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> RpcResult<T> {
        self.call_at(&self.base_url, method, params).await
    }

    async fn wallet_call<T: DeserializeOwned>(&self, method: &str, params: Value) -> RpcResult<T> {
        self.call_at(&self.wallet_url(), method, params).await
    }

    async fn call_at<T: DeserializeOwned>(
        &self,
        url: &str,
        method: &str,
        params: Value,
    ) -> RpcResult<T> {
        let id = uuid::Uuid::new_v4().to_string();
        let body = json!({
            "jsonrpc": "1.0",
            "id": id,
            "method": method,
            "params": params,
        });

        tracing::debug!(method = %method, request_id = %id, "RPC request");

        let resp = self
            .client
            .post(url)
            .basic_auth(&self.user, Some(&self.password))
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        // The node reports RPC errors with a non-2xx status and a JSON body
        let parsed: RpcResponse = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(RpcError::Transport(format!("HTTP {}: {}", status, text)));
            }
            Err(e) => return Err(RpcError::Decode(format!("{}: {}", method, e))),
        };

        if let Some(error) = parsed.error {
            tracing::debug!(method = %method, code = error.code, "RPC error: {}", error.message);
            return Err(RpcError::Remote {
                code: error.code,
                message: error.message,
            });
        }

        serde_json::from_value(parsed.result)
            .map_err(|e| RpcError::Decode(format!("{}: {}", method, e)))
    }
}

#[async_trait]
impl WalletRpc for JsonRpcClient {
    async fn list_wallets(&self) -> RpcResult<Vec<String>> {
        self.call("listwallets", json!([])).await
    }

    async fn load_wallet(&self, name: &str) -> RpcResult<()> {
        let _: Value = self.call("loadwallet", json!([name])).await?;
        Ok(())
    }

    async fn create_wallet(&self, name: &str) -> RpcResult<()> {
        // name, disable_private_keys, blank, passphrase, avoid_reuse, descriptors
        let _: Value = self
            .call("createwallet", json!([name, false, true, "", false, true]))
            .await?;
        Ok(())
    }

    async fn list_descriptors(&self, private: bool) -> RpcResult<Vec<ListedDescriptor>> {
        let resp: ListDescriptorsResponse =
            self.wallet_call("listdescriptors", json!([private])).await?;
        Ok(resp.descriptors)
    }

    async fn get_descriptor_info(&self, descriptor: &str) -> RpcResult<DescriptorInfo> {
        self.call("getdescriptorinfo", json!([descriptor])).await
    }

    async fn import_descriptors(&self, requests: &[ImportRequest]) -> RpcResult<Vec<ImportResult>> {
        self.wallet_call("importdescriptors", json!([requests])).await
    }

    async fn list_unspent(&self, query: &ListUnspentQuery) -> RpcResult<Vec<Utxo>> {
        self.wallet_call("listunspent", query.to_params()).await
    }

    async fn get_raw_change_address(&self, address_type: AddressType) -> RpcResult<String> {
        self.wallet_call("getrawchangeaddress", json!([address_type]))
            .await
    }

    async fn create_raw_transaction(
        &self,
        inputs: &[TxInput],
        outputs: &[TxOutput],
    ) -> RpcResult<String> {
        self.call("createrawtransaction", json!([inputs, outputs]))
            .await
    }

    async fn sign_raw_transaction_with_wallet(&self, hex: &str) -> RpcResult<SignedTransaction> {
        self.wallet_call("signrawtransactionwithwallet", json!([hex]))
            .await
    }

    async fn send_raw_transaction(&self, hex: &str, max_fee_rate: f64) -> RpcResult<String> {
        self.call("sendrawtransaction", json!([hex, max_fee_rate]))
            .await
    }

    async fn get_wallet_info(&self) -> RpcResult<WalletInfo> {
        self.wallet_call("getwalletinfo", json!([])).await
    }

    async fn get_blockchain_info(&self) -> RpcResult<BlockchainInfo> {
        self.call("getblockchaininfo", json!([])).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_url() {
        let client = JsonRpcClient::new(
            "http://127.0.0.1:8332/",
            "user",
            "pass",
            "main",
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(client.wallet_url(), "http://127.0.0.1:8332/wallet/main");

        let other = client.for_wallet("cold");
        assert_eq!(other.wallet_name(), "cold");
        assert_eq!(other.wallet_url(), "http://127.0.0.1:8332/wallet/cold");
    }

    #[tokio::test]
    async fn test_unreachable_node_is_transport_error() {
        let client = JsonRpcClient::new(
            "http://127.0.0.1:1",
            "user",
            "pass",
            "main",
            Duration::from_millis(500),
        )
        .unwrap();

        let result = client.get_blockchain_info().await;
        assert!(matches!(result, Err(RpcError::Transport(_))));
    }
}
