//! Wallet identity cache.
//!
//! Derivation runs PBKDF2 and several HMAC levels, so the public part of the
//! identity is cached per wallet name. Private keys never reach the store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::traits::{load_json, save_json, KeyValueStore, StorageResult};
use crate::keys::{derive_wallet_keys, KeyError, WalletIdentity};

const KEY_PREFIX: &str = "wallet_identity";

/// Cached public identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedIdentity {
    pub wallet_id: String,
    pub eth_address: String,
}

impl From<&WalletIdentity> for CachedIdentity {
    fn from(identity: &WalletIdentity) -> Self {
        Self {
            wallet_id: identity.wallet_id.clone(),
            eth_address: identity.eth_address.clone(),
        }
    }
}

/// Errors from cache lookups that may fall back to derivation
#[derive(Debug, thiserror::Error)]
pub enum IdentityCacheError {
    #[error(transparent)]
    Storage(#[from] super::traits::StorageError),

    #[error(transparent)]
    Key(#[from] KeyError),
}

pub struct IdentityCache {
    store: Arc<dyn KeyValueStore>,
}

impl IdentityCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn key(wallet_name: &str) -> String {
        format!("{}/{}", KEY_PREFIX, wallet_name)
    }

    pub async fn get(&self, wallet_name: &str) -> StorageResult<Option<CachedIdentity>> {
        load_json(self.store.as_ref(), &Self::key(wallet_name)).await
    }

    pub async fn put(&self, wallet_name: &str, identity: &CachedIdentity) -> StorageResult<()> {
        save_json(self.store.as_ref(), &Self::key(wallet_name), identity).await
    }

    pub async fn clear(&self, wallet_name: &str) -> StorageResult<bool> {
        self.store.delete(&Self::key(wallet_name)).await
    }

    /// Cached identity, or derive it from the mnemonic and cache the result
    pub async fn resolve(
        &self,
        wallet_name: &str,
        mnemonic: &str,
    ) -> Result<CachedIdentity, IdentityCacheError> {
        if let Some(cached) = self.get(wallet_name).await? {
            tracing::debug!(wallet = %wallet_name, "Identity cache hit");
            return Ok(cached);
        }

        let keys = derive_wallet_keys(mnemonic)?;
        let identity = CachedIdentity::from(&keys.identity);
        self.put(wallet_name, &identity).await?;

        tracing::debug!(
            wallet = %wallet_name,
            wallet_id = %identity.wallet_id,
            "Identity derived and cached"
        );

        Ok(identity)
    }
}
