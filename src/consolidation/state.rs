//! Persisted consolidation progress, one record per wallet.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::storage::{load_json, save_json, KeyValueStore, StorageResult};

const KEY_PREFIX: &str = "utxo_consolidation_state";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidationState {
    pub wallet_name: String,
    pub max_inputs_per_tx: usize,
    /// Transactions broadcast across all runs
    pub consolidation_count: u32,
    pub is_complete: bool,
    /// Unix seconds of the last write
    pub updated_at: i64,
}

impl ConsolidationState {
    pub fn new(wallet_name: &str, max_inputs_per_tx: usize) -> Self {
        Self {
            wallet_name: wallet_name.to_string(),
            max_inputs_per_tx,
            consolidation_count: 0,
            is_complete: false,
            updated_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn record_broadcast(&mut self) {
        self.consolidation_count += 1;
        self.touch();
    }

    pub fn mark_complete(&mut self) {
        self.is_complete = true;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().timestamp();
    }
}

/// Key-value backed state repository
#[derive(Clone)]
pub struct ConsolidationStore {
    store: Arc<dyn KeyValueStore>,
}

impl ConsolidationStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn key(wallet_name: &str) -> String {
        format!("{}/{}", KEY_PREFIX, wallet_name)
    }

    pub async fn load(&self, wallet_name: &str) -> StorageResult<Option<ConsolidationState>> {
        load_json(self.store.as_ref(), &Self::key(wallet_name)).await
    }

    pub async fn save(&self, state: &ConsolidationState) -> StorageResult<()> {
        save_json(self.store.as_ref(), &Self::key(&state.wallet_name), state).await
    }

    pub async fn clear(&self, wallet_name: &str) -> StorageResult<bool> {
        self.store.delete(&Self::key(wallet_name)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKvStore;

    #[tokio::test]
    async fn test_save_load_clear() {
        let kv = MemoryKvStore::new();
        let store = ConsolidationStore::new(Arc::new(kv.clone()));

        assert!(store.load("main").await.unwrap().is_none());

        let mut state = ConsolidationState::new("main", 900);
        state.record_broadcast();
        store.save(&state).await.unwrap();

        let loaded = store.load("main").await.unwrap().unwrap();
        assert_eq!(loaded.consolidation_count, 1);
        assert!(!loaded.is_complete);

        let raw = kv.get("utxo_consolidation_state/main").await.unwrap().unwrap();
        assert!(raw.contains("\"consolidationCount\":1"));
        assert!(raw.contains("\"maxInputsPerTx\":900"));

        assert!(store.clear("main").await.unwrap());
        assert!(store.load("main").await.unwrap().is_none());
    }
}
