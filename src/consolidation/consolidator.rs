//! UTXO Consolidator
//!
//! Sweeps a fragmented wallet into fewer outputs, one batch per transaction,
//! largest coins first. Progress is persisted after every broadcast so an
//! interrupted run can be resumed with the same batch size.

use std::sync::Arc;
use std::time::Duration;

use bitcoin::Amount;
use thiserror::Error;

use super::state::{ConsolidationState, ConsolidationStore};
use crate::common::logging::{generate_correlation_id, log_consolidation_event};
use crate::rpc::{AddressType, ListUnspentQuery, RpcError, TxOutput, Utxo, WalletRpc};
use crate::storage::StorageError;

/// Below this many UTXOs a run does nothing
pub const MIN_UTXOS_TO_CONSOLIDATE: usize = 1000;

pub const DEFAULT_MAX_INPUTS_PER_TX: usize = 900;

/// Size estimate per input, per output and fixed overhead (bytes)
pub const INPUT_SIZE: u64 = 148;
pub const OUTPUT_SIZE: u64 = 34;
pub const TX_OVERHEAD: u64 = 10;

/// sat/byte
pub const DEFAULT_FEE_RATE: u64 = 1_000;

const MIN_CONFIRMATIONS: u32 = 1;
const MAX_CONFIRMATIONS: u32 = 9_999_999;

#[derive(Debug, Error)]
pub enum ConsolidationError {
    #[error("consolidation aborted: {0}")]
    Aborted(String),

    #[error("node request failed: {0}")]
    Remote(#[from] RpcError),

    #[error("state persistence failed: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone)]
pub struct ConsolidatorConfig {
    pub min_utxos: usize,
    /// sat/byte
    pub fee_rate: u64,
    /// Pause between broadcasts
    pub delay: Duration,
    /// Broadcast ceiling in BTC/kvB
    pub max_fee_rate: f64,
    pub change_address_type: AddressType,
    /// Extra broadcast attempts per batch after a transient node error
    pub max_retries: u32,
}

impl Default for ConsolidatorConfig {
    fn default() -> Self {
        Self {
            min_utxos: MIN_UTXOS_TO_CONSOLIDATE,
            fee_rate: DEFAULT_FEE_RATE,
            delay: Duration::from_secs(10),
            max_fee_rate: 0.1,
            change_address_type: AddressType::Bech32,
            max_retries: 2,
        }
    }
}

/// Estimated fee for a single-output sweep of `inputs` coins
pub fn estimate_fee(inputs: usize, fee_rate: u64) -> Amount {
    let size = inputs as u64 * INPUT_SIZE + OUTPUT_SIZE + TX_OVERHEAD;
    Amount::from_sat(size.saturating_mul(fee_rate))
}

pub struct UtxoConsolidator {
    rpc: Arc<dyn WalletRpc>,
    states: ConsolidationStore,
    wallet_name: String,
    config: ConsolidatorConfig,
}

impl UtxoConsolidator {
    pub fn new(
        rpc: Arc<dyn WalletRpc>,
        states: ConsolidationStore,
        wallet_name: impl Into<String>,
        config: ConsolidatorConfig,
    ) -> Self {
        Self {
            rpc,
            states,
            wallet_name: wallet_name.into(),
            config,
        }
    }

    /// Consolidate every confirmed UTXO, returning transactions broadcast by this run
    pub async fn consolidate_all(&self, max_inputs_per_tx: usize) -> Result<u32, ConsolidationError> {
        let max_inputs = max_inputs_per_tx.max(2);
        let correlation_id = generate_correlation_id();

        let query = ListUnspentQuery::confirmed(MIN_CONFIRMATIONS, MAX_CONFIRMATIONS);
        let mut unspent = self.rpc.list_unspent(&query).await?;

        if unspent.len() < self.config.min_utxos {
            tracing::info!(
                target: "bridgewallet::consolidation",
                wallet = %self.wallet_name,
                utxos = unspent.len(),
                threshold = self.config.min_utxos,
                "Not enough UTXOs to consolidate"
            );
            return Ok(0);
        }

        let mut state = match self.states.load(&self.wallet_name).await? {
            Some(previous) => ConsolidationState {
                max_inputs_per_tx: max_inputs,
                is_complete: false,
                ..previous
            },
            None => ConsolidationState::new(&self.wallet_name, max_inputs),
        };
        self.states.save(&state).await?;

        tracing::info!(
            target: "bridgewallet::consolidation",
            wallet = %self.wallet_name,
            utxos = unspent.len(),
            max_inputs,
            previous_count = state.consolidation_count,
            "Starting consolidation"
        );

        unspent.sort_by(|a, b| b.amount.cmp(&a.amount));

        let mut sent = 0u32;
        while unspent.len() >= 2 {
            let take = max_inputs.min(unspent.len());
            let batch: Vec<Utxo> = unspent.drain(..take).collect();

            match self.consolidate_batch(&batch).await {
                Ok(txid) => {
                    state.record_broadcast();
                    sent += 1;
                    self.states.save(&state).await?;

                    log_consolidation_event(
                        "consolidation_tx_sent",
                        &correlation_id,
                        &self.wallet_name,
                        state.consolidation_count,
                        txid.as_deref(),
                        None,
                    );

                    if unspent.len() >= 2 {
                        tokio::time::sleep(self.config.delay).await;
                    }
                }
                Err(e) => {
                    self.states.save(&state).await?;
                    log_consolidation_event(
                        "consolidation_failed",
                        &correlation_id,
                        &self.wallet_name,
                        state.consolidation_count,
                        None,
                        Some(&e.to_string()),
                    );
                    return Err(e);
                }
            }
        }

        state.mark_complete();
        self.states.save(&state).await?;

        log_consolidation_event(
            "consolidation_complete",
            &correlation_id,
            &self.wallet_name,
            state.consolidation_count,
            None,
            None,
        );

        Ok(sent)
    }

    /// Continue an unfinished run with its recorded batch size
    pub async fn resume(&self) -> Result<Option<u32>, ConsolidationError> {
        match self.states.load(&self.wallet_name).await? {
            Some(state) if !state.is_complete => {
                tracing::info!(
                    target: "bridgewallet::consolidation",
                    wallet = %self.wallet_name,
                    count = state.consolidation_count,
                    "Resuming consolidation"
                );
                self.consolidate_all(state.max_inputs_per_tx).await.map(Some)
            }
            _ => Ok(None),
        }
    }

    pub async fn status(&self) -> Result<Option<ConsolidationState>, ConsolidationError> {
        Ok(self.states.load(&self.wallet_name).await?)
    }

    pub async fn clear(&self) -> Result<bool, ConsolidationError> {
        Ok(self.states.clear(&self.wallet_name).await?)
    }

    /// Build and sign one batch, then broadcast it
    ///
    /// Returns the txid when the node reported it or the signed hex decodes.
    async fn consolidate_batch(
        &self,
        batch: &[Utxo],
    ) -> Result<Option<String>, ConsolidationError> {
        let total: u64 = batch.iter().map(|u| u.amount.to_sat()).sum();
        let fee = estimate_fee(batch.len(), self.config.fee_rate);

        if total <= fee.to_sat() {
            return Err(ConsolidationError::Aborted(format!(
                "fee {} exceeds batch value {}",
                fee,
                Amount::from_sat(total)
            )));
        }
        let output_value = Amount::from_sat(total - fee.to_sat());

        let address = self
            .rpc
            .get_raw_change_address(self.config.change_address_type)
            .await?;

        let inputs: Vec<_> = batch.iter().map(Utxo::outpoint).collect();
        let outputs = vec![TxOutput::payment(address, output_value)];

        let raw = self.rpc.create_raw_transaction(&inputs, &outputs).await?;
        let signed = self.rpc.sign_raw_transaction_with_wallet(&raw).await?;

        if !signed.complete {
            return Err(ConsolidationError::Aborted(
                "wallet could not fully sign the transaction".to_string(),
            ));
        }

        let txid = self.broadcast_with_retry(&signed.hex).await?;

        tracing::debug!(
            target: "bridgewallet::consolidation",
            inputs = batch.len(),
            fee_sats = fee.to_sat(),
            txid = ?txid,
            "Consolidation batch broadcast"
        );

        Ok(txid)
    }

    /// Send the same signed transaction until the node accepts it
    ///
    /// After a send whose outcome is unknown (transport failure), a rejection
    /// saying the transaction is already known means the earlier attempt went
    /// through.
    async fn broadcast_with_retry(
        &self,
        signed_hex: &str,
    ) -> Result<Option<String>, ConsolidationError> {
        let mut attempt = 0u32;
        let mut outcome_unknown = false;

        loop {
            match self
                .rpc
                .send_raw_transaction(signed_hex, self.config.max_fee_rate)
                .await
            {
                Ok(txid) => return Ok(Some(txid)),
                Err(e) if outcome_unknown && e.is_already_broadcast() => {
                    let txid = txid_of(signed_hex);
                    tracing::info!(
                        target: "bridgewallet::consolidation",
                        txid = ?txid,
                        "Earlier broadcast was accepted: {}",
                        e
                    );
                    return Ok(txid);
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    outcome_unknown |= matches!(e, RpcError::Transport(_));
                    tracing::warn!(
                        target: "bridgewallet::consolidation",
                        attempt,
                        "Transient node error, resending transaction: {}",
                        e
                    );
                    tokio::time::sleep(self.config.delay.saturating_mul(attempt)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn txid_of(signed_hex: &str) -> Option<String> {
    bitcoin::consensus::encode::deserialize_hex::<bitcoin::Transaction>(signed_hex)
        .ok()
        .map(|tx| tx.compute_txid().to_string())
}
