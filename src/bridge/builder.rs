//! Bridge Transaction Builder
//!
//! Selects wallet UTXOs for a bridge transfer and has the node build and
//! sign the transaction. Nothing is written to the node before selection
//! succeeds.

use std::sync::Arc;

use bitcoin::Amount;
use serde::Serialize;
use thiserror::Error;

use super::payload::encode_payload;
use crate::common::logging::{generate_correlation_id, log_bridge_event};
use crate::rpc::{
    AddressType, ListUnspentQuery, QueryOptions, RpcError, TxInput, TxOutput, Utxo, WalletRpc,
};

/// Flat network fee per bridge transaction
pub const DEFAULT_FEE: Amount = Amount::from_sat(100_000);

/// Change at or below this is left to the fee
pub const DUST_THRESHOLD: Amount = Amount::from_sat(101_000);

/// Smallest UTXO considered for selection (0.01 BTC)
pub const MIN_UTXO_AMOUNT: Amount = Amount::from_sat(1_000_000);

pub const MIN_CONFIRMATIONS: u32 = 6;
pub const MAX_CONFIRMATIONS: u32 = 99_999_999;

/// Default broadcast ceiling in BTC/kvB
pub const DEFAULT_MAX_FEE_RATE: f64 = 0.1;

/// Bridge construction errors
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("no eligible UTXOs with at least {min_confirmations} confirmations")]
    NoEligibleUtxo { min_confirmations: u32 },

    #[error("insufficient funds: need {required}, have {available}")]
    InsufficientFunds { available: Amount, required: Amount },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("failed to read wallet state: {0}")]
    Remote(RpcError),

    #[error("node failed to construct transaction: {0}")]
    RemoteConstruction(RpcError),

    #[error("wallet could not fully sign the transaction")]
    SigningIncomplete,

    #[error("broadcast failed: {0}")]
    Broadcast(RpcError),
}

impl BridgeError {
    /// Short operator-facing hint
    pub fn remediation(&self) -> &'static str {
        match self {
            BridgeError::NoEligibleUtxo { .. } => {
                "Wait for incoming funds to reach the required confirmations."
            }
            BridgeError::InsufficientFunds { .. } => {
                "Lower the amount or fund the wallet; the flat fee is included in the requirement."
            }
            BridgeError::InvalidAmount(_) => "Use a positive amount.",
            BridgeError::Remote(_) | BridgeError::RemoteConstruction(_) => {
                "Check that the node is reachable and the wallet is loaded."
            }
            BridgeError::SigningIncomplete => {
                "Make sure the wallet descriptors include private keys."
            }
            BridgeError::Broadcast(_) => "Inspect the node's mempool rejection reason.",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub fee: Amount,
    pub dust_threshold: Amount,
    pub min_utxo_amount: Amount,
    pub min_confirmations: u32,
    pub change_address_type: AddressType,
    pub max_fee_rate: f64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            fee: DEFAULT_FEE,
            dust_threshold: DUST_THRESHOLD,
            min_utxo_amount: MIN_UTXO_AMOUNT,
            min_confirmations: MIN_CONFIRMATIONS,
            change_address_type: AddressType::Bech32,
            max_fee_rate: DEFAULT_MAX_FEE_RATE,
        }
    }
}

/// A transfer to bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeRequest {
    pub destination: String,
    pub amount: Amount,
    /// Address credited on the other side
    pub return_address: String,
}

/// Signed, not yet broadcast
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeTransaction {
    pub hex: String,
    pub inputs: Vec<TxInput>,
    #[serde(skip)]
    pub outputs: Vec<TxOutput>,
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub fee: Amount,
    #[serde(with = "bitcoin::amount::serde::as_sat::opt")]
    pub change: Option<Amount>,
    pub payload_hex: String,
}

/// Result of greedy selection
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub selected: Vec<Utxo>,
    pub total: Amount,
}

/// Largest-first accumulation until `target` is covered
///
/// On shortfall returns the sum of everything offered.
pub fn select_utxos(utxos: &[Utxo], target: Amount) -> Result<Selection, Amount> {
    let mut sorted: Vec<&Utxo> = utxos.iter().collect();
    sorted.sort_by(|a, b| b.amount.cmp(&a.amount));

    let mut selected = Vec::new();
    let mut total = 0u64;

    for utxo in sorted {
        if total >= target.to_sat() {
            break;
        }
        total = total.saturating_add(utxo.amount.to_sat());
        selected.push(utxo.clone());
    }

    if total >= target.to_sat() {
        Ok(Selection {
            selected,
            total: Amount::from_sat(total),
        })
    } else {
        Err(Amount::from_sat(total))
    }
}

pub struct BridgeTxBuilder {
    rpc: Arc<dyn WalletRpc>,
    wallet_id: String,
    config: BridgeConfig,
}

impl BridgeTxBuilder {
    pub fn new(rpc: Arc<dyn WalletRpc>, wallet_id: impl Into<String>, config: BridgeConfig) -> Self {
        Self {
            rpc,
            wallet_id: wallet_id.into(),
            config,
        }
    }

    pub fn wallet_id(&self) -> &str {
        &self.wallet_id
    }

    /// Select, build and sign a bridge transaction
    pub async fn build(&self, request: &BridgeRequest) -> Result<BridgeTransaction, BridgeError> {
        let correlation_id = generate_correlation_id();
        let result = self.build_inner(request).await;

        match &result {
            Ok(tx) => {
                tracing::debug!(
                    target: "bridgewallet::bridge",
                    inputs = tx.inputs.len(),
                    outputs = tx.outputs.len(),
                    "Bridge transaction ready"
                );
                log_bridge_event(
                    "bridge_tx_signed",
                    &correlation_id,
                    &self.wallet_id,
                    request.amount.to_sat(),
                    None,
                );
            }
            Err(e) => log_bridge_event(
                "bridge_tx_failed",
                &correlation_id,
                &self.wallet_id,
                request.amount.to_sat(),
                Some(&e.to_string()),
            ),
        }

        result
    }

    async fn build_inner(&self, request: &BridgeRequest) -> Result<BridgeTransaction, BridgeError> {
        if request.amount == Amount::ZERO {
            return Err(BridgeError::InvalidAmount("amount must be positive".to_string()));
        }

        let required = request
            .amount
            .checked_add(self.config.fee)
            .ok_or_else(|| BridgeError::InvalidAmount("amount overflows".to_string()))?;

        let query = ListUnspentQuery::confirmed(self.config.min_confirmations, MAX_CONFIRMATIONS)
            .with_options(QueryOptions {
                minimum_amount: Some(self.config.min_utxo_amount),
                minimum_sum_amount: Some(required),
                ..Default::default()
            });

        let utxos = self
            .rpc
            .list_unspent(&query)
            .await
            .map_err(BridgeError::Remote)?;

        if utxos.is_empty() {
            return Err(BridgeError::NoEligibleUtxo {
                min_confirmations: self.config.min_confirmations,
            });
        }

        let selection = select_utxos(&utxos, required).map_err(|available| {
            BridgeError::InsufficientFunds {
                available,
                required,
            }
        })?;

        let change_sats = selection.total.to_sat() - required.to_sat();
        let change = Amount::from_sat(change_sats);

        let mut outputs = vec![TxOutput::payment(request.destination.clone(), request.amount)];

        let change = if change > self.config.dust_threshold {
            let change_address = self
                .rpc
                .get_raw_change_address(self.config.change_address_type)
                .await
                .map_err(BridgeError::RemoteConstruction)?;
            outputs.push(TxOutput::payment(change_address, change));
            Some(change)
        } else {
            None
        };

        let payload_hex = encode_payload(&self.wallet_id, &request.return_address);
        outputs.push(TxOutput::Data(payload_hex.clone()));

        let inputs: Vec<TxInput> = selection.selected.iter().map(Utxo::outpoint).collect();

        let raw = self
            .rpc
            .create_raw_transaction(&inputs, &outputs)
            .await
            .map_err(BridgeError::RemoteConstruction)?;

        let signed = self
            .rpc
            .sign_raw_transaction_with_wallet(&raw)
            .await
            .map_err(BridgeError::RemoteConstruction)?;

        if !signed.complete {
            return Err(BridgeError::SigningIncomplete);
        }

        // Dust change is absorbed by the fee
        let fee = Amount::from_sat(
            selection.total.to_sat() - request.amount.to_sat() - change.map_or(0, |c| c.to_sat()),
        );

        Ok(BridgeTransaction {
            hex: signed.hex,
            inputs,
            outputs,
            fee,
            change,
            payload_hex,
        })
    }

    /// Submit a signed bridge transaction, returning the txid
    pub async fn broadcast(&self, tx: &BridgeTransaction) -> Result<String, BridgeError> {
        let txid = self
            .rpc
            .send_raw_transaction(&tx.hex, self.config.max_fee_rate)
            .await
            .map_err(BridgeError::Broadcast)?;

        tracing::info!(target: "bridgewallet::bridge", txid = %txid, "Bridge transaction broadcast");
        Ok(txid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::payload::decode_payload;
    use crate::rpc::traits::MockWalletRpc;
    use crate::rpc::SignedTransaction;

    fn btc(value: f64) -> Amount {
        Amount::from_btc(value).unwrap()
    }

    fn utxo(txid: &str, amount: Amount) -> Utxo {
        Utxo {
            txid: txid.to_string(),
            vout: 0,
            amount,
            confirmations: 10,
            address: None,
            script_pub_key: None,
            spendable: true,
        }
    }

    fn request(amount: Amount) -> BridgeRequest {
        BridgeRequest {
            destination: "bc1qdestination".to_string(),
            amount,
            return_address: "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".to_string(),
        }
    }

    fn expect_signing(rpc: &mut MockWalletRpc) {
        rpc.expect_create_raw_transaction()
            .returning(|_, _| Ok("rawhex".to_string()));
        rpc.expect_sign_raw_transaction_with_wallet()
            .returning(|_| {
                Ok(SignedTransaction {
                    hex: "signedhex".to_string(),
                    complete: true,
                    errors: vec![],
                })
            });
    }

    #[test]
    fn test_select_largest_first() {
        let utxos = vec![
            utxo("a", btc(1.0)),
            utxo("b", btc(5.0)),
            utxo("c", btc(3.0)),
        ];

        let selection = select_utxos(&utxos, btc(6.0)).unwrap();
        let ids: Vec<&str> = selection.selected.iter().map(|u| u.txid.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(selection.total, btc(8.0));

        assert_eq!(select_utxos(&utxos, btc(10.0)), Err(btc(9.0)));
    }

    #[tokio::test]
    async fn test_build_with_change() {
        let mut rpc = MockWalletRpc::new();
        rpc.expect_list_unspent()
            .withf(|q: &ListUnspentQuery| {
                q.min_confirmations == 6
                    && q.options.minimum_amount == Some(Amount::from_sat(1_000_000))
                    && q.options.minimum_sum_amount == Some(Amount::from_sat(600_100_000))
            })
            .returning(|_| {
                Ok(vec![
                    utxo("five", Amount::from_btc(5.0).unwrap()),
                    utxo("three", Amount::from_btc(3.0).unwrap()),
                    utxo("one", Amount::from_btc(1.0).unwrap()),
                ])
            });
        rpc.expect_get_raw_change_address()
            .withf(|t: &AddressType| *t == AddressType::Bech32)
            .times(1)
            .returning(|_| Ok("bc1qchange".to_string()));
        rpc.expect_create_raw_transaction()
            .withf(|inputs: &[TxInput], outputs: &[TxOutput]| {
                inputs.len() == 2 && inputs[0].txid == "five" && outputs.len() == 3
            })
            .returning(|_, _| Ok("rawhex".to_string()));
        rpc.expect_sign_raw_transaction_with_wallet()
            .returning(|_| {
                Ok(SignedTransaction {
                    hex: "signedhex".to_string(),
                    complete: true,
                    errors: vec![],
                })
            });

        let builder = BridgeTxBuilder::new(Arc::new(rpc), "Bwallet", BridgeConfig::default());
        let tx = builder.build(&request(btc(6.0))).await.unwrap();

        assert_eq!(tx.hex, "signedhex");
        assert_eq!(tx.outputs.len(), 3);
        assert_eq!(tx.outputs[0], TxOutput::payment("bc1qdestination", btc(6.0)));
        // 8 BTC in, 6 out, 0.001 fee
        assert_eq!(tx.change, Some(Amount::from_sat(199_900_000)));
        assert_eq!(
            tx.outputs[1],
            TxOutput::payment("bc1qchange", Amount::from_sat(199_900_000))
        );
        assert_eq!(tx.fee, DEFAULT_FEE);

        match &tx.outputs[2] {
            TxOutput::Data(hex) => {
                let (wallet_id, address) = decode_payload(hex).unwrap();
                assert_eq!(wallet_id, "Bwallet");
                assert_eq!(address, "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
            }
            other => panic!("expected data output last, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dust_change_is_dropped() {
        let mut rpc = MockWalletRpc::new();
        // 1.0011 BTC in, 1.0 BTC + 0.001 fee out: 10_000 sat change
        rpc.expect_list_unspent()
            .returning(|_| Ok(vec![utxo("a", Amount::from_sat(100_110_000))]));
        rpc.expect_get_raw_change_address().never();
        expect_signing(&mut rpc);

        let builder = BridgeTxBuilder::new(Arc::new(rpc), "Bwallet", BridgeConfig::default());
        let tx = builder.build(&request(btc(1.0))).await.unwrap();

        assert_eq!(tx.outputs.len(), 2);
        assert!(matches!(tx.outputs[1], TxOutput::Data(_)));
        assert_eq!(tx.change, None);
        assert_eq!(tx.fee, Amount::from_sat(110_000));
    }

    #[tokio::test]
    async fn test_change_at_threshold_is_dropped() {
        let mut rpc = MockWalletRpc::new();
        rpc.expect_list_unspent().returning(|_| {
            Ok(vec![utxo(
                "a",
                Amount::from_sat(100_000_000 + 100_000 + 101_000),
            )])
        });
        rpc.expect_get_raw_change_address().never();
        expect_signing(&mut rpc);

        let builder = BridgeTxBuilder::new(Arc::new(rpc), "Bwallet", BridgeConfig::default());
        let tx = builder.build(&request(btc(1.0))).await.unwrap();
        assert_eq!(tx.outputs.len(), 2);
    }

    #[tokio::test]
    async fn test_insufficient_funds_makes_no_writes() {
        let mut rpc = MockWalletRpc::new();
        rpc.expect_list_unspent()
            .returning(|_| Ok(vec![utxo("a", Amount::from_btc(0.5).unwrap())]));
        rpc.expect_get_raw_change_address().never();
        rpc.expect_create_raw_transaction().never();
        rpc.expect_sign_raw_transaction_with_wallet().never();
        rpc.expect_send_raw_transaction().never();

        let builder = BridgeTxBuilder::new(Arc::new(rpc), "Bwallet", BridgeConfig::default());
        let result = builder.build(&request(btc(1.0))).await;

        match result {
            Err(BridgeError::InsufficientFunds {
                available,
                required,
            }) => {
                assert_eq!(available, btc(0.5));
                assert_eq!(required, Amount::from_sat(100_100_000));
            }
            other => panic!("expected InsufficientFunds, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_eligible_utxo() {
        let mut rpc = MockWalletRpc::new();
        rpc.expect_list_unspent().returning(|_| Ok(vec![]));
        rpc.expect_create_raw_transaction().never();

        let builder = BridgeTxBuilder::new(Arc::new(rpc), "Bwallet", BridgeConfig::default());
        let err = builder.build(&request(btc(1.0))).await.unwrap_err();

        assert!(matches!(err, BridgeError::NoEligibleUtxo { min_confirmations: 6 }));
        assert!(!err.remediation().is_empty());
    }

    #[tokio::test]
    async fn test_incomplete_signature() {
        let mut rpc = MockWalletRpc::new();
        rpc.expect_list_unspent()
            .returning(|_| Ok(vec![utxo("a", Amount::from_btc(2.0).unwrap())]));
        rpc.expect_get_raw_change_address()
            .returning(|_| Ok("bc1qchange".to_string()));
        rpc.expect_create_raw_transaction()
            .returning(|_, _| Ok("rawhex".to_string()));
        rpc.expect_sign_raw_transaction_with_wallet()
            .returning(|_| {
                Ok(SignedTransaction {
                    hex: "partial".to_string(),
                    complete: false,
                    errors: vec![],
                })
            });

        let builder = BridgeTxBuilder::new(Arc::new(rpc), "Bwallet", BridgeConfig::default());
        let result = builder.build(&request(btc(1.0))).await;
        assert!(matches!(result, Err(BridgeError::SigningIncomplete)));
    }

    #[tokio::test]
    async fn test_construction_failure_is_reported() {
        let mut rpc = MockWalletRpc::new();
        rpc.expect_list_unspent()
            .returning(|_| Ok(vec![utxo("a", Amount::from_btc(2.0).unwrap())]));
        rpc.expect_get_raw_change_address()
            .returning(|_| Ok("bc1qchange".to_string()));
        rpc.expect_create_raw_transaction()
            .returning(|_, _| Err(RpcError::remote(-8, "Invalid parameter")));

        let builder = BridgeTxBuilder::new(Arc::new(rpc), "Bwallet", BridgeConfig::default());
        let result = builder.build(&request(btc(1.0))).await;
        assert!(matches!(result, Err(BridgeError::RemoteConstruction(_))));
    }

    #[tokio::test]
    async fn test_zero_amount_rejected() {
        let mut rpc = MockWalletRpc::new();
        rpc.expect_list_unspent().never();

        let builder = BridgeTxBuilder::new(Arc::new(rpc), "Bwallet", BridgeConfig::default());
        let result = builder.build(&request(Amount::ZERO)).await;
        assert!(matches!(result, Err(BridgeError::InvalidAmount(_))));
    }

    #[tokio::test]
    async fn test_broadcast_uses_fee_ceiling() {
        let mut rpc = MockWalletRpc::new();
        rpc.expect_send_raw_transaction()
            .withf(|hex: &str, rate: &f64| hex == "signedhex" && *rate == 0.1)
            .returning(|_, _| Ok("txid123".to_string()));

        let builder = BridgeTxBuilder::new(Arc::new(rpc), "Bwallet", BridgeConfig::default());
        let tx = BridgeTransaction {
            hex: "signedhex".to_string(),
            inputs: vec![],
            outputs: vec![],
            fee: DEFAULT_FEE,
            change: None,
            payload_hex: String::new(),
        };

        assert_eq!(builder.broadcast(&tx).await.unwrap(), "txid123");
    }
}
