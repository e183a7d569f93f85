//! Bridge Transactions
//!
//! Builds the on-chain leg of a bridge transfer.
//!
//! # Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    BRIDGE TRANSACTION                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  1. List spendable coins                                        │
//! │     └── ≥ 6 confirmations, ≥ 0.01 BTC each                      │
//! │                                                                 │
//! │  2. Select largest first until amount + fee is covered          │
//! │     └── Shortfall: InsufficientFunds, nothing written           │
//! │                                                                 │
//! │  3. Outputs, in order                                           │
//! │     └── destination                                             │
//! │     └── change (only above the dust threshold)                  │
//! │     └── data: hex("wrp:<walletId>-<returnAddress>")             │
//! │                                                                 │
//! │  4. Node builds and signs                                       │
//! │     └── createrawtransaction / signrawtransactionwithwallet     │
//! │                                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod builder;
pub mod payload;

pub use builder::{
    select_utxos, BridgeConfig, BridgeError, BridgeRequest, BridgeTransaction, BridgeTxBuilder,
    Selection, DEFAULT_FEE, DUST_THRESHOLD,
};
pub use payload::{decode_payload, encode_payload, redemption_payload};
