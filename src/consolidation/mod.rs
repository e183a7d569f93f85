//! UTXO Consolidation
//!
//! Merges many small confirmed coins into few large ones so later bridge
//! transactions stay small. Runs only once the wallet holds at least
//! [`MIN_UTXOS_TO_CONSOLIDATE`] coins, and records a per-wallet progress
//! counter under `utxo_consolidation_state/<wallet>` that survives restarts.

pub mod consolidator;
pub mod state;

pub use consolidator::{
    estimate_fee, ConsolidationError, ConsolidatorConfig, UtxoConsolidator,
    DEFAULT_FEE_RATE, DEFAULT_MAX_INPUTS_PER_TX, MIN_UTXOS_TO_CONSOLIDATE,
};
pub use state::{ConsolidationState, ConsolidationStore};
