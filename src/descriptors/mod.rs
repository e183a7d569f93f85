//! Descriptor Management
//!
//! - `synthesizer` - builds the four account descriptors from the master key
//! - `reconciler` - imports them into the node, waiting out rescans
//! - `monitor` - reports chain and rescan progress in the background

pub mod monitor;
pub mod reconciler;
pub mod synthesizer;

pub use monitor::{SyncMonitor, SyncObserver, SyncStatus};
pub use reconciler::{
    plan_import, DescriptorReconciler, ImportPlan, NoopObserver, ReconcileError,
    ReconcileObserver, ReconcileReport, ReconcileState, ReconcilerConfig, ScanProgress,
};
pub use synthesizer::{build_descriptor, derive_descriptors, Descriptor, ScriptType};
