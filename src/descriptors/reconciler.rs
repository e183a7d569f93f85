//! Descriptor Reconciler
//!
//! Brings the node's descriptor set in line with the synthesized one:
//!
//! ```text
//!            ┌──────────────────────────────────────────────┐
//!            ▼                                              │
//! Idle ─► CheckRemoteState ──scan / IBD──► WaitingForScan ──┘
//!            │
//!            ▼
//!        Importing ──ok──► Success
//!            │
//!            └──error──► RetryBackoff ──► CheckRemoteState
//!                             │
//!                             └──retries exhausted──► Failed
//! ```
//!
//! Waiting for a wallet rescan or chain sync never consumes a retry.
//! Within an import, stale active descriptors are deactivated before new
//! ones are imported.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

use super::synthesizer::{derive_descriptors, Descriptor};
use crate::common::logging::log_reconcile_event;
use crate::keys::{KeyError, MasterKeyPair};
use crate::rpc::{
    BlockchainInfo, ImportRequest, ImportResult, ListedDescriptor, RpcError, WalletInfo, WalletRpc,
};

/// Reconciler states, published to the observer on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileState {
    Idle,
    CheckRemoteState,
    WaitingForScan,
    Importing,
    RetryBackoff,
    Success,
    Failed,
}

impl ReconcileState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReconcileState::Success | ReconcileState::Failed)
    }
}

/// Progress snapshot while blocked on the node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanProgress {
    /// Wallet rescan progress when rescanning, chain verification otherwise
    pub progress: f64,
    pub elapsed: Duration,
    pub wallet_scanning: bool,
    pub blocks: u64,
    pub headers: u64,
}

/// Receives state transitions and progress updates
pub trait ReconcileObserver: Send + Sync {
    fn on_state(&self, _state: ReconcileState) {}

    fn on_progress(&self, _progress: &ScanProgress) {}
}

/// Observer that ignores everything
pub struct NoopObserver;

impl ReconcileObserver for NoopObserver {}

/// Reconciler errors
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("descriptor reconciliation failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: RpcError },

    #[error("descriptor derivation failed: {0}")]
    Derivation(#[from] KeyError),
}

/// Summary of a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub imported: usize,
    pub deactivated: usize,
    /// Failed attempts before success
    pub retries: u32,
    /// Times the run waited on a scan or chain sync
    pub scan_polls: u32,
}

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Failed attempts tolerated before giving up
    pub max_retries: u32,
    /// First backoff delay, doubled after every further failure
    pub retry_backoff: Duration,
    /// Delay between state checks while the node is busy
    pub poll_interval: Duration,
    /// Rescan start for new imports, unix seconds
    pub timestamp: u64,
    /// Last index of the derivation range for ranged descriptors
    pub range_end: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff: Duration::from_secs(2),
            poll_interval: Duration::from_secs(5),
            timestamp: 0,
            range_end: 999,
        }
    }
}

/// Import work computed from the node's current descriptors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportPlan {
    /// Active descriptors that are no longer wanted, with `active: false`
    pub deactivations: Vec<ImportRequest>,
    /// Candidates without an exact match on the node
    pub imports: Vec<ImportRequest>,
}

impl ImportPlan {
    pub fn is_empty(&self) -> bool {
        self.deactivations.is_empty() && self.imports.is_empty()
    }
}

/// Diff the node's descriptors against the candidates
pub fn plan_import(existing: &[ListedDescriptor], candidates: &[ImportRequest]) -> ImportPlan {
    let wanted: HashSet<&str> = candidates.iter().map(|c| c.desc.as_str()).collect();

    let deactivations = existing
        .iter()
        .filter(|e| e.active && !wanted.contains(e.desc.as_str()))
        .map(|e| ImportRequest {
            desc: e.desc.clone(),
            active: false,
            internal: e.internal,
            timestamp: e.timestamp,
            range: e.range,
        })
        .collect();

    let imports = candidates
        .iter()
        .filter(|c| !existing.iter().any(|e| c.matches(e)))
        .cloned()
        .collect();

    ImportPlan {
        deactivations,
        imports,
    }
}

enum Attempt {
    Busy(ScanProgress),
    Done { imported: usize, deactivated: usize },
}

pub struct DescriptorReconciler {
    rpc: Arc<dyn WalletRpc>,
    config: ReconcilerConfig,
    observer: Arc<dyn ReconcileObserver>,
}

impl DescriptorReconciler {
    pub fn new(rpc: Arc<dyn WalletRpc>, config: ReconcilerConfig) -> Self {
        Self {
            rpc,
            config,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ReconcileObserver>) -> Self {
        self.observer = observer;
        self
    }

    fn transition(&self, state: ReconcileState) {
        tracing::debug!(target: "bridgewallet::reconcile", state = ?state, "Reconciler state");
        self.observer.on_state(state);
    }

    /// Run until the node matches `desired` or retries are exhausted
    pub async fn reconcile(&self, desired: &[Descriptor]) -> Result<ReconcileReport, ReconcileError> {
        let started = Instant::now();
        let mut report = ReconcileReport::default();
        let mut waiting_since: Option<Instant> = None;

        self.transition(ReconcileState::Idle);

        loop {
            self.transition(ReconcileState::CheckRemoteState);

            let failure = match self.attempt(desired, &mut waiting_since).await {
                Ok(Attempt::Done {
                    imported,
                    deactivated,
                }) => {
                    report.imported = imported;
                    report.deactivated = deactivated;
                    self.transition(ReconcileState::Success);
                    log_reconcile_event(
                        "reconcile_complete",
                        imported,
                        deactivated,
                        report.retries,
                        started.elapsed().as_millis() as u64,
                        None,
                    );
                    return Ok(report);
                }
                Ok(Attempt::Busy(progress)) => {
                    self.wait_for_scan(&progress, &mut report).await;
                    continue;
                }
                Err(e) if e.is_already_rescanning() => {
                    let since = *waiting_since.get_or_insert_with(Instant::now);
                    let progress = ScanProgress {
                        progress: 0.0,
                        elapsed: since.elapsed(),
                        wallet_scanning: true,
                        blocks: 0,
                        headers: 0,
                    };
                    self.wait_for_scan(&progress, &mut report).await;
                    continue;
                }
                Err(e) => e,
            };

            report.retries += 1;
            tracing::warn!(
                target: "bridgewallet::reconcile",
                attempt = report.retries,
                max_retries = self.config.max_retries,
                "Reconcile attempt failed: {}",
                failure
            );

            if report.retries > self.config.max_retries {
                self.transition(ReconcileState::Failed);
                log_reconcile_event(
                    "reconcile_failed",
                    0,
                    0,
                    report.retries,
                    started.elapsed().as_millis() as u64,
                    Some(&failure.to_string()),
                );
                return Err(ReconcileError::RetriesExhausted {
                    attempts: report.retries,
                    last_error: failure,
                });
            }

            self.transition(ReconcileState::RetryBackoff);
            tokio::time::sleep(self.backoff_delay(report.retries)).await;
        }
    }

    /// Synthesize the four account descriptors for `master` and reconcile them
    pub async fn reconcile_master(
        &self,
        master: &MasterKeyPair,
    ) -> Result<ReconcileReport, ReconcileError> {
        let desired = derive_descriptors(master)?;
        self.reconcile(&desired).await
    }

    /// Delay after the `retry`-th failure (1-based)
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.config.retry_backoff.saturating_mul(1u32 << exponent)
    }

    async fn wait_for_scan(&self, progress: &ScanProgress, report: &mut ReconcileReport) {
        report.scan_polls += 1;
        self.transition(ReconcileState::WaitingForScan);
        self.observer.on_progress(progress);

        tracing::info!(
            target: "bridgewallet::reconcile",
            progress = progress.progress,
            elapsed_secs = progress.elapsed.as_secs(),
            "Node busy, waiting before import"
        );

        tokio::time::sleep(self.config.poll_interval).await;
    }

    async fn attempt(
        &self,
        desired: &[Descriptor],
        waiting_since: &mut Option<Instant>,
    ) -> Result<Attempt, RpcError> {
        let existing = self.rpc.list_descriptors(true).await?;
        let wallet = self.rpc.get_wallet_info().await?;
        let chain = self.rpc.get_blockchain_info().await?;

        if wallet.scanning.is_scanning() || chain.is_syncing() {
            let since = *waiting_since.get_or_insert_with(Instant::now);
            return Ok(Attempt::Busy(scan_progress(&wallet, &chain, since)));
        }
        *waiting_since = None;

        self.transition(ReconcileState::Importing);

        let candidates = self.build_candidates(desired).await?;
        let plan = plan_import(&existing, &candidates);

        if plan.is_empty() {
            tracing::info!(target: "bridgewallet::reconcile", "Descriptors already up to date");
        }

        if !plan.deactivations.is_empty() {
            let results = self.rpc.import_descriptors(&plan.deactivations).await?;
            check_results(&results)?;
            tracing::info!(
                target: "bridgewallet::reconcile",
                count = plan.deactivations.len(),
                "Deactivated stale descriptors"
            );
        }

        if !plan.imports.is_empty() {
            let results = self.rpc.import_descriptors(&plan.imports).await?;
            check_results(&results)?;
            tracing::info!(
                target: "bridgewallet::reconcile",
                count = plan.imports.len(),
                "Imported descriptors"
            );
        }

        Ok(Attempt::Done {
            imported: plan.imports.len(),
            deactivated: plan.deactivations.len(),
        })
    }

    /// Checksummed import candidates, receive then change for each account
    async fn build_candidates(&self, desired: &[Descriptor]) -> Result<Vec<ImportRequest>, RpcError> {
        let mut candidates = Vec::with_capacity(desired.len() * 2);

        for descriptor in desired {
            for (expression, internal) in descriptor.branches() {
                let info = self.rpc.get_descriptor_info(expression).await?;
                let ranged = info.isrange || expression.contains('*');

                candidates.push(ImportRequest {
                    desc: format!("{}#{}", expression, info.checksum),
                    active: descriptor.is_active,
                    internal,
                    timestamp: self.config.timestamp,
                    range: ranged.then_some((0, self.config.range_end)),
                });
            }
        }

        Ok(candidates)
    }
}

fn scan_progress(wallet: &WalletInfo, chain: &BlockchainInfo, since: Instant) -> ScanProgress {
    let elapsed = wallet
        .scanning
        .duration_secs()
        .map(Duration::from_secs)
        .unwrap_or_else(|| since.elapsed());

    ScanProgress {
        progress: wallet
            .scanning
            .progress()
            .unwrap_or(chain.verificationprogress),
        elapsed,
        wallet_scanning: wallet.scanning.is_scanning(),
        blocks: chain.blocks,
        headers: chain.headers,
    }
}

/// First failed item becomes the attempt's error
fn check_results(results: &[ImportResult]) -> Result<(), RpcError> {
    match results.iter().find(|r| !r.success) {
        None => Ok(()),
        Some(failed) => Err(match &failed.error {
            Some(err) => RpcError::remote(err.code, err.message.clone()),
            None => RpcError::remote(0, "descriptor import failed"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::traits::MockWalletRpc;
    use crate::rpc::{DescriptorInfo, ScanStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn fast_config() -> ReconcilerConfig {
        ReconcilerConfig {
            max_retries: 3,
            retry_backoff: Duration::from_millis(1),
            poll_interval: Duration::from_millis(1),
            ..Default::default()
        }
    }

    fn desired() -> Vec<Descriptor> {
        vec![Descriptor {
            script_type: crate::descriptors::ScriptType::P2wpkh,
            path: "m/84'/0'/0'".to_string(),
            receive_descriptor: "wpkh([abcd0123/84'/0'/0']xprvA/0/*)".to_string(),
            change_descriptor: "wpkh([abcd0123/84'/0'/0']xprvA/1/*)".to_string(),
            is_active: true,
        }]
    }

    fn idle_wallet() -> WalletInfo {
        WalletInfo {
            walletname: "bridge".to_string(),
            txcount: 0,
            scanning: ScanStatus::Idle(false),
        }
    }

    fn scanning_wallet() -> WalletInfo {
        WalletInfo {
            walletname: "bridge".to_string(),
            txcount: 0,
            scanning: ScanStatus::Scanning {
                duration: 30,
                progress: 0.4,
            },
        }
    }

    fn synced_chain() -> BlockchainInfo {
        BlockchainInfo {
            chain: "main".to_string(),
            blocks: 800_000,
            headers: 800_000,
            verificationprogress: 1.0,
            initialblockdownload: false,
        }
    }

    fn expect_checksums(rpc: &mut MockWalletRpc) {
        rpc.expect_get_descriptor_info().returning(|desc| {
            Ok(DescriptorInfo {
                descriptor: desc.to_string(),
                checksum: "cksum123".to_string(),
                isrange: true,
                issolvable: true,
                hasprivatekeys: true,
            })
        });
    }

    fn listed(desc: &str, active: bool, internal: bool, timestamp: u64) -> ListedDescriptor {
        ListedDescriptor {
            desc: desc.to_string(),
            timestamp,
            active,
            internal,
            range: Some((0, 999)),
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        states: Mutex<Vec<ReconcileState>>,
        progress: Mutex<Vec<ScanProgress>>,
    }

    impl ReconcileObserver for RecordingObserver {
        fn on_state(&self, state: ReconcileState) {
            self.states.lock().unwrap().push(state);
        }

        fn on_progress(&self, progress: &ScanProgress) {
            self.progress.lock().unwrap().push(progress.clone());
        }
    }

    #[test]
    fn test_plan_deactivates_stale_and_imports_new() {
        let candidate = ImportRequest {
            desc: "wpkh(new/0/*)#aaaa".to_string(),
            active: true,
            internal: false,
            timestamp: 0,
            range: Some((0, 999)),
        };
        let existing = vec![
            listed("pkh(old/0/*)#bbbb", true, false, 10),
            listed("pkh(older/0/*)#cccc", false, false, 10),
        ];

        let plan = plan_import(&existing, &[candidate.clone()]);

        assert_eq!(plan.deactivations.len(), 1);
        assert_eq!(plan.deactivations[0].desc, "pkh(old/0/*)#bbbb");
        assert!(!plan.deactivations[0].active);
        assert_eq!(plan.deactivations[0].timestamp, 10);
        assert_eq!(plan.imports, vec![candidate]);
    }

    #[test]
    fn test_plan_exact_match_is_noop() {
        let candidate = ImportRequest {
            desc: "wpkh(k/1/*)#aaaa".to_string(),
            active: true,
            internal: true,
            timestamp: 0,
            range: Some((0, 999)),
        };

        let plan = plan_import(&[listed("wpkh(k/1/*)#aaaa", true, true, 0)], &[candidate.clone()]);
        assert!(plan.is_empty());

        // Same descriptor under a different role is re-imported
        let plan = plan_import(&[listed("wpkh(k/1/*)#aaaa", true, false, 0)], &[candidate]);
        assert!(plan.deactivations.is_empty());
        assert_eq!(plan.imports.len(), 1);
    }

    #[tokio::test]
    async fn test_imports_when_node_idle() {
        let mut rpc = MockWalletRpc::new();
        rpc.expect_list_descriptors().returning(|_| Ok(vec![]));
        rpc.expect_get_wallet_info().returning(|| Ok(idle_wallet()));
        rpc.expect_get_blockchain_info()
            .returning(|| Ok(synced_chain()));
        expect_checksums(&mut rpc);
        rpc.expect_import_descriptors()
            .withf(|requests: &[ImportRequest]| {
                requests.len() == 2
                    && requests[0].desc.ends_with("/0/*)#cksum123")
                    && !requests[0].internal
                    && requests[1].internal
                    && requests.iter().all(|r| r.range == Some((0, 999)))
            })
            .times(1)
            .returning(|requests| Ok(requests.iter().map(|_| ImportResult::ok()).collect()));

        let observer = Arc::new(RecordingObserver::default());
        let reconciler = DescriptorReconciler::new(Arc::new(rpc), fast_config())
            .with_observer(observer.clone());

        let report = reconciler.reconcile(&desired()).await.unwrap();

        assert_eq!(report.imported, 2);
        assert_eq!(report.deactivated, 0);
        assert_eq!(report.retries, 0);
        assert_eq!(
            *observer.states.lock().unwrap(),
            vec![
                ReconcileState::Idle,
                ReconcileState::CheckRemoteState,
                ReconcileState::Importing,
                ReconcileState::Success
            ]
        );
    }

    #[tokio::test]
    async fn test_reconcile_master_imports_all_script_types() {
        let master = MasterKeyPair::from_entropy(&[0u8; 16]).unwrap();

        let mut rpc = MockWalletRpc::new();
        rpc.expect_list_descriptors().returning(|_| Ok(vec![]));
        rpc.expect_get_wallet_info().returning(|| Ok(idle_wallet()));
        rpc.expect_get_blockchain_info()
            .returning(|| Ok(synced_chain()));
        expect_checksums(&mut rpc);
        rpc.expect_import_descriptors()
            .withf(|requests: &[ImportRequest]| requests.len() == 8)
            .times(1)
            .returning(|requests| Ok(requests.iter().map(|_| ImportResult::ok()).collect()));

        let report = DescriptorReconciler::new(Arc::new(rpc), fast_config())
            .reconcile_master(&master)
            .await
            .unwrap();

        assert_eq!(report.imported, 8);
    }

    #[tokio::test]
    async fn test_waits_while_scanning_without_consuming_retries() {
        let polls = Arc::new(AtomicUsize::new(0));
        let polls_in_mock = polls.clone();

        let mut rpc = MockWalletRpc::new();
        rpc.expect_list_descriptors().returning(|_| Ok(vec![]));
        rpc.expect_get_wallet_info().returning(move || {
            // Busy for the first three checks
            if polls_in_mock.fetch_add(1, Ordering::SeqCst) < 3 {
                Ok(scanning_wallet())
            } else {
                Ok(idle_wallet())
            }
        });
        rpc.expect_get_blockchain_info()
            .returning(|| Ok(synced_chain()));
        expect_checksums(&mut rpc);
        rpc.expect_import_descriptors()
            .times(1)
            .returning(|requests| Ok(requests.iter().map(|_| ImportResult::ok()).collect()));

        let observer = Arc::new(RecordingObserver::default());
        let reconciler = DescriptorReconciler::new(Arc::new(rpc), fast_config())
            .with_observer(observer.clone());

        let report = reconciler.reconcile(&desired()).await.unwrap();

        assert_eq!(report.retries, 0);
        assert_eq!(report.scan_polls, 3);

        let progress = observer.progress.lock().unwrap();
        assert_eq!(progress.len(), 3);
        assert_eq!(progress[0].progress, 0.4);
        assert_eq!(progress[0].elapsed, Duration::from_secs(30));
        assert!(observer
            .states
            .lock()
            .unwrap()
            .contains(&ReconcileState::WaitingForScan));
    }

    #[tokio::test]
    async fn test_scanning_node_never_receives_import() {
        let checks = Arc::new(AtomicUsize::new(0));
        let checks_in_mock = checks.clone();

        let mut rpc = MockWalletRpc::new();
        rpc.expect_list_descriptors().returning(|_| Ok(vec![]));
        rpc.expect_get_wallet_info().returning(move || {
            if checks_in_mock.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(scanning_wallet())
            } else {
                Ok(idle_wallet())
            }
        });
        rpc.expect_get_blockchain_info()
            .returning(|| Ok(synced_chain()));
        expect_checksums(&mut rpc);

        let imported_while_scanning = Arc::new(AtomicUsize::new(0));
        let flag = imported_while_scanning.clone();
        let checks_at_import = checks.clone();
        rpc.expect_import_descriptors().returning(move |requests| {
            if checks_at_import.load(Ordering::SeqCst) < 2 {
                flag.fetch_add(1, Ordering::SeqCst);
            }
            Ok(requests.iter().map(|_| ImportResult::ok()).collect())
        });

        let reconciler = DescriptorReconciler::new(Arc::new(rpc), fast_config());
        let report = reconciler.reconcile(&desired()).await.unwrap();

        assert_eq!(report.retries, 0);
        assert_eq!(imported_while_scanning.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_waits_for_chain_sync() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_mock = calls.clone();

        let mut rpc = MockWalletRpc::new();
        rpc.expect_list_descriptors().returning(|_| Ok(vec![]));
        rpc.expect_get_wallet_info().returning(|| Ok(idle_wallet()));
        rpc.expect_get_blockchain_info().returning(move || {
            let mut chain = synced_chain();
            if calls_in_mock.fetch_add(1, Ordering::SeqCst) == 0 {
                chain.blocks = 799_000;
                chain.verificationprogress = 0.9;
            }
            Ok(chain)
        });
        expect_checksums(&mut rpc);
        rpc.expect_import_descriptors()
            .times(1)
            .returning(|requests| Ok(requests.iter().map(|_| ImportResult::ok()).collect()));

        let observer = Arc::new(RecordingObserver::default());
        let reconciler = DescriptorReconciler::new(Arc::new(rpc), fast_config())
            .with_observer(observer.clone());

        let report = reconciler.reconcile(&desired()).await.unwrap();
        assert_eq!(report.scan_polls, 1);
        assert_eq!(report.retries, 0);

        let progress = observer.progress.lock().unwrap();
        assert!(!progress[0].wallet_scanning);
        assert_eq!(progress[0].progress, 0.9);
        assert_eq!(progress[0].blocks, 799_000);
    }

    #[tokio::test]
    async fn test_rescanning_error_waits_instead_of_retrying() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_in_mock = attempts.clone();

        let mut rpc = MockWalletRpc::new();
        rpc.expect_list_descriptors().returning(|_| Ok(vec![]));
        rpc.expect_get_wallet_info().returning(|| Ok(idle_wallet()));
        rpc.expect_get_blockchain_info()
            .returning(|| Ok(synced_chain()));
        expect_checksums(&mut rpc);
        rpc.expect_import_descriptors().returning(move |requests| {
            if attempts_in_mock.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(RpcError::remote(
                    -4,
                    "Wallet is currently rescanning. Abort existing rescan or wait.",
                ))
            } else {
                Ok(requests.iter().map(|_| ImportResult::ok()).collect())
            }
        });

        let reconciler = DescriptorReconciler::new(Arc::new(rpc), fast_config());
        let report = reconciler.reconcile(&desired()).await.unwrap();

        assert_eq!(report.retries, 0);
        assert_eq!(report.scan_polls, 1);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_item_failure_mentioning_rescan_waits() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_in_mock = attempts.clone();

        let mut rpc = MockWalletRpc::new();
        rpc.expect_list_descriptors().returning(|_| Ok(vec![]));
        rpc.expect_get_wallet_info().returning(|| Ok(idle_wallet()));
        rpc.expect_get_blockchain_info()
            .returning(|| Ok(synced_chain()));
        expect_checksums(&mut rpc);
        rpc.expect_import_descriptors().returning(move |requests| {
            if attempts_in_mock.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(vec![ImportResult::failed(-4, "Wallet is currently rescanning")])
            } else {
                Ok(requests.iter().map(|_| ImportResult::ok()).collect())
            }
        });

        let reconciler = DescriptorReconciler::new(Arc::new(rpc), fast_config());
        let report = reconciler.reconcile(&desired()).await.unwrap();

        assert_eq!(report.retries, 0);
        assert_eq!(report.scan_polls, 1);
    }

    #[tokio::test]
    async fn test_retries_then_fails() {
        let mut rpc = MockWalletRpc::new();
        rpc.expect_list_descriptors()
            .times(4)
            .returning(|_| Err(RpcError::Transport("connection refused".to_string())));
        rpc.expect_import_descriptors().never();

        let observer = Arc::new(RecordingObserver::default());
        let reconciler = DescriptorReconciler::new(Arc::new(rpc), fast_config())
            .with_observer(observer.clone());

        let result = reconciler.reconcile(&desired()).await;

        match result {
            Err(ReconcileError::RetriesExhausted {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 4);
                assert!(matches!(last_error, RpcError::Transport(_)));
            }
            other => panic!("expected RetriesExhausted, got {:?}", other),
        }

        let states = observer.states.lock().unwrap();
        assert_eq!(states.last(), Some(&ReconcileState::Failed));
        assert_eq!(
            states
                .iter()
                .filter(|s| **s == ReconcileState::RetryBackoff)
                .count(),
            3
        );
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_mock = calls.clone();

        let mut rpc = MockWalletRpc::new();
        rpc.expect_list_descriptors().returning(move |_| {
            if calls_in_mock.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(RpcError::Transport("timeout".to_string()))
            } else {
                Ok(vec![])
            }
        });
        rpc.expect_get_wallet_info().returning(|| Ok(idle_wallet()));
        rpc.expect_get_blockchain_info()
            .returning(|| Ok(synced_chain()));
        expect_checksums(&mut rpc);
        rpc.expect_import_descriptors()
            .returning(|requests| Ok(requests.iter().map(|_| ImportResult::ok()).collect()));

        let reconciler = DescriptorReconciler::new(Arc::new(rpc), fast_config());
        let report = reconciler.reconcile(&desired()).await.unwrap();

        assert_eq!(report.retries, 1);
        assert_eq!(report.imported, 2);
    }

    #[tokio::test]
    async fn test_deactivation_precedes_import() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let order_in_mock = order.clone();

        let mut rpc = MockWalletRpc::new();
        rpc.expect_list_descriptors()
            .returning(|_| Ok(vec![listed("pkh(stale/0/*)#old", true, false, 0)]));
        rpc.expect_get_wallet_info().returning(|| Ok(idle_wallet()));
        rpc.expect_get_blockchain_info()
            .returning(|| Ok(synced_chain()));
        expect_checksums(&mut rpc);
        rpc.expect_import_descriptors()
            .times(2)
            .returning(move |requests| {
                order_in_mock
                    .lock()
                    .unwrap()
                    .push(requests.iter().all(|r| r.active));
                Ok(requests.iter().map(|_| ImportResult::ok()).collect())
            });

        let reconciler = DescriptorReconciler::new(Arc::new(rpc), fast_config());
        let report = reconciler.reconcile(&desired()).await.unwrap();

        assert_eq!(report.deactivated, 1);
        assert_eq!(report.imported, 2);
        // false = deactivation batch, true = activation batch
        assert_eq!(*order.lock().unwrap(), vec![false, true]);
    }

    #[test]
    fn test_backoff_doubles() {
        let rpc = MockWalletRpc::new();
        let reconciler = DescriptorReconciler::new(
            Arc::new(rpc),
            ReconcilerConfig {
                retry_backoff: Duration::from_millis(100),
                ..Default::default()
            },
        );

        assert_eq!(reconciler.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(reconciler.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(reconciler.backoff_delay(3), Duration::from_millis(400));
    }
}
