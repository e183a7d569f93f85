//! Sync Monitor
//!
//! Background poller reporting chain sync and wallet rescan progress to
//! subscribed observers. It only issues read calls, so it can run next to
//! a reconciliation against the same wallet.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::rpc::{chain_is_syncing, RpcError, WalletRpc};

/// One poll result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncStatus {
    pub blocks: u64,
    pub headers: u64,
    pub verification_progress: f64,
    pub initial_block_download: bool,
    /// Rescan progress in [0, 1] while the wallet is rescanning
    pub wallet_scan_progress: Option<f64>,
}

impl SyncStatus {
    /// Same rule the reconciler uses to wait for the chain
    pub fn is_caught_up(&self) -> bool {
        !chain_is_syncing(self.blocks, self.headers, self.initial_block_download)
    }

    pub fn is_wallet_scanning(&self) -> bool {
        self.wallet_scan_progress.is_some()
    }
}

pub trait SyncObserver: Send + Sync {
    fn on_status(&self, status: &SyncStatus);

    fn on_error(&self, _error: &RpcError) {}
}

type Observers = Arc<RwLock<Vec<Arc<dyn SyncObserver>>>>;

/// Owned polling session; dropping it stops the poller
pub struct SyncMonitor {
    rpc: Arc<dyn WalletRpc>,
    interval: Duration,
    observers: Observers,
    latest: Arc<RwLock<Option<SyncStatus>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncMonitor {
    pub fn new(rpc: Arc<dyn WalletRpc>, interval: Duration) -> Self {
        Self {
            rpc,
            interval,
            observers: Arc::new(RwLock::new(Vec::new())),
            latest: Arc::new(RwLock::new(None)),
            task: Mutex::new(None),
        }
    }

    pub async fn subscribe(&self, observer: Arc<dyn SyncObserver>) {
        self.observers.write().await.push(observer);
    }

    /// Start polling. Returns false if already running.
    pub fn start(&self) -> bool {
        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return false;
        }

        let rpc = self.rpc.clone();
        let observers = self.observers.clone();
        let latest = self.latest.clone();
        let interval = self.interval;

        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                poll_and_publish(rpc.as_ref(), &observers, &latest).await;
            }
        }));

        tracing::info!(interval_ms = interval.as_millis() as u64, "Sync monitor started");
        true
    }

    /// Stop polling. Returns false if it was not running.
    pub fn stop(&self) -> bool {
        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        match task.take() {
            Some(handle) => {
                let was_running = !handle.is_finished();
                handle.abort();
                if was_running {
                    tracing::info!("Sync monitor stopped");
                }
                was_running
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    /// Most recent successful poll
    pub async fn latest(&self) -> Option<SyncStatus> {
        self.latest.read().await.clone()
    }

    /// Poll once without the background task
    pub async fn poll_once(&self) -> Result<SyncStatus, RpcError> {
        let status = fetch_status(self.rpc.as_ref()).await?;
        *self.latest.write().await = Some(status.clone());
        Ok(status)
    }
}

impl Drop for SyncMonitor {
    fn drop(&mut self) {
        if let Ok(mut task) = self.task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
    }
}

async fn fetch_status(rpc: &dyn WalletRpc) -> Result<SyncStatus, RpcError> {
    let chain = rpc.get_blockchain_info().await?;
    let wallet = rpc.get_wallet_info().await?;

    Ok(SyncStatus {
        blocks: chain.blocks,
        headers: chain.headers,
        verification_progress: chain.verificationprogress,
        initial_block_download: chain.initialblockdownload,
        wallet_scan_progress: wallet.scanning.progress(),
    })
}

async fn poll_and_publish(
    rpc: &dyn WalletRpc,
    observers: &Observers,
    latest: &Arc<RwLock<Option<SyncStatus>>>,
) {
    match fetch_status(rpc).await {
        Ok(status) => {
            tracing::debug!(
                blocks = status.blocks,
                headers = status.headers,
                caught_up = status.is_caught_up(),
                "Sync status"
            );
            *latest.write().await = Some(status.clone());
            for observer in observers.read().await.iter() {
                observer.on_status(&status);
            }
        }
        Err(e) => {
            tracing::warn!("Sync poll failed: {}", e);
            for observer in observers.read().await.iter() {
                observer.on_error(&e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::traits::MockWalletRpc;
    use crate::rpc::{BlockchainInfo, ScanStatus, WalletInfo};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn mock_rpc() -> MockWalletRpc {
        let mut rpc = MockWalletRpc::new();
        rpc.expect_get_blockchain_info().returning(|| {
            Ok(BlockchainInfo {
                chain: "main".to_string(),
                blocks: 100,
                headers: 120,
                verificationprogress: 0.8,
                initialblockdownload: true,
            })
        });
        rpc.expect_get_wallet_info().returning(|| {
            Ok(WalletInfo {
                walletname: "bridge".to_string(),
                txcount: 0,
                scanning: ScanStatus::Scanning {
                    duration: 5,
                    progress: 0.5,
                },
            })
        });
        rpc
    }

    #[derive(Default)]
    struct CountingObserver {
        seen: AtomicUsize,
    }

    impl SyncObserver for CountingObserver {
        fn on_status(&self, status: &SyncStatus) {
            assert!(!status.is_caught_up());
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_poll_once() {
        let monitor = SyncMonitor::new(Arc::new(mock_rpc()), Duration::from_millis(5));
        let status = monitor.poll_once().await.unwrap();

        assert!(!status.is_caught_up());
        assert!(status.is_wallet_scanning());
        assert_eq!(status.wallet_scan_progress, Some(0.5));
        assert_eq!(monitor.latest().await, Some(status));
    }

    #[tokio::test]
    async fn test_start_stop_idempotent() {
        let monitor = SyncMonitor::new(Arc::new(mock_rpc()), Duration::from_millis(5));
        let observer = Arc::new(CountingObserver::default());
        monitor.subscribe(observer.clone()).await;

        assert!(monitor.start());
        assert!(!monitor.start());
        assert!(monitor.is_running());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(observer.seen.load(Ordering::SeqCst) >= 1);

        assert!(monitor.stop());
        assert!(!monitor.stop());
        assert!(!monitor.is_running());

        // Restartable after stop
        assert!(monitor.start());
        assert!(monitor.stop());
    }

    #[test]
    fn test_caught_up() {
        let status = SyncStatus {
            blocks: 10,
            headers: 10,
            verification_progress: 1.0,
            initial_block_download: false,
            wallet_scan_progress: None,
        };
        assert!(status.is_caught_up());
        assert!(!status.is_wallet_scanning());
    }

    #[test]
    fn test_caught_up_agrees_with_chain_info() {
        let cases = [
            (10, 10, false),
            (9, 10, false),
            (10, 10, true),
            (11, 10, false),
        ];

        for (blocks, headers, ibd) in cases {
            let info = BlockchainInfo {
                chain: "main".to_string(),
                blocks,
                headers,
                verificationprogress: 1.0,
                initialblockdownload: ibd,
            };
            let status = SyncStatus {
                blocks,
                headers,
                verification_progress: 1.0,
                initial_block_download: ibd,
                wallet_scan_progress: None,
            };
            assert_eq!(status.is_caught_up(), info.is_caught_up());
            assert_eq!(status.is_caught_up(), !info.is_syncing());
        }
    }
}
