//! Background snapshot service
//!
//! A dedicated task dumps the store to disk on a fixed cadence and once more
//! at shutdown. A single-writer guard keeps overlapping dumps from racing on
//! the snapshot file: a second attempt while one is in flight is skipped
//! with a warning rather than queued.

use crate::error::{Result, RustyRadishError};
use crate::storage::memory::MemoryStore;
use crate::storage::snapshot;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Handle to the running snapshot worker.
pub struct SnapshotService {
    worker: Arc<SnapshotWorker>,
    handle: Option<JoinHandle<()>>,
}

struct SnapshotWorker {
    store: Arc<MemoryStore>,
    path: PathBuf,
    interval: Duration,
    shutdown: Notify,
    dump_in_progress: AtomicBool,
}

impl SnapshotService {
    /// Spawn the background worker. It sleeps for `interval` between dumps
    /// and wakes immediately when [`SnapshotService::shutdown`] is called.
    pub fn start(store: Arc<MemoryStore>, path: PathBuf, interval: Duration) -> Self {
        let worker = Arc::new(SnapshotWorker {
            store,
            path,
            interval,
            shutdown: Notify::new(),
            dump_in_progress: AtomicBool::new(false),
        });

        let handle = tokio::spawn(Arc::clone(&worker).run());
        Self {
            worker,
            handle: Some(handle),
        }
    }

    /// Try to restore the store from an existing snapshot file. A missing or
    /// unreadable file means starting from an empty key space, not a fatal
    /// error.
    pub async fn load_existing(store: &MemoryStore, path: &Path) {
        match snapshot::load(store, path).await {
            Ok(()) => {}
            Err(e) => {
                info!(
                    path = %path.display(),
                    reason = %e,
                    "no usable snapshot; starting with an empty key space"
                );
            }
        }
    }

    /// Dump immediately, honoring the single-writer guard.
    pub async fn snapshot_now(&self) -> Result<()> {
        self.worker.snapshot().await
    }

    /// Stop the worker. The worker performs one final dump before exiting.
    pub async fn shutdown(mut self) -> Result<()> {
        self.worker.shutdown.notify_one();
        if let Some(handle) = self.handle.take() {
            handle
                .await
                .map_err(|e| RustyRadishError::InternalError {
                    message: format!("snapshot worker panicked: {e}"),
                    component: Some("persistence".to_string()),
                })?;
        }
        Ok(())
    }
}

impl SnapshotWorker {
    async fn run(self: Arc<Self>) {
        info!(
            interval_secs = self.interval.as_secs(),
            path = %self.path.display(),
            "snapshot worker started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    if let Err(e) = self.snapshot().await {
                        error!(error = %e, "periodic snapshot failed");
                    }
                }
                _ = self.shutdown.notified() => {
                    break;
                }
            }
        }

        // Final dump so an orderly shutdown never loses more than is
        // already on disk.
        match self.snapshot().await {
            Ok(()) => info!("final snapshot written"),
            Err(e) => error!(error = %e, "final snapshot failed"),
        }
    }

    async fn snapshot(&self) -> Result<()> {
        if self
            .dump_in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("snapshot already in progress; skipping this attempt");
            return Ok(());
        }

        let result = snapshot::dump(&self.store, &self.path).await;
        self.dump_in_progress.store(false, Ordering::Release);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn snapshot_now_writes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.my_rdb");

        let store = Arc::new(MemoryStore::new());
        store.set("k", "v".to_string());

        let service =
            SnapshotService::start(Arc::clone(&store), path.clone(), Duration::from_secs(3600));
        service.snapshot_now().await.unwrap();
        assert!(path.exists());
        service.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_performs_a_final_dump() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.my_rdb");

        let store = Arc::new(MemoryStore::new());
        let service =
            SnapshotService::start(Arc::clone(&store), path.clone(), Duration::from_secs(3600));

        store.set("late", "write".to_string());
        service.shutdown().await.unwrap();

        let restored = MemoryStore::new();
        snapshot::load(&restored, &path).await.unwrap();
        assert_eq!(restored.get("late").unwrap(), Some("write".to_string()));
    }

    #[tokio::test]
    async fn periodic_dump_fires_on_the_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.my_rdb");

        let store = Arc::new(MemoryStore::new());
        store.set("k", "v".to_string());

        let service =
            SnapshotService::start(Arc::clone(&store), path.clone(), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(path.exists());
        service.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn load_existing_tolerates_a_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.my_rdb");

        let store = MemoryStore::new();
        SnapshotService::load_existing(&store, &path).await;
        assert!(store.keys().is_empty());
    }
}
