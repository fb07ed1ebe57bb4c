//! Background expiry sweep.
//!
//! Requests already purge lazily; the sweeper catches buckets nobody has
//! touched for a while and drops stale name-tag batches.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::database::Database;
use super::files::{Bucket, FileStore, PurgeReport, StorageError};
use crate::metrics::MetricsCollector;

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub buckets: Vec<(Bucket, PurgeReport)>,
    pub orphans: u64,
    pub nametag_batches: u64,
}

impl SweepReport {
    /// Files and bytes purged across all buckets.
    pub fn total(&self) -> PurgeReport {
        let mut total = PurgeReport::default();
        for (_, report) in &self.buckets {
            total.merge(*report);
        }
        total
    }
}

/// Periodically purges expired uploads.
pub struct Sweeper {
    stores: Vec<Arc<FileStore>>,
    db: Arc<Database>,
    retention: Duration,
    interval: Duration,
    metrics: MetricsCollector,
}

impl Sweeper {
    pub fn new(
        stores: Vec<Arc<FileStore>>,
        db: Arc<Database>,
        retention: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            stores,
            db,
            retention,
            interval,
            metrics: MetricsCollector::new(),
        }
    }

    /// Runs one sweep over every store.
    pub async fn sweep_once(&self) -> Result<SweepReport, StorageError> {
        let now = Utc::now();
        let mut report = SweepReport::default();

        for store in &self.stores {
            let purged = store.purge_expired(now).await?;
            report.orphans += store.cleanup_orphans().await?;
            self.metrics.record_purge(store.bucket().as_str(), purged.files);

            let stats = store.stats().await?;
            self.metrics.set_stored_bytes(store.bucket().as_str(), stats.total_size_bytes);

            report.buckets.push((store.bucket(), purged));
        }

        let cutoff = now
            - chrono::Duration::from_std(self.retention).unwrap_or_else(|_| chrono::Duration::days(7));
        report.nametag_batches = self.db.purge_nametag_batches(cutoff).await?;

        Ok(report)
    }

    /// Spawns the sweep loop. It stops when `shutdown_rx` fires or closes.
    pub fn spawn(self, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_secs = self.interval.as_secs(), "Expiry sweeper started");
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Expiry sweeper received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        match self.sweep_once().await {
                            Ok(report) => {
                                let total = report.total();
                                debug!(
                                    files = total.files,
                                    bytes = total.bytes,
                                    orphans = report.orphans,
                                    nametag_batches = report.nametag_batches,
                                    "Sweep finished"
                                );
                            }
                            Err(e) => error!(error = %e, "Expiry sweep failed"),
                        }
                    }
                }
            }

            info!("Expiry sweeper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_sweep_once_reports_per_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.run_migrations().await.unwrap();
        let db = Arc::new(db);

        let stores: Vec<Arc<FileStore>> = Bucket::ALL
            .iter()
            .map(|bucket| {
                Arc::new(FileStore::new(
                    *bucket,
                    dir.path().join(bucket.as_str()),
                    db.clone(),
                    Duration::from_secs(3600),
                    1024,
                ))
            })
            .collect();
        stores[0]
            .store_bytes("a.txt", "text/plain", None, Bytes::from_static(b"abc"))
            .await
            .unwrap();

        let sweeper = Sweeper::new(stores, db, Duration::from_secs(3600), Duration::from_secs(60));
        let report = sweeper.sweep_once().await.unwrap();

        assert_eq!(report.buckets.len(), 2);
        assert_eq!(report.total(), PurgeReport::default());
        assert_eq!(report.nametag_batches, 0);
    }

    #[tokio::test]
    async fn test_spawned_sweeper_stops_on_shutdown() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.run_migrations().await.unwrap();
        let sweeper = Sweeper::new(
            Vec::new(),
            Arc::new(db),
            Duration::from_secs(3600),
            Duration::from_millis(10),
        );

        let (tx, rx) = broadcast::channel(1);
        let handle = sweeper.spawn(rx);
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("sweeper should stop")
            .expect("sweeper task should not panic");
    }
}
