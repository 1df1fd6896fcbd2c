use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use color_eyre::Result;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::collectors::Collector;
use crate::services::{LockManager, MergeStats, Reconciler, SnapshotExporter, SyncLock};
use crate::types::{SyncStats, TriggerType};

/// Runs one collector end-to-end: lock, collect, merge, release, export.
pub struct SyncOrchestrator {
    locks: Arc<LockManager>,
    reconciler: Arc<Reconciler>,
    exporter: Arc<SnapshotExporter>,
    shutdown: CancellationToken,
}

impl SyncOrchestrator {
    pub fn new(
        locks: Arc<LockManager>,
        reconciler: Arc<Reconciler>,
        exporter: Arc<SnapshotExporter>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            locks,
            reconciler,
            exporter,
            shutdown,
        }
    }

    /// Run a full sync, silently no-opping if the collector is already
    /// running (a dropped cron tick, not an error).
    pub async fn run(&self, collector: Arc<dyn Collector>, trigger_type: TriggerType) -> Result<()> {
        let Some(lock) = self
            .locks
            .try_acquire(collector.name(), collector.service_type(), trigger_type)
            .await?
        else {
            debug!("Sync for {} skipped: already running", collector.name());
            return Ok(());
        };

        self.run_locked(lock, collector, trigger_type).await
    }

    /// Run a sync whose lock was already acquired by the caller (manual
    /// triggers acquire in the request path so the API can report
    /// contention precisely).
    pub async fn run_locked(
        &self,
        lock: SyncLock,
        collector: Arc<dyn Collector>,
        trigger_type: TriggerType,
    ) -> Result<()> {
        info!("Starting {trigger_type} sync for {}", collector.name());
        let started = Instant::now();

        let outcome = AssertUnwindSafe(self.execute(collector.clone()))
            .catch_unwind()
            .await;

        let (stats, error) = match outcome {
            Ok(Ok((stats, error))) => (stats, error),
            Ok(Err(e)) => {
                let message = if self.shutdown.is_cancelled() {
                    "cancelled".to_string()
                } else {
                    format!("{e:#}")
                };
                (SyncStats::default(), Some(message))
            }
            Err(_) => (SyncStats::default(), Some("sync task panicked".to_string())),
        };

        // Release runs on every path so the run row never stays `running`.
        self.locks.release(lock, stats, error.as_deref()).await?;

        match &error {
            None => {
                info!(
                    "Sync for {} completed in {:.1}s: {} found, {} added, {} updated, {} removed",
                    collector.name(),
                    started.elapsed().as_secs_f64(),
                    stats.found,
                    stats.added,
                    stats.updated,
                    stats.removed
                );
                if let Err(e) = self.exporter.export_all().await {
                    // Snapshot files are advisory; a failed export never
                    // fails the sync that produced the data.
                    warn!("Snapshot export after {} sync failed: {e:#}", collector.name());
                }
            }
            Some(message) => {
                error!(
                    "Sync for {} failed after {:.1}s: {message}",
                    collector.name(),
                    started.elapsed().as_secs_f64()
                );
            }
        }

        Ok(())
    }

    async fn execute(&self, collector: Arc<dyn Collector>) -> Result<(SyncStats, Option<String>)> {
        let result = collector.collect(&self.shutdown).await;

        let mut stats = SyncStats {
            found: result.found() as i64,
            ..Default::default()
        };

        // A fatal sweep error (top-level list failure, bad token,
        // cancellation) merges nothing: the pre-call inventory stands.
        if let Some(message) = result.error {
            return Ok((stats, Some(message)));
        }

        let mut merged = MergeStats::default();
        if !result.domains.is_empty() {
            merged += self
                .reconciler
                .merge_domains(collector.source(), &result.domains, &self.shutdown)
                .await?;
        }
        if !result.dns_records.is_empty() || !result.checked_domains.is_empty() {
            merged += self
                .reconciler
                .merge_dns_records(
                    collector.source(),
                    &result.dns_records,
                    &result.checked_domains,
                    &self.shutdown,
                )
                .await?;
        }

        stats.added = merged.added;
        stats.updated = merged.updated;
        stats.removed = merged.removed;
        Ok((stats, None))
    }
}
