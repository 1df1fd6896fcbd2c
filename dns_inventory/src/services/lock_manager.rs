use std::time::Duration;

use color_eyre::Result;
use dashmap::DashMap;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::repository::SyncRunRepository;
use crate::types::{ServiceType, SyncStats, SyncStatus, TriggerType};

/// Running rows older than this are failed at scheduler startup.
pub const MAX_STALE_AGE: Duration = Duration::from_secs(2 * 60 * 60);

/// A held sync lock. Not droppable on its own: the orchestrator must call
/// [`LockManager::release`] on every exit path so the run row is closed.
#[derive(Debug)]
pub struct SyncLock {
    pub run_id: Uuid,
    pub collector_name: String,
}

/// Two-layer at-most-one-running lock per collector name.
///
/// The in-process layer is a claim table; the cross-process layer is the
/// `running` sync-run row, guarded by the store's partial-unique index.
/// Acquisition is non-blocking on both layers: contention means the caller
/// drops its tick.
pub struct LockManager {
    running: DashMap<String, ()>,
    runs: SyncRunRepository,
}

impl LockManager {
    pub fn new(runs: SyncRunRepository) -> Self {
        Self {
            running: DashMap::new(),
            runs,
        }
    }

    /// Try to acquire the lock for `collector_name`, inserting the
    /// `running` sync-run row on success. Returns `None` without blocking
    /// when the collector is already running here or in another process.
    pub async fn try_acquire(
        &self,
        collector_name: &str,
        service_type: ServiceType,
        trigger_type: TriggerType,
    ) -> Result<Option<SyncLock>> {
        if self.running.insert(collector_name.to_string(), ()).is_some() {
            debug!("Collector {collector_name} is already running in this process");
            return Ok(None);
        }

        match self.runs.has_running(collector_name).await {
            Ok(false) => {}
            Ok(true) => {
                self.running.remove(collector_name);
                debug!("Collector {collector_name} is already running in another process");
                return Ok(None);
            }
            Err(e) => {
                self.running.remove(collector_name);
                return Err(e);
            }
        }

        match self
            .runs
            .insert_running(collector_name, service_type, trigger_type)
            .await
        {
            Ok(run) => Ok(Some(SyncLock {
                run_id: run.id,
                collector_name: collector_name.to_string(),
            })),
            Err(e) if is_unique_violation(&e) => {
                // Lost the insert race against a concurrent process.
                self.running.remove(collector_name);
                debug!("Lost the lock race for {collector_name}");
                Ok(None)
            }
            Err(e) => {
                self.running.remove(collector_name);
                Err(e.into())
            }
        }
    }

    /// Close the run row and free both lock layers. The in-process claim is
    /// dropped even if the row update fails, otherwise a DB hiccup would
    /// wedge the collector until restart.
    pub async fn release(
        &self,
        lock: SyncLock,
        stats: SyncStats,
        error: Option<&str>,
    ) -> Result<()> {
        let status = if error.is_some() {
            SyncStatus::Failed
        } else {
            SyncStatus::Completed
        };

        let result = self.runs.finish(lock.run_id, status, stats, error).await;
        self.running.remove(&lock.collector_name);
        result
    }

    pub fn is_held_locally(&self, collector_name: &str) -> bool {
        self.running.contains_key(collector_name)
    }

    /// Fail `running` rows left behind by a crashed predecessor. Runs only
    /// at scheduler startup so it cannot race a legitimately long sweep.
    pub async fn recover_stale(&self, max_age: Duration) -> Result<u64> {
        let recovered = self.runs.fail_stale(max_age).await?;
        if recovered > 0 {
            warn!("Stale-lock recovery failed {recovered} abandoned sync run(s)");
        }
        Ok(recovered)
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}
