use std::time::Duration;

use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::types::{ServiceType, SyncStats, SyncStatus, TriggerType};

const SYNC_RUN_COLUMNS: &str = r#"
    id,
    collector_name,
    service_type,
    status,
    trigger_type,
    started_at,
    completed_at,
    records_found,
    records_added,
    records_updated,
    records_removed,
    error_message
"#;

/// Persisted trace of one collector execution. A row with
/// `status = running` is also the cross-process lock for its collector,
/// enforced by a partial-unique index on `(collector_name)`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct SyncRunRow {
    pub id: Uuid,
    pub collector_name: String,
    pub service_type: ServiceType,
    pub status: SyncStatus,
    pub trigger_type: TriggerType,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub records_found: i64,
    pub records_added: i64,
    pub records_updated: i64,
    pub records_removed: i64,
    pub error_message: Option<String>,
}

#[derive(Clone)]
pub struct SyncRunRepository {
    pool: PgPool,
}

impl SyncRunRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a `running` row for the collector. Returns the raw sqlx error
    /// so the lock manager can treat a unique violation on the partial
    /// index as lock contention rather than a failure.
    pub async fn insert_running(
        &self,
        collector_name: &str,
        service_type: ServiceType,
        trigger_type: TriggerType,
    ) -> sqlx::Result<SyncRunRow> {
        sqlx::query_as::<_, SyncRunRow>(&format!(
            r#"INSERT INTO
                    sync_runs (collector_name, service_type, status, trigger_type)
               VALUES
                    ($1, $2, 'running', $3)
               RETURNING {SYNC_RUN_COLUMNS}
            "#
        ))
        .bind(collector_name)
        .bind(service_type)
        .bind(trigger_type)
        .fetch_one(&self.pool)
        .await
    }

    /// Close a run: final status, completion timestamp, counters and the
    /// error message if any. Rows are never deleted.
    pub async fn finish(
        &self,
        run_id: Uuid,
        status: SyncStatus,
        stats: SyncStats,
        error_message: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"UPDATE
                    sync_runs
               SET
                    status = $2,
                    completed_at = NOW(),
                    records_found = $3,
                    records_added = $4,
                    records_updated = $5,
                    records_removed = $6,
                    error_message = $7
               WHERE
                    id = $1
            "#,
        )
        .bind(run_id)
        .bind(status)
        .bind(stats.found)
        .bind(stats.added)
        .bind(stats.updated)
        .bind(stats.removed)
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn has_running(&self, collector_name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"SELECT EXISTS (
                    SELECT 1 FROM sync_runs WHERE collector_name = $1 AND status = 'running'
               )
            "#,
        )
        .bind(collector_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    pub async fn latest_for(&self, collector_name: &str) -> Result<Option<SyncRunRow>> {
        let row = sqlx::query_as::<_, SyncRunRow>(&format!(
            r#"SELECT {SYNC_RUN_COLUMNS}
               FROM
                    sync_runs
               WHERE
                    collector_name = $1
               ORDER BY
                    started_at DESC
               LIMIT 1
            "#
        ))
        .bind(collector_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// The most recent run per collector, for the sync status API.
    pub async fn latest_per_collector(&self) -> Result<Vec<SyncRunRow>> {
        let rows = sqlx::query_as::<_, SyncRunRow>(&format!(
            r#"SELECT DISTINCT ON (collector_name) {SYNC_RUN_COLUMNS}
               FROM
                    sync_runs
               ORDER BY
                    collector_name,
                    started_at DESC
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Fail `running` rows older than `max_age`: a crashed predecessor
    /// would otherwise pin its collector forever.
    pub async fn fail_stale(&self, max_age: Duration) -> Result<u64> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::hours(2));

        let result = sqlx::query(
            r#"UPDATE
                    sync_runs
               SET
                    status = 'failed',
                    completed_at = NOW(),
                    error_message = 'Process terminated unexpectedly'
               WHERE
                    status = 'running'
                    AND started_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
