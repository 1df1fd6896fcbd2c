use std::collections::BTreeSet;
use std::ops::AddAssign;

use chrono::Utc;
use color_eyre::{Result, eyre::eyre};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::collectors::{DiscoveredDomain, DiscoveredRecord};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    pub added: i64,
    pub updated: i64,
    pub removed: i64,
}

impl AddAssign for MergeStats {
    fn add_assign(&mut self, other: Self) {
        self.added += other.added;
        self.updated += other.updated;
        self.removed += other.removed;
    }
}

/// Applies a collector's sweep to the inventory: upserts observations,
/// advances `last_seen`, and tombstones records absent from the sweep.
///
/// Each merge is a single transaction against one UTC calendar date
/// captured at its start, so a sweep that crosses midnight still
/// reconciles against a single `today`. Any error (or cancellation)
/// before commit rolls the whole merge back.
#[derive(Clone)]
pub struct Reconciler {
    pool: PgPool,
}

impl Reconciler {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Merge a full domain sweep for `source`.
    ///
    /// The tombstone pass is unscoped: the upstream domain list is a single
    /// atomic call, so every active row not seen today was genuinely absent.
    pub async fn merge_domains(
        &self,
        source: &str,
        domains: &[DiscoveredDomain],
        cancel: &CancellationToken,
    ) -> Result<MergeStats> {
        let today = Utc::now().date_naive();
        let mut tx = self.pool.begin().await?;
        let mut stats = MergeStats::default();

        for domain in domains {
            if cancel.is_cancelled() {
                return Err(eyre!("Domain merge for {source} cancelled"));
            }

            let inserted: Option<Uuid> = sqlx::query_scalar(
                r#"INSERT INTO
                        domains (name, source, status, expiry_date, discovery_date, last_seen, raw_payload)
                   VALUES
                        ($1, $2, 'active', $3, $4, $4, $5)
                   ON CONFLICT (name, source) DO NOTHING
                   RETURNING id
                "#,
            )
            .bind(&domain.name)
            .bind(source)
            .bind(domain.expiry_date)
            .bind(today)
            .bind(domain.raw_payload.clone())
            .fetch_optional(&mut *tx)
            .await?;

            if inserted.is_some() {
                stats.added += 1;
            } else {
                // discovery_date is deliberately left alone.
                sqlx::query(
                    r#"UPDATE
                            domains
                       SET
                            status = 'active',
                            last_seen = $3,
                            expiry_date = $4,
                            raw_payload = $5,
                            updated_at = NOW()
                       WHERE
                            name = $1
                            AND source = $2
                    "#,
                )
                .bind(&domain.name)
                .bind(source)
                .bind(today)
                .bind(domain.expiry_date)
                .bind(domain.raw_payload.clone())
                .execute(&mut *tx)
                .await?;
                stats.updated += 1;
            }
        }

        let removed = sqlx::query(
            r#"UPDATE
                    domains
               SET
                    status = 'removed',
                    updated_at = NOW()
               WHERE
                    source = $1
                    AND status = 'active'
                    AND last_seen < $2
            "#,
        )
        .bind(source)
        .bind(today)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        stats.removed = removed as i64;

        tx.commit().await?;

        info!(
            "Merged {} domains from {source}: {} added, {} updated, {} removed",
            domains.len(),
            stats.added,
            stats.updated,
            stats.removed
        );
        Ok(stats)
    }

    /// Merge a DNS record sweep for `source`.
    ///
    /// The tombstone pass is scoped to `checked_domains`, the parents whose
    /// record fetch actually completed, so a partial sweep (quota
    /// exhaustion, per-domain errors) never tombstones records in domains it
    /// did not look at. A checked domain with zero records still tombstones
    /// its leftovers.
    pub async fn merge_dns_records(
        &self,
        source: &str,
        records: &[DiscoveredRecord],
        checked_domains: &[String],
        cancel: &CancellationToken,
    ) -> Result<MergeStats> {
        let today = Utc::now().date_naive();
        let mut tx = self.pool.begin().await?;
        let mut stats = MergeStats::default();

        for record in records {
            if cancel.is_cancelled() {
                return Err(eyre!("DNS record merge for {source} cancelled"));
            }

            let inserted: Option<Uuid> = sqlx::query_scalar(
                r#"INSERT INTO
                        dns_records (parent_domain, subdomain, record_type, data, source,
                                     status, ttl, priority, discovery_date, last_seen, raw_payload)
                   VALUES
                        ($1, $2, $3, $4, $5, 'active', $6, $7, $8, $8, $9)
                   ON CONFLICT (parent_domain, subdomain, record_type, data, source) DO NOTHING
                   RETURNING id
                "#,
            )
            .bind(&record.parent_domain)
            .bind(&record.subdomain)
            .bind(&record.record_type)
            .bind(&record.data)
            .bind(source)
            .bind(record.ttl)
            .bind(record.priority)
            .bind(today)
            .bind(record.raw_payload.clone())
            .fetch_optional(&mut *tx)
            .await?;

            if inserted.is_some() {
                stats.added += 1;
            } else {
                sqlx::query(
                    r#"UPDATE
                            dns_records
                       SET
                            status = 'active',
                            last_seen = $6,
                            ttl = $7,
                            priority = $8,
                            raw_payload = $9,
                            updated_at = NOW()
                       WHERE
                            parent_domain = $1
                            AND subdomain = $2
                            AND record_type = $3
                            AND data = $4
                            AND source = $5
                    "#,
                )
                .bind(&record.parent_domain)
                .bind(&record.subdomain)
                .bind(&record.record_type)
                .bind(&record.data)
                .bind(source)
                .bind(today)
                .bind(record.ttl)
                .bind(record.priority)
                .bind(record.raw_payload.clone())
                .execute(&mut *tx)
                .await?;
                stats.updated += 1;
            }
        }

        let parents: Vec<String> = checked_domains
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if !parents.is_empty() {
            let removed = sqlx::query(
                r#"UPDATE
                        dns_records
                   SET
                        status = 'removed',
                        updated_at = NOW()
                   WHERE
                        source = $1
                        AND status = 'active'
                        AND last_seen < $2
                        AND parent_domain = ANY($3)
                "#,
            )
            .bind(source)
            .bind(today)
            .bind(&parents)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            stats.removed = removed as i64;
        }

        tx.commit().await?;

        info!(
            "Merged {} DNS records from {source} across {} checked domains: \
             {} added, {} updated, {} removed",
            records.len(),
            parents.len(),
            stats.added,
            stats.updated,
            stats.removed
        );
        Ok(stats)
    }
}
