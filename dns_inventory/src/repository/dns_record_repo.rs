use chrono::{DateTime, NaiveDate, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::types::AssetStatus;

/// A DNS record in the inventory. Identity is the full signature
/// `(parent_domain, subdomain, record_type, data, source)`; `subdomain`
/// is empty for the apex.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct DnsRecordRow {
    pub id: Uuid,
    pub parent_domain: String,
    pub subdomain: String,
    pub record_type: String,
    pub data: String,
    pub source: String,
    pub status: AssetStatus,
    pub ttl: Option<i32>,
    pub priority: Option<i32>,
    pub discovery_date: NaiveDate,
    pub last_seen: NaiveDate,
    pub raw_payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct DnsRecordRepository {
    pool: PgPool,
}

impl DnsRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_dns_records(
        &self,
        status: Option<AssetStatus>,
        source: Option<&str>,
        parent_domain: Option<&str>,
    ) -> Result<Vec<DnsRecordRow>> {
        let rows = sqlx::query_as::<_, DnsRecordRow>(
            r#"SELECT
                    id,
                    parent_domain,
                    subdomain,
                    record_type,
                    data,
                    source,
                    status,
                    ttl,
                    priority,
                    discovery_date,
                    last_seen,
                    raw_payload,
                    created_at,
                    updated_at
               FROM
                    dns_records
               WHERE
                    ($1::text IS NULL OR status = $1)
                    AND ($2::text IS NULL OR source = $2)
                    AND ($3::text IS NULL OR parent_domain = $3)
               ORDER BY
                    parent_domain,
                    subdomain
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .bind(source)
        .bind(parent_domain)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
