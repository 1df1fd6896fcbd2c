use chrono::{DateTime, NaiveDate, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::types::AssetStatus;

/// A domain in the inventory. Identity is `(name, source)`;
/// `discovery_date` is immutable after the first observation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct DomainRow {
    pub id: Uuid,
    pub name: String,
    pub source: String,
    pub status: AssetStatus,
    pub expiry_date: Option<NaiveDate>,
    pub discovery_date: NaiveDate,
    pub last_seen: NaiveDate,
    pub raw_payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct DomainRepository {
    pool: PgPool,
}

impl DomainRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_domains(
        &self,
        status: Option<AssetStatus>,
        source: Option<&str>,
    ) -> Result<Vec<DomainRow>> {
        let rows = sqlx::query_as::<_, DomainRow>(
            r#"SELECT
                    id,
                    name,
                    source,
                    status,
                    expiry_date,
                    discovery_date,
                    last_seen,
                    raw_payload,
                    created_at,
                    updated_at
               FROM
                    domains
               WHERE
                    ($1::text IS NULL OR status = $1)
                    AND ($2::text IS NULL OR source = $2)
               ORDER BY
                    name
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .bind(source)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn get_by_identity(&self, name: &str, source: &str) -> Result<Option<DomainRow>> {
        let row = sqlx::query_as::<_, DomainRow>(
            r#"SELECT
                    id,
                    name,
                    source,
                    status,
                    expiry_date,
                    discovery_date,
                    last_seen,
                    raw_payload,
                    created_at,
                    updated_at
               FROM
                    domains
               WHERE
                    name = $1
                    AND source = $2
            "#,
        )
        .bind(name)
        .bind(source)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}
