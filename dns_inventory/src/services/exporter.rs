use std::path::PathBuf;

use chrono::{NaiveDate, SecondsFormat, Utc};
use color_eyre::{Result, eyre::WrapErr};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::repository::{DnsRecordRepository, DnsRecordRow, DomainRepository, DomainRow};
use crate::types::AssetStatus;

/// A tombstoned asset as the dashboard consumes it from `removed.json`.
#[derive(Debug, Serialize)]
pub struct RemovedAsset {
    pub asset_type: &'static str,
    pub name: String,
    pub provider: String,
    pub details: String,
    pub discovery_date: NaiveDate,
    pub removed_date: NaiveDate,
    pub status: &'static str,
}

impl RemovedAsset {
    fn from_domain(row: &DomainRow) -> Self {
        Self {
            asset_type: "domain",
            name: row.name.clone(),
            provider: row.source.clone(),
            details: "Domain removed from registrar".to_string(),
            discovery_date: row.discovery_date,
            removed_date: row.last_seen,
            status: "removed",
        }
    }

    fn from_dns_record(row: &DnsRecordRow) -> Self {
        let name = if row.subdomain.is_empty() {
            row.parent_domain.clone()
        } else {
            format!("{}.{}", row.subdomain, row.parent_domain)
        };
        Self {
            asset_type: "subdomain",
            name,
            provider: row.source.clone(),
            details: format!("{} record - {}", row.record_type, row.data),
            discovery_date: row.discovery_date,
            removed_date: row.last_seen,
            status: "removed",
        }
    }
}

/// Projects the inventory into the static JSON files the dashboard reads.
///
/// Writes are not transactional with the store: each file is replaced whole,
/// in sequence, and readers tolerate the window between them.
pub struct SnapshotExporter {
    domains: DomainRepository,
    dns_records: DnsRecordRepository,
    output_dir: PathBuf,
}

impl SnapshotExporter {
    pub fn new(
        domains: DomainRepository,
        dns_records: DnsRecordRepository,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            domains,
            dns_records,
            output_dir,
        }
    }

    pub async fn export_all(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .wrap_err_with(|| {
                format!("Failed to create output dir {}", self.output_dir.display())
            })?;

        let domains = self.domains.get_domains(None, None).await?;
        let records = self.dns_records.get_dns_records(None, None, None).await?;

        let removed: Vec<RemovedAsset> = domains
            .iter()
            .filter(|row| row.status == AssetStatus::Removed)
            .map(RemovedAsset::from_domain)
            .chain(
                records
                    .iter()
                    .filter(|row| row.status == AssetStatus::Removed)
                    .map(RemovedAsset::from_dns_record),
            )
            .collect();

        self.write_json("domains.json", &domains).await?;
        self.write_json("subdomains.json", &records).await?;
        self.write_json("removed.json", &removed).await?;
        self.update_metadata(domains.len(), records.len(), removed.len())
            .await?;

        info!(
            "Exported {} domains, {} DNS records, {} removed assets to {}",
            domains.len(),
            records.len(),
            removed.len(),
            self.output_dir.display()
        );
        Ok(())
    }

    async fn write_json<T: Serialize>(&self, file_name: &str, data: &T) -> Result<()> {
        let path = self.output_dir.join(file_name);
        let body = serde_json::to_vec_pretty(data)?;
        tokio::fs::write(&path, body)
            .await
            .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
        debug!("Wrote {}", path.display());
        Ok(())
    }

    /// Merge the `services.dns` block into metadata.json, preserving keys
    /// owned by other services. An unreadable or corrupt file starts fresh.
    async fn update_metadata(
        &self,
        domains_count: usize,
        dns_records_count: usize,
        removed_count: usize,
    ) -> Result<()> {
        let path = self.output_dir.join("metadata.json");

        let existing: Value = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|_| json!({})),
            Err(_) => json!({}),
        };
        let mut root = match existing {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };

        let services = root.entry("services").or_insert_with(|| json!({}));
        if !services.is_object() {
            *services = json!({});
        }
        services["dns"] = json!({
            "last_updated": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            "domains_count": domains_count,
            "dns_records_count": dns_records_count,
            "removed_count": removed_count,
        });

        let body = serde_json::to_vec_pretty(&Value::Object(root))?;
        tokio::fs::write(&path, body)
            .await
            .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}
