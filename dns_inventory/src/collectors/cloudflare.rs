use async_trait::async_trait;
use color_eyre::{Result, eyre::eyre};
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collectors::{
    CollectionResult, Collector, DiscoveredDomain, DiscoveredRecord, filters, normalize,
};
use crate::config::CloudflareConfig;
use crate::fetch_client::{FetchClient, FetchError};
use crate::types::ServiceType;

const SOURCE: &str = "Cloudflare";

/// Standard Cloudflare v4 response envelope for list endpoints.
#[derive(Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    result: Vec<Value>,
    #[serde(default)]
    result_info: Option<ResultInfo>,
    #[serde(default)]
    errors: Vec<Value>,
}

#[derive(Deserialize)]
struct ResultInfo {
    #[serde(default = "default_total_pages")]
    total_pages: u32,
}

fn default_total_pages() -> u32 {
    1
}

/// Daily DNS sweep of all Cloudflare zones. The API token is verified once
/// before enumeration; zones and records both use 1-based page numbers.
pub struct CloudflareDnsCollector {
    config: CloudflareConfig,
    fetch: FetchClient,
}

impl CloudflareDnsCollector {
    pub fn new(config: CloudflareConfig, fetch: FetchClient) -> Self {
        Self { config, fetch }
    }

    fn headers(&self) -> [(&'static str, String); 1] {
        [("Authorization", format!("Bearer {}", self.config.api_token))]
    }

    async fn verify_token(&self, cancel: &CancellationToken) -> std::result::Result<(), String> {
        let url = format!(
            "{}/user/tokens/verify",
            self.config.base_url.trim_end_matches('/')
        );

        match self
            .fetch
            .get_json::<Value>(&url, &self.headers(), cancel)
            .await
        {
            Ok(body) if body.get("success").and_then(Value::as_bool).unwrap_or(false) => Ok(()),
            Ok(body) => Err(format!(
                "Cloudflare token verification rejected: {}",
                body.get("errors").cloned().unwrap_or(Value::Null)
            )),
            Err(FetchError::Cancelled) => Err("cancelled".to_string()),
            Err(e) => Err(format!("Cloudflare token verification failed: {e}")),
        }
    }

    /// Collect every page of a list endpoint, iterating until the current
    /// page reaches the reported total.
    async fn fetch_pages(
        &self,
        path: &str,
        per_page: usize,
        cancel: &CancellationToken,
    ) -> std::result::Result<Vec<Value>, FetchError> {
        let base = self.config.base_url.trim_end_matches('/');
        let headers = self.headers();
        let mut entries = Vec::new();
        let mut page = 1u32;

        loop {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            let url = format!("{base}{path}?page={page}&per_page={per_page}");
            let envelope: Envelope = self.fetch.get_json(&url, &headers, cancel).await?;

            if !envelope.success {
                return Err(FetchError::ClientError {
                    status: 200,
                    body: format!(
                        "Cloudflare API error: {}",
                        serde_json::to_string(&envelope.errors).unwrap_or_default()
                    ),
                });
            }

            entries.extend(envelope.result);

            let total_pages = envelope
                .result_info
                .map(|info| info.total_pages)
                .unwrap_or(1);
            if page >= total_pages {
                break;
            }
            page += 1;
        }

        Ok(entries)
    }
}

#[async_trait]
impl Collector for CloudflareDnsCollector {
    fn name(&self) -> &str {
        "cloudflare_dns"
    }

    fn source(&self) -> &str {
        SOURCE
    }

    fn service_type(&self) -> ServiceType {
        ServiceType::DnsRecords
    }

    fn validate(&self) -> Result<()> {
        if self.config.api_token.is_empty() {
            return Err(eyre!("Cloudflare API token is not set"));
        }
        Ok(())
    }

    async fn collect(&self, cancel: &CancellationToken) -> CollectionResult {
        let mut result = CollectionResult::started();

        // A bad token must abort before any partial state is produced.
        if let Err(message) = self.verify_token(cancel).await {
            return result.fail(message);
        }

        let zones = match self
            .fetch_pages("/zones", self.config.zones_per_page, cancel)
            .await
        {
            Ok(zones) => zones,
            Err(FetchError::Cancelled) => return result.fail("cancelled"),
            Err(e) => return result.fail(format!("Cloudflare zone list failed: {e}")),
        };

        // The zone list is one atomic upstream sweep: every zone becomes a
        // domain observation even if its record fetch is later cut short.
        let mut swept_zones: Vec<(String, String)> = Vec::new();
        for zone in zones {
            let Some(zone_name) = zone.get("name").and_then(Value::as_str) else {
                warn!("Cloudflare zone entry without a name, skipping");
                continue;
            };
            let zone_name = zone_name.trim().to_lowercase();
            if filters::is_test_domain(&zone_name) {
                debug!("Skipping test zone {zone_name}");
                continue;
            }
            let Some(zone_id) = zone.get("id").and_then(Value::as_str) else {
                warn!("Cloudflare zone {zone_name} has no id, skipping");
                continue;
            };
            let zone_id = zone_id.to_string();

            result.domains.push(DiscoveredDomain {
                name: zone_name.clone(),
                expiry_date: None,
                raw_payload: Some(zone),
            });
            swept_zones.push((zone_id, zone_name));
        }

        for (zone_id, zone_name) in swept_zones {
            if cancel.is_cancelled() {
                return result.fail("cancelled");
            }

            match self
                .fetch_pages(
                    &format!("/zones/{zone_id}/dns_records"),
                    self.config.records_per_page,
                    cancel,
                )
                .await
            {
                Ok(entries) => {
                    debug!("{zone_name}: {} records", entries.len());
                    for entry in entries {
                        if let Some(record) = normalize_record(&zone_name, entry) {
                            result.dns_records.push(record);
                        }
                    }
                    result.checked_domains.push(zone_name);
                }
                Err(FetchError::QuotaExceeded) => {
                    warn!(
                        "Cloudflare quota exhausted at {zone_name}, stopping sweep with {} zones checked",
                        result.checked_domains.len()
                    );
                    break;
                }
                Err(FetchError::Cancelled) => return result.fail("cancelled"),
                Err(e) => {
                    warn!("Record fetch for zone {zone_name} failed: {e}, skipping zone");
                }
            }
        }

        info!(
            "Cloudflare sweep found {} records across {} zones",
            result.dns_records.len(),
            result.checked_domains.len()
        );
        result.finish()
    }
}

fn normalize_record(zone: &str, raw: Value) -> Option<DiscoveredRecord> {
    let name = raw.get("name").and_then(Value::as_str).map(str::to_string);
    let record_type = raw.get("type").and_then(Value::as_str).map(str::to_string);
    let data = raw
        .get("content")
        .and_then(Value::as_str)
        .map(str::to_string);

    let (Some(name), Some(record_type), Some(data)) = (name, record_type, data) else {
        warn!("Malformed Cloudflare record entry in zone {zone}, skipping");
        return None;
    };

    Some(DiscoveredRecord {
        parent_domain: zone.to_string(),
        subdomain: normalize::extract_subdomain(&name, zone),
        record_type: normalize::normalize_record_type(&record_type),
        data: data.trim().to_string(),
        ttl: raw.get("ttl").and_then(Value::as_i64).map(|v| v as i32),
        priority: raw.get("priority").and_then(Value::as_i64).map(|v| v as i32),
        raw_payload: Some(raw),
    })
}
