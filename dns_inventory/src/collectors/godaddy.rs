use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use color_eyre::{Result, eyre::eyre};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collectors::{
    CollectionResult, Collector, DiscoveredDomain, DiscoveredRecord, filters, normalize,
};
use crate::config::GoDaddyConfig;
use crate::fetch_client::{FetchClient, FetchError};
use crate::types::ServiceType;

const SOURCE: &str = "GoDaddy";

/// Weekly registrar sweep: domains only, marker-paginated.
pub struct GoDaddyDomainsCollector {
    config: GoDaddyConfig,
    fetch: FetchClient,
}

impl GoDaddyDomainsCollector {
    pub fn new(config: GoDaddyConfig, fetch: FetchClient) -> Self {
        Self { config, fetch }
    }
}

#[async_trait]
impl Collector for GoDaddyDomainsCollector {
    fn name(&self) -> &str {
        "godaddy_domains"
    }

    fn source(&self) -> &str {
        SOURCE
    }

    fn service_type(&self) -> ServiceType {
        ServiceType::Domains
    }

    fn validate(&self) -> Result<()> {
        validate_credentials(&self.config)
    }

    async fn collect(&self, cancel: &CancellationToken) -> CollectionResult {
        let mut result = CollectionResult::started();

        match sweep_domains(&self.config, &self.fetch, cancel).await {
            Ok(domains) => {
                info!("GoDaddy domain sweep found {} domains", domains.len());
                result.domains = domains;
                result.finish()
            }
            Err(FetchError::Cancelled) => result.fail("cancelled"),
            Err(e) => result.fail(format!("GoDaddy domain list failed: {e}")),
        }
    }
}

/// Daily DNS sweep: the domain enumeration plus an offset-paginated record
/// fetch per domain. Quota exhaustion stops the enumeration but keeps the
/// partial result.
pub struct GoDaddyDnsCollector {
    config: GoDaddyConfig,
    fetch: FetchClient,
}

impl GoDaddyDnsCollector {
    pub fn new(config: GoDaddyConfig, fetch: FetchClient) -> Self {
        Self { config, fetch }
    }
}

#[async_trait]
impl Collector for GoDaddyDnsCollector {
    fn name(&self) -> &str {
        "godaddy_dns"
    }

    fn source(&self) -> &str {
        SOURCE
    }

    fn service_type(&self) -> ServiceType {
        ServiceType::DnsRecords
    }

    fn validate(&self) -> Result<()> {
        validate_credentials(&self.config)
    }

    async fn collect(&self, cancel: &CancellationToken) -> CollectionResult {
        let mut result = CollectionResult::started();

        let domains = match sweep_domains(&self.config, &self.fetch, cancel).await {
            Ok(domains) => domains,
            Err(FetchError::Cancelled) => return result.fail("cancelled"),
            Err(e) => return result.fail(format!("GoDaddy domain list failed: {e}")),
        };

        for domain in &domains {
            if cancel.is_cancelled() {
                return result.fail("cancelled");
            }

            match sweep_records(&self.config, &self.fetch, &domain.name, cancel).await {
                Ok(records) => {
                    debug!("{}: {} records", domain.name, records.len());
                    result.dns_records.extend(records);
                    result.checked_domains.push(domain.name.clone());
                }
                Err(FetchError::QuotaExceeded) => {
                    warn!(
                        "GoDaddy quota exhausted at {}, stopping sweep with {} of {} domains checked",
                        domain.name,
                        result.checked_domains.len(),
                        domains.len()
                    );
                    break;
                }
                Err(FetchError::Cancelled) => return result.fail("cancelled"),
                Err(FetchError::NotFound) => {
                    debug!("Domain {} not found upstream, skipping", domain.name);
                }
                Err(e) => {
                    warn!("Record fetch for {} failed: {e}, skipping domain", domain.name);
                }
            }
        }

        info!(
            "GoDaddy DNS sweep found {} records across {} domains",
            result.dns_records.len(),
            result.checked_domains.len()
        );
        result.domains = domains;
        result.finish()
    }
}

fn validate_credentials(config: &GoDaddyConfig) -> Result<()> {
    if config.api_key.is_empty() || config.api_secret.is_empty() {
        return Err(eyre!("GoDaddy API key/secret are not set"));
    }
    Ok(())
}

fn auth_header(config: &GoDaddyConfig) -> (&'static str, String) {
    (
        "Authorization",
        format!("sso-key {}:{}", config.api_key, config.api_secret),
    )
}

/// Enumerate all domains with marker pagination: each page is requested
/// with the last domain of the previous page as the marker, and a short
/// page terminates the sweep.
async fn sweep_domains(
    config: &GoDaddyConfig,
    fetch: &FetchClient,
    cancel: &CancellationToken,
) -> Result<Vec<DiscoveredDomain>, FetchError> {
    let headers = [auth_header(config)];
    let base = config.base_url.trim_end_matches('/');
    let mut domains = Vec::new();
    let mut marker: Option<String> = None;

    loop {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let mut url = format!("{base}/v1/domains?limit={}", config.domains_limit);
        if let Some(marker) = &marker {
            url.push_str(&format!("&marker={}", urlencoding::encode(marker)));
        }

        let page: Vec<Value> = fetch.get_json(&url, &headers, cancel).await?;
        let short_page = page.len() < config.domains_limit;
        marker = page
            .last()
            .and_then(|entry| entry.get("domain"))
            .and_then(Value::as_str)
            .map(str::to_string);

        for entry in page {
            let Some(name) = entry.get("domain").and_then(Value::as_str) else {
                warn!("GoDaddy domain entry without a name, skipping");
                continue;
            };
            let name = name.trim().to_lowercase();
            if filters::is_test_domain(&name) {
                debug!("Skipping test domain {name}");
                continue;
            }
            let expiry_date = parse_expiry(&entry);
            domains.push(DiscoveredDomain {
                name,
                expiry_date,
                raw_payload: Some(entry),
            });
        }

        if short_page || marker.is_none() {
            break;
        }
    }

    Ok(domains)
}

/// Fetch all records of one domain with offset pagination; a short page
/// terminates.
async fn sweep_records(
    config: &GoDaddyConfig,
    fetch: &FetchClient,
    domain: &str,
    cancel: &CancellationToken,
) -> Result<Vec<DiscoveredRecord>, FetchError> {
    let headers = [auth_header(config)];
    let base = config.base_url.trim_end_matches('/');
    let mut records = Vec::new();
    let mut offset = 0usize;

    loop {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let url = format!(
            "{base}/v1/domains/{}/records?limit={}&offset={offset}",
            urlencoding::encode(domain),
            config.records_limit,
        );
        let page: Vec<Value> = fetch.get_json(&url, &headers, cancel).await?;
        let page_len = page.len();

        for entry in page {
            if let Some(record) = normalize_record(domain, entry) {
                records.push(record);
            }
        }

        if page_len < config.records_limit {
            break;
        }
        offset += config.records_limit;
    }

    Ok(records)
}

fn normalize_record(parent: &str, raw: Value) -> Option<DiscoveredRecord> {
    let name = raw.get("name").and_then(Value::as_str).map(str::to_string);
    let record_type = raw.get("type").and_then(Value::as_str).map(str::to_string);
    let data = raw.get("data").and_then(Value::as_str).map(str::to_string);

    let (Some(name), Some(record_type), Some(data)) = (name, record_type, data) else {
        warn!("Malformed GoDaddy record entry for {parent}, skipping");
        return None;
    };

    Some(DiscoveredRecord {
        parent_domain: parent.to_string(),
        subdomain: normalize::normalize_subdomain(&name),
        record_type: normalize::normalize_record_type(&record_type),
        data: data.trim().to_string(),
        ttl: raw.get("ttl").and_then(Value::as_i64).map(|v| v as i32),
        priority: raw.get("priority").and_then(Value::as_i64).map(|v| v as i32),
        raw_payload: Some(raw),
    })
}

fn parse_expiry(entry: &Value) -> Option<NaiveDate> {
    let raw = entry.get("expires")?.as_str()?;
    raw.parse::<DateTime<Utc>>()
        .map(|ts| ts.date_naive())
        .ok()
        .or_else(|| raw.get(..10)?.parse::<NaiveDate>().ok())
}
