use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use color_eyre::Result;
use tokio_util::sync::CancellationToken;

use crate::types::ServiceType;

mod cloudflare;
pub mod filters;
mod godaddy;
pub mod normalize;
mod registry;

pub use cloudflare::CloudflareDnsCollector;
pub use godaddy::{GoDaddyDnsCollector, GoDaddyDomainsCollector};
pub use registry::CollectorRegistry;

/// A domain as observed in one upstream sweep, before reconciliation.
#[derive(Debug, Clone)]
pub struct DiscoveredDomain {
    pub name: String,
    pub expiry_date: Option<NaiveDate>,
    /// The provider's original JSON object, stored verbatim.
    pub raw_payload: Option<serde_json::Value>,
}

/// A DNS record as observed in one upstream sweep. `subdomain` is empty for
/// the apex.
#[derive(Debug, Clone)]
pub struct DiscoveredRecord {
    pub parent_domain: String,
    pub subdomain: String,
    pub record_type: String,
    pub data: String,
    pub ttl: Option<i32>,
    pub priority: Option<i32>,
    pub raw_payload: Option<serde_json::Value>,
}

/// Outcome of one full collector sweep.
///
/// `checked_domains` lists the parent domains whose record sweep completed,
/// including domains that turned out to have zero records. The reconciler
/// scopes its DNS tombstone sweep to this set, so domains skipped by quota
/// exhaustion or per-domain errors are left untouched.
#[derive(Debug)]
pub struct CollectionResult {
    pub domains: Vec<DiscoveredDomain>,
    pub dns_records: Vec<DiscoveredRecord>,
    pub checked_domains: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Fatal sweep error. When set, the orchestrator records the run as
    /// failed and nothing is merged.
    pub error: Option<String>,
}

impl CollectionResult {
    pub fn started() -> Self {
        let now = Utc::now();
        Self {
            domains: Vec::new(),
            dns_records: Vec::new(),
            checked_domains: Vec::new(),
            started_at: now,
            finished_at: now,
            error: None,
        }
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self.finished_at = Utc::now();
        self
    }

    /// Total number of normalized items the sweep produced.
    pub fn found(&self) -> usize {
        self.domains.len() + self.dns_records.len()
    }
}

/// A pluggable upstream source of domains and/or DNS records.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Stable unique identifier, e.g. "godaddy_dns".
    fn name(&self) -> &str;

    /// Provider label used as the reconciliation identity key, e.g. "GoDaddy".
    fn source(&self) -> &str;

    fn service_type(&self) -> ServiceType;

    /// Check required credentials/config. Called once at registration.
    fn validate(&self) -> Result<()>;

    /// Perform one full sweep. Implementations check `cancel` between
    /// requests and between pages; a cancelled sweep returns a failed
    /// result with the message "cancelled".
    async fn collect(&self, cancel: &CancellationToken) -> CollectionResult;
}
