use std::sync::Arc;

use color_eyre::{Result, eyre::WrapErr, eyre::eyre};
use tracing::info;

use crate::collectors::Collector;
use crate::types::ServiceType;

/// Name-indexed set of collectors. Registrations happen during startup;
/// the registry is then shared immutably behind an `Arc`.
#[derive(Default)]
pub struct CollectorRegistry {
    collectors: Vec<Arc<dyn Collector>>,
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a collector, failing on a name collision or a failed
    /// credential/config validation.
    pub fn register(&mut self, collector: Arc<dyn Collector>) -> Result<()> {
        if self.get(collector.name()).is_some() {
            return Err(eyre!("Collector {} is already registered", collector.name()));
        }
        collector
            .validate()
            .wrap_err_with(|| format!("Collector {} failed validation", collector.name()))?;

        info!(
            "Registered collector {} (source={}, type={})",
            collector.name(),
            collector.source(),
            collector.service_type()
        );
        self.collectors.push(collector);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Collector>> {
        self.collectors.iter().find(|c| c.name() == name).cloned()
    }

    pub fn by_service_type(&self, service_type: ServiceType) -> Vec<Arc<dyn Collector>> {
        self.collectors
            .iter()
            .filter(|c| c.service_type() == service_type)
            .cloned()
            .collect()
    }

    pub fn by_source(&self, source: &str) -> Vec<Arc<dyn Collector>> {
        self.collectors
            .iter()
            .filter(|c| c.source() == source)
            .cloned()
            .collect()
    }

    pub fn all(&self) -> &[Arc<dyn Collector>] {
        &self.collectors
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }
}
