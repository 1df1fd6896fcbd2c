/// lib exports for integration testing
/// separated to simulate real api call: http request -> api handler -> service -> repo -> db
pub use moka::future::Cache;
pub use std::sync::{Arc, atomic::AtomicUsize};

pub mod api;
pub mod api_response;
pub mod background;
pub mod collectors;
pub mod config;
pub mod fetch_client;
pub mod repository;
pub mod routes;
pub mod services;
pub mod types;

use axum::body::Bytes;
use sqlx::PgPool;

pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<config::Config>,
    pub domain_repo: Arc<repository::DomainRepository>,
    pub dns_record_repo: Arc<repository::DnsRecordRepository>,
    pub scheduler: Arc<background::SyncScheduler>,
    pub exporter: Arc<services::SnapshotExporter>,
    pub active_requests: Arc<AtomicUsize>,
    pub cache: Cache<String, Bytes>,
}
