#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
};
use axum_test::TestServer;
use sqlx::PgPool;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use dns_inventory::{
    AppState, Arc, AtomicUsize, Cache,
    background::SyncScheduler,
    collectors::{CollectorRegistry, GoDaddyDnsCollector, GoDaddyDomainsCollector},
    config::{Config, SchedulerConfig},
    fetch_client::FetchClient,
    repository::{DnsRecordRepository, DomainRepository, SyncRunRepository, SyncRunRow},
    services::{LockManager, Reconciler, SnapshotExporter, SyncOrchestrator},
    types::SyncStatus,
};

use super::mock_servers::MockUpstreams;

pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub sync_run_repo: SyncRunRepository,
    pub shutdown: CancellationToken,
    pub output_dir: TempDir,
}

async fn inject_socket_addr(mut request: Request, next: Next) -> Response {
    let mock_addr = SocketAddr::from(([127, 0, 0, 1], 8080));
    request.extensions_mut().insert(mock_addr);
    next.run(request).await
}

pub async fn create_test_app(pool: &PgPool, mocks: &MockUpstreams) -> TestApp {
    let output_dir = tempfile::tempdir().expect("Failed to create export dir");
    let config = Arc::new(Config::new_for_test(
        Some(mocks.godaddy_url()),
        None,
        output_dir.path().to_path_buf(),
    ));

    let fetch = FetchClient::new(config.fetch.clone()).expect("Failed to build fetch client");
    let godaddy = config.godaddy.clone().expect("test config has GoDaddy");

    let mut registry = CollectorRegistry::new();
    registry
        .register(Arc::new(GoDaddyDomainsCollector::new(
            godaddy.clone(),
            fetch.clone(),
        )))
        .expect("register godaddy_domains");
    registry
        .register(Arc::new(GoDaddyDnsCollector::new(godaddy, fetch)))
        .expect("register godaddy_dns");
    let registry = Arc::new(registry);

    let pool = pool.clone();
    let sync_run_repo = SyncRunRepository::new(pool.clone());
    let locks = Arc::new(LockManager::new(sync_run_repo.clone()));
    let reconciler = Arc::new(Reconciler::new(pool.clone()));
    let exporter = Arc::new(SnapshotExporter::new(
        DomainRepository::new(pool.clone()),
        DnsRecordRepository::new(pool.clone()),
        config.json_output_dir.clone(),
    ));

    let shutdown = CancellationToken::new();
    let orchestrator = Arc::new(SyncOrchestrator::new(
        locks.clone(),
        reconciler,
        exporter.clone(),
        shutdown.clone(),
    ));
    let scheduler = Arc::new(SyncScheduler::new(
        registry,
        orchestrator,
        locks,
        sync_run_repo.clone(),
        SchedulerConfig {
            enabled: false,
            ..Default::default()
        },
    ));

    let state = Arc::new(AppState {
        domain_repo: Arc::new(DomainRepository::new(pool.clone())),
        dns_record_repo: Arc::new(DnsRecordRepository::new(pool.clone())),
        pool,
        config,
        scheduler,
        exporter,
        active_requests: Arc::new(AtomicUsize::new(0)),
        cache: Cache::builder()
            .time_to_live(Duration::from_millis(100))
            .build(),
    });

    let app = dns_inventory::routes::create_routes(state.clone())
        .layer(middleware::from_fn(inject_socket_addr));
    let server = TestServer::new(app).expect("Failed to create test server");

    TestApp {
        server,
        state,
        sync_run_repo,
        shutdown,
        output_dir,
    }
}

/// Poll until the collector's latest run reaches `status`.
pub async fn wait_for_run_status(
    repo: &SyncRunRepository,
    collector_name: &str,
    status: SyncStatus,
) -> SyncRunRow {
    for _ in 0..200 {
        if let Some(run) = repo
            .latest_for(collector_name)
            .await
            .expect("Failed to query latest run")
        {
            if run.status == status {
                return run;
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("Timed out waiting for {collector_name} to reach {status}");
}
