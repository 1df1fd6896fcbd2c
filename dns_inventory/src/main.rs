use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
};
use color_eyre::{Result, eyre::eyre};
use sqlx::postgres::PgPoolOptions;
use tokio::{
    net::TcpListener,
    signal::unix::{SignalKind, signal},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use dns_inventory::{
    AppState, Cache,
    background::SyncScheduler,
    collectors::{
        CloudflareDnsCollector, Collector, CollectorRegistry, GoDaddyDnsCollector,
        GoDaddyDomainsCollector,
    },
    config::Config,
    fetch_client::FetchClient,
    repository::{DnsRecordRepository, DomainRepository, SyncRunRepository},
    routes,
    services::{LockManager, Reconciler, SnapshotExporter, SyncOrchestrator},
};

const RESPONSE_CACHE_TTL: Duration = Duration::from_secs(60);

/// Active requests counter middleware.
/// Keeps track of the number of active requests.
/// The counter is used to gracefully shutdown the server.
async fn request_counter(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    state.active_requests.fetch_add(1, Ordering::SeqCst);
    let response = next.run(request).await;
    state.active_requests.fetch_sub(1, Ordering::SeqCst);

    response
}

fn build_registry(config: &Config, fetch: &FetchClient) -> Result<CollectorRegistry> {
    let mut registry = CollectorRegistry::new();

    if let Some(godaddy) = config.godaddy.clone() {
        let collectors: [Arc<dyn Collector>; 2] = [
            Arc::new(GoDaddyDomainsCollector::new(godaddy.clone(), fetch.clone())),
            Arc::new(GoDaddyDnsCollector::new(godaddy, fetch.clone())),
        ];
        for collector in collectors {
            if let Err(e) = registry.register(collector) {
                // A misconfigured collector is skipped, not fatal.
                warn!("Skipping collector: {e:#}");
            }
        }
    }
    if let Some(cloudflare) = config.cloudflare.clone() {
        if let Err(e) = registry.register(Arc::new(CloudflareDnsCollector::new(
            cloudflare,
            fetch.clone(),
        ))) {
            warn!("Skipping collector: {e:#}");
        }
    }

    if registry.is_empty() {
        return Err(eyre!(
            "No collectors could be registered; check provider credentials"
        ));
    }

    Ok(registry)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    let config = Arc::new(Config::new_from_env()?);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or(EnvFilter::new(config.log_level.clone())),
        )
        .init();

    info!("DNS inventory engine is starting...");

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(config.database_max_idle)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let fetch = FetchClient::new(config.fetch.clone())?;
    let registry = Arc::new(build_registry(&config, &fetch)?);

    let domain_repo = Arc::new(DomainRepository::new(pool.clone()));
    let dns_record_repo = Arc::new(DnsRecordRepository::new(pool.clone()));
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
        reconciler.clone(),
        exporter.clone(),
        shutdown.clone(),
    ));
    let scheduler = Arc::new(SyncScheduler::new(
        registry.clone(),
        orchestrator,
        locks,
        sync_run_repo,
        config.scheduler.clone(),
    ));

    let scheduler_handle = tokio::spawn(scheduler.clone().start(shutdown.clone()));

    let active_requests = Arc::new(AtomicUsize::new(0));
    let app_state = Arc::new(AppState {
        pool: pool.clone(),
        config: config.clone(),
        domain_repo,
        dns_record_repo,
        scheduler,
        exporter,
        active_requests: active_requests.clone(),
        cache: Cache::builder().time_to_live(RESPONSE_CACHE_TTL).build(),
    });

    let app = routes::create_routes(app_state.clone()).layer(middleware::from_fn_with_state(
        app_state.clone(),
        request_counter,
    ));

    let server_addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&server_addr).await?;
    info!("Listening on {server_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(active_requests, shutdown.clone()))
        .await?;

    // Bounded wait for background syncs to observe the cancellation and
    // release their locks.
    if let Err(e) = tokio::time::timeout(Duration::from_secs(2), scheduler_handle).await {
        warn!("Scheduler did not stop within the shutdown window: {e}");
    }

    info!("DNS inventory engine shut down gracefully");

    Ok(())
}

async fn shutdown_signal(active_requests: Arc<AtomicUsize>, shutdown: CancellationToken) {
    let mut sigint = signal(SignalKind::interrupt()).expect("SIGINT signal handler failed");
    let mut sigterm = signal(SignalKind::terminate()).expect("SIGTERM signal handler failed");

    tokio::select! {
        _ = sigint.recv() => {
            info!("Received SIGINT signal, shutting down...");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM signal, shutting down...");
        }
    }

    shutdown.cancel();

    while active_requests.load(Ordering::SeqCst) > 0 {
        debug!(
            "Waiting for {} active requests to finish...",
            active_requests.load(Ordering::SeqCst)
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    info!("All active requests have been completed");
}
