use utoipa::OpenApi;

use crate::api::*;
use crate::api_response::ErrorResponse;
use crate::background::{CollectorStatus, JobInfo};
use crate::repository::{DnsRecordRow, DomainRow, SyncRunRow};
use crate::types::{AssetStatus, ServiceType, SyncStats, SyncStatus, TriggerType};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "DNS Inventory",
        description = r#"
Multi-source DNS asset inventory engine.

Collectors poll upstream registrar/DNS provider APIs (GoDaddy, Cloudflare),
and a transactional reconciler maintains a durable inventory with discovery
history and tombstones for removed assets. The inventory is served here and
exported as static JSON snapshots for the dashboard.

### Asset lifecycle
 - **active** - present in the most recent successful sweep for its source
 - **removed** - absent from the most recent successful sweep (tombstoned);
   `discovery_date` and `last_seen` keep the provenance
        "#,
        version = "1.0.0"
    ),
    paths(
        handle_health,
        handle_sync_status,
        handle_collector_sync_status,
        handle_trigger_sync,
        handle_trigger_sync_all,
        handle_get_domains,
        handle_get_dns_records,
        handle_export,
        handle_scheduler_jobs,
    ),
    components(
        schemas(
            // Inventory
            DomainRow,
            DnsRecordRow,
            AssetStatus,

            // Sync
            SyncRunRow,
            SyncStats,
            SyncStatus,
            ServiceType,
            TriggerType,
            SyncStatusResponse,
            CollectorStatus,
            TriggerResponse,
            TriggerAllResponse,

            // Scheduler
            JobInfo,
            SchedulerJobsResponse,

            // misc
            HealthResponse,
            ExportResponse,
            ErrorResponse,
        ),
    ),
    tags(
        (name = "Inventory", description = "Reconciled domain and DNS record views"),
        (name = "Sync", description = "Sync runs, triggers and scheduling"),
        (name = "System", description = "Health and diagnostics"),
    )
)]
pub struct ApiDoc;
