use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{Path, State},
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::{IntoParams, ToSchema};

use crate::background::{CollectorStatus, TriggerOutcome};
use crate::repository::SyncRunRow;
use crate::{AppState, api_response::*};

#[derive(Deserialize, ToSchema, IntoParams)]
pub struct CollectorPath {
    pub name: String,
}

#[derive(Serialize, ToSchema)]
pub struct SyncStatusResponse {
    pub collectors: Vec<SyncRunRow>,
}

#[derive(Serialize, ToSchema)]
pub struct TriggerResponse {
    pub status: String,
}

#[derive(Serialize, ToSchema)]
pub struct TriggerAllResponse {
    pub status: String,
    pub collectors: usize,
}

/// Latest sync run per collector.
#[utoipa::path(
    get,
    path = "/api/v1/sync/status",
    responses(
        (status = 200, description = "Latest run per collector", body = SyncStatusResponse),
        (status = 500, description = "Internal Server Error", body = ErrorResponse),
    ),
    tags = ["Sync"],
)]
#[debug_handler]
pub async fn handle_sync_status(
    State(state): State<Arc<AppState>>,
) -> Result<ApiResponse<SyncStatusResponse>, ApiResponse<()>> {
    let collectors = state.scheduler.status_all().await.map_err(|e| {
        error!("Failed to load sync status: {e:#}");
        internal_server_error("Failed to load sync status")
    })?;

    Ok(ok_response(SyncStatusResponse { collectors }))
}

/// Detailed status for one collector.
#[utoipa::path(
    get,
    path = "/api/v1/sync/status/{name}",
    params(CollectorPath),
    responses(
        (status = 200, description = "Collector status", body = CollectorStatus),
        (status = 404, description = "Unknown collector", body = ErrorResponse),
        (status = 500, description = "Internal Server Error", body = ErrorResponse),
    ),
    tags = ["Sync"],
)]
#[debug_handler]
pub async fn handle_collector_sync_status(
    State(state): State<Arc<AppState>>,
    WithRejection(Path(path), _): WithRejection<Path<CollectorPath>, ApiResponse<ErrorResponse>>,
) -> Result<ApiResponse<CollectorStatus>, ApiResponse<()>> {
    let status = state
        .scheduler
        .collector_status(&path.name)
        .await
        .map_err(|e| {
            error!("Failed to load status for {}: {e:#}", path.name);
            internal_server_error("Failed to load collector status")
        })?;

    match status {
        Some(status) => Ok(ok_response(status)),
        None => Err(not_found(format!("Unknown collector: {}", path.name))),
    }
}

/// Start a sync for one collector.
#[utoipa::path(
    post,
    path = "/api/v1/sync/trigger/{name}",
    params(CollectorPath),
    responses(
        (status = 202, description = "Sync started", body = TriggerResponse),
        (status = 409, description = "Sync already running", body = TriggerResponse),
        (status = 400, description = "Unknown collector", body = ErrorResponse),
        (status = 500, description = "Internal Server Error", body = ErrorResponse),
    ),
    tags = ["Sync"],
)]
#[debug_handler]
pub async fn handle_trigger_sync(
    State(state): State<Arc<AppState>>,
    WithRejection(Path(path), _): WithRejection<Path<CollectorPath>, ApiResponse<ErrorResponse>>,
) -> Result<ApiResponse<TriggerResponse>, ApiResponse<()>> {
    let outcome = state.scheduler.trigger_sync(&path.name).await.map_err(|e| {
        error!("Failed to trigger sync for {}: {e:#}", path.name);
        internal_server_error("Failed to trigger sync")
    })?;

    match outcome {
        TriggerOutcome::Started => Ok(accepted(TriggerResponse {
            status: "started".to_string(),
        })),
        TriggerOutcome::AlreadyRunning => Ok(conflict(TriggerResponse {
            status: "already_running".to_string(),
        })),
        TriggerOutcome::UnknownCollector => {
            Err(bad_request(format!("Unknown collector: {}", path.name)))
        }
    }
}

/// Start a sync for every registered collector.
#[utoipa::path(
    post,
    path = "/api/v1/sync/trigger-all",
    responses(
        (status = 202, description = "Syncs started", body = TriggerAllResponse),
    ),
    tags = ["Sync"],
)]
#[debug_handler]
pub async fn handle_trigger_sync_all(
    State(state): State<Arc<AppState>>,
) -> ApiResponse<TriggerAllResponse> {
    let collectors = state.scheduler.trigger_sync_all();

    accepted(TriggerAllResponse {
        status: "started".to_string(),
        collectors,
    })
}
