use std::sync::Arc;

use axum::{debug_handler, extract::State};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::{AppState, api_response::*};

#[derive(Serialize, ToSchema)]
pub struct ExportResponse {
    pub status: String,
}

/// Write the JSON snapshot files from the current inventory.
#[utoipa::path(
    post,
    path = "/api/v1/export",
    responses(
        (status = 200, description = "Snapshots written", body = ExportResponse),
        (status = 500, description = "Exporter error", body = ErrorResponse),
    ),
    tags = ["Inventory"],
)]
#[debug_handler]
pub async fn handle_export(
    State(state): State<Arc<AppState>>,
) -> Result<ApiResponse<ExportResponse>, ApiResponse<()>> {
    state.exporter.export_all().await.map_err(|e| {
        error!("Manual export failed: {e:#}");
        internal_server_error(format!("Export failed: {e}"))
    })?;

    Ok(ok_response(ExportResponse {
        status: "completed".to_string(),
    }))
}
