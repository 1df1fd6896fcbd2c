use std::sync::Arc;

use axum::{debug_handler, extract::State};
use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use crate::{AppState, api_response::*};

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Service health, including a database ping.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Service health", body = HealthResponse),
    ),
    tags = ["System"],
)]
#[debug_handler]
pub async fn handle_health(State(state): State<Arc<AppState>>) -> ApiResponse<HealthResponse> {
    // "degraded" still answers 200: load balancers treat non-2xx as dead.
    let status = match sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.pool)
        .await
    {
        Ok(_) => "healthy",
        Err(e) => {
            warn!("Health check database ping failed: {e}");
            "degraded"
        }
    };

    ok_response(HealthResponse {
        status: status.to_string(),
    })
}
