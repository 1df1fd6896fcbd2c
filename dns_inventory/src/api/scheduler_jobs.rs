use std::sync::Arc;

use axum::{debug_handler, extract::State};
use serde::Serialize;
use utoipa::ToSchema;

use crate::background::JobInfo;
use crate::{AppState, api_response::*};

#[derive(Serialize, ToSchema)]
pub struct SchedulerJobsResponse {
    pub jobs: Vec<JobInfo>,
}

/// Registered cron jobs with their next and previous fire times.
#[utoipa::path(
    get,
    path = "/api/v1/scheduler/jobs",
    responses(
        (status = 200, description = "Registered jobs", body = SchedulerJobsResponse),
    ),
    tags = ["Sync"],
)]
#[debug_handler]
pub async fn handle_scheduler_jobs(
    State(state): State<Arc<AppState>>,
) -> ApiResponse<SchedulerJobsResponse> {
    ok_response(SchedulerJobsResponse {
        jobs: state.scheduler.jobs_snapshot(),
    })
}
