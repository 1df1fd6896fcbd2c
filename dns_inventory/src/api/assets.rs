use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{Query, State},
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use tracing::error;
use utoipa::IntoParams;

use crate::repository::{DnsRecordRow, DomainRow};
use crate::types::AssetStatus;
use crate::{AppState, api_response::*};

#[derive(Deserialize, IntoParams)]
pub struct DomainsQuery {
    pub status: Option<String>,
    pub source: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct DnsRecordsQuery {
    pub status: Option<String>,
    pub source: Option<String>,
    pub domain: Option<String>,
}

fn parse_status(raw: Option<&str>) -> Result<Option<AssetStatus>, ApiResponse<()>> {
    raw.map(|s| s.parse::<AssetStatus>())
        .transpose()
        .map_err(|_| bad_request("Invalid status filter: expected 'active' or 'removed'"))
}

/// List inventory domains, optionally filtered by status and source.
#[utoipa::path(
    get,
    path = "/api/v1/domains",
    params(DomainsQuery),
    responses(
        (status = 200, description = "Domains ordered by name", body = [DomainRow]),
        (status = 400, description = "Bad Request", body = ErrorResponse),
        (status = 500, description = "Internal Server Error", body = ErrorResponse),
    ),
    tags = ["Inventory"],
)]
#[debug_handler]
pub async fn handle_get_domains(
    State(state): State<Arc<AppState>>,
    WithRejection(Query(query), _): WithRejection<Query<DomainsQuery>, ApiResponse<ErrorResponse>>,
) -> Result<ApiResponse<Vec<DomainRow>>, ApiResponse<()>> {
    let status = parse_status(query.status.as_deref())?;

    let domains = state
        .domain_repo
        .get_domains(status, query.source.as_deref())
        .await
        .map_err(|e| {
            error!("Failed to query domains: {e:#}");
            internal_server_error("Failed to query domains")
        })?;

    Ok(ok_response(domains))
}

/// List DNS records, optionally filtered by status, source and parent domain.
#[utoipa::path(
    get,
    path = "/api/v1/dns-records",
    params(DnsRecordsQuery),
    responses(
        (status = 200, description = "Records ordered by (parent, subdomain)", body = [DnsRecordRow]),
        (status = 400, description = "Bad Request", body = ErrorResponse),
        (status = 500, description = "Internal Server Error", body = ErrorResponse),
    ),
    tags = ["Inventory"],
)]
#[debug_handler]
pub async fn handle_get_dns_records(
    State(state): State<Arc<AppState>>,
    WithRejection(Query(query), _): WithRejection<
        Query<DnsRecordsQuery>,
        ApiResponse<ErrorResponse>,
    >,
) -> Result<ApiResponse<Vec<DnsRecordRow>>, ApiResponse<()>> {
    let status = parse_status(query.status.as_deref())?;

    let records = state
        .dns_record_repo
        .get_dns_records(status, query.source.as_deref(), query.domain.as_deref())
        .await
        .map_err(|e| {
            error!("Failed to query DNS records: {e:#}");
            internal_server_error("Failed to query DNS records")
        })?;

    Ok(ok_response(records))
}
