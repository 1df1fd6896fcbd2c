use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    body::Body,
    http::Response,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use tower_governor::{
    GovernorError, GovernorLayer, governor::GovernorConfigBuilder,
    key_extractor::SmartIpKeyExtractor,
};
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{AppState, api::*, api_response::*};

fn too_many_requests_error_handler(error: GovernorError) -> Response<Body> {
    match error {
        GovernorError::TooManyRequests { .. } => {
            tracing::warn!("Rate limit hit: {:?}", error);
            too_many_requests("Rate limit exceeded").into_response()
        }
        _ => {
            tracing::error!("Rate limit error: {:?}", error);
            internal_server_error("Rate limit error").into_response()
        }
    }
}

pub fn create_routes(state: Arc<AppState>) -> Router {
    // Rate limiting: 200 req/s sustained, burst of 100
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(5) // ~200 req/s
            .burst_size(100)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .unwrap(),
    );

    let governor_limiter = governor_config.limiter().clone();
    let interval = Duration::from_secs(60);

    // background task to clean up
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            tracing::debug!(
                "rate governor_limiter storage size: {}",
                governor_limiter.len()
            );
            governor_limiter.retain_recent();
        }
    });

    let swagger_routes =
        SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi());

    // Read endpoints carry the short-TTL byte cache.
    let inventory_routes = Router::new()
        .route("/domains", get(handle_get_domains))
        .route("/dns-records", get(handle_get_dns_records))
        .layer(middleware::from_fn_with_state(state.clone(), read_cache));

    let sync_routes = Router::new()
        .route("/sync/status", get(handle_sync_status))
        .route("/sync/status/{name}", get(handle_collector_sync_status))
        .route("/sync/trigger/{name}", post(handle_trigger_sync))
        .route("/sync/trigger-all", post(handle_trigger_sync_all))
        .route("/export", post(handle_export))
        .route("/scheduler/jobs", get(handle_scheduler_jobs));

    let health_route = Router::new().route("/health", get(handle_health));

    let api_routes = Router::new()
        .merge(inventory_routes)
        .merge(sync_routes)
        .merge(health_route)
        .layer(
            GovernorLayer::new(governor_config.clone())
                .error_handler(too_many_requests_error_handler),
        );

    Router::new()
        .merge(swagger_routes)
        .nest("/api/v1", api_routes)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
