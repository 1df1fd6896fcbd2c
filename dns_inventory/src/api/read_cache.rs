use std::sync::Arc;

use axum::{
    body::{self, Body, Bytes},
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

use crate::AppState;

/// Short-TTL cache in front of the inventory read endpoints. The inventory
/// only changes when a sync commits, so briefly stale reads are fine (the
/// JSON snapshots are already advisory). Bodies are cached as the raw bytes
/// that went over the wire, so a hit skips both the repository query and
/// the re-serialization.
pub async fn read_cache(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let key = format!(
        "{}?{}",
        req.uri().path(),
        req.uri().query().unwrap_or_default()
    );

    if let Some(cached) = state.cache.get(&key).await {
        debug!("inventory cache hit: {key}");
        return cached_json(cached);
    }

    let response = next.run(req).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let (parts, response_body) = response.into_parts();
    let bytes = match body::to_bytes(response_body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Failed to buffer inventory response for caching: {e}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    state.cache.insert(key, bytes.clone()).await;
    Response::from_parts(parts, Body::from(bytes))
}

fn cached_json(body: Bytes) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}
