//! Router assembly for the Ingest Gateway. Grounded in the teacher's
//! `create_app` (`main.rs`): a nested `/api/v1` router with auth applied
//! via `from_fn_with_state` as a layer, plus `TraceLayer` and a
//! configurable `CorsLayer` wrapping the whole thing.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::middleware::from_fn_with_state;
use axum::routing::{IntoMakeServiceWithConnectInfo, get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::{auth_middleware, read_rate_limit_middleware, upload_rate_limit_middleware};
use crate::state::AppState;
use crate::validation::MAX_UPLOAD_BYTES;

/// Slack above `MAX_UPLOAD_BYTES` for multipart boundary/header overhead —
/// the handler's own `read_file_field` check against `MAX_UPLOAD_BYTES` is
/// still the authoritative `TooLarge` boundary (spec §8); this only has to
/// be generous enough that axum's body limit never trips before it does.
const BODY_LIMIT_SLACK_BYTES: usize = 64 * 1024;

pub fn create_app(
    state: Arc<AppState>,
) -> IntoMakeServiceWithConnectInfo<Router, SocketAddr> {
    let upload_routes = Router::new()
        .route("/images/upload", post(handlers::upload))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + BODY_LIMIT_SLACK_BYTES))
        .layer(from_fn_with_state(state.clone(), upload_rate_limit_middleware));

    let read_and_write_routes = Router::new()
        .route("/images/", get(handlers::list))
        .route("/images/{image_id}", get(handlers::get).delete(handlers::delete))
        .route("/images/{image_id}/downloaded", post(handlers::track_download))
        .route("/tasks/{image_id}/status", get(handlers::task_status))
        .route("/tasks/{image_id}/retry", post(handlers::retry))
        .layer(from_fn_with_state(state.clone(), read_rate_limit_middleware));

    let api = Router::new()
        .merge(upload_routes)
        .merge(read_and_write_routes)
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    let cors = build_cors(&state.config.cors_allowed_origins);

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .into_make_service_with_connect_info::<SocketAddr>()
}

/// The teacher's `Any`-everywhere `CorsLayer` is its permissive dev
/// default; a configured allowlist takes precedence (spec.md SPEC_FULL.md
/// §2 "CORS allowlist").
fn build_cors(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        log::warn!("[cors] CORS_ALLOWED_ORIGINS not set, allowing any origin (dev default)");
        return CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| o.parse::<HeaderValue>().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}
