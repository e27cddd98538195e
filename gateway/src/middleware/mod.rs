//! Auth and rate-limit middleware, run as axum `from_fn_with_state` layers
//! ahead of the `/api/v1` routes. Grounded in the teacher's
//! `jwt_auth_middleware` shape — decode the bearer token, insert the
//! extracted identity into request extensions — generalized to insert an
//! opaque `owner_id` instead of a looked-up `User` row, since this core has
//! no user record (spec §1: authentication is an external collaborator).

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use lore_anchor_shared::error::CoreError;

use crate::error::AppError;
use crate::state::AppState;

/// Extractor for the `owner_id` inserted by `auth_middleware`.
pub struct OwnerId(pub String);

impl<S> FromRequestParts<S> for OwnerId
where
    S: Send + Sync + 'static,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<OwnerId>()
            .map(|o| OwnerId(o.0.clone()))
            .ok_or_else(|| AppError(CoreError::Unauthenticated))
    }
}

impl Clone for OwnerId {
    fn clone(&self) -> Self {
        OwnerId(self.0.clone())
    }
}

/// Decode the `Authorization: Bearer <token>` header and insert the
/// verified `owner_id` into request extensions. Spec §6: "missing/invalid
/// token -> 401."
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();

    let token = parts
        .headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string);

    let token = token.ok_or(AppError(CoreError::Unauthenticated))?;
    let owner_id = state.auth.verify(&token)?;
    parts.extensions.insert(OwnerId(owner_id));

    let req = Request::from_parts(parts, body);
    Ok(next.run(req).await)
}

/// Extract the caller's source IP for rate limiting, preferring
/// `X-Forwarded-For` (first hop) and falling back to the connection's
/// socket address when the request arrives directly (e.g. in tests).
pub fn source_ip(parts: &Parts) -> String {
    parts
        .headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split(',').next())
        .map(|s| s.trim().to_string())
        .or_else(|| {
            parts
                .extensions
                .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
                .map(|ci| ci.0.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Per-IP token-bucket rate limit for upload-class endpoints (spec §4.1:
/// 10 uploads/minute).
pub async fn upload_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let (parts, body) = req.into_parts();
    let ip = source_ip(&parts);
    if !state.upload_rate_limiter.check(&ip).await {
        return Err(AppError(CoreError::RateLimited));
    }
    let req = Request::from_parts(parts, body);
    Ok(next.run(req).await)
}

/// Per-IP token-bucket rate limit for read-class endpoints (spec §4.1:
/// 60 reads/minute).
pub async fn read_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let (parts, body) = req.into_parts();
    let ip = source_ip(&parts);
    if !state.read_rate_limiter.check(&ip).await {
        return Err(AppError(CoreError::RateLimited));
    }
    let req = Request::from_parts(parts, body);
    Ok(next.run(req).await)
}
