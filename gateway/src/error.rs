//! HTTP error mapping for the Ingest Gateway. Spec §7.
//!
//! Wraps the shared `CoreError` taxonomy the way the teacher's `errors.rs`
//! wraps its own `AppError`: a status-code match plus a single JSON
//! `{"message": ...}` body, with the error logged via `log::warn!` before
//! being returned. Detail is suppressed in production mode (spec §7
//! "User-visible behaviour": "a single non-leaking error string") — only
//! `Internal` and `DependencyUnavailable` are generalized to a fixed string.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lore_anchor_shared::error::CoreError;
use serde::Serialize;

#[derive(Debug)]
pub struct AppError(pub CoreError);

impl From<CoreError> for AppError {
    fn from(e: CoreError) -> Self {
        AppError(e)
    }
}

impl From<lore_anchor_shared::catalog::CatalogError> for AppError {
    fn from(e: lore_anchor_shared::catalog::CatalogError) -> Self {
        use lore_anchor_shared::catalog::CatalogError as CE;
        match e {
            CE::ImageNotFound | CE::TaskNotFound => AppError(CoreError::NotFound),
            CE::InvalidTransition { from, to } => {
                AppError(CoreError::InvalidTransition { from, to })
            }
            CE::Backend(e) => AppError(CoreError::DependencyUnavailable(e.to_string())),
        }
    }
}

impl From<lore_anchor_shared::objectstore::StorageError> for AppError {
    fn from(e: lore_anchor_shared::objectstore::StorageError) -> Self {
        AppError(CoreError::DependencyUnavailable(e.to_string()))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError(CoreError::Internal(e))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self.0 {
            CoreError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated", self.0.to_string()),
            CoreError::Forbidden => (StatusCode::FORBIDDEN, "forbidden", self.0.to_string()),
            CoreError::NotFound => (StatusCode::NOT_FOUND, "not_found", self.0.to_string()),
            CoreError::UnsupportedType(_) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_type", self.0.to_string())
            }
            CoreError::ContentMismatch => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "content_mismatch", self.0.to_string())
            }
            CoreError::TooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "too_large", self.0.to_string()),
            CoreError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input", self.0.to_string()),
            CoreError::Conflict(_) | CoreError::InvalidTransition { .. } => {
                (StatusCode::CONFLICT, "conflict", self.0.to_string())
            }
            CoreError::QuotaExceeded => (StatusCode::TOO_MANY_REQUESTS, "quota_exceeded", self.0.to_string()),
            CoreError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate_limited", self.0.to_string()),
            CoreError::UnprocessableEntity(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "unprocessable_entity", self.0.to_string())
            }
            CoreError::DependencyUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "dependency_unavailable",
                "a downstream dependency is unavailable".to_string(),
            ),
            CoreError::PipelineStageFailure { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal", "internal error".to_string())
            }
            CoreError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal", "internal error".to_string())
            }
        };

        log::warn!("[gateway] {status} {code}: {}", self.0);

        (
            status,
            Json(ErrorBody {
                error: code.to_string(),
                message,
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, AppError>;
