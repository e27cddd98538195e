//! HTTP handlers for the Ingest Gateway (spec §4.1, §6). Grounded in the
//! teacher's `api/v1::gitops` handler shape — an `AuthenticatedUser`-style
//! extractor, a `State<Arc<AppState>>`, a `Result<impl IntoResponse, AppError>`
//! return — and `api/v1/upload.rs`'s `read_file_field` pattern for the
//! multipart upload.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use lore_anchor_shared::error::CoreError;
use lore_anchor_shared::models::{Envelope, Image, ImageStatus, Task};

use crate::error::{ApiResult, AppError};
use crate::middleware::OwnerId;
use crate::quota::PlanTier;
use crate::state::AppState;
use crate::validation::{MAX_UPLOAD_BYTES, clamp_pagination, validate_upload};

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// Quota enforcement helper (spec §4.1 "Quota enforcement") — shared by
// `upload` and `retry`, both of which consult the Plan collaborator before
// acting.
// ---------------------------------------------------------------------------

/// Placeholder watermark id used only when compensating an enqueue failure
/// before any pipeline run has actually minted one — never a value a
/// client can mistake for a real embedded watermark (all zero hex digits).
const NO_WATERMARK_PLACEHOLDER: &str = "00000000000000000000000000000000";

/// `worker_id` recorded on the `Task` row a compensated enqueue failure
/// inserts — no worker ever touched the image, but spec §8 invariant 3
/// requires every terminal image to carry at least one task, so this labels
/// the row's origin for anyone reading it later.
const GATEWAY_COMPENSATION_WORKER_ID: &str = "gateway-compensation";

/// Drive the guarded `pending -> processing -> failed` path so a failed
/// enqueue (spec §4.1: "the gateway never leaves an Image in `pending`
/// without an enqueued envelope") lands on a legal terminal state — the
/// Catalog's guard only allows `failed` from `processing` (spec §4.2), so
/// this passes through it rather than writing `failed` directly. Also
/// inserts a terminal `Task` row so the image satisfies spec §8 invariant 3
/// ("every completed/failed image has at least one task with a terminal
/// outcome") even though no worker ever picked it up.
async fn compensate_failed_enqueue(
    state: &AppState,
    image_id: Uuid,
    watermark_hint: Option<&str>,
) {
    let watermark_id = watermark_hint.unwrap_or(NO_WATERMARK_PLACEHOLDER);
    if let Err(e) = state.catalog.set_processing(image_id, watermark_id).await {
        log::warn!("[compensate] could not transition {image_id} to processing before marking failed: {e}");
        return;
    }
    let error_log = "enqueue failed after upload; retry to re-enqueue";
    if let Err(e) = state.catalog.set_failed(image_id, error_log).await {
        log::warn!("[compensate] could not mark {image_id} failed: {e}");
        return;
    }
    let task = Task::failed_immediately(image_id, GATEWAY_COMPENSATION_WORKER_ID.to_string(), error_log);
    if let Err(e) = state.catalog.insert_task(task).await {
        log::warn!("[compensate] could not insert compensation task for {image_id}: {e}");
    }
}

async fn enforce_quota(state: &AppState, owner_id: &str) -> Result<(), CoreError> {
    if state.plan_provider.tier_for(owner_id).await == PlanTier::Pro {
        return Ok(());
    }
    let now = Utc::now();
    let month_start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .expect("first of the month is always a valid timestamp");
    let count = state
        .catalog
        .count_images_since(owner_id, month_start)
        .await
        .map_err(|e| CoreError::DependencyUnavailable(e.to_string()))?;
    if count >= state.config.free_tier_monthly_cap as u64 {
        return Err(CoreError::QuotaExceeded);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// upload
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct UploadResponse {
    image_id: Uuid,
    status: &'static str,
}

/// `POST /api/v1/images/upload` — spec §4.1 `upload`.
pub async fn upload(
    OwnerId(owner_id): OwnerId,
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    enforce_quota(&state, &owner_id).await?;

    let (bytes, declared_mime) = read_file_field(&mut multipart).await?;
    let mime = validate_upload(&bytes, &declared_mime)?;

    let image_id = Uuid::now_v7();
    let opaque = Uuid::new_v4();
    let original_key = format!("raw/{owner_id}/{opaque}.{}", mime.extension());

    // Object Store write. Per spec §4.1's compensation rule, an orphaned
    // blob after this point (Catalog insert or enqueue fails) is
    // acceptable and left for the store's own lifecycle policy.
    state
        .object_store
        .put(&original_key, bytes)
        .await
        .map_err(|e| {
            log::error!("[upload] object store write failed for {original_key}: {e}");
            AppError(CoreError::Internal(anyhow::anyhow!(e.to_string())))
        })?;

    let image = Image::new_pending(image_id, owner_id.clone(), original_key.clone());
    if let Err(e) = state.catalog.create_image(image).await {
        // Object Store write succeeded, Catalog insert failed: the blob is
        // an acceptable orphan (spec §4.1). Nothing to compensate — there
        // is no row to mark failed. Surface as Internal.
        log::error!("[upload] catalog insert failed for {image_id}: {e}");
        return Err(AppError(CoreError::Internal(anyhow::anyhow!(e.to_string()))));
    }

    let envelope = Envelope {
        image_id,
        storage_key: original_key,
    };
    if let Err(e) = state.queue.push(&envelope).await {
        // Both writes succeeded but enqueue failed: the gateway never
        // leaves an Image `pending` without an enqueued envelope (spec
        // §4.1), so mark it `failed` before surfacing the error.
        log::error!("[upload] enqueue failed for {image_id}, marking image failed: {e}");
        compensate_failed_enqueue(&state, image_id, None).await;
        return Err(AppError(CoreError::Internal(anyhow::anyhow!(e.to_string()))));
    }

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            image_id,
            status: "pending",
        }),
    ))
}

/// Read the `file` field from a multipart upload body, enforcing the size
/// cap before buffering the whole field (spec §8: "20 MiB + 1 B upload is
/// rejected with `TooLarge`"). The declared MIME is taken from the part's
/// `Content-Type` header, per the HTTP surface's multipart `file` body.
async fn read_file_field(multipart: &mut Multipart) -> Result<(bytes::Bytes, String), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError(CoreError::InvalidInput(format!("multipart parse error: {e}"))))?
    {
        if field.name() == Some("file") {
            let declared_mime = field
                .content_type()
                .map(str::to_string)
                .ok_or_else(|| AppError(CoreError::UnsupportedType("missing".to_string())))?;
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError(CoreError::InvalidInput(format!("failed to read file field: {e}"))))?;
            if data.len() > MAX_UPLOAD_BYTES {
                return Err(AppError(CoreError::TooLarge));
            }
            return Ok((data, declared_mime));
        }
    }
    Err(AppError(CoreError::InvalidInput("missing \"file\" field".to_string())))
}

// ---------------------------------------------------------------------------
// list
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_page_size")]
    page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    20
}

#[derive(Serialize)]
struct ListResponse {
    images: Vec<Image>,
    total: u64,
    page: u32,
    page_size: u32,
    has_more: bool,
}

/// `GET /api/v1/images/` — spec §4.1 `list`.
pub async fn list(
    OwnerId(owner_id): OwnerId,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    let (page, page_size) = clamp_pagination(query.page, query.page_size);
    let result = state
        .catalog
        .list_images_by_owner(&owner_id, page, page_size)
        .await?;
    Ok(Json(ListResponse {
        images: result.images,
        total: result.total,
        page,
        page_size,
        has_more: result.has_more,
    }))
}

// ---------------------------------------------------------------------------
// get
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ImageView {
    image_id: Uuid,
    owner_id: String,
    status: ImageStatus,
    protected_url: Option<String>,
    watermark_id: Option<String>,
    provenance_manifest: Option<serde_json::Value>,
    download_count: u64,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

async fn load_owned_image(state: &AppState, image_id: Uuid, owner_id: &str) -> Result<Image, AppError> {
    let image = state
        .catalog
        .get_image(image_id)
        .await?
        .ok_or(AppError(CoreError::NotFound))?;
    if image.owner_id != owner_id {
        return Err(AppError(CoreError::Forbidden));
    }
    Ok(image)
}

/// `GET /api/v1/images/{image_id}` — spec §4.1 `get`.
pub async fn get(
    OwnerId(owner_id): OwnerId,
    State(state): State<Arc<AppState>>,
    Path(image_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let image = load_owned_image(&state, image_id, &owner_id).await?;
    let protected_url = image
        .protected_key
        .as_deref()
        .map(|key| state.presigner.sign(key, Duration::hours(1)));
    Ok(Json(ImageView {
        image_id: image.image_id,
        owner_id: image.owner_id,
        status: image.status,
        protected_url,
        watermark_id: image.watermark_id,
        provenance_manifest: image.provenance_manifest,
        download_count: image.download_count,
        created_at: image.created_at,
        updated_at: image.updated_at,
    }))
}

// ---------------------------------------------------------------------------
// delete
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct DeleteResponse {
    image_id: Uuid,
    deleted: bool,
}

/// `DELETE /api/v1/images/{image_id}` — spec §4.1 `delete`: soft delete plus
/// best-effort blob cleanup that never fails the request. Idempotent per
/// spec §8 ("`delete(id)` called twice ... the second call is a no-op"): a
/// second call on an already-deleted image short-circuits to the same
/// `{deleted: true}` response without re-running `soft_delete` or the
/// object-store cleanup.
pub async fn delete(
    OwnerId(owner_id): OwnerId,
    State(state): State<Arc<AppState>>,
    Path(image_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let image = state
        .catalog
        .get_image_even_if_deleted(image_id)
        .await?
        .ok_or(AppError(CoreError::NotFound))?;
    if image.owner_id != owner_id {
        return Err(AppError(CoreError::Forbidden));
    }
    if image.status == ImageStatus::Deleted {
        return Ok(Json(DeleteResponse {
            image_id,
            deleted: true,
        }));
    }

    state.catalog.soft_delete(image_id).await?;

    if let Err(e) = state.object_store.delete(&image.original_key).await {
        log::warn!("[delete] best-effort delete of {} failed: {e}", image.original_key);
    }
    if let Some(protected_key) = &image.protected_key {
        if let Err(e) = state.object_store.delete(protected_key).await {
            log::warn!("[delete] best-effort delete of {protected_key} failed: {e}");
        }
    }

    Ok(Json(DeleteResponse {
        image_id,
        deleted: true,
    }))
}

// ---------------------------------------------------------------------------
// track_download
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct DownloadResponse {
    image_id: Uuid,
    download_count: u64,
}

/// `POST /api/v1/images/{image_id}/downloaded` — spec §4.1 `track_download`.
/// Owner-scoped per the Open Question's conservative resolution (see
/// DESIGN.md): only the image's owner may record a download.
pub async fn track_download(
    OwnerId(owner_id): OwnerId,
    State(state): State<Arc<AppState>>,
    Path(image_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    load_owned_image(&state, image_id, &owner_id).await?;
    let count = state.catalog.increment_download_count(image_id).await?;
    Ok(Json(DownloadResponse {
        image_id,
        download_count: count,
    }))
}

// ---------------------------------------------------------------------------
// task status
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct TaskStatusResponse {
    image_id: Uuid,
    status: ImageStatus,
    error_log: Option<String>,
    started_at: Option<chrono::DateTime<Utc>>,
    completed_at: Option<chrono::DateTime<Utc>>,
}

/// `GET /api/v1/tasks/{image_id}/status` — spec §6.
pub async fn task_status(
    OwnerId(owner_id): OwnerId,
    State(state): State<Arc<AppState>>,
    Path(image_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let image = load_owned_image(&state, image_id, &owner_id).await?;
    let task = state.catalog.latest_task_for_image(image_id).await?;
    Ok(Json(TaskStatusResponse {
        image_id,
        status: image.status,
        error_log: task.as_ref().and_then(|t| t.error_log.clone()),
        started_at: task.as_ref().map(|t| t.started_at),
        completed_at: task.as_ref().and_then(|t| t.completed_at),
    }))
}

// ---------------------------------------------------------------------------
// retry
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct RetryResponse {
    image_id: Uuid,
    status: &'static str,
    queued: bool,
}

/// `POST /api/v1/tasks/{image_id}/retry` — spec §4.1 `retry`: legal only
/// when `status = failed`.
pub async fn retry(
    OwnerId(owner_id): OwnerId,
    State(state): State<Arc<AppState>>,
    Path(image_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let image = load_owned_image(&state, image_id, &owner_id).await?;
    if image.status != ImageStatus::Failed {
        return Err(AppError(CoreError::Conflict(format!(
            "retry is only legal from failed, image is {}",
            image.status.as_str()
        ))));
    }

    enforce_quota(&state, &owner_id).await?;

    state.catalog.set_pending_for_retry(image_id).await?;

    let envelope = Envelope {
        image_id,
        storage_key: image.original_key.clone(),
    };
    if let Err(e) = state.queue.push(&envelope).await {
        log::error!("[retry] enqueue failed for {image_id}: {e}");
        compensate_failed_enqueue(&state, image_id, image.watermark_id.as_deref()).await;
        return Err(AppError(CoreError::Internal(anyhow::anyhow!(e.to_string()))));
    }

    Ok(Json(RetryResponse {
        image_id,
        status: "pending",
        queued: true,
    }))
}
