//! Core data model shared by the Ingest Gateway and the Protection Worker.
//!
//! See spec §3 for the authoritative description of these types and their
//! invariants. Nothing here owns persistence — that's `catalog`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Truncation bound for `Task::error_log`, per spec §7 ("typically 4 KiB").
pub const ERROR_LOG_MAX_BYTES: usize = 4096;

/// An image's lifecycle state. Transitions are restricted to the directed
/// graph in spec §3: `Pending -> Processing -> {Completed | Failed}`,
/// `Failed -> Pending` (retry), any of `{Completed, Failed}` -> `Deleted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Deleted,
}

impl ImageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageStatus::Pending => "pending",
            ImageStatus::Processing => "processing",
            ImageStatus::Completed => "completed",
            ImageStatus::Failed => "failed",
            ImageStatus::Deleted => "deleted",
        }
    }

    /// Legal predecessor states for a transition into `self`. Used by the
    /// Catalog's guarded update (spec §4.2) to reject anything not in this
    /// set with `InvalidTransition`.
    pub fn legal_predecessors(self) -> &'static [ImageStatus] {
        match self {
            ImageStatus::Pending => &[ImageStatus::Failed],
            ImageStatus::Processing => &[ImageStatus::Pending],
            ImageStatus::Completed => &[ImageStatus::Processing],
            ImageStatus::Failed => &[ImageStatus::Processing],
            // Soft delete is legal from any non-deleted state. The HTTP
            // contract for DELETE (spec §6) carries no 409, unlike retry and
            // track_download, so we don't gate it on being terminal already
            // — see DESIGN.md for this Open Question resolution.
            ImageStatus::Deleted => &[
                ImageStatus::Pending,
                ImageStatus::Processing,
                ImageStatus::Completed,
                ImageStatus::Failed,
            ],
        }
    }

    pub fn can_transition_from(self, from: ImageStatus) -> bool {
        self.legal_predecessors().contains(&from)
    }
}

/// One uploaded image and its protection pipeline state. Spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub image_id: Uuid,
    pub owner_id: String,
    pub original_key: String,
    pub protected_key: Option<String>,
    pub watermark_id: Option<String>,
    pub status: ImageStatus,
    pub provenance_manifest: Option<serde_json::Value>,
    pub download_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Image {
    pub fn new_pending(image_id: Uuid, owner_id: String, original_key: String) -> Self {
        let now = Utc::now();
        Self {
            image_id,
            owner_id,
            original_key,
            protected_key: None,
            watermark_id: None,
            status: ImageStatus::Pending,
            provenance_manifest: None,
            download_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One worker attempt on an image. Inserted at pipeline start, mutated at
/// most twice (start, terminate), never deleted. Spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: Uuid,
    pub image_id: Uuid,
    pub worker_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_log: Option<String>,
}

impl Task {
    pub fn started(image_id: Uuid, worker_id: String) -> Self {
        Self {
            task_id: Uuid::now_v7(),
            image_id,
            worker_id,
            started_at: Utc::now(),
            completed_at: None,
            error_log: None,
        }
    }

    /// A task that starts and terminates in the same write, for callers that
    /// never actually ran a pipeline attempt but still need the image's
    /// terminal `failed` state to carry at least one task with a terminal
    /// outcome (spec §8 invariant 3) — e.g. the gateway's enqueue-failure
    /// compensation, which marks an image `failed` without a worker ever
    /// having picked it up.
    pub fn failed_immediately(image_id: Uuid, worker_id: String, error_log: &str) -> Self {
        let now = Utc::now();
        Self {
            task_id: Uuid::now_v7(),
            image_id,
            worker_id,
            started_at: now,
            completed_at: Some(now),
            error_log: Some(truncate_error_log(error_log)),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.completed_at.is_some() && self.error_log.is_none()
    }
}

/// Truncate an error message to `ERROR_LOG_MAX_BYTES`, respecting UTF-8
/// character boundaries.
pub fn truncate_error_log(message: &str) -> String {
    if message.len() <= ERROR_LOG_MAX_BYTES {
        return message.to_string();
    }
    let mut end = ERROR_LOG_MAX_BYTES;
    while end > 0 && !message.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated)", &message[..end])
}

/// The transient work-queue message. Spec §3 and §6 — field names match the
/// wire JSON object `{"image_id": ..., "storage_key": ...}` exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub image_id: Uuid,
    pub storage_key: String,
}

/// The signed provenance assertion produced by the `provenance_sign` stage.
/// Stored verbatim (as JSON) in `Image::provenance_manifest`. Spec §4.4 and
/// glossary entry "Provenance manifest".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceManifest {
    pub claim_generator: String,
    pub watermark_id: String,
    pub assertions: Vec<TrainingAssertion>,
    pub signing_algorithm: String,
    pub signature: String,
    pub signed_at: DateTime<Utc>,
}

/// One `not-allowed` assertion in the manifest (ai_generative_training,
/// ai_inference, ai_training, data_mining — spec §4.4 "Provenance
/// signature").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingAssertion {
    pub label: String,
    pub allowed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_graph_matches_spec() {
        assert!(ImageStatus::Processing.can_transition_from(ImageStatus::Pending));
        assert!(ImageStatus::Completed.can_transition_from(ImageStatus::Processing));
        assert!(ImageStatus::Failed.can_transition_from(ImageStatus::Processing));
        assert!(ImageStatus::Pending.can_transition_from(ImageStatus::Failed));
        assert!(!ImageStatus::Completed.can_transition_from(ImageStatus::Pending));
        assert!(!ImageStatus::Processing.can_transition_from(ImageStatus::Completed));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "é".repeat(ERROR_LOG_MAX_BYTES); // 2 bytes per char, so the
        // naive byte cutoff lands mid-character at exactly ERROR_LOG_MAX_BYTES.
        let truncated = truncate_error_log(&s);
        assert!(truncated.len() <= ERROR_LOG_MAX_BYTES + "... (truncated)".len());
    }

    #[test]
    fn truncate_noop_under_limit() {
        assert_eq!(truncate_error_log("short"), "short");
    }
}
