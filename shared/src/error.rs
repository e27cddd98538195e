//! Error taxonomy shared by the gateway and the worker. Spec §7.
//!
//! Mirrors the shape of the teacher's `AppError` (a flat `thiserror` enum),
//! generalized to the taxonomy spec.md actually calls for. The gateway maps
//! this into HTTP responses; the worker maps `PipelineStageFailure` into a
//! `Task.error_log` and never turns it into a response at all.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Download,
    WatermarkEmbed,
    Perturb,
    WatermarkVerify,
    ProvenanceSign,
    Upload,
}

impl PipelineStage {
    pub fn name(self) -> &'static str {
        match self {
            PipelineStage::Download => "download",
            PipelineStage::WatermarkEmbed => "watermark_embed",
            PipelineStage::Perturb => "perturb",
            PipelineStage::WatermarkVerify => "watermark_verify",
            PipelineStage::ProvenanceSign => "provenance_sign",
            PipelineStage::Upload => "upload",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unsupported content type: {0}")]
    UnsupportedType(String),
    #[error("uploaded content does not match declared type")]
    ContentMismatch,
    #[error("upload exceeds the maximum size")]
    TooLarge,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("quota exceeded")]
    QuotaExceeded,
    #[error("rate limited")]
    RateLimited,
    #[error("unprocessable entity: {0}")]
    UnprocessableEntity(String),
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),
    #[error("pipeline stage {stage} failed: {cause}")]
    PipelineStageFailure { stage: PipelineStage, cause: String },
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    pub fn stage_failure(stage: PipelineStage, cause: impl std::fmt::Display) -> Self {
        CoreError::PipelineStageFailure {
            stage,
            cause: cause.to_string(),
        }
    }

    /// The single stage name and cause string to store as `Task.error_log`,
    /// truncated per spec §7. Returns `None` for non-pipeline errors (those
    /// never reach a Task record).
    pub fn as_stage_error_log(&self) -> Option<String> {
        match self {
            CoreError::PipelineStageFailure { stage, cause } => {
                Some(crate::models::truncate_error_log(&format!(
                    "[{stage}] {cause}"
                )))
            }
            _ => None,
        }
    }
}
