//! The five-/six-stage pipeline of spec §4.4, run in-process against an
//! already-downloaded `Image` record. The outer consume/dedup/shutdown loop
//! lives in `crate::runner`; this module is the pure transformation chain,
//! grounded in `workers/gpu-worker/main.rs`'s `process_image` (download ->
//! watermark -> perturb -> sign -> upload) with the `watermark_verify`
//! integrity gate from spec §4.4 step 4 inserted before signing.

pub mod dct;
pub mod model;
pub mod perturb;
pub mod sign;
pub mod watermark;

use std::io::Cursor;
use std::sync::Arc;

use image::{ImageFormat, RgbImage};
use lore_anchor_shared::error::{CoreError, PipelineStage};
use lore_anchor_shared::models::ProvenanceManifest;
use lore_anchor_shared::objectstore::ObjectStoreService;

use self::model::PerturbationModel;
use self::perturb::{PerturbationConfig, PerturbationVariant, apply_perturbation, max_channel_diff};
use self::sign::ProvenanceSigner;
use self::watermark::{embed_watermark, verify_watermark};

/// The contract used verification hinges on (spec §4.4 stage 4 and §8
/// invariant 6).
pub const WATERMARK_MATCH_THRESHOLD: f32 = 0.75;

pub struct PipelineInputs<'a> {
    pub object_store: &'a ObjectStoreService,
    pub original_key: &'a str,
    pub image_id: uuid::Uuid,
    /// Minted by the caller before the guarded `pending -> processing`
    /// catalog write, so the same id lands in both the `Image` row and the
    /// embedded watermark (spec §3: "assigned at worker start, stable
    /// across retries of the same attempt").
    pub watermark_id: &'a str,
    pub epsilon: u8,
    pub steps: u32,
    pub model: &'a PerturbationModel,
    pub signer: &'a Arc<ProvenanceSigner>,
}

pub struct PipelineOutcome {
    pub watermark_id: String,
    pub protected_key: String,
    pub provenance_manifest: ProvenanceManifest,
}

/// Run all six stages in order, stopping at the first failure. Every
/// failure is tagged with its originating stage so the caller can write it
/// verbatim into `Task.error_log` and `Image`'s terminal state (spec §7).
pub async fn run(inputs: PipelineInputs<'_>) -> Result<PipelineOutcome, CoreError> {
    // Stage 1: download.
    let raw = inputs
        .object_store
        .get(inputs.original_key)
        .await
        .map_err(|e| CoreError::stage_failure(PipelineStage::Download, e))?;
    let decoded = image::load_from_memory(&raw)
        .map_err(|e| CoreError::stage_failure(PipelineStage::Download, e))?;
    let original = decoded.to_rgb8();

    // Stage 2: watermark_embed.
    let watermark_id = inputs.watermark_id;
    let (original_w, original_h) = original.dimensions();
    let watermarked = embed_watermark(&original, watermark_id)
        .map_err(|e| CoreError::stage_failure(PipelineStage::WatermarkEmbed, e))?;
    if watermarked.dimensions() != (original_w, original_h) {
        return Err(CoreError::stage_failure(
            PipelineStage::WatermarkEmbed,
            "output resolution differs from input",
        ));
    }

    // Stage 3: perturb.
    let variant = if inputs.model.is_degraded() {
        PerturbationVariant::FrequencyDomain
    } else {
        PerturbationVariant::Gradient
    };
    let perturb_config = PerturbationConfig {
        epsilon: inputs.epsilon,
        steps: inputs.steps,
        variant,
    };
    let perturbed = apply_perturbation(&watermarked, perturb_config);
    if perturbed.dimensions() != watermarked.dimensions() {
        return Err(CoreError::stage_failure(
            PipelineStage::Perturb,
            "output resolution differs from input",
        ));
    }
    let diff = max_channel_diff(&perturbed, &watermarked);
    if diff > inputs.epsilon {
        return Err(CoreError::stage_failure(
            PipelineStage::Perturb,
            format!("bounded-magnitude invariant violated: diff={diff} > epsilon={}", inputs.epsilon),
        ));
    }

    // Stage 4: watermark_verify.
    let (matched, accuracy) = verify_watermark(&perturbed, &watermark_id)
        .map_err(|e| CoreError::stage_failure(PipelineStage::WatermarkVerify, e))?;
    if !matched {
        return Err(CoreError::stage_failure(
            PipelineStage::WatermarkVerify,
            format!(
                "bit accuracy {accuracy:.3} below threshold {WATERMARK_MATCH_THRESHOLD} — \
                 perturbation destroyed the watermark"
            ),
        ));
    }

    // Stage 5: provenance_sign.
    let encoded = encode_png(&perturbed)
        .map_err(|e| CoreError::stage_failure(PipelineStage::ProvenanceSign, e))?;
    let manifest = inputs.signer.sign(&watermark_id, &encoded);

    // Stage 6: upload.
    let protected_key = format!("protected/{}.png", inputs.image_id);
    inputs
        .object_store
        .put(&protected_key, encoded.into())
        .await
        .map_err(|e| CoreError::stage_failure(PipelineStage::Upload, e))?;

    Ok(PipelineOutcome {
        watermark_id: watermark_id.to_string(),
        protected_key,
        provenance_manifest: manifest,
    })
}

fn encode_png(image: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::watermark::mint_watermark_id;
    use lore_anchor_shared::objectstore::ObjectStoreBackend;

    fn sample_png(w: u32, h: u32) -> Vec<u8> {
        let mut img = RgbImage::new(w, h);
        let mut seed = 7u32;
        for pixel in img.pixels_mut() {
            seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
            let v = ((seed >> 16) & 0xFF) as u8;
            *pixel = image::Rgb([v, v.wrapping_add(30), v.wrapping_add(90)]);
        }
        encode_png(&img).unwrap()
    }

    #[tokio::test]
    async fn full_pipeline_succeeds_end_to_end() {
        let store = ObjectStoreService::new(ObjectStoreBackend::Memory).unwrap();
        store
            .put("raw/u1/a.png", sample_png(128, 128).into())
            .await
            .unwrap();

        let model = PerturbationModel::warmup(None);
        let signer = Arc::new(ProvenanceSigner::from_config("", true).unwrap());
        let image_id = uuid::Uuid::now_v7();
        let watermark_id = mint_watermark_id();

        let outcome = run(PipelineInputs {
            object_store: &store,
            original_key: "raw/u1/a.png",
            image_id,
            watermark_id: &watermark_id,
            epsilon: 8,
            steps: 3,
            model: &model,
            signer: &signer,
        })
        .await
        .unwrap();

        assert_eq!(outcome.protected_key, format!("protected/{image_id}.png"));
        assert!(store.exists(&outcome.protected_key).await.unwrap());
        assert_eq!(outcome.provenance_manifest.watermark_id, outcome.watermark_id);
    }

    #[tokio::test]
    async fn missing_original_fails_at_download_stage() {
        let store = ObjectStoreService::new(ObjectStoreBackend::Memory).unwrap();
        let model = PerturbationModel::warmup(None);
        let signer = Arc::new(ProvenanceSigner::from_config("", true).unwrap());
        let watermark_id = mint_watermark_id();

        let err = run(PipelineInputs {
            object_store: &store,
            original_key: "raw/u1/missing.png",
            image_id: uuid::Uuid::now_v7(),
            watermark_id: &watermark_id,
            epsilon: 8,
            steps: 3,
            model: &model,
            signer: &signer,
        })
        .await
        .unwrap_err();

        match err {
            CoreError::PipelineStageFailure { stage, .. } => {
                assert_eq!(stage, PipelineStage::Download)
            }
            other => panic!("expected PipelineStageFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn degraded_model_forces_frequency_domain_variant() {
        let store = ObjectStoreService::new(ObjectStoreBackend::Memory).unwrap();
        store
            .put("raw/u1/b.png", sample_png(64, 64).into())
            .await
            .unwrap();

        let model = PerturbationModel::warmup(Some("/nonexistent/path/for/testing"));
        assert!(model.is_degraded());

        let signer = Arc::new(ProvenanceSigner::from_config("", true).unwrap());
        let watermark_id = mint_watermark_id();
        let outcome = run(PipelineInputs {
            object_store: &store,
            original_key: "raw/u1/b.png",
            image_id: uuid::Uuid::now_v7(),
            watermark_id: &watermark_id,
            epsilon: 8,
            steps: 3,
            model: &model,
            signer: &signer,
        })
        .await
        .unwrap();
        assert!(!outcome.watermark_id.is_empty());
    }
}
