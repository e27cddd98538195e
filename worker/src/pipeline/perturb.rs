//! Mist-style adversarial perturbation. Stage 3 (`perturb`) of spec §4.4.
//!
//! Two variants, selected by `PerturbationVariant`: a gradient-based attack
//! (a) and a deterministic frequency-domain injection (b). Both are bound by
//! the same contract regardless of variant — output shape equals input shape
//! and `max_channel_diff(out, in) <= epsilon` — which is what
//! `watermark_verify` and the `PipelineStageFailure` invariant checks in
//! spec §8 actually test.
//!
//! The original `core/mist/mist_v2.py` drives its PGD loop against a frozen
//! Stable Diffusion VAE encoder's latent space. There is no equivalent
//! pretrained model available in this workspace, so variant (a) here
//! substitutes a deterministic structured-texture target (derived from the
//! image itself via a local-gradient estimate) for the VAE's latent
//! distance — the iterate-and-project PGD shape is kept, only the loss
//! surrogate changes. Variant (b) is a direct port of the original's
//! described frequency-domain fallback using the pure-Rust DCT in `dct`.

use image::RgbImage;

use super::dct::{MID_BAND_COEFFS, dct_2d_block, idct_2d_block};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerturbationVariant {
    /// Gradient-based PGD against a structured texture target.
    Gradient,
    /// Deterministic mid-band DCT coefficient injection.
    FrequencyDomain,
}

#[derive(Debug, Clone, Copy)]
pub struct PerturbationConfig {
    pub epsilon: u8,
    pub steps: u32,
    pub variant: PerturbationVariant,
}

/// Largest absolute per-channel difference between two same-sized RGB
/// images. Spec §4.4's must-fail condition and §8 invariant 5 both key off
/// this exact quantity.
pub fn max_channel_diff(a: &RgbImage, b: &RgbImage) -> u8 {
    a.pixels()
        .zip(b.pixels())
        .flat_map(|(pa, pb)| pa.0.iter().zip(pb.0.iter()))
        .map(|(&x, &y)| x.abs_diff(y))
        .max()
        .unwrap_or(0)
}

pub fn apply_perturbation(image: &RgbImage, config: PerturbationConfig) -> RgbImage {
    match config.variant {
        PerturbationVariant::Gradient => apply_gradient(image, config),
        PerturbationVariant::FrequencyDomain => apply_frequency_domain(image, config.epsilon),
    }
}

/// Deterministic "structured texture" target: each pixel's neighbour
/// gradient direction, standing in for the VAE latent's preference for
/// smooth regions. Pushing a pixel away from its local mean approximates
/// pushing the encoded latent away from the clean one.
fn texture_gradient(image: &RgbImage, x: u32, y: u32, channel: usize) -> f32 {
    let (w, h) = image.dimensions();
    let get = |xx: i64, yy: i64| -> f32 {
        let xx = xx.clamp(0, w as i64 - 1) as u32;
        let yy = yy.clamp(0, h as i64 - 1) as u32;
        image.get_pixel(xx, yy)[channel] as f32
    };
    let center = get(x as i64, y as i64);
    let mean_neighbours = (get(x as i64 - 1, y as i64)
        + get(x as i64 + 1, y as i64)
        + get(x as i64, y as i64 - 1)
        + get(x as i64, y as i64 + 1))
        / 4.0;
    center - mean_neighbours
}

/// PGD-shaped loop: each step nudges every pixel away from its local mean
/// (maximizing a structured-texture surrogate loss), then projects back into
/// the epsilon-ball around the original and clamps to `[0, 255]` — the exact
/// projection `mist_v2.py` performs after every gradient step.
fn apply_gradient(image: &RgbImage, config: PerturbationConfig) -> RgbImage {
    let (w, h) = image.dimensions();
    let eps = config.epsilon as f32;
    let steps = config.steps.max(1);
    let step_size = (2.0 * eps / steps as f32).max(1.0);

    let mut current = image.clone();
    for _ in 0..steps {
        let snapshot = current.clone();
        for y in 0..h {
            for x in 0..w {
                for c in 0..3 {
                    let grad = texture_gradient(&snapshot, x, y, c);
                    let direction = if grad >= 0.0 { 1.0 } else { -1.0 };
                    let orig = image.get_pixel(x, y)[c] as f32;
                    let moved = snapshot.get_pixel(x, y)[c] as f32 - step_size * direction;
                    let projected = moved.clamp(orig - eps, orig + eps).clamp(0.0, 255.0);
                    current.get_pixel_mut(x, y)[c] = projected.round() as u8;
                }
            }
        }
    }
    current
}

/// Deterministic mid-band DCT coefficient injection: every 8x8 block of
/// every channel gets a fixed-sign nudge at the coefficients in
/// `MID_BAND_COEFFS`, then the bound is enforced directly in pixel space
/// (not just the DCT domain) so the output always satisfies the contract
/// even with rounding through the transform.
fn apply_frequency_domain(image: &RgbImage, epsilon: u8) -> RgbImage {
    let (w, h) = image.dimensions();
    let mut planes = [
        vec![0u8; (w * h) as usize],
        vec![0u8; (w * h) as usize],
        vec![0u8; (w * h) as usize],
    ];
    for (i, pixel) in image.pixels().enumerate() {
        planes[0][i] = pixel[0];
        planes[1][i] = pixel[1];
        planes[2][i] = pixel[2];
    }

    let mut out = image.clone();
    let nudge = (epsilon as f32 * 0.6).max(1.0);

    for (channel, plane) in planes.iter().enumerate() {
        let mut bx = 0;
        while bx * 8 < w as usize {
            let mut by = 0;
            while by * 8 < h as usize {
                let mut block = [0.0f32; 64];
                for dy in 0..8 {
                    for dx in 0..8 {
                        let x = (bx * 8 + dx).min(w as usize - 1);
                        let y = (by * 8 + dy).min(h as usize - 1);
                        block[dy * 8 + dx] = plane[y * w as usize + x] as f32;
                    }
                }
                let mut coeffs = dct_2d_block(&block);
                for (i, &(u, v)) in MID_BAND_COEFFS.iter().enumerate() {
                    let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
                    coeffs[u * 8 + v] += sign * nudge;
                }
                let reconstructed = idct_2d_block(&coeffs);
                for dy in 0..8 {
                    for dx in 0..8 {
                        let x = bx * 8 + dx;
                        let y = by * 8 + dy;
                        if x >= w as usize || y >= h as usize {
                            continue;
                        }
                        let orig = plane[y * w as usize + x] as f32;
                        let bounded = reconstructed[dy * 8 + dx].clamp(
                            orig - epsilon as f32,
                            orig + epsilon as f32,
                        );
                        out.get_pixel_mut(x as u32, y as u32)[channel] =
                            bounded.round().clamp(0.0, 255.0) as u8;
                    }
                }
                by += 1;
            }
            bx += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_image(w: u32, h: u32) -> RgbImage {
        let mut img = RgbImage::new(w, h);
        let mut seed = 42u32;
        for pixel in img.pixels_mut() {
            seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
            let v = ((seed >> 16) & 0xFF) as u8;
            *pixel = image::Rgb([v, v.wrapping_add(20), v.wrapping_add(60)]);
        }
        img
    }

    #[test]
    fn gradient_variant_respects_epsilon_bound() {
        let img = test_image(64, 64);
        let config = PerturbationConfig {
            epsilon: 8,
            steps: 3,
            variant: PerturbationVariant::Gradient,
        };
        let perturbed = apply_perturbation(&img, config);
        assert_eq!(perturbed.dimensions(), img.dimensions());
        assert!(max_channel_diff(&perturbed, &img) <= config.epsilon);
    }

    #[test]
    fn frequency_variant_respects_epsilon_bound() {
        let img = test_image(64, 64);
        let config = PerturbationConfig {
            epsilon: 8,
            steps: 3,
            variant: PerturbationVariant::FrequencyDomain,
        };
        let perturbed = apply_perturbation(&img, config);
        assert_eq!(perturbed.dimensions(), img.dimensions());
        assert!(max_channel_diff(&perturbed, &img) <= config.epsilon);
    }

    #[test]
    fn perturbation_actually_changes_pixels() {
        let img = test_image(64, 64);
        let config = PerturbationConfig {
            epsilon: 8,
            steps: 3,
            variant: PerturbationVariant::FrequencyDomain,
        };
        let perturbed = apply_perturbation(&img, config);
        assert!(perturbed.pixels().ne(img.pixels()));
    }
}
