//! PixelSeal-style invisible watermarking (spread-spectrum over a Haar DWT
//! sub-band). Stage 2 (`watermark_embed`) and stage 4 (`watermark_verify`)
//! of spec §4.4.
//!
//! Grounded in the teacher's pure-Rust, no-C-library image philosophy
//! (`services/image_processing.rs`) and in the original Python
//! implementation's `core/seal/pixelseal.py`, whose docstring names the
//! scheme this reimplements: a deterministic DWT mode, no pretrained
//! weights, robust to moderate adversarial noise.

use image::RgbImage;
use rand::{Rng, SeedableRng, rngs::StdRng};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const WATERMARK_BITS: usize = 128;
const STRENGTH: f32 = 6.0;
const MATCH_THRESHOLD: f32 = 0.75;

#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("watermark_id must be 32 hex characters (128 bits), got {0}")]
    InvalidId(String),
    #[error("image too small to carry a 128-bit watermark: sub-band capacity is {0}")]
    InsufficientCapacity(usize),
}

/// Parse a 32-hex-char watermark id into 128 bits, MSB first.
fn id_to_bits(watermark_id: &str) -> Result<[bool; WATERMARK_BITS], WatermarkError> {
    let bytes =
        hex::decode(watermark_id).map_err(|_| WatermarkError::InvalidId(watermark_id.to_string()))?;
    if bytes.len() != 16 {
        return Err(WatermarkError::InvalidId(watermark_id.to_string()));
    }
    let mut bits = [false; WATERMARK_BITS];
    for (byte_idx, byte) in bytes.iter().enumerate() {
        for bit_idx in 0..8 {
            bits[byte_idx * 8 + bit_idx] = (byte >> (7 - bit_idx)) & 1 == 1;
        }
    }
    Ok(bits)
}

/// Mint a fresh 128-bit watermark id (32 lowercase hex chars), per spec §4.4
/// "freshly minted at worker start".
pub fn mint_watermark_id() -> String {
    let mut rng = rand::thread_rng();
    let mut bytes = [0u8; 16];
    rng.fill(&mut bytes);
    hex::encode(bytes)
}

/// Deterministic chip sequence for (watermark_id, channel, bit). Reused
/// identically by embed and verify so extraction can correlate blind.
fn chip_sequence(watermark_id: &str, channel: usize, bit_idx: usize, len: usize) -> Vec<f32> {
    let mut hasher = Sha256::new();
    hasher.update(watermark_id.as_bytes());
    hasher.update(channel.to_le_bytes());
    hasher.update(bit_idx.to_le_bytes());
    let digest = hasher.finalize();
    let seed = u64::from_le_bytes(digest[0..8].try_into().unwrap());
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len)
        .map(|_| if rng.gen_bool(0.5) { 1.0 } else { -1.0 })
        .collect()
}

/// A single-level 2D Haar DWT sub-band decomposition of one channel,
/// padded to even dimensions by edge replication.
struct Subbands {
    ll: Vec<f32>,
    lh: Vec<f32>,
    hl: Vec<f32>,
    hh: Vec<f32>,
    sub_w: usize,
    sub_h: usize,
    orig_w: usize,
    orig_h: usize,
}

fn channel_to_padded(plane: &[u8], width: usize, height: usize) -> (Vec<f32>, usize, usize) {
    let pad_w = width + (width % 2);
    let pad_h = height + (height % 2);
    let mut out = vec![0.0f32; pad_w * pad_h];
    for y in 0..pad_h {
        let sy = y.min(height - 1);
        for x in 0..pad_w {
            let sx = x.min(width - 1);
            out[y * pad_w + x] = plane[sy * width + sx] as f32;
        }
    }
    (out, pad_w, pad_h)
}

const SQRT2: f32 = std::f32::consts::SQRT_2;

fn dwt_2d(padded: &[f32], pad_w: usize, pad_h: usize, orig_w: usize, orig_h: usize) -> Subbands {
    let sub_w = pad_w / 2;
    let sub_h = pad_h / 2;

    // Row transform: pairwise (a, b) -> ((a+b)/sqrt2, (a-b)/sqrt2).
    let mut row_low = vec![0.0f32; sub_w * pad_h];
    let mut row_high = vec![0.0f32; sub_w * pad_h];
    for y in 0..pad_h {
        for x in 0..sub_w {
            let a = padded[y * pad_w + 2 * x];
            let b = padded[y * pad_w + 2 * x + 1];
            row_low[y * sub_w + x] = (a + b) / SQRT2;
            row_high[y * sub_w + x] = (a - b) / SQRT2;
        }
    }

    // Column transform on each of the two row bands.
    let mut ll = vec![0.0f32; sub_w * sub_h];
    let mut lh = vec![0.0f32; sub_w * sub_h];
    let mut hl = vec![0.0f32; sub_w * sub_h];
    let mut hh = vec![0.0f32; sub_w * sub_h];
    for y in 0..sub_h {
        for x in 0..sub_w {
            let la = row_low[(2 * y) * sub_w + x];
            let lb = row_low[(2 * y + 1) * sub_w + x];
            ll[y * sub_w + x] = (la + lb) / SQRT2;
            lh[y * sub_w + x] = (la - lb) / SQRT2;

            let ha = row_high[(2 * y) * sub_w + x];
            let hb = row_high[(2 * y + 1) * sub_w + x];
            hl[y * sub_w + x] = (ha + hb) / SQRT2;
            hh[y * sub_w + x] = (ha - hb) / SQRT2;
        }
    }

    Subbands {
        ll,
        lh,
        hl,
        hh,
        sub_w,
        sub_h,
        orig_w,
        orig_h,
    }
}

fn idwt_2d(sub: &Subbands) -> Vec<u8> {
    let sub_w = sub.sub_w;
    let sub_h = sub.sub_h;
    let pad_w = sub_w * 2;
    let pad_h = sub_h * 2;

    let mut row_low = vec![0.0f32; sub_w * pad_h];
    let mut row_high = vec![0.0f32; sub_w * pad_h];
    for y in 0..sub_h {
        for x in 0..sub_w {
            let ll = sub.ll[y * sub_w + x];
            let lh = sub.lh[y * sub_w + x];
            row_low[(2 * y) * sub_w + x] = (ll + lh) / SQRT2;
            row_low[(2 * y + 1) * sub_w + x] = (ll - lh) / SQRT2;

            let hl = sub.hl[y * sub_w + x];
            let hh = sub.hh[y * sub_w + x];
            row_high[(2 * y) * sub_w + x] = (hl + hh) / SQRT2;
            row_high[(2 * y + 1) * sub_w + x] = (hl - hh) / SQRT2;
        }
    }

    let mut padded = vec![0.0f32; pad_w * pad_h];
    for y in 0..pad_h {
        for x in 0..sub_w {
            let a = row_low[y * sub_w + x];
            let b = row_high[y * sub_w + x];
            padded[y * pad_w + 2 * x] = (a + b) / SQRT2;
            padded[y * pad_w + 2 * x + 1] = (a - b) / SQRT2;
        }
    }

    let mut out = vec![0u8; sub.orig_w * sub.orig_h];
    for y in 0..sub.orig_h {
        for x in 0..sub.orig_w {
            out[y * sub.orig_w + x] = padded[y * pad_w + x].round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

fn embed_into_subband(hl: &mut [f32], watermark_id: &str, channel: usize, bits: &[bool; WATERMARK_BITS]) -> Result<(), WatermarkError> {
    let chip_len = hl.len() / WATERMARK_BITS;
    if chip_len == 0 {
        return Err(WatermarkError::InsufficientCapacity(hl.len()));
    }
    for (bit_idx, &bit) in bits.iter().enumerate() {
        let chip = chip_sequence(watermark_id, channel, bit_idx, chip_len);
        let polarity = if bit { 1.0 } else { -1.0 };
        let offset = bit_idx * chip_len;
        for (i, &c) in chip.iter().enumerate() {
            hl[offset + i] += STRENGTH * polarity * c;
        }
    }
    Ok(())
}

/// Embed `watermark_id` into `image`, one plane at a time, via spread
/// spectrum in the HL (horizontal detail) sub-band of a single-level Haar
/// DWT. Output has identical dimensions (spec §4.4: "output resolution
/// differs from input" is a must-fail condition).
pub fn embed_watermark(image: &RgbImage, watermark_id: &str) -> Result<RgbImage, WatermarkError> {
    let bits = id_to_bits(watermark_id)?;
    let (width, height) = image.dimensions();
    let (width, height) = (width as usize, height as usize);

    let mut planes = [
        vec![0u8; width * height],
        vec![0u8; width * height],
        vec![0u8; width * height],
    ];
    for (i, pixel) in image.pixels().enumerate() {
        planes[0][i] = pixel[0];
        planes[1][i] = pixel[1];
        planes[2][i] = pixel[2];
    }

    let mut out = RgbImage::new(width as u32, height as u32);
    for (channel, plane) in planes.iter().enumerate() {
        let (padded, pad_w, pad_h) = channel_to_padded(plane, width, height);
        let mut sub = dwt_2d(&padded, pad_w, pad_h, width, height);
        embed_into_subband(&mut sub.hl, watermark_id, channel, &bits)?;
        let reconstructed = idwt_2d(&sub);
        for (i, &v) in reconstructed.iter().enumerate() {
            let x = (i % width) as u32;
            let y = (i / width) as u32;
            out.get_pixel_mut(x, y)[channel] = v;
        }
    }
    Ok(out)
}

/// Correlate the candidate image's sub-band against the chip sequences for
/// `watermark_id`, returning `(matched, accuracy)`. A positive correlation
/// decodes to bit 1; `matched = accuracy >= 0.75` per spec §4.4.
pub fn verify_watermark(image: &RgbImage, watermark_id: &str) -> Result<(bool, f32), WatermarkError> {
    let expected_bits = id_to_bits(watermark_id)?;
    let (width, height) = image.dimensions();
    let (width, height) = (width as usize, height as usize);

    let mut planes = [
        vec![0u8; width * height],
        vec![0u8; width * height],
        vec![0u8; width * height],
    ];
    for (i, pixel) in image.pixels().enumerate() {
        planes[0][i] = pixel[0];
        planes[1][i] = pixel[1];
        planes[2][i] = pixel[2];
    }

    let mut channel_hls = Vec::with_capacity(3);
    for plane in &planes {
        let (padded, pad_w, pad_h) = channel_to_padded(plane, width, height);
        let sub = dwt_2d(&padded, pad_w, pad_h, width, height);
        channel_hls.push(sub.hl);
    }

    let chip_len = channel_hls[0].len() / WATERMARK_BITS;
    if chip_len == 0 {
        return Err(WatermarkError::InsufficientCapacity(channel_hls[0].len()));
    }

    let mut matches = 0usize;
    for bit_idx in 0..WATERMARK_BITS {
        let offset = bit_idx * chip_len;
        let mut votes_for_one = 0i32;
        for (channel, hl) in channel_hls.iter().enumerate() {
            let chip = chip_sequence(watermark_id, channel, bit_idx, chip_len);
            let correlation: f32 = chip
                .iter()
                .enumerate()
                .map(|(i, &c)| c * hl[offset + i])
                .sum();
            if correlation > 0.0 {
                votes_for_one += 1;
            } else {
                votes_for_one -= 1;
            }
        }
        let decoded_bit = votes_for_one > 0;
        if decoded_bit == expected_bits[bit_idx] {
            matches += 1;
        }
    }

    let accuracy = matches as f32 / WATERMARK_BITS as f32;
    Ok((accuracy >= MATCH_THRESHOLD, accuracy))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_image(w: u32, h: u32) -> RgbImage {
        let mut img = RgbImage::new(w, h);
        let mut seed = 12345u32;
        for pixel in img.pixels_mut() {
            seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
            let v = ((seed >> 16) & 0xFF) as u8;
            *pixel = image::Rgb([v, v.wrapping_add(40), v.wrapping_add(80)]);
        }
        img
    }

    #[test]
    fn embed_preserves_dimensions() {
        let img = test_image(128, 96);
        let id = mint_watermark_id();
        let watermarked = embed_watermark(&img, &id).unwrap();
        assert_eq!(watermarked.dimensions(), img.dimensions());
    }

    #[test]
    fn round_trip_survives_on_unperturbed_image() {
        let img = test_image(256, 256);
        let id = mint_watermark_id();
        let watermarked = embed_watermark(&img, &id).unwrap();
        let (matched, accuracy) = verify_watermark(&watermarked, &id).unwrap();
        assert!(matched, "accuracy was {accuracy}");
        assert!(accuracy >= 0.95, "accuracy was {accuracy}");
    }

    #[test]
    fn wrong_watermark_id_does_not_match() {
        let img = test_image(256, 256);
        let id = mint_watermark_id();
        let other_id = mint_watermark_id();
        let watermarked = embed_watermark(&img, &id).unwrap();
        let (matched, _accuracy) = verify_watermark(&watermarked, &other_id).unwrap();
        assert!(!matched);
    }

    #[test]
    fn rejects_malformed_id() {
        let img = test_image(64, 64);
        assert!(matches!(
            embed_watermark(&img, "not-hex"),
            Err(WatermarkError::InvalidId(_))
        ));
    }

    #[test]
    fn too_small_image_reports_insufficient_capacity() {
        let img = test_image(4, 4);
        let id = mint_watermark_id();
        assert!(matches!(
            embed_watermark(&img, &id),
            Err(WatermarkError::InsufficientCapacity(_))
        ));
    }
}
