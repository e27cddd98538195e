//! Hand-rolled 8x8 block DCT-II / inverse DCT-III, pure Rust. Used by the
//! frequency-domain perturbation variant (spec §4.4, perturbation variant
//! (b)). No C library wrapper, matching the teacher's stated image-pipeline
//! philosophy (`services/image_processing.rs`: "All logic is pure Rust").

const BLOCK: usize = 8;

fn cosine_table() -> [[f32; BLOCK]; BLOCK] {
    let mut table = [[0.0f32; BLOCK]; BLOCK];
    for (k, row) in table.iter_mut().enumerate() {
        for (n, cell) in row.iter_mut().enumerate() {
            *cell = ((std::f32::consts::PI / BLOCK as f32) * (n as f32 + 0.5) * k as f32).cos();
        }
    }
    table
}

fn alpha(k: usize) -> f32 {
    if k == 0 {
        (1.0 / BLOCK as f32).sqrt()
    } else {
        (2.0 / BLOCK as f32).sqrt()
    }
}

fn dct_1d(input: &[f32; BLOCK], table: &[[f32; BLOCK]; BLOCK]) -> [f32; BLOCK] {
    let mut out = [0.0f32; BLOCK];
    for k in 0..BLOCK {
        let mut sum = 0.0f32;
        for n in 0..BLOCK {
            sum += input[n] * table[k][n];
        }
        out[k] = alpha(k) * sum;
    }
    out
}

fn idct_1d(coeffs: &[f32; BLOCK], table: &[[f32; BLOCK]; BLOCK]) -> [f32; BLOCK] {
    let mut out = [0.0f32; BLOCK];
    for n in 0..BLOCK {
        let mut sum = 0.0f32;
        for k in 0..BLOCK {
            sum += alpha(k) * coeffs[k] * table[k][n];
        }
        out[n] = sum;
    }
    out
}

/// Forward 2D DCT-II on one 8x8 block (row-major, length 64).
pub fn dct_2d_block(block: &[f32; 64]) -> [f32; 64] {
    let table = cosine_table();
    let mut rows_out = [0.0f32; 64];
    for r in 0..BLOCK {
        let row: [f32; BLOCK] = block[r * BLOCK..r * BLOCK + BLOCK].try_into().unwrap();
        let transformed = dct_1d(&row, &table);
        rows_out[r * BLOCK..r * BLOCK + BLOCK].copy_from_slice(&transformed);
    }
    let mut out = [0.0f32; 64];
    for c in 0..BLOCK {
        let col: [f32; BLOCK] = std::array::from_fn(|r| rows_out[r * BLOCK + c]);
        let transformed = dct_1d(&col, &table);
        for r in 0..BLOCK {
            out[r * BLOCK + c] = transformed[r];
        }
    }
    out
}

/// Inverse 2D DCT (DCT-III) on one 8x8 block.
pub fn idct_2d_block(coeffs: &[f32; 64]) -> [f32; 64] {
    let table = cosine_table();
    let mut cols_out = [0.0f32; 64];
    for c in 0..BLOCK {
        let col: [f32; BLOCK] = std::array::from_fn(|r| coeffs[r * BLOCK + c]);
        let transformed = idct_1d(&col, &table);
        for r in 0..BLOCK {
            cols_out[r * BLOCK + c] = transformed[r];
        }
    }
    let mut out = [0.0f32; 64];
    for r in 0..BLOCK {
        let row: [f32; BLOCK] = cols_out[r * BLOCK..r * BLOCK + BLOCK].try_into().unwrap();
        let transformed = idct_1d(&row, &table);
        out[r * BLOCK..r * BLOCK + BLOCK].copy_from_slice(&transformed);
    }
    out
}

/// Mid-band coefficient positions (zig-zag middle), fixed and deterministic.
pub const MID_BAND_COEFFS: [(usize, usize); 4] = [(2, 3), (3, 2), (3, 3), (2, 4)];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_identity() {
        let mut block = [0.0f32; 64];
        for (i, v) in block.iter_mut().enumerate() {
            *v = (i * 7 % 256) as f32;
        }
        let coeffs = dct_2d_block(&block);
        let reconstructed = idct_2d_block(&coeffs);
        for (a, b) in block.iter().zip(reconstructed.iter()) {
            assert!((a - b).abs() < 1e-2, "{a} vs {b}");
        }
    }
}
