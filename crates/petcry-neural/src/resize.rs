//! Anti-aliased 2-D resize
//!
//! Bilinear interpolation on pixel-centered grids with mirror boundaries.
//! When an axis shrinks, it is first smoothed with a Gaussian of
//! `σ = (in/out − 1) / 2` so energy above the new Nyquist does not fold back
//! into the image. Growing axes are interpolated directly.

use ndarray::{Array2, Axis};

/// Gaussian kernels are cut at this many standard deviations.
const TRUNCATE: f64 = 4.0;

/// Resize `input` to `(rows, cols)`.
///
/// Output values are clipped to the input's value range. Returns `None` if
/// either the input or the requested shape has a zero dimension.
pub fn resize_antialiased(input: &Array2<f32>, rows: usize, cols: usize) -> Option<Array2<f32>> {
    let (in_rows, in_cols) = input.dim();
    if in_rows == 0 || in_cols == 0 || rows == 0 || cols == 0 {
        return None;
    }

    let mut work = input.mapv(|v| v as f64);

    let row_sigma = antialias_sigma(in_rows, rows);
    if row_sigma > 0.0 {
        work = gaussian_along(&work, Axis(0), row_sigma);
    }
    let col_sigma = antialias_sigma(in_cols, cols);
    if col_sigma > 0.0 {
        work = gaussian_along(&work, Axis(1), col_sigma);
    }

    let row_taps = linear_taps(in_rows, rows);
    let col_taps = linear_taps(in_cols, cols);

    let (lo, hi) = input
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    let output = Array2::from_shape_fn((rows, cols), |(r, c)| {
        let (r0, r1, rw) = row_taps[r];
        let (c0, c1, cw) = col_taps[c];
        let top = work[[r0, c0]] * (1.0 - cw) + work[[r0, c1]] * cw;
        let bottom = work[[r1, c0]] * (1.0 - cw) + work[[r1, c1]] * cw;
        let value = (top * (1.0 - rw) + bottom * rw) as f32;
        value.clamp(lo, hi)
    });

    Some(output)
}

/// Smoothing needed before shrinking `n_in` samples to `n_out`.
fn antialias_sigma(n_in: usize, n_out: usize) -> f64 {
    let factor = n_in as f64 / n_out as f64;
    ((factor - 1.0) / 2.0).max(0.0)
}

/// Mirror an integer index into `[0, n)`, reflecting about the edge samples
/// (`d c b | a b c d | c b a`).
fn mirror(index: i64, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n as i64 - 1);
    let mut i = index.rem_euclid(period);
    if i >= n as i64 {
        i = period - i;
    }
    i as usize
}

/// For each output position: the two input indices and the weight of the
/// second one. Centers are aligned, so output `o` samples input coordinate
/// `(o + 0.5) · n_in / n_out − 0.5`.
fn linear_taps(n_in: usize, n_out: usize) -> Vec<(usize, usize, f64)> {
    let scale = n_in as f64 / n_out as f64;
    (0..n_out)
        .map(|o| {
            let x = (o as f64 + 0.5) * scale - 0.5;
            let x0 = x.floor();
            let weight = x - x0;
            let i0 = x0 as i64;
            (mirror(i0, n_in), mirror(i0 + 1, n_in), weight)
        })
        .collect()
}

fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (TRUNCATE * sigma + 0.5) as i64;
    let mut kernel: Vec<f64> = (-radius..=radius)
        .map(|x| (-0.5 * (x as f64 / sigma).powi(2)).exp())
        .collect();
    let sum: f64 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= sum;
    }
    kernel
}

fn gaussian_along(input: &Array2<f64>, axis: Axis, sigma: f64) -> Array2<f64> {
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as i64;
    let mut output = input.clone();

    for (src, mut dst) in input.lanes(axis).into_iter().zip(output.lanes_mut(axis)) {
        let n = src.len();
        for i in 0..n {
            let mut acc = 0.0;
            for (k, w) in kernel.iter().enumerate() {
                let j = mirror(i as i64 + k as i64 - radius, n);
                acc += w * src[j];
            }
            dst[i] = acc;
        }
    }

    output
}
