//! Resampling kernels used to apply alignment results.
//!
//! - **Bicubic** (Catmull-Rom): separable, used for whole-frame translations.
//! - **Lanczos-3**: used to apply dense warp fields.
//!
//! Both extrapolate past the border by mirror reflection.

use std::f32::consts::PI;

use ndarray::{Array2, Axis};
use rayon::prelude::*;

use crate::consts::{LANCZOS_RADIUS, PARALLEL_PIXEL_THRESHOLD};

/// Catmull-Rom cubic convolution kernel (a = -0.5).
#[inline]
pub fn catmull_rom(x: f32) -> f32 {
    const A: f32 = -0.5;
    let ax = x.abs();
    if ax <= 1.0 {
        ((A + 2.0) * ax - (A + 3.0)) * ax * ax + 1.0
    } else if ax < 2.0 {
        ((A * ax - 5.0 * A) * ax + 8.0 * A) * ax - 4.0 * A
    } else {
        0.0
    }
}

/// Lanczos kernel: sinc(x) * sinc(x / a) inside the window, zero outside.
#[inline]
pub fn lanczos(x: f32, a: f32) -> f32 {
    let ax = x.abs();
    if ax < 1e-6 {
        return 1.0;
    }
    if ax >= a {
        return 0.0;
    }
    let pi_x = PI * x;
    let pi_x_a = pi_x / a;
    (pi_x.sin() / pi_x) * (pi_x_a.sin() / pi_x_a)
}

/// Mirror an out-of-range index back into `[0, n)` without repeating the edge sample.
#[inline]
pub fn reflect_index(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let n = n as isize;
    let period = 2 * (n - 1);
    let mut m = i.rem_euclid(period);
    if m >= n {
        m = period - m;
    }
    m as usize
}

/// Cubic weights and the first tap for sampling at fractional position `pos`.
#[inline]
fn cubic_taps(pos: f64) -> (isize, [f32; 4]) {
    let base = pos.floor();
    let t = (pos - base) as f32;
    let start = base as isize - 1;
    (
        start,
        [
            catmull_rom(t + 1.0),
            catmull_rom(t),
            catmull_rom(1.0 - t),
            catmull_rom(2.0 - t),
        ],
    )
}

/// Translate a plane: `out(x, y) = data(x + dx, y + dy)`, Catmull-Rom, reflect border.
///
/// The shift is constant over the image, so the kernel is applied separably
/// (rows, then columns) with one weight set per axis.
pub fn shift_bicubic(data: &Array2<f32>, dx: f64, dy: f64) -> Array2<f32> {
    if dx == 0.0 && dy == 0.0 {
        return data.clone();
    }
    let (h, w) = data.dim();
    let parallel = h * w >= PARALLEL_PIXEL_THRESHOLD;

    let (x_start, wx) = cubic_taps(dx);
    let mut rows_pass = Array2::<f32>::zeros((h, w));
    let shift_row = |src: ndarray::ArrayView1<f32>, mut dst: ndarray::ArrayViewMut1<f32>| {
        for col in 0..w {
            let mut acc = 0.0f32;
            for (k, &wk) in wx.iter().enumerate() {
                let c = reflect_index(col as isize + x_start + k as isize, w);
                acc += wk * src[c];
            }
            dst[col] = acc;
        }
    };
    if parallel {
        rows_pass
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(data.axis_iter(Axis(0)).into_par_iter())
            .for_each(|(dst, src)| shift_row(src, dst));
    } else {
        for (dst, src) in rows_pass.axis_iter_mut(Axis(0)).zip(data.axis_iter(Axis(0))) {
            shift_row(src, dst);
        }
    }

    let (y_start, wy) = cubic_taps(dy);
    let mut out = Array2::<f32>::zeros((h, w));
    let shift_out_row = |row: usize, mut dst: ndarray::ArrayViewMut1<f32>| {
        let taps: Vec<(usize, f32)> = wy
            .iter()
            .enumerate()
            .map(|(k, &wk)| (reflect_index(row as isize + y_start + k as isize, h), wk))
            .collect();
        for col in 0..w {
            dst[col] = taps.iter().map(|&(r, wk)| wk * rows_pass[[r, col]]).sum();
        }
    };
    if parallel {
        out.axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(row, dst)| shift_out_row(row, dst));
    } else {
        for (row, dst) in out.axis_iter_mut(Axis(0)).enumerate() {
            shift_out_row(row, dst);
        }
    }
    out
}

/// Lanczos-3 sample of `data` at a fractional position, reflect border.
/// Kernel weights are renormalized to sum to one.
pub fn sample_lanczos(data: &Array2<f32>, x: f64, y: f64) -> f32 {
    let (h, w) = data.dim();
    let a = LANCZOS_RADIUS as isize;
    let x0 = x.floor() as isize;
    let y0 = y.floor() as isize;
    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;

    let mut wx = [0.0f32; 2 * LANCZOS_RADIUS];
    let mut wy = [0.0f32; 2 * LANCZOS_RADIUS];
    for k in 0..2 * LANCZOS_RADIUS {
        let offset = k as isize - a + 1;
        wx[k] = lanczos(fx - offset as f32, a as f32);
        wy[k] = lanczos(fy - offset as f32, a as f32);
    }

    let mut acc = 0.0f32;
    let mut norm = 0.0f32;
    for (j, &wyj) in wy.iter().enumerate() {
        let r = reflect_index(y0 + j as isize - a + 1, h);
        for (i, &wxi) in wx.iter().enumerate() {
            let c = reflect_index(x0 + i as isize - a + 1, w);
            let weight = wyj * wxi;
            acc += weight * data[[r, c]];
            norm += weight;
        }
    }
    if norm.abs() > 1e-6 {
        acc / norm
    } else {
        acc
    }
}
