use ndarray::{Array2, Axis};
use rayon::prelude::*;

use crate::consts::PARALLEL_PIXEL_THRESHOLD;

/// Separable Gaussian blur with clamp-to-edge borders.
///
/// `sigma <= 0` returns a copy of the input.
pub fn gaussian_blur_array(data: &Array2<f32>, sigma: f32) -> Array2<f32> {
    if sigma <= 0.0 {
        return data.clone();
    }
    let kernel = make_gaussian_kernel(sigma);
    let row_pass = convolve_axis(data, &kernel, Axis(1));
    convolve_axis(&row_pass, &kernel, Axis(0))
}

fn make_gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (sigma * 3.0).ceil() as usize;
    let s2 = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (0..=2 * radius)
        .map(|i| {
            let x = i as f32 - radius as f32;
            (-x * x / s2).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|v| *v /= sum);
    kernel
}

/// 1-D convolution along `axis` (1 = along rows, 0 = along columns).
fn convolve_axis(data: &Array2<f32>, kernel: &[f32], axis: Axis) -> Array2<f32> {
    let (h, w) = data.dim();
    let radius = kernel.len() as isize / 2;
    let along_rows = axis == Axis(1);
    let len = if along_rows { w } else { h } as isize;

    let pixel = |row: usize, col: usize| -> f32 {
        let (pos, fixed) = if along_rows { (col, row) } else { (row, col) };
        kernel
            .iter()
            .enumerate()
            .map(|(ki, &kv)| {
                let src = (pos as isize + ki as isize - radius).clamp(0, len - 1) as usize;
                let v = if along_rows {
                    data[[fixed, src]]
                } else {
                    data[[src, fixed]]
                };
                v * kv
            })
            .sum()
    };

    let mut result = Array2::<f32>::zeros((h, w));
    if h * w >= PARALLEL_PIXEL_THRESHOLD {
        result
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(row, mut out)| {
                for col in 0..w {
                    out[col] = pixel(row, col);
                }
            });
    } else {
        for ((row, col), out) in result.indexed_iter_mut() {
            *out = pixel(row, col);
        }
    }
    result
}
