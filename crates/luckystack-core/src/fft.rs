use std::f64::consts::TAU;
use std::sync::Arc;

use ndarray::Array2;
use num_complex::Complex;
use rayon::prelude::*;
use rustfft::{Fft, FftDirection, FftPlanner};

use crate::consts::PARALLEL_PIXEL_THRESHOLD;

/// Forward 2-D FFT of a real plane.
pub fn fft2d_forward(data: &Array2<f32>) -> Array2<Complex<f64>> {
    let mut spectrum = data.mapv(|v| Complex::new(v as f64, 0.0));
    transform_in_place(&mut spectrum, FftDirection::Forward);
    spectrum
}

/// Inverse 2-D FFT, normalized by `1/(h*w)`, returning the real part.
pub fn ifft2d_inverse(spectrum: &Array2<Complex<f64>>) -> Array2<f64> {
    let (h, w) = spectrum.dim();
    let mut data = spectrum.clone();
    transform_in_place(&mut data, FftDirection::Inverse);
    let norm = 1.0 / (h * w) as f64;
    data.mapv(|c| c.re * norm)
}

fn transform_in_place(data: &mut Array2<Complex<f64>>, direction: FftDirection) {
    let (h, w) = data.dim();
    let mut planner = FftPlanner::new();
    let fft_row = planner.plan_fft(w, direction);
    let fft_col = planner.plan_fft(h, direction);

    if h * w >= PARALLEL_PIXEL_THRESHOLD {
        transform_parallel(data, &fft_row, &fft_col);
    } else {
        transform_sequential(data, &fft_row, &fft_col);
    }
}

fn transform_parallel(
    data: &mut Array2<Complex<f64>>,
    fft_row: &Arc<dyn Fft<f64>>,
    fft_col: &Arc<dyn Fft<f64>>,
) {
    data.axis_iter_mut(ndarray::Axis(0))
        .into_par_iter()
        .for_each(|mut row| {
            let mut buf: Vec<Complex<f64>> = row.to_vec();
            fft_row.process(&mut buf);
            row.iter_mut().zip(buf).for_each(|(dst, v)| *dst = v);
        });
    data.axis_iter_mut(ndarray::Axis(1))
        .into_par_iter()
        .for_each(|mut col| {
            let mut buf: Vec<Complex<f64>> = col.to_vec();
            fft_col.process(&mut buf);
            col.iter_mut().zip(buf).for_each(|(dst, v)| *dst = v);
        });
}

fn transform_sequential(
    data: &mut Array2<Complex<f64>>,
    fft_row: &Arc<dyn Fft<f64>>,
    fft_col: &Arc<dyn Fft<f64>>,
) {
    let (h, w) = data.dim();
    let mut row_buf = vec![Complex::new(0.0, 0.0); w];
    for r in 0..h {
        for c in 0..w {
            row_buf[c] = data[[r, c]];
        }
        fft_row.process(&mut row_buf);
        for c in 0..w {
            data[[r, c]] = row_buf[c];
        }
    }

    let mut col_buf = vec![Complex::new(0.0, 0.0); h];
    for c in 0..w {
        for r in 0..h {
            col_buf[r] = data[[r, c]];
        }
        fft_col.process(&mut col_buf);
        for r in 0..h {
            data[[r, c]] = col_buf[r];
        }
    }
}

/// Multiply by a separable 2-D Hann window to suppress edge discontinuities.
pub fn hann_window(data: &Array2<f32>) -> Array2<f32> {
    let (h, w) = data.dim();
    let wy: Vec<f64> = (0..h)
        .map(|r| 0.5 * (1.0 - (TAU * r as f64 / h as f64).cos()))
        .collect();
    let wx: Vec<f64> = (0..w)
        .map(|c| 0.5 * (1.0 - (TAU * c as f64 / w as f64).cos()))
        .collect();
    Array2::from_shape_fn((h, w), |(r, c)| data[[r, c]] * (wy[r] * wx[c]) as f32)
}

/// Signed frequency of bin `k` in a transform of length `n`, as a fraction of Nyquist.
pub fn normalized_frequency(k: usize, n: usize) -> f64 {
    if n < 2 {
        return 0.0;
    }
    let signed = if k <= n / 2 {
        k as f64
    } else {
        k as f64 - n as f64
    };
    signed / (n as f64 / 2.0)
}
