use ndarray::Array2;
use num_complex::Complex;
use rayon::prelude::*;

use crate::consts::{CROSS_POWER_REGULARIZATION, EPSILON};
use crate::error::{LuckyStackError, Result};
use crate::fft::{fft2d_forward, hann_window, ifft2d_inverse};
use crate::frame::{AlignmentOffset, Frame};

use super::interpolation::shift_bicubic;
use super::subpixel::refine_peak_parabolic;

/// Translation measured by phase correlation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhaseCorrelation {
    pub offset: AlignmentOffset,
    /// Peak height relative to a perfect match, in [0, 1].
    pub confidence: f64,
}

/// Measure the displacement of `target` relative to `reference`.
///
/// `offset` is such that `target(x + dx, y + dy) ≈ reference(x, y)`.
pub fn compute_offset_array(
    reference: &Array2<f32>,
    target: &Array2<f32>,
) -> Result<PhaseCorrelation> {
    let (h, w) = reference.dim();
    let (th, tw) = target.dim();
    if h != th || w != tw {
        return Err(LuckyStackError::AlignmentFailure {
            index: 0,
            reason: format!("array size mismatch: {}x{} vs {}x{}", w, h, tw, th),
        });
    }
    if h < 2 || w < 2 {
        return Err(LuckyStackError::InvalidDimensions {
            width: w,
            height: h,
        });
    }

    let ref_fft = fft2d_forward(&hann_window(reference));
    let tgt_fft = fft2d_forward(&hann_window(target));

    let (cross_power, mean_weight) = normalized_cross_power(&ref_fft, &tgt_fft);
    if mean_weight <= EPSILON as f64 {
        // Both spectra are empty: nothing to correlate.
        return Ok(PhaseCorrelation {
            offset: AlignmentOffset::default(),
            confidence: 0.0,
        });
    }

    let correlation = ifft2d_inverse(&cross_power);
    let (peak_row, peak_col, peak_val) = find_peak(&correlation);
    let (sub_dy, sub_dx) = refine_peak_parabolic(&correlation, peak_row, peak_col, true);

    // The peak sits at minus the displacement, modulo the frame size.
    let peak_y = wrap_signed(peak_row, h) + sub_dy;
    let peak_x = wrap_signed(peak_col, w) + sub_dx;

    Ok(PhaseCorrelation {
        offset: AlignmentOffset {
            dx: -peak_x,
            dy: -peak_y,
        },
        confidence: (peak_val / mean_weight).clamp(0.0, 1.0),
    })
}

/// Phase-correlate the luminance of two frames.
pub fn compute_offset(reference: &Frame, target: &Frame) -> Result<PhaseCorrelation> {
    compute_offset_array(&reference.luminance(), &target.luminance()).map_err(|e| match e {
        LuckyStackError::AlignmentFailure { reason, .. } => LuckyStackError::AlignmentFailure {
            index: target.index,
            reason,
        },
        other => other,
    })
}

/// Resample every channel of a frame so that it lines up with the reference.
pub fn shift_frame(frame: &Frame, offset: &AlignmentOffset) -> Frame {
    let channels: Vec<Array2<f32>> = frame
        .channels
        .par_iter()
        .map(|c| shift_bicubic(c, offset.dx, offset.dy))
        .collect();
    frame.with_channels(channels)
}

/// `R = C / (|C| + ε)` with `C = F1·conj(F2)` and `ε` relative to `max|C|`.
///
/// Returns the spectrum and the mean of `|R|`, which is the height a perfect
/// match reaches after the inverse transform.
fn normalized_cross_power(
    ref_fft: &Array2<Complex<f64>>,
    tgt_fft: &Array2<Complex<f64>>,
) -> (Array2<Complex<f64>>, f64) {
    let cross = ndarray::Zip::from(ref_fft)
        .and(tgt_fft)
        .map_collect(|a, b| a * b.conj());
    let max_mag = cross.iter().map(|c| c.norm()).fold(0.0f64, f64::max);
    let eps = CROSS_POWER_REGULARIZATION * max_mag + f64::MIN_POSITIVE;

    let mut weight_sum = 0.0;
    let normalized = cross.mapv(|c| {
        let mag = c.norm();
        let scale = 1.0 / (mag + eps);
        weight_sum += mag * scale;
        c * scale
    });
    let mean_weight = weight_sum / normalized.len() as f64;
    (normalized, mean_weight)
}

fn find_peak(data: &Array2<f64>) -> (usize, usize, f64) {
    let mut best = (0, 0, f64::NEG_INFINITY);
    for ((row, col), &v) in data.indexed_iter() {
        if v > best.2 {
            best = (row, col, v);
        }
    }
    best
}

fn wrap_signed(i: usize, n: usize) -> f64 {
    if i > n / 2 {
        i as f64 - n as f64
    } else {
        i as f64
    }
}
