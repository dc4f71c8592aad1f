use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::consts::OTSU_HISTOGRAM_BINS;

/// How the subject is separated from the background.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum ThresholdMethod {
    /// Otsu's method: maximizes between-class variance of the histogram.
    #[default]
    Otsu,
    /// mean + k * stddev.
    MeanPlusSigma(f32),
    /// Fixed level in [0.0, 1.0].
    Fixed(f32),
}

pub fn compute_threshold(data: &Array2<f32>, method: ThresholdMethod) -> f32 {
    match method {
        ThresholdMethod::Otsu => otsu_threshold(data),
        ThresholdMethod::MeanPlusSigma(k) => {
            let (mean, std) = mean_stddev(data);
            (mean + k as f64 * std) as f32
        }
        ThresholdMethod::Fixed(v) => v,
    }
}

/// Population mean and standard deviation.
pub fn mean_stddev(data: &Array2<f32>) -> (f64, f64) {
    let n = data.len() as f64;
    if n == 0.0 {
        return (0.0, 0.0);
    }
    let mean = data.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = data.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

pub fn otsu_threshold(data: &Array2<f32>) -> f32 {
    let bins = OTSU_HISTOGRAM_BINS;
    let mut histogram = vec![0u64; bins];
    for &v in data.iter() {
        let bin = ((v.clamp(0.0, 1.0) * (bins - 1) as f32) as usize).min(bins - 1);
        histogram[bin] += 1;
    }

    let total = data.len() as f64;
    let sum_all: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c as f64)
        .sum();

    let mut weight_bg = 0.0f64;
    let mut sum_bg = 0.0f64;
    let mut best = (0.0f64, 0usize);
    for (i, &count) in histogram.iter().enumerate() {
        weight_bg += count as f64;
        if weight_bg == 0.0 {
            continue;
        }
        let weight_fg = total - weight_bg;
        if weight_fg == 0.0 {
            break;
        }
        sum_bg += i as f64 * count as f64;
        let mean_bg = sum_bg / weight_bg;
        let mean_fg = (sum_all - sum_bg) / weight_fg;
        let between = weight_bg * weight_fg * (mean_bg - mean_fg).powi(2);
        if between > best.0 {
            best = (between, i);
        }
    }

    // Upper edge of the last background bin.
    (best.1 + 1) as f32 / (bins - 1) as f32
}
