use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_SIGMA_ITERATIONS, DEFAULT_SIGMA_THRESHOLD};
use crate::error::{LuckyStackError, Result};

/// Parameters for sigma-clipped weighted mean stacking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigmaClipParams {
    /// Samples at or beyond `sigma` standard deviations from the mean are rejected.
    pub sigma: f32,
    /// Number of rejection passes.
    pub iterations: usize,
}

impl Default for SigmaClipParams {
    fn default() -> Self {
        Self {
            sigma: DEFAULT_SIGMA_THRESHOLD,
            iterations: DEFAULT_SIGMA_ITERATIONS,
        }
    }
}

impl SigmaClipParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.sigma > 0.0 && self.sigma.is_finite()) {
            return Err(LuckyStackError::Configuration(format!(
                "sigma threshold must be positive, got {}",
                self.sigma
            )));
        }
        Ok(())
    }
}

/// Weighted running sums over the accepted samples of one pixel.
#[derive(Clone, Copy, Debug, Default)]
pub struct StackAccumulator {
    pub weighted_sum: f64,
    pub weighted_sum_squares: f64,
    pub accepted_weight: f64,
}

impl StackAccumulator {
    pub fn add(&mut self, value: f64, weight: f64) {
        self.weighted_sum += weight * value;
        self.weighted_sum_squares += weight * value * value;
        self.accepted_weight += weight;
    }

    /// Weighted mean, `None` when no weight was accepted.
    pub fn mean(&self) -> Option<f64> {
        (self.accepted_weight > 0.0).then(|| self.weighted_sum / self.accepted_weight)
    }

    /// Weighted population standard deviation.
    pub fn stddev(&self) -> Option<f64> {
        let mean = self.mean()?;
        let var = self.weighted_sum_squares / self.accepted_weight - mean * mean;
        Some(var.max(0.0).sqrt())
    }
}

/// Sigma-clipped weighted mean of one pixel's samples.
///
/// `mask` is scratch space of the same length as `values`. Each pass keeps
/// samples with `|x - mean| < k * sigma`; a pass that would reject everything
/// is abandoned. With no usable weight the plain mean is returned.
pub fn clip_pixel(values: &[f32], weights: &[f32], mask: &mut [bool], params: &SigmaClipParams) -> f32 {
    mask.iter_mut().for_each(|m| *m = true);
    let k = params.sigma as f64;

    let accumulate = |mask: &[bool]| {
        let mut acc = StackAccumulator::default();
        for ((&v, &w), &keep) in values.iter().zip(weights).zip(mask) {
            if keep {
                acc.add(v as f64, w as f64);
            }
        }
        acc
    };

    let unclipped = accumulate(mask);
    let Some(mut mean) = unclipped.mean() else {
        return plain_mean(values);
    };
    let mut stddev = unclipped.stddev().unwrap_or(0.0);

    for _ in 0..params.iterations {
        if stddev <= f64::EPSILON {
            break;
        }
        let band = k * stddev;
        let survivors = values
            .iter()
            .zip(mask.iter())
            .filter(|&(&v, &keep)| keep && (v as f64 - mean).abs() < band)
            .count();
        if survivors == 0 {
            break;
        }
        for (&v, keep) in values.iter().zip(mask.iter_mut()) {
            if *keep && (v as f64 - mean).abs() >= band {
                *keep = false;
            }
        }
        let acc = accumulate(mask);
        match (acc.mean(), acc.stddev()) {
            (Some(m), Some(s)) => {
                mean = m;
                stddev = s;
            }
            // Survivors carry zero weight.
            _ => return unclipped.mean().map_or_else(|| plain_mean(values), |m| m as f32),
        }
    }

    mean as f32
}

fn plain_mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64) as f32
}
