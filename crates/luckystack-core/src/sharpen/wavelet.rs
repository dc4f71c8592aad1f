use ndarray::{Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::consts::{B3_KERNEL, DEFAULT_WAVELET_GAINS, DEFAULT_WAVELET_LAYERS, PARALLEL_PIXEL_THRESHOLD};
use crate::error::{LuckyStackError, Result};
use crate::frame::Frame;

/// Parameters for wavelet sharpening.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaveletParams {
    /// Number of detail layers.
    pub num_layers: usize,
    /// Gain per detail layer, finest first: >1.0 sharpens, <1.0 suppresses.
    pub gains: Vec<f32>,
}

impl Default for WaveletParams {
    fn default() -> Self {
        Self {
            num_layers: DEFAULT_WAVELET_LAYERS,
            gains: DEFAULT_WAVELET_GAINS.to_vec(),
        }
    }
}

impl WaveletParams {
    pub fn validate(&self) -> Result<()> {
        if self.num_layers == 0 {
            return Err(LuckyStackError::Configuration(
                "wavelet num_layers must be at least 1".into(),
            ));
        }
        check_gains(&self.gains, self.num_layers)
    }
}

fn check_gains(gains: &[f32], num_layers: usize) -> Result<()> {
    if gains.len() != num_layers {
        return Err(LuckyStackError::Configuration(format!(
            "{} wavelet gains given for {} layers",
            gains.len(),
            num_layers
        )));
    }
    if gains.iter().any(|g| !g.is_finite()) {
        return Err(LuckyStackError::Configuration(
            "wavelet gains must be finite".into(),
        ));
    }
    Ok(())
}

/// Detail layers (finest first) and the final smoothed residual of one plane.
///
/// `sum(layers) + residual` reproduces the source plane.
#[derive(Clone, Debug)]
pub struct WaveletPyramid {
    pub layers: Vec<Array2<f32>>,
    pub residual: Array2<f32>,
}

impl WaveletPyramid {
    /// À trous decomposition with the B3-spline kernel.
    pub fn decompose(data: &Array2<f32>, num_layers: usize) -> Self {
        let mut layers = Vec::with_capacity(num_layers);
        let mut current = data.clone();
        for scale in 0..num_layers {
            let smoothed = atrous_convolve(&current, scale);
            layers.push(&current - &smoothed);
            current = smoothed;
        }
        Self {
            layers,
            residual: current,
        }
    }

    /// Weighted sum of the layers; the residual is never scaled. Not clamped.
    pub fn reconstruct(&self, gains: &[f32]) -> Array2<f32> {
        let mut result = self.residual.clone();
        for (layer, &gain) in self.layers.iter().zip(gains) {
            result.scaled_add(gain, layer);
        }
        result
    }
}

/// Cached per-channel decomposition of one image.
///
/// Build once, then call [`apply`](Self::apply) with as many gain sets as needed.
pub struct WaveletSharpener {
    source: Frame,
    pyramids: Vec<WaveletPyramid>,
}

impl WaveletSharpener {
    pub fn new(frame: &Frame, num_layers: usize) -> Self {
        let pyramids = frame
            .channels
            .par_iter()
            .map(|c| WaveletPyramid::decompose(c, num_layers))
            .collect();
        Self {
            source: frame.with_channels(Vec::new()),
            pyramids,
        }
    }

    pub fn num_layers(&self) -> usize {
        self.pyramids.first().map_or(0, |p| p.layers.len())
    }

    pub fn pyramids(&self) -> &[WaveletPyramid] {
        &self.pyramids
    }

    /// Recombine with `gains` (one per layer) and clamp to [0, 1].
    pub fn apply(&self, gains: &[f32]) -> Result<Frame> {
        check_gains(gains, self.num_layers())?;
        let channels = self
            .pyramids
            .par_iter()
            .map(|p| {
                let mut out = p.reconstruct(gains);
                out.mapv_inplace(|v| v.clamp(0.0, 1.0));
                out
            })
            .collect();
        Ok(self.source.with_channels(channels))
    }
}

/// Decompose and recombine in one call.
pub fn sharpen(frame: &Frame, params: &WaveletParams) -> Result<Frame> {
    params.validate()?;
    WaveletSharpener::new(frame, params.num_layers).apply(&params.gains)
}

/// B3 smoothing at `scale`: taps spaced `2^scale` apart, rows then columns.
fn atrous_convolve(data: &Array2<f32>, scale: usize) -> Array2<f32> {
    let step = 1usize << scale;
    let rows = convolve_atrous(data, step, Axis(1));
    convolve_atrous(&rows, step, Axis(0))
}

fn convolve_atrous(data: &Array2<f32>, step: usize, axis: Axis) -> Array2<f32> {
    let (h, w) = data.dim();
    let along_rows = axis == Axis(1);
    let len = if along_rows { w } else { h };

    let pixel = |row: usize, col: usize| -> f32 {
        let (pos, fixed) = if along_rows { (col, row) } else { (row, col) };
        B3_KERNEL
            .iter()
            .enumerate()
            .map(|(ki, &kv)| {
                let src = mirror_index(pos as isize + (ki as isize - 2) * step as isize, len);
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

/// Reflect an index into `[0, size)`, repeating the edge sample (f(-1) = f(0)).
pub fn mirror_index(idx: isize, size: usize) -> usize {
    if size <= 1 {
        return 0;
    }
    let period = 2 * size;
    let m = idx.rem_euclid(period as isize) as usize;
    if m < size {
        m
    } else {
        period - 1 - m
    }
}
