pub mod gradient;
pub mod laplacian;
pub mod spectral;

use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::consts::{
    DEFAULT_GRADIENT_WEIGHT, DEFAULT_HF_INNER, DEFAULT_HF_OUTER, DEFAULT_HIGH_FREQUENCY_WEIGHT,
    DEFAULT_LAPLACIAN_WEIGHT,
};
use crate::detection::detect_roi;
use crate::error::Result;
use crate::frame::{Frame, Roi};
use crate::pipeline::config::AnalysisConfig;
use crate::pipeline::{AnalysisReport, FrameDiagnostic, PipelineControl, PipelineState, ProgressThrottle};
use crate::source::FrameSource;

use gradient::gradient_energy_array;
use laplacian::laplacian_variance_array;
use spectral::high_frequency_energy_array;

/// Relative weight of each sharpness sub-metric in the combined score.
///
/// The defaults are provisional and untuned.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityWeights {
    pub laplacian: f64,
    pub gradient: f64,
    pub high_frequency: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            laplacian: DEFAULT_LAPLACIAN_WEIGHT,
            gradient: DEFAULT_GRADIENT_WEIGHT,
            high_frequency: DEFAULT_HIGH_FREQUENCY_WEIGHT,
        }
    }
}

impl QualityWeights {
    pub fn total(&self) -> f64 {
        self.laplacian + self.gradient + self.high_frequency
    }
}

/// Raw (un-normalized) sharpness measurements of one region.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SharpnessMetrics {
    pub laplacian_variance: f64,
    pub gradient_energy: f64,
    pub high_frequency_energy: f64,
}

/// Sharpness of one frame. `score` is only comparable within one batch.
#[derive(Clone, Debug, PartialEq)]
pub struct QualityRecord {
    pub frame_index: usize,
    pub metrics: SharpnessMetrics,
    /// Weighted sum of the raw metrics; informational.
    pub raw_metric: f64,
    /// Batch-normalized combined score in [0, 1].
    pub score: f64,
    pub roi: Roi,
}

/// Scores luminance regions with a fixed configuration.
#[derive(Clone, Debug)]
pub struct QualityScorer {
    pub weights: QualityWeights,
    pub hf_inner: f64,
    pub hf_outer: f64,
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self {
            weights: QualityWeights::default(),
            hf_inner: DEFAULT_HF_INNER,
            hf_outer: DEFAULT_HF_OUTER,
        }
    }
}

impl QualityScorer {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            weights: config.weights,
            hf_inner: config.hf_inner,
            hf_outer: config.hf_outer,
        }
    }

    /// Raw sub-metrics of a luminance region. Deterministic, no side effects.
    pub fn measure(&self, region: &Array2<f32>) -> SharpnessMetrics {
        SharpnessMetrics {
            laplacian_variance: laplacian_variance_array(region),
            gradient_energy: gradient_energy_array(region),
            high_frequency_energy: high_frequency_energy_array(region, self.hf_inner, self.hf_outer),
        }
    }

    pub fn raw_metric(&self, m: &SharpnessMetrics) -> f64 {
        self.weights.laplacian * m.laplacian_variance
            + self.weights.gradient * m.gradient_energy
            + self.weights.high_frequency * m.high_frequency_energy
    }

    /// Measure the luminance of `frame` inside `roi` (whole frame when `None`).
    /// The record's score is left at 0 until the batch is normalized.
    pub fn record(&self, frame: &Frame, roi: Option<Roi>) -> QualityRecord {
        let luminance = frame.luminance();
        let (h, w) = luminance.dim();
        let roi = roi
            .and_then(|r| r.clamp_to(w, h))
            .unwrap_or_else(|| Roi::full(w, h));
        let metrics = self.measure(&roi.crop(&luminance));
        QualityRecord {
            frame_index: frame.index,
            metrics,
            raw_metric: self.raw_metric(&metrics),
            score: 0.0,
            roi,
        }
    }

    /// Min-max normalize each sub-metric across `records` and combine.
    ///
    /// A sub-metric with zero range gives every record 1.0 for it.
    pub fn normalize(&self, records: &mut [QualityRecord]) {
        if records.is_empty() {
            return;
        }
        let range = |f: fn(&SharpnessMetrics) -> f64| {
            records.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
                let v = f(&r.metrics);
                (lo.min(v), hi.max(v))
            })
        };
        let lap = range(|m| m.laplacian_variance);
        let grad = range(|m| m.gradient_energy);
        let hf = range(|m| m.high_frequency_energy);
        let total = self.weights.total();

        for r in records.iter_mut() {
            let combined = self.weights.laplacian * min_max(r.metrics.laplacian_variance, lap)
                + self.weights.gradient * min_max(r.metrics.gradient_energy, grad)
                + self.weights.high_frequency * min_max(r.metrics.high_frequency_energy, hf);
            r.score = if total > 0.0 {
                (combined / total).clamp(0.0, 1.0)
            } else {
                1.0
            };
        }
    }

    /// Score a set of in-memory frames against a shared ROI, normalized together.
    pub fn score_frames(&self, frames: &[Frame], roi: Option<Roi>) -> Vec<QualityRecord> {
        let mut records: Vec<QualityRecord> =
            frames.par_iter().map(|f| self.record(f, roi)).collect();
        self.normalize(&mut records);
        records
    }
}

fn min_max(v: f64, (lo, hi): (f64, f64)) -> f64 {
    let span = hi - lo;
    if span > 0.0 && span.is_finite() {
        (v - lo) / span
    } else {
        1.0
    }
}

/// Score every `sample_step`-th frame of `source`.
///
/// Frames are fetched and scored in parallel chunks of at most `chunk_size`.
/// The ROI is re-detected on the first frame of every `roi_interval`
/// analyzed frames, sequentially before the chunk is scored. Frames that
/// fail to decode are recorded as diagnostics and skipped.
pub fn analyze(
    source: &dyn FrameSource,
    config: &AnalysisConfig,
    chunk_size: usize,
    progress_interval: usize,
    control: &PipelineControl,
) -> Result<AnalysisReport> {
    let total = source.frame_count();
    let step = config.sample_step.max(1);
    let interval = config.roi_interval.max(1);
    let scorer = QualityScorer::from_config(config);
    let indices: Vec<usize> = (0..total).step_by(step).collect();
    info!(total_frames = total, sampled = indices.len(), "Analyzing frame quality");

    let throttle = ProgressThrottle::new(control, PipelineState::Analyzing, indices.len(), progress_interval);
    let mut records = Vec::with_capacity(indices.len());
    let mut diagnostics = Vec::new();
    let mut current_roi: Option<Roi> = None;

    // Position within the analysis schedule; drives ROI re-detection.
    let mut position = 0usize;
    for chunk in indices.chunks(chunk_size.max(1)) {
        control.check_cancelled()?;

        // Frames to score with the ROI in force for each; frames that open an
        // interval are fetched here for detection and handed over.
        let mut jobs: Vec<(usize, Option<Roi>, Option<Frame>)> = Vec::with_capacity(chunk.len());
        for &index in chunk {
            let opens_interval = position % interval == 0;
            position += 1;
            if !opens_interval {
                jobs.push((index, current_roi, None));
                continue;
            }
            match source.get_frame(index) {
                Ok(frame) => {
                    current_roi = detect_roi(&frame.luminance(), &config.roi_detection);
                    debug!(frame = index, roi = ?current_roi, "ROI re-detected");
                    jobs.push((index, current_roi, Some(frame)));
                }
                Err(e) => {
                    warn!(frame = index, error = %e, "Frame could not be read");
                    diagnostics.push(FrameDiagnostic::from_error(index, PipelineState::Analyzing, &e));
                    throttle.advance();
                }
            }
        }

        let scored: Vec<(usize, Result<QualityRecord>)> = jobs
            .into_par_iter()
            .map(|(index, roi, prefetched)| {
                let frame = match prefetched {
                    Some(f) => Ok(f),
                    None => source.get_frame(index),
                };
                let result = frame.map(|f| scorer.record(&f, roi));
                throttle.advance();
                (index, result)
            })
            .collect();

        for (index, result) in scored {
            match result {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(frame = index, error = %e, "Frame could not be read");
                    diagnostics.push(FrameDiagnostic::from_error(index, PipelineState::Analyzing, &e));
                }
            }
        }
    }

    scorer.normalize(&mut records);
    records.sort_by_key(|r| r.frame_index);
    throttle.finish();

    info!(analyzed = records.len(), skipped = diagnostics.len(), "Quality analysis complete");
    Ok(AnalysisReport {
        total_frames: total,
        analyzed: records.len(),
        records,
        diagnostics,
    })
}
