use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::align::{LocalAlignParams, WarpInterpolation};
use crate::consts::{
    ALLOWED_TILE_SIZES, DEFAULT_CHUNK_SIZE, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_HF_INNER,
    DEFAULT_HF_OUTER, DEFAULT_KEEP_PERCENTAGE, DEFAULT_LOCAL_CONFIDENCE_FLOOR, DEFAULT_MAX_FRAMES,
    DEFAULT_MIN_FRAMES, DEFAULT_MIN_VALID_TILE_FRACTION, DEFAULT_PROGRESS_INTERVAL,
    DEFAULT_ROI_INTERVAL, DEFAULT_TILE_SIZE,
};
use crate::detection::RoiDetectionConfig;
use crate::error::{LuckyStackError, Result};
use crate::quality::QualityWeights;
use crate::sharpen::wavelet::WaveletParams;
use crate::stack::sigma_clip::SigmaClipParams;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Completed frames between two progress events.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub alignment: AlignmentConfig,
    #[serde(default)]
    pub stacking: SigmaClipParams,
    /// Wavelet sharpening of the stack; disabled when absent.
    #[serde(default)]
    pub sharpening: Option<WaveletParams>,
    #[serde(default)]
    pub memory: MemoryConfig,
}

fn default_progress_interval() -> usize {
    DEFAULT_PROGRESS_INTERVAL
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            selection: SelectionConfig::default(),
            analysis: AnalysisConfig::default(),
            alignment: AlignmentConfig::default(),
            stacking: SigmaClipParams::default(),
            sharpening: Some(WaveletParams::default()),
            memory: MemoryConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Fraction of frames to keep, in (0, 1].
    pub keep_percentage: f32,
    pub min_frames: usize,
    pub max_frames: usize,
    /// Window length in source frames for temporally spread selection.
    pub temporal_window: Option<usize>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            keep_percentage: DEFAULT_KEEP_PERCENTAGE,
            min_frames: DEFAULT_MIN_FRAMES,
            max_frames: DEFAULT_MAX_FRAMES,
            temporal_window: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Score every n-th frame.
    pub sample_step: usize,
    /// Analyzed frames between two ROI re-detections.
    pub roi_interval: usize,
    /// High-frequency annulus, as fractions of Nyquist.
    pub hf_inner: f64,
    pub hf_outer: f64,
    pub weights: QualityWeights,
    pub roi_detection: RoiDetectionConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_step: 1,
            roi_interval: DEFAULT_ROI_INTERVAL,
            hf_inner: DEFAULT_HF_INNER,
            hf_outer: DEFAULT_HF_OUTER,
            weights: QualityWeights::default(),
            roi_detection: RoiDetectionConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    /// Phase-correlation confidence below which a frame is kept unshifted.
    pub confidence_threshold: f64,
    pub enable_local_align: bool,
    /// One of 16, 32, 48, 64.
    pub tile_size: usize,
    pub local_confidence_floor: f64,
    pub min_valid_tile_fraction: f64,
    pub interpolation: WarpInterpolation,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            enable_local_align: true,
            tile_size: DEFAULT_TILE_SIZE,
            local_confidence_floor: DEFAULT_LOCAL_CONFIDENCE_FLOOR,
            min_valid_tile_fraction: DEFAULT_MIN_VALID_TILE_FRACTION,
            interpolation: WarpInterpolation::Bicubic,
        }
    }
}

impl AlignmentConfig {
    pub fn local_params(&self) -> LocalAlignParams {
        LocalAlignParams {
            tile_size: self.tile_size,
            confidence_floor: self.local_confidence_floor,
            min_valid_fraction: self.min_valid_tile_fraction,
            interpolation: self.interpolation,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Maximum decoded frames held at once; larger aligned sets are spilled.
    pub chunk_size: usize,
    /// Directory for the spill file; system temp dir when absent.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            scratch_dir: None,
        }
    }
}

/// Named parameter bundles for common subjects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Preset {
    #[default]
    Default,
    /// Bright, well-defined subjects: gentler rejection, stronger fine detail.
    HighContrast,
    /// Faint or low-contrast subjects: keep more frames, suppress the finest layer.
    LowContrast,
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::HighContrast => write!(f, "high-contrast"),
            Self::LowContrast => write!(f, "low-contrast"),
        }
    }
}

impl PipelineConfig {
    pub fn preset(preset: Preset) -> Self {
        let mut config = Self::default();
        match preset {
            Preset::Default => {}
            Preset::HighContrast => {
                config.selection.keep_percentage = 0.15;
                config.stacking.sigma = 3.0;
                config.sharpening = Some(WaveletParams {
                    num_layers: 5,
                    gains: vec![1.2, 2.0, 2.2, 1.6, 1.1],
                });
            }
            Preset::LowContrast => {
                config.selection.keep_percentage = 0.4;
                config.stacking.sigma = 2.0;
                config.stacking.iterations = 3;
                config.alignment.local_confidence_floor = 0.4;
                config.sharpening = Some(WaveletParams {
                    num_layers: 5,
                    gains: vec![0.6, 1.2, 1.6, 1.5, 1.1],
                });
            }
        }
        config
    }

    /// Reject out-of-range options before any processing starts.
    pub fn validate(&self) -> Result<()> {
        let s = &self.selection;
        if !(s.keep_percentage > 0.0 && s.keep_percentage <= 1.0) {
            return invalid(format!(
                "keep_percentage must be in (0, 1], got {}",
                s.keep_percentage
            ));
        }
        if s.max_frames == 0 {
            return invalid("max_frames must be at least 1".into());
        }
        if s.min_frames == 0 {
            return invalid("min_frames must be at least 1".into());
        }
        if s.min_frames > s.max_frames {
            return invalid(format!(
                "min_frames ({}) exceeds max_frames ({})",
                s.min_frames, s.max_frames
            ));
        }
        if s.temporal_window == Some(0) {
            return invalid("temporal_window must be at least 1".into());
        }

        let a = &self.analysis;
        if a.sample_step == 0 {
            return invalid("sample_step must be at least 1".into());
        }
        if a.roi_interval == 0 {
            return invalid("roi_interval must be at least 1".into());
        }
        let w = &a.weights;
        if [w.laplacian, w.gradient, w.high_frequency]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
            || w.total() <= 0.0
        {
            return invalid("quality weights must be non-negative with a positive sum".into());
        }
        if !(a.hf_inner >= 0.0 && a.hf_inner < a.hf_outer && a.hf_outer <= 1.5) {
            return invalid(format!(
                "high-frequency band must satisfy 0 <= inner < outer <= 1.5, got {}..{}",
                a.hf_inner, a.hf_outer
            ));
        }

        let al = &self.alignment;
        if !ALLOWED_TILE_SIZES.contains(&al.tile_size) {
            return invalid(format!(
                "tile_size must be one of {:?}, got {}",
                ALLOWED_TILE_SIZES, al.tile_size
            ));
        }
        if !(0.0..=1.0).contains(&al.confidence_threshold) {
            return invalid(format!(
                "confidence_threshold must be in [0, 1], got {}",
                al.confidence_threshold
            ));
        }
        if !(0.0..=1.0).contains(&al.local_confidence_floor) {
            return invalid(format!(
                "local_confidence_floor must be in [0, 1], got {}",
                al.local_confidence_floor
            ));
        }
        if !(al.min_valid_tile_fraction > 0.0 && al.min_valid_tile_fraction <= 1.0) {
            return invalid(format!(
                "min_valid_tile_fraction must be in (0, 1], got {}",
                al.min_valid_tile_fraction
            ));
        }

        self.stacking.validate()?;
        if let Some(ref wavelet) = self.sharpening {
            wavelet.validate()?;
        }
        if self.memory.chunk_size == 0 {
            return invalid("chunk_size must be at least 1".into());
        }
        if self.progress_interval == 0 {
            return invalid("progress_interval must be at least 1".into());
        }
        Ok(())
    }
}

fn invalid(msg: String) -> Result<()> {
    Err(LuckyStackError::Configuration(msg))
}
