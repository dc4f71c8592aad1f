use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_ROI_BLUR_SIGMA, DEFAULT_ROI_MIN_AREA, DEFAULT_ROI_PADDING_FRACTION,
};
use crate::filters::gaussian_blur::gaussian_blur_array;
use crate::frame::Roi;

use super::components::connected_components;
use super::morphology::morphological_opening;
use super::threshold::{compute_threshold, ThresholdMethod};

/// Coarse subject detection settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoiDetectionConfig {
    /// Gaussian blur sigma applied before thresholding.
    pub blur_sigma: f32,
    /// Smallest component (pixels) accepted as the subject.
    pub min_area: usize,
    /// Bounding-box padding as a fraction of its size on each side.
    pub padding_fraction: f32,
    pub threshold: ThresholdMethod,
}

impl Default for RoiDetectionConfig {
    fn default() -> Self {
        Self {
            blur_sigma: DEFAULT_ROI_BLUR_SIGMA,
            min_area: DEFAULT_ROI_MIN_AREA,
            padding_fraction: DEFAULT_ROI_PADDING_FRACTION,
            threshold: ThresholdMethod::Otsu,
        }
    }
}

/// Bounding box of the brightest coherent region of a luminance plane.
///
/// Blur, threshold, open, keep the largest 4-connected component, pad and
/// clamp to the frame. `None` when no component reaches `min_area`.
pub fn detect_roi(luminance: &Array2<f32>, config: &RoiDetectionConfig) -> Option<Roi> {
    let (h, w) = luminance.dim();
    if h == 0 || w == 0 {
        return None;
    }

    let blurred = gaussian_blur_array(luminance, config.blur_sigma);
    let level = compute_threshold(&blurred, config.threshold);
    let mask = morphological_opening(&blurred.mapv(|v| v > level));

    let largest = connected_components(&mask).into_iter().next()?;
    if largest.area < config.min_area {
        return None;
    }

    let b = largest.bounds;
    let pad_x = (b.width as f32 * config.padding_fraction).ceil() as usize;
    let pad_y = (b.height as f32 * config.padding_fraction).ceil() as usize;
    let x0 = b.x.saturating_sub(pad_x);
    let y0 = b.y.saturating_sub(pad_y);
    Roi {
        x: x0,
        y: y0,
        width: b.x + b.width + pad_x - x0,
        height: b.y + b.height + pad_y - y0,
    }
    .clamp_to(w, h)
}
