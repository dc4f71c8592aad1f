pub mod interpolation;
pub mod local;
pub mod phase_correlation;
pub mod subpixel;
pub mod warp_field;

use ndarray::Array2;
use tracing::debug;

use crate::error::{LuckyStackError, Result};
use crate::frame::{AlignmentOffset, Frame, Roi};

pub use local::{LocalAlignParams, LocalAligner};
pub use phase_correlation::{compute_offset, compute_offset_array, shift_frame};
pub use warp_field::{TileSample, WarpField, WarpInterpolation};

/// Registration of one frame against the reference.
#[derive(Clone, Debug)]
pub struct AlignmentResult {
    pub frame_index: usize,
    /// Displacement of the frame relative to the reference; the aligned frame
    /// samples the original at `(x + dx, y + dy)`.
    pub dx: f64,
    pub dy: f64,
    pub confidence: f64,
    pub low_confidence: bool,
    /// Present when local alignment was applied.
    pub warp: Option<WarpField>,
}

impl AlignmentResult {
    pub fn offset(&self) -> AlignmentOffset {
        AlignmentOffset {
            dx: self.dx,
            dy: self.dy,
        }
    }
}

/// Translational registration of whole frames against one reference luminance.
pub struct GlobalAligner {
    reference: Array2<f32>,
    region: Roi,
    confidence_threshold: f64,
}

impl GlobalAligner {
    /// Correlation runs on `region` of the reference (whole frame when `None`).
    pub fn new(reference: Array2<f32>, region: Option<Roi>, confidence_threshold: f64) -> Self {
        let (h, w) = reference.dim();
        let region = region
            .and_then(|r| r.clamp_to(w, h))
            .unwrap_or_else(|| Roi::full(w, h));
        Self {
            reference,
            region,
            confidence_threshold,
        }
    }

    pub fn region(&self) -> Roi {
        self.region
    }

    /// Measure the frame's translation and resample it onto the reference grid.
    ///
    /// Below the confidence threshold the frame is kept unshifted and flagged.
    pub fn align(&self, target: &Frame) -> Result<(AlignmentResult, Frame)> {
        if target.height() != self.reference.nrows() || target.width() != self.reference.ncols()
        {
            return Err(LuckyStackError::AlignmentFailure {
                index: target.index,
                reason: format!(
                    "frame is {}x{}, reference is {}x{}",
                    target.width(),
                    target.height(),
                    self.reference.ncols(),
                    self.reference.nrows()
                ),
            });
        }

        let reference = self.region.crop(&self.reference);
        let target_lum = self.region.crop(&target.luminance());
        let measured = compute_offset_array(&reference, &target_lum).map_err(|e| {
            LuckyStackError::AlignmentFailure {
                index: target.index,
                reason: e.to_string(),
            }
        })?;

        if measured.confidence < self.confidence_threshold {
            debug!(
                frame = target.index,
                confidence = measured.confidence,
                "Low-confidence alignment, keeping frame unshifted"
            );
            let result = AlignmentResult {
                frame_index: target.index,
                dx: 0.0,
                dy: 0.0,
                confidence: 0.0,
                low_confidence: true,
                warp: None,
            };
            return Ok((result, target.clone()));
        }

        let aligned = shift_frame(target, &measured.offset);
        let result = AlignmentResult {
            frame_index: target.index,
            dx: measured.offset.dx,
            dy: measured.offset.dy,
            confidence: measured.confidence,
            low_confidence: false,
            warp: None,
        };
        Ok((result, aligned))
    }
}
