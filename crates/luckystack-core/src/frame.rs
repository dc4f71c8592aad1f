use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};

use crate::consts::{COLOR_CHANNEL_COUNT, LUMINANCE_B, LUMINANCE_G, LUMINANCE_R};
use crate::error::{LuckyStackError, Result};

/// A single image frame, one plane per channel (1 = mono, 3 = RGB).
/// Pixel values are f32 in [0.0, 1.0].
#[derive(Clone, Debug)]
pub struct Frame {
    /// Channel planes, row-major, shape = (height, width)
    pub channels: Vec<Array2<f32>>,
    /// Position in the source sequence
    pub index: usize,
    /// Original bit depth before conversion (8 or 16)
    pub original_bit_depth: u8,
    /// Optional region of interest
    pub roi: Option<Roi>,
}

impl Frame {
    pub fn mono(data: Array2<f32>, index: usize, bit_depth: u8) -> Self {
        Self {
            channels: vec![data],
            index,
            original_bit_depth: bit_depth,
            roi: None,
        }
    }

    /// Build a frame from channel planes, rejecting empty or mismatched shapes.
    pub fn from_channels(channels: Vec<Array2<f32>>, index: usize, bit_depth: u8) -> Result<Self> {
        let first = channels.first().ok_or(LuckyStackError::InvalidDimensions {
            width: 0,
            height: 0,
        })?;
        let dim = first.dim();
        if dim.0 == 0 || dim.1 == 0 {
            return Err(LuckyStackError::InvalidDimensions {
                width: dim.1,
                height: dim.0,
            });
        }
        if channels.len() != 1 && channels.len() != COLOR_CHANNEL_COUNT {
            return Err(LuckyStackError::FrameDecode {
                index,
                reason: format!("unsupported channel count {}", channels.len()),
            });
        }
        if channels.iter().any(|c| c.dim() != dim) {
            return Err(LuckyStackError::FrameDecode {
                index,
                reason: "channel planes differ in shape".into(),
            });
        }
        Ok(Self {
            channels,
            index,
            original_bit_depth: bit_depth,
            roi: None,
        })
    }

    pub fn with_roi(mut self, roi: Option<Roi>) -> Self {
        self.roi = roi;
        self
    }

    pub fn width(&self) -> usize {
        self.channels[0].ncols()
    }

    pub fn height(&self) -> usize {
        self.channels[0].nrows()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn is_color(&self) -> bool {
        self.channels.len() == COLOR_CHANNEL_COUNT
    }

    /// Luminance plane: the single channel for mono, BT.601 weighted sum for RGB.
    pub fn luminance(&self) -> Array2<f32> {
        if !self.is_color() {
            return self.channels[0].clone();
        }
        let (r, g, b) = (&self.channels[0], &self.channels[1], &self.channels[2]);
        let mut lum = Array2::<f32>::zeros(r.dim());
        ndarray::Zip::from(&mut lum)
            .and(r)
            .and(g)
            .and(b)
            .for_each(|l, &r, &g, &b| *l = LUMINANCE_R * r + LUMINANCE_G * g + LUMINANCE_B * b);
        lum
    }

    /// New frame with the same identity and different pixels.
    pub fn with_channels(&self, channels: Vec<Array2<f32>>) -> Self {
        Self {
            channels,
            index: self.index,
            original_bit_depth: self.original_bit_depth,
            roi: self.roi,
        }
    }
}

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Roi {
    pub fn full(width: usize, height: usize) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Grow by `margin` pixels on each side, clamped to the frame.
    pub fn expand(&self, margin: usize, frame_w: usize, frame_h: usize) -> Self {
        let x0 = self.x.saturating_sub(margin);
        let y0 = self.y.saturating_sub(margin);
        let x1 = (self.x + self.width + margin).min(frame_w);
        let y1 = (self.y + self.height + margin).min(frame_h);
        Self {
            x: x0,
            y: y0,
            width: x1.saturating_sub(x0),
            height: y1.saturating_sub(y0),
        }
    }

    /// Clamp to a frame of the given size. Returns `None` if nothing remains.
    pub fn clamp_to(&self, frame_w: usize, frame_h: usize) -> Option<Self> {
        let x0 = self.x.min(frame_w);
        let y0 = self.y.min(frame_h);
        let x1 = (self.x + self.width).min(frame_w);
        let y1 = (self.y + self.height).min(frame_h);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Self {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }

    pub fn area(&self) -> usize {
        self.width * self.height
    }

    /// Copy the covered region out of a plane. The ROI must lie inside it.
    pub fn crop(&self, data: &Array2<f32>) -> Array2<f32> {
        data.slice(s![self.y..self.y + self.height, self.x..self.x + self.width])
            .to_owned()
    }
}

/// Alignment offset for a frame relative to a reference.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AlignmentOffset {
    pub dx: f64,
    pub dy: f64,
}
