use ndarray::{s, Array2};
use rayon::prelude::*;
use tracing::debug;

use crate::consts::{
    DEFAULT_LOCAL_CONFIDENCE_FLOOR, DEFAULT_MIN_VALID_TILE_FRACTION, DEFAULT_TILE_SIZE,
};
use crate::error::{LuckyStackError, Result};
use crate::frame::{Frame, Roi};

use super::interpolation::sample_lanczos;
use super::subpixel::refine_peak_parabolic;
use super::warp_field::{TileSample, WarpField, WarpInterpolation};

/// Template standard deviation under which a tile counts as flat.
const FLAT_TEMPLATE_STDDEV: f64 = 1e-6;

#[derive(Clone, Copy, Debug)]
pub struct LocalAlignParams {
    pub tile_size: usize,
    /// Minimum peak NCC for a tile to count as measured.
    pub confidence_floor: f64,
    /// Fraction of measured tiles required to apply the warp.
    pub min_valid_fraction: f64,
    pub interpolation: WarpInterpolation,
}

impl Default for LocalAlignParams {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            confidence_floor: DEFAULT_LOCAL_CONFIDENCE_FLOOR,
            min_valid_fraction: DEFAULT_MIN_VALID_TILE_FRACTION,
            interpolation: WarpInterpolation::Bicubic,
        }
    }
}

impl LocalAlignParams {
    /// Search margin on each side of a tile.
    pub fn margin(&self) -> usize {
        self.tile_size / 2
    }
}

/// Reference tile, zero-mean, with its precomputed statistics.
struct Template {
    x: usize,
    y: usize,
    /// Template minus its mean.
    centred: Array2<f64>,
    /// Sum of squares of `centred`.
    energy: f64,
}

impl Template {
    fn is_flat(&self) -> bool {
        let n = self.centred.len() as f64;
        (self.energy / n).sqrt() < FLAT_TEMPLATE_STDDEV
    }
}

/// Tile-based aligner against a fixed reference.
///
/// Templates are cut once from the reference and reused for every target.
pub struct LocalAligner {
    params: LocalAlignParams,
    rows: usize,
    cols: usize,
    templates: Vec<Template>,
}

impl LocalAligner {
    /// Lay a centred grid of full tiles over `region` (whole frame when `None`).
    pub fn new(reference: &Array2<f32>, region: Option<Roi>, params: LocalAlignParams) -> Self {
        let (h, w) = reference.dim();
        let region = region
            .and_then(|r| r.clamp_to(w, h))
            .unwrap_or_else(|| Roi::full(w, h));
        let tile = params.tile_size.max(1);
        let cols = region.width / tile;
        let rows = region.height / tile;
        let x0 = region.x + (region.width - cols * tile) / 2;
        let y0 = region.y + (region.height - rows * tile) / 2;

        let mut templates = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                let x = x0 + c * tile;
                let y = y0 + r * tile;
                let patch = reference.slice(s![y..y + tile, x..x + tile]).mapv(|v| v as f64);
                let mean = patch.mean().unwrap_or(0.0);
                let centred = patch.mapv(|v| v - mean);
                let energy = centred.iter().map(|v| v * v).sum();
                templates.push(Template {
                    x,
                    y,
                    centred,
                    energy,
                });
            }
        }

        Self {
            params,
            rows,
            cols,
            templates,
        }
    }

    pub fn grid_size(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Measure the warp of `target` against the reference.
    ///
    /// Fails with `AlignmentFailure` when the grid is smaller than 2x2 or too
    /// few tiles find a confident match.
    pub fn measure(&self, target: &Array2<f32>, frame_index: usize) -> Result<WarpField> {
        if self.rows < 2 || self.cols < 2 {
            return Err(LuckyStackError::AlignmentFailure {
                index: frame_index,
                reason: format!(
                    "{}x{} tile grid is smaller than 2x2",
                    self.cols, self.rows
                ),
            });
        }

        let tile = self.params.tile_size;
        let margin = self.params.margin();
        let half = (tile as f64 - 1.0) / 2.0;

        let mut samples: Vec<TileSample> = self
            .templates
            .par_iter()
            .map(|t| {
                let (dx, dy, confidence) = if t.is_flat() {
                    (0.0, 0.0, 0.0)
                } else {
                    match_template(t, target, margin)
                };
                TileSample {
                    center_x: t.x as f64 + half,
                    center_y: t.y as f64 + half,
                    dx,
                    dy,
                    confidence,
                    measured: !t.is_flat() && confidence >= self.params.confidence_floor,
                }
            })
            .collect();

        let measured = samples.iter().filter(|s| s.measured).count();
        let fraction = measured as f64 / samples.len() as f64;
        if fraction < self.params.min_valid_fraction {
            return Err(LuckyStackError::AlignmentFailure {
                index: frame_index,
                reason: format!(
                    "only {}/{} tiles matched (need {:.0}%)",
                    measured,
                    samples.len(),
                    self.params.min_valid_fraction * 100.0
                ),
            });
        }

        fill_unmeasured(&mut samples, self.rows, self.cols);
        debug!(
            frame = frame_index,
            measured,
            tiles = samples.len(),
            "Local alignment measured"
        );

        Ok(WarpField::new(
            self.rows,
            self.cols,
            tile as f64,
            margin as f64,
            self.params.interpolation,
            samples,
        ))
    }

    /// Measure and apply the warp to every channel of `frame`.
    pub fn align(&self, frame: &Frame) -> Result<(Frame, WarpField)> {
        let field = self.measure(&frame.luminance(), frame.index)?;
        let warped = warp_frame(frame, &field);
        Ok((warped, field))
    }
}

/// NCC search of a template over `target` within +/- `margin` pixels.
///
/// Returns `(dx, dy, peak_ncc)`; the match sits at `template + (dx, dy)`.
fn match_template(template: &Template, target: &Array2<f32>, margin: usize) -> (f64, f64, f64) {
    let (h, w) = target.dim();
    let tile = template.centred.nrows();
    let span = tile + 2 * margin;

    // Search window with clamped reads past the frame edge.
    let window = Array2::from_shape_fn((span, span), |(r, c)| {
        let y = (template.y as isize + r as isize - margin as isize).clamp(0, h as isize - 1);
        let x = (template.x as isize + c as isize - margin as isize).clamp(0, w as isize - 1);
        target[[y as usize, x as usize]] as f64
    });

    let n = (tile * tile) as f64;
    let positions = 2 * margin + 1;
    let mut surface = Array2::<f64>::zeros((positions, positions));
    for v in 0..positions {
        for u in 0..positions {
            let mut sum_w = 0.0;
            let mut sum_w2 = 0.0;
            let mut sum_tw = 0.0;
            for r in 0..tile {
                for c in 0..tile {
                    let wv = window[[v + r, u + c]];
                    sum_w += wv;
                    sum_w2 += wv * wv;
                    sum_tw += template.centred[[r, c]] * wv;
                }
            }
            let var_w = sum_w2 - sum_w * sum_w / n;
            let denom = (template.energy * var_w).sqrt();
            surface[[v, u]] = if denom > 1e-12 { sum_tw / denom } else { 0.0 };
        }
    }

    let mut peak = (margin, margin, f64::NEG_INFINITY);
    for ((v, u), &val) in surface.indexed_iter() {
        if val > peak.2 {
            peak = (v, u, val);
        }
    }
    let (sub_v, sub_u) = refine_peak_parabolic(&surface, peak.0, peak.1, false);

    let m = margin as f64;
    let dx = (peak.1 as f64 - m + sub_u).clamp(-m, m);
    let dy = (peak.0 as f64 - m + sub_v).clamp(-m, m);
    (dx, dy, peak.2.clamp(0.0, 1.0))
}

/// Give unmeasured tiles the mean of their filled 8-neighbours, repeating
/// outward from measured tiles. Anything unreachable gets the global mean.
fn fill_unmeasured(samples: &mut [TileSample], rows: usize, cols: usize) {
    let mut filled: Vec<bool> = samples.iter().map(|s| s.measured).collect();
    let (sum_dx, sum_dy, count) = samples
        .iter()
        .filter(|s| s.measured)
        .fold((0.0, 0.0, 0usize), |acc, s| (acc.0 + s.dx, acc.1 + s.dy, acc.2 + 1));
    let global = if count > 0 {
        (sum_dx / count as f64, sum_dy / count as f64)
    } else {
        (0.0, 0.0)
    };

    loop {
        let mut updates = Vec::new();
        for r in 0..rows {
            for c in 0..cols {
                let i = r * cols + c;
                if filled[i] {
                    continue;
                }
                let mut acc = (0.0, 0.0, 0usize);
                for nr in r.saturating_sub(1)..(r + 2).min(rows) {
                    for nc in c.saturating_sub(1)..(c + 2).min(cols) {
                        let j = nr * cols + nc;
                        if j != i && filled[j] {
                            acc = (acc.0 + samples[j].dx, acc.1 + samples[j].dy, acc.2 + 1);
                        }
                    }
                }
                if acc.2 > 0 {
                    updates.push((i, acc.0 / acc.2 as f64, acc.1 / acc.2 as f64));
                }
            }
        }
        if updates.is_empty() {
            break;
        }
        for (i, dx, dy) in updates {
            samples[i].dx = dx;
            samples[i].dy = dy;
            filled[i] = true;
        }
    }

    for (s, done) in samples.iter_mut().zip(&filled) {
        if !done {
            s.dx = global.0;
            s.dy = global.1;
        }
    }
}

/// Resample every channel at `(x + dx, y + dy)` with the field's displacement.
pub fn warp_frame(frame: &Frame, field: &WarpField) -> Frame {
    let (h, w) = (frame.height(), frame.width());
    let n_channels = frame.channel_count();

    let rows: Vec<Vec<f32>> = (0..h)
        .into_par_iter()
        .map(|row| {
            let mut out = vec![0.0f32; w * n_channels];
            for col in 0..w {
                let (dx, dy) = field.displacement_at(col as f64, row as f64);
                let sx = col as f64 + dx;
                let sy = row as f64 + dy;
                for (ch, plane) in frame.channels.iter().enumerate() {
                    out[ch * w + col] = sample_lanczos(plane, sx, sy);
                }
            }
            out
        })
        .collect();

    let mut channels = vec![Array2::<f32>::zeros((h, w)); n_channels];
    for (row, values) in rows.into_iter().enumerate() {
        for (ch, plane) in channels.iter_mut().enumerate() {
            for col in 0..w {
                plane[[row, col]] = values[ch * w + col];
            }
        }
    }
    frame.with_channels(channels)
}
