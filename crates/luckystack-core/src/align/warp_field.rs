use serde::{Deserialize, Serialize};

use super::interpolation::catmull_rom;

/// How per-tile displacements are spread between tile centres.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarpInterpolation {
    Bilinear,
    #[default]
    Bicubic,
}

impl std::fmt::Display for WarpInterpolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bilinear => write!(f, "bilinear"),
            Self::Bicubic => write!(f, "bicubic"),
        }
    }
}

/// Displacement measured for one tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileSample {
    pub center_x: f64,
    pub center_y: f64,
    pub dx: f64,
    pub dy: f64,
    /// Peak normalized cross-correlation of the match.
    pub confidence: f64,
    /// False when the displacement was filled in from neighbours.
    pub measured: bool,
}

/// Sparse displacement samples on a regular tile grid.
///
/// Dense displacements are evaluated on demand by [`WarpField::displacement_at`].
#[derive(Clone, Debug)]
pub struct WarpField {
    rows: usize,
    cols: usize,
    /// Centre of tile (0, 0).
    origin_x: f64,
    origin_y: f64,
    spacing: f64,
    margin: f64,
    interpolation: WarpInterpolation,
    samples: Vec<TileSample>,
}

impl WarpField {
    /// `samples` are row-major, `rows * cols` of them, centred `spacing` apart.
    pub fn new(
        rows: usize,
        cols: usize,
        spacing: f64,
        margin: f64,
        interpolation: WarpInterpolation,
        samples: Vec<TileSample>,
    ) -> Self {
        debug_assert_eq!(samples.len(), rows * cols);
        let (origin_x, origin_y) = samples
            .first()
            .map(|s| (s.center_x, s.center_y))
            .unwrap_or((0.0, 0.0));
        Self {
            rows,
            cols,
            origin_x,
            origin_y,
            spacing,
            margin,
            interpolation,
            samples,
        }
    }

    pub fn grid_size(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn samples(&self) -> &[TileSample] {
        &self.samples
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    pub fn interpolation(&self) -> WarpInterpolation {
        self.interpolation
    }

    pub fn measured_fraction(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().filter(|s| s.measured).count() as f64 / self.samples.len() as f64
    }

    fn sample(&self, row: isize, col: isize) -> &TileSample {
        let r = row.clamp(0, self.rows as isize - 1) as usize;
        let c = col.clamp(0, self.cols as isize - 1) as usize;
        &self.samples[r * self.cols + c]
    }

    /// Displacement `(dx, dy)` at pixel `(x, y)`, each axis clamped to the search margin.
    pub fn displacement_at(&self, x: f64, y: f64) -> (f64, f64) {
        if self.samples.is_empty() {
            return (0.0, 0.0);
        }
        // Outside the outer tile centres the edge value holds.
        let gx = ((x - self.origin_x) / self.spacing).clamp(0.0, (self.cols - 1) as f64);
        let gy = ((y - self.origin_y) / self.spacing).clamp(0.0, (self.rows - 1) as f64);
        let c0 = gx.floor() as isize;
        let r0 = gy.floor() as isize;
        let tx = gx - c0 as f64;
        let ty = gy - r0 as f64;

        let (dx, dy) = match self.interpolation {
            WarpInterpolation::Bilinear => {
                let mut acc = (0.0, 0.0);
                for (dr, wy) in [(0, 1.0 - ty), (1, ty)] {
                    for (dc, wx) in [(0, 1.0 - tx), (1, tx)] {
                        let s = self.sample(r0 + dr, c0 + dc);
                        acc.0 += wy * wx * s.dx;
                        acc.1 += wy * wx * s.dy;
                    }
                }
                acc
            }
            WarpInterpolation::Bicubic => {
                let weights = |t: f64| -> [f64; 4] {
                    let t = t as f32;
                    [
                        catmull_rom(t + 1.0) as f64,
                        catmull_rom(t) as f64,
                        catmull_rom(1.0 - t) as f64,
                        catmull_rom(2.0 - t) as f64,
                    ]
                };
                let (wx, wy) = (weights(tx), weights(ty));
                let mut acc = (0.0, 0.0);
                for (j, wyj) in wy.iter().enumerate() {
                    for (i, wxi) in wx.iter().enumerate() {
                        let s = self.sample(r0 + j as isize - 1, c0 + i as isize - 1);
                        acc.0 += wyj * wxi * s.dx;
                        acc.1 += wyj * wxi * s.dy;
                    }
                }
                acc
            }
        };

        (
            dx.clamp(-self.margin, self.margin),
            dy.clamp(-self.margin, self.margin),
        )
    }
}
