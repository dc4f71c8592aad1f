use ndarray::Array2;

/// Refine a correlation peak with independent 1-D parabola fits along each axis.
///
/// With `wrap` the surface is treated as periodic (phase correlation);
/// otherwise a peak on the border is not refined along that axis.
///
/// Returns (delta_row, delta_col) as fractional offsets from the integer peak,
/// each clamped to +/- 0.5 pixel.
pub fn refine_peak_parabolic(
    surface: &Array2<f64>,
    peak_row: usize,
    peak_col: usize,
    wrap: bool,
) -> (f64, f64) {
    let (h, w) = surface.dim();
    let centre = surface[[peak_row, peak_col]];

    let delta_row = neighbours(peak_row, h, wrap)
        .map(|(prev, next)| {
            parabola_vertex(surface[[prev, peak_col]], centre, surface[[next, peak_col]])
        })
        .unwrap_or(0.0);
    let delta_col = neighbours(peak_col, w, wrap)
        .map(|(prev, next)| {
            parabola_vertex(surface[[peak_row, prev]], centre, surface[[peak_row, next]])
        })
        .unwrap_or(0.0);

    (delta_row, delta_col)
}

fn neighbours(i: usize, n: usize, wrap: bool) -> Option<(usize, usize)> {
    if n < 3 {
        return None;
    }
    if wrap {
        Some(((i + n - 1) % n, (i + 1) % n))
    } else if i == 0 || i >= n - 1 {
        None
    } else {
        Some((i - 1, i + 1))
    }
}

/// Vertex offset of the parabola through (-1, prev), (0, curr), (1, next).
fn parabola_vertex(prev: f64, curr: f64, next: f64) -> f64 {
    let denom = prev - 2.0 * curr + next;
    if denom.abs() > 1e-12 {
        ((prev - next) / (2.0 * denom)).clamp(-0.5, 0.5)
    } else {
        0.0
    }
}
