use ndarray::Array2;

/// Sobel (gx, gy) at an interior pixel.
///
///   Gx = [[-1, 0, 1], [-2, 0, 2], [-1, 0, 1]]
///   Gy = [[-1, -2, -1], [0, 0, 0], [1, 2, 1]]
#[inline]
fn sobel_at(data: &Array2<f32>, row: usize, col: usize) -> (f64, f64) {
    let p = |r: usize, c: usize| data[[r, c]] as f64;
    let gx = -p(row - 1, col - 1) + p(row - 1, col + 1) - 2.0 * p(row, col - 1)
        + 2.0 * p(row, col + 1)
        - p(row + 1, col - 1)
        + p(row + 1, col + 1);
    let gy = -p(row - 1, col - 1) - 2.0 * p(row - 1, col) - p(row - 1, col + 1)
        + p(row + 1, col - 1)
        + 2.0 * p(row + 1, col)
        + p(row + 1, col + 1);
    (gx, gy)
}

/// Mean squared Sobel gradient magnitude over the interior pixels.
pub fn gradient_energy_array(data: &Array2<f32>) -> f64 {
    let (h, w) = data.dim();
    if h < 3 || w < 3 {
        return 0.0;
    }

    let mut sum = 0.0f64;
    for row in 1..h - 1 {
        for col in 1..w - 1 {
            let (gx, gy) = sobel_at(data, row, col);
            sum += gx * gx + gy * gy;
        }
    }
    sum / ((h - 2) * (w - 2)) as f64
}
