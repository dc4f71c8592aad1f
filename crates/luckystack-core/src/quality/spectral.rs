use ndarray::Array2;

use crate::fft::{fft2d_forward, normalized_frequency};

/// Mean spectral magnitude of the mean-subtracted plane inside an annulus.
///
/// Radii are fractions of Nyquist; a bin `(u, v)` lies at
/// `sqrt(fu^2 + fv^2)` with `fu, fv` in `[-1, 1]`. The annulus includes
/// `inner` and excludes `outer`. Returns 0 when no bin falls inside.
pub fn high_frequency_energy_array(data: &Array2<f32>, inner: f64, outer: f64) -> f64 {
    let (h, w) = data.dim();
    if h < 2 || w < 2 {
        return 0.0;
    }

    let mean = data.iter().map(|&v| v as f64).sum::<f64>() / data.len() as f64;
    let centred = data.mapv(|v| v - mean as f32);
    let spectrum = fft2d_forward(&centred);

    let mut sum = 0.0f64;
    let mut count = 0usize;
    for ((row, col), c) in spectrum.indexed_iter() {
        let fv = normalized_frequency(row, h);
        let fu = normalized_frequency(col, w);
        let radius = (fu * fu + fv * fv).sqrt();
        if radius >= inner && radius < outer {
            sum += c.norm();
            count += 1;
        }
    }

    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
