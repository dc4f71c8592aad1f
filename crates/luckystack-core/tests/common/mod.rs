#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use luckystack_core::error::{LuckyStackError, Result};
use luckystack_core::filters::gaussian_blur::gaussian_blur_array;
use luckystack_core::frame::Frame;
use luckystack_core::source::FrameSource;

/// Gaussian blob: centre, sigma, amplitude.
#[derive(Clone, Copy, Debug)]
pub struct Blob {
    pub x: f64,
    pub y: f64,
    pub sigma: f64,
    pub amplitude: f64,
}

/// Blobs scattered over the interior of a `w x h` frame, reproducible from `seed`.
pub fn random_blobs(w: usize, h: usize, count: usize, seed: u64) -> Vec<Blob> {
    let mut rng = StdRng::seed_from_u64(seed);
    let margin = 12.0;
    (0..count)
        .map(|_| Blob {
            x: rng.random_range(margin..w as f64 - margin),
            y: rng.random_range(margin..h as f64 - margin),
            sigma: rng.random_range(2.5..4.0),
            amplitude: rng.random_range(0.3..0.7),
        })
        .collect()
}

/// Render blobs translated by `(shift_x, shift_y)`: `out(x, y) = scene(x - sx, y - sy)`.
///
/// A frame rendered with shift `s` lines up with the unshifted one when
/// sampled at `(x + s)`, so its measured displacement is `s`.
pub fn render_blobs(w: usize, h: usize, blobs: &[Blob], shift_x: f64, shift_y: f64) -> Array2<f32> {
    Array2::from_shape_fn((h, w), |(row, col)| {
        let x = col as f64 - shift_x;
        let y = row as f64 - shift_y;
        let v: f64 = blobs
            .iter()
            .map(|b| {
                let r2 = (x - b.x).powi(2) + (y - b.y).powi(2);
                b.amplitude * (-r2 / (2.0 * b.sigma * b.sigma)).exp()
            })
            .sum();
        v.min(1.0) as f32
    })
}

/// Blobs plus a gentle interference pattern, so every region carries texture.
pub fn render_textured(w: usize, h: usize, blobs: &[Blob], shift_x: f64, shift_y: f64) -> Array2<f32> {
    let base = render_blobs(w, h, blobs, shift_x, shift_y);
    Array2::from_shape_fn((h, w), |(row, col)| {
        let x = col as f64 - shift_x;
        let y = row as f64 - shift_y;
        let pattern = 0.08 * ((0.31 * x).sin() * (0.27 * y).cos() + 1.0);
        (base[[row, col]] as f64 * 0.8 + pattern).min(1.0) as f32
    })
}

/// Bright uniform disk on a dark background.
pub fn disk(w: usize, h: usize, cx: f64, cy: f64, radius: f64) -> Array2<f32> {
    Array2::from_shape_fn((h, w), |(row, col)| {
        let d = ((col as f64 - cx).powi(2) + (row as f64 - cy).powi(2)).sqrt();
        if d <= radius {
            0.8
        } else {
            0.05
        }
    })
}

/// Add zero-mean uniform noise of half-width `amplitude`.
pub fn add_noise(data: &Array2<f32>, amplitude: f32, rng: &mut StdRng) -> Array2<f32> {
    data.mapv(|v| v + rng.random_range(-amplitude..amplitude))
}

/// Sequence of noisy, progressively blurred copies of one scene.
///
/// Frame `i` is blurred with sigma `0.5 * (i % 5)`, so frames 0, 5, 10, ...
/// are the sharpest.
pub fn blurred_sequence(n: usize, w: usize, h: usize, seed: u64) -> Vec<Frame> {
    let blobs = random_blobs(w, h, 30, seed);
    let sharp = render_textured(w, h, &blobs, 0.0, 0.0);
    let mut rng = StdRng::seed_from_u64(seed + 1);
    (0..n)
        .map(|i| {
            let blurred = gaussian_blur_array(&sharp, 0.5 * (i % 5) as f32);
            Frame::mono(add_noise(&blurred, 0.01, &mut rng), i, 16)
        })
        .collect()
}

/// Source whose listed frames fail to decode.
pub struct FlakySource {
    pub frames: Vec<Frame>,
    pub broken: Vec<usize>,
}

impl FrameSource for FlakySource {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn get_frame(&self, index: usize) -> Result<Frame> {
        if self.broken.contains(&index) {
            return Err(LuckyStackError::FrameDecode {
                index,
                reason: "corrupt payload".into(),
            });
        }
        self.frames
            .get(index)
            .cloned()
            .ok_or(LuckyStackError::FrameIndexOutOfRange {
                index,
                total: self.frames.len(),
            })
    }
}

/// Source whose `fragile` frame decodes for its first `healthy_reads` reads
/// and fails on every later one.
pub struct FragileSource {
    frames: Vec<Frame>,
    fragile: usize,
    healthy_reads: usize,
    reads: AtomicUsize,
}

impl FragileSource {
    pub fn new(frames: Vec<Frame>, fragile: usize, healthy_reads: usize) -> Self {
        Self {
            frames,
            fragile,
            healthy_reads,
            reads: AtomicUsize::new(0),
        }
    }
}

impl FrameSource for FragileSource {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn get_frame(&self, index: usize) -> Result<Frame> {
        if index == self.fragile && self.reads.fetch_add(1, Ordering::SeqCst) >= self.healthy_reads {
            return Err(LuckyStackError::FrameDecode {
                index,
                reason: "truncated read".into(),
            });
        }
        self.frames
            .get(index)
            .cloned()
            .ok_or(LuckyStackError::FrameIndexOutOfRange {
                index,
                total: self.frames.len(),
            })
    }
}

/// Soft-edged disk textured with blobs, translated by `(shift_x, shift_y)`.
pub fn planet(
    w: usize,
    h: usize,
    radius: f64,
    blobs: &[Blob],
    shift_x: f64,
    shift_y: f64,
) -> Array2<f32> {
    let (cx, cy) = (w as f64 / 2.0, h as f64 / 2.0);
    let texture = render_blobs(w, h, blobs, shift_x, shift_y);
    Array2::from_shape_fn((h, w), |(row, col)| {
        let x = col as f64 - shift_x;
        let y = row as f64 - shift_y;
        let r = ((x - cx).powi(2) + (y - cy).powi(2)).sqrt();
        let body = 1.0 / (1.0 + (r - radius).exp());
        (0.02 + body * (0.45 + 0.5 * texture[[row, col]] as f64)).min(1.0) as f32
    })
}

/// Blobs confined to a disk of `radius` around the frame centre.
pub fn planet_blobs(w: usize, h: usize, radius: f64, count: usize, seed: u64) -> Vec<Blob> {
    let mut rng = StdRng::seed_from_u64(seed);
    let (cx, cy) = (w as f64 / 2.0, h as f64 / 2.0);
    (0..count)
        .map(|_| {
            let angle = rng.random_range(0.0..std::f64::consts::TAU);
            let dist = rng.random_range(0.0..radius * 0.85);
            Blob {
                x: cx + dist * angle.cos(),
                y: cy + dist * angle.sin(),
                sigma: rng.random_range(2.0..3.5),
                amplitude: rng.random_range(0.2..0.6),
            }
        })
        .collect()
}

/// Frame sequence of a planet jittering by known sub-pixel offsets.
///
/// Returns the frames and each frame's translation.
pub fn jittered_planet_sequence(
    n: usize,
    size: usize,
    seed: u64,
) -> (Vec<Frame>, Vec<(f64, f64)>) {
    let radius = size as f64 * 0.3;
    let blobs = planet_blobs(size, size, radius, 25, seed);
    let mut rng = StdRng::seed_from_u64(seed + 100);
    let mut shifts = Vec::with_capacity(n);
    let frames = (0..n)
        .map(|i| {
            let sx = rng.random_range(-3.0..3.0);
            let sy = rng.random_range(-3.0..3.0);
            shifts.push((sx, sy));
            let clean = planet(size, size, radius, &blobs, sx, sy);
            let blurred = gaussian_blur_array(&clean, 0.3 * (i % 4) as f32);
            Frame::mono(add_noise(&blurred, 0.001, &mut rng), i, 16)
        })
        .collect();
    (frames, shifts)
}
