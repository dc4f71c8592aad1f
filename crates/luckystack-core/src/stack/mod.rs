pub mod sigma_clip;
pub mod store;

use ndarray::{s, Array2};
use rayon::prelude::*;
use tracing::info;

use crate::consts::{LOW_CONFIDENCE_WEIGHT, MIN_QUALITY_WEIGHT};
use crate::error::{LuckyStackError, Result};
use crate::frame::Frame;
use crate::pipeline::{PipelineControl, PipelineState, ProgressThrottle};

pub use sigma_clip::{clip_pixel, SigmaClipParams, StackAccumulator};
pub use store::AlignedFrameStore;

/// Stacking weight of a frame from its quality score and alignment confidence.
pub fn frame_weight(score: f64, confidence: f64) -> f32 {
    let quality = MIN_QUALITY_WEIGHT + (1.0 - MIN_QUALITY_WEIGHT) * score.clamp(0.0, 1.0) as f32;
    quality * (confidence as f32).clamp(LOW_CONFIDENCE_WEIGHT, 1.0)
}

/// Rows per band so that one band across all frames is about one chunk of
/// frames per worker.
fn band_rows(height: usize, frames: usize, chunk_size: usize) -> usize {
    let workers = rayon::current_num_threads().max(1);
    (chunk_size * height / (frames.max(1) * workers)).clamp(1, height.max(1))
}

/// Sigma-clipped weighted mean of every frame in `store`, one plane per channel.
///
/// The image is split into disjoint row bands; each band is loaded and
/// clipped by one worker. Cancellation is polled before each band.
pub fn stack_store(
    store: &AlignedFrameStore,
    weights: &[f32],
    params: &SigmaClipParams,
    chunk_size: usize,
    control: &PipelineControl,
) -> Result<Vec<Array2<f32>>> {
    let n = store.len();
    if n == 0 {
        return Err(LuckyStackError::Stacking("no frames to stack".into()));
    }
    if weights.len() != n {
        return Err(LuckyStackError::Stacking(format!(
            "{} weights for {} frames",
            weights.len(),
            n
        )));
    }

    let (h, w) = store.dim();
    let rows_per_band = band_rows(h, n, chunk_size);
    let bands: Vec<(usize, usize)> = (0..h)
        .step_by(rows_per_band)
        .map(|start| (start, (start + rows_per_band).min(h)))
        .collect();
    info!(
        frames = n,
        bands = bands.len(),
        rows_per_band,
        spilled = store.is_spilled(),
        "Stacking"
    );

    let throttle = ProgressThrottle::new(
        control,
        PipelineState::Stacking,
        bands.len() * store.channel_count(),
        1,
    );
    let mut planes: Vec<Array2<f32>> = (0..store.channel_count())
        .map(|_| Array2::zeros((h, w)))
        .collect();

    for (channel, plane) in planes.iter_mut().enumerate() {
        let results: Vec<((usize, usize), Array2<f32>)> = bands
            .par_iter()
            .map(|&(start, end)| {
                control.check_cancelled()?;
                let band = stack_band(store, weights, params, channel, start..end)?;
                throttle.advance();
                Ok(((start, end), band))
            })
            .collect::<Result<_>>()?;

        for ((start, end), band) in results {
            plane.slice_mut(s![start..end, ..]).assign(&band);
        }
    }

    throttle.finish();
    Ok(planes)
}

/// Load one row band of one channel from every frame and clip it.
fn stack_band(
    store: &AlignedFrameStore,
    weights: &[f32],
    params: &SigmaClipParams,
    channel: usize,
    rows: std::ops::Range<usize>,
) -> Result<Array2<f32>> {
    let (_, w) = store.dim();
    let n = store.len();
    let band_len = rows.len() * w;

    // Frame-major sample block: block[i * band_len + p].
    let mut block = vec![0.0f32; n * band_len];
    for (i, dst) in block.chunks_exact_mut(band_len).enumerate() {
        store.read_rows(i, channel, rows.clone(), dst)?;
    }

    let mut values = vec![0.0f32; n];
    let mut mask = vec![true; n];
    let mut out = Array2::<f32>::zeros((rows.len(), w));
    for (p, px) in out.iter_mut().enumerate() {
        for (i, v) in values.iter_mut().enumerate() {
            *v = block[i * band_len + p];
        }
        *px = clip_pixel(&values, weights, &mut mask, params);
    }
    Ok(out)
}

/// Stack in-memory frames with the given weights.
pub fn stack(frames: &[Frame], weights: &[f32], params: &SigmaClipParams) -> Result<Frame> {
    let store = AlignedFrameStore::from_frames(frames)?;
    let planes = stack_store(&store, weights, params, frames.len(), &PipelineControl::default())?;
    Ok(frames[0].with_channels(planes))
}
