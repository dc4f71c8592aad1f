/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// B3 spline 1D kernel coefficients: [1, 4, 6, 4, 1] / 16.
pub const B3_KERNEL: [f32; 5] = [1.0 / 16.0, 4.0 / 16.0, 6.0 / 16.0, 4.0 / 16.0, 1.0 / 16.0];

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f32 = 1e-10;

/// ITU-R BT.601 luminance coefficient for the red channel.
pub const LUMINANCE_R: f32 = 0.299;

/// ITU-R BT.601 luminance coefficient for the green channel.
pub const LUMINANCE_G: f32 = 0.587;

/// ITU-R BT.601 luminance coefficient for the blue channel.
pub const LUMINANCE_B: f32 = 0.114;

/// Number of channels in a color frame (R, G, B).
pub const COLOR_CHANNEL_COUNT: usize = 3;

// ---------------------------------------------------------------------------
// Quality scoring
// ---------------------------------------------------------------------------

/// Provisional weight of the Laplacian-variance sub-metric. Untuned.
pub const DEFAULT_LAPLACIAN_WEIGHT: f64 = 0.4;

/// Provisional weight of the gradient-energy sub-metric. Untuned.
pub const DEFAULT_GRADIENT_WEIGHT: f64 = 0.3;

/// Provisional weight of the high-frequency-energy sub-metric. Untuned.
pub const DEFAULT_HIGH_FREQUENCY_WEIGHT: f64 = 0.3;

/// Inner radius of the high-frequency annulus, as a fraction of Nyquist.
pub const DEFAULT_HF_INNER: f64 = 0.3;

/// Outer radius of the high-frequency annulus, as a fraction of Nyquist.
pub const DEFAULT_HF_OUTER: f64 = 0.8;

/// Number of analyzed frames between two ROI re-detections.
pub const DEFAULT_ROI_INTERVAL: usize = 30;

// ---------------------------------------------------------------------------
// ROI detection
// ---------------------------------------------------------------------------

/// Padding fraction around the detected subject bounding box (10%).
pub const DEFAULT_ROI_PADDING_FRACTION: f32 = 0.1;

/// Gaussian blur sigma applied before thresholding.
pub const DEFAULT_ROI_BLUR_SIGMA: f32 = 2.0;

/// Minimum connected-component area (pixels) to count as the subject.
pub const DEFAULT_ROI_MIN_AREA: usize = 16;

/// Number of histogram bins for Otsu's thresholding.
pub const OTSU_HISTOGRAM_BINS: usize = 256;

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

pub const DEFAULT_KEEP_PERCENTAGE: f32 = 0.25;
pub const DEFAULT_MIN_FRAMES: usize = 50;
pub const DEFAULT_MAX_FRAMES: usize = 500;

// ---------------------------------------------------------------------------
// Alignment
// ---------------------------------------------------------------------------

/// Phase-correlation confidence below which a frame is kept unshifted.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.1;

/// Relative floor added to cross-power magnitudes so empty bins carry no weight.
pub const CROSS_POWER_REGULARIZATION: f64 = 1e-10;

/// Tile sizes accepted for local alignment.
pub const ALLOWED_TILE_SIZES: [usize; 4] = [16, 32, 48, 64];

pub const DEFAULT_TILE_SIZE: usize = 32;

/// Minimum peak NCC for a tile to count as measured.
pub const DEFAULT_LOCAL_CONFIDENCE_FLOOR: f64 = 0.5;

/// Fraction of tiles that must be measured for local alignment to apply.
pub const DEFAULT_MIN_VALID_TILE_FRACTION: f64 = 0.5;

/// Lanczos window size used to apply the dense warp.
pub const LANCZOS_RADIUS: usize = 3;

// ---------------------------------------------------------------------------
// Stacking
// ---------------------------------------------------------------------------

pub const DEFAULT_SIGMA_THRESHOLD: f32 = 2.5;
pub const DEFAULT_SIGMA_ITERATIONS: usize = 2;

/// Quality weight given to the worst selected frame.
pub const MIN_QUALITY_WEIGHT: f32 = 0.5;

/// Confidence weight floor, applied to low-confidence alignments.
pub const LOW_CONFIDENCE_WEIGHT: f32 = 0.25;

// ---------------------------------------------------------------------------
// Sharpening
// ---------------------------------------------------------------------------

pub const DEFAULT_WAVELET_LAYERS: usize = 5;
pub const DEFAULT_WAVELET_GAINS: [f32; 5] = [0.8, 1.5, 2.0, 1.8, 1.2];

// ---------------------------------------------------------------------------
// Memory / progress
// ---------------------------------------------------------------------------

/// Frames decoded or aligned at once before the working set is flushed.
pub const DEFAULT_CHUNK_SIZE: usize = 32;

/// Frames between two progress events within a stage.
pub const DEFAULT_PROGRESS_INTERVAL: usize = 50;
