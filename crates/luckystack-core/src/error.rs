use thiserror::Error;

#[derive(Error, Debug)]
pub enum LuckyStackError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Failed to decode frame {index}: {reason}")]
    FrameDecode { index: usize, reason: String },

    #[error("Alignment failed for frame {index}: {reason}")]
    AlignmentFailure { index: usize, reason: String },

    #[error("Insufficient frames: {usable} usable, {required} required")]
    InsufficientFrames { usable: usize, required: usize },

    #[error("Stacking error: {0}")]
    Stacking(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Frame index {index} out of range (total: {total})")]
    FrameIndexOutOfRange { index: usize, total: usize },

    #[error("Processing cancelled")]
    Cancelled,
}

impl LuckyStackError {
    /// Per-frame errors that drop a single frame without failing the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::FrameDecode { .. } | Self::AlignmentFailure { .. } | Self::FrameIndexOutOfRange { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, LuckyStackError>;
