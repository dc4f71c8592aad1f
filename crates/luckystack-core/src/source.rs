use crate::error::{LuckyStackError, Result};
use crate::frame::Frame;

/// Pull interface over a frame sequence.
///
/// Implementations must be shareable across the rayon pool: analysis and
/// alignment fetch frames from several workers at once.
pub trait FrameSource: Sync {
    fn frame_count(&self) -> usize;

    /// Decode the frame at `index`. Unreadable frames yield `FrameDecode`.
    fn get_frame(&self, index: usize) -> Result<Frame>;
}

/// Frames already decoded into memory.
pub struct InMemorySource {
    frames: Vec<Frame>,
}

impl InMemorySource {
    /// Frame indices are rewritten to their position in `frames`.
    pub fn new(frames: Vec<Frame>) -> Self {
        let frames = frames
            .into_iter()
            .enumerate()
            .map(|(i, mut f)| {
                f.index = i;
                f
            })
            .collect();
        Self { frames }
    }
}

impl FrameSource for InMemorySource {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn get_frame(&self, index: usize) -> Result<Frame> {
        self.frames
            .get(index)
            .cloned()
            .ok_or(LuckyStackError::FrameIndexOutOfRange {
                index,
                total: self.frames.len(),
            })
    }
}
