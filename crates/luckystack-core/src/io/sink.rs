use std::path::PathBuf;

use crate::error::Result;
use crate::frame::Frame;

use super::image_io::save_image;

/// Consumer of the finished image.
pub trait ImageSink {
    fn accept(&mut self, frame: &Frame) -> Result<()>;
}

/// Writes the image to a file; format follows the extension.
pub struct FileSink {
    path: PathBuf,
    written: usize,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            written: 0,
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Images accepted so far. Each one overwrites the previous file.
    pub fn written(&self) -> usize {
        self.written
    }
}

impl ImageSink for FileSink {
    fn accept(&mut self, frame: &Frame) -> Result<()> {
        save_image(frame, &self.path)?;
        self.written += 1;
        Ok(())
    }
}

/// Keeps every accepted image in memory.
#[derive(Default)]
pub struct MemorySink {
    pub frames: Vec<Frame>,
}

impl ImageSink for MemorySink {
    fn accept(&mut self, frame: &Frame) -> Result<()> {
        self.frames.push(frame.clone());
        Ok(())
    }
}
