use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{LuckyStackError, Result};
use crate::frame::Frame;
use crate::source::FrameSource;

use super::image_io::decode;

const SEQUENCE_EXTENSIONS: [&str; 6] = ["png", "tif", "tiff", "jpg", "jpeg", "bmp"];

/// A directory of still images, one frame per file, ordered by file name.
///
/// Files are decoded on every request; nothing is cached.
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
}

impl ImageSequenceSource {
    pub fn open(dir: &Path) -> Result<Self> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_sequence_image(p))
            .collect();
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        info!(dir = %dir.display(), frames = paths.len(), "Opened image sequence");
        Ok(Self { paths })
    }

    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

fn is_sequence_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SEQUENCE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

impl FrameSource for ImageSequenceSource {
    fn frame_count(&self) -> usize {
        self.paths.len()
    }

    fn get_frame(&self, index: usize) -> Result<Frame> {
        let path = self
            .paths
            .get(index)
            .ok_or(LuckyStackError::FrameIndexOutOfRange {
                index,
                total: self.paths.len(),
            })?;
        let img = image::open(path).map_err(|e| LuckyStackError::FrameDecode {
            index,
            reason: format!("{}: {e}", path.display()),
        })?;
        decode(img, index)
    }
}
