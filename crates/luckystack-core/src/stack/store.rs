use std::io::{BufWriter, Write};
use std::ops::Range;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use memmap2::Mmap;
use ndarray::Array2;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{LuckyStackError, Result};
use crate::frame::Frame;

const F32_BYTES: usize = std::mem::size_of::<f32>();

enum Backing {
    Resident(Vec<Vec<Array2<f32>>>),
    Spilled {
        writer: Option<BufWriter<NamedTempFile>>,
        file: Option<NamedTempFile>,
        mmap: Option<Mmap>,
    },
}

/// Aligned frames awaiting stacking.
///
/// Up to `chunk_size` frames stay in memory; larger sets are written to a
/// scratch file of little-endian f32 planes (frame-major, then channel,
/// then row) and read back through a memory map. The file is deleted on drop.
pub struct AlignedFrameStore {
    height: usize,
    width: usize,
    channels: usize,
    len: usize,
    backing: Backing,
}

impl AlignedFrameStore {
    /// Store sized for `expected` frames of `height x width x channels`.
    pub fn new(
        height: usize,
        width: usize,
        channels: usize,
        expected: usize,
        chunk_size: usize,
        scratch_dir: Option<&Path>,
    ) -> Result<Self> {
        let backing = if expected <= chunk_size {
            Backing::Resident(Vec::with_capacity(expected))
        } else {
            let file = match scratch_dir {
                Some(dir) => NamedTempFile::new_in(dir)?,
                None => NamedTempFile::new()?,
            };
            debug!(
                path = %file.path().display(),
                frames = expected,
                "Spilling aligned frames to scratch file"
            );
            Backing::Spilled {
                writer: Some(BufWriter::new(file)),
                file: None,
                mmap: None,
            }
        };
        Ok(Self {
            height,
            width,
            channels,
            len: 0,
            backing,
        })
    }

    /// Resident store holding the given frames.
    pub fn from_frames(frames: &[Frame]) -> Result<Self> {
        let first = frames
            .first()
            .ok_or_else(|| LuckyStackError::Stacking("no frames to stack".into()))?;
        let mut store = Self::new(
            first.height(),
            first.width(),
            first.channel_count(),
            frames.len(),
            frames.len(),
            None,
        )?;
        for f in frames {
            store.push(f)?;
        }
        store.finish()?;
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn dim(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn channel_count(&self) -> usize {
        self.channels
    }

    pub fn is_spilled(&self) -> bool {
        matches!(self.backing, Backing::Spilled { .. })
    }

    /// Append a frame. Shape or channel mismatches are `Stacking` errors.
    pub fn push(&mut self, frame: &Frame) -> Result<()> {
        if frame.height() != self.height
            || frame.width() != self.width
            || frame.channel_count() != self.channels
        {
            return Err(LuckyStackError::Stacking(format!(
                "frame {} is {}x{}x{}, expected {}x{}x{}",
                frame.index,
                frame.width(),
                frame.height(),
                frame.channel_count(),
                self.width,
                self.height,
                self.channels
            )));
        }

        match &mut self.backing {
            Backing::Resident(frames) => frames.push(frame.channels.clone()),
            Backing::Spilled { writer, .. } => {
                let writer = writer.as_mut().ok_or_else(|| {
                    LuckyStackError::Stacking("store already finished".into())
                })?;
                for plane in &frame.channels {
                    for &v in plane.iter() {
                        writer.write_f32::<LittleEndian>(v)?;
                    }
                }
            }
        }
        self.len += 1;
        Ok(())
    }

    /// Seal the store for reading. Idempotent.
    pub fn finish(&mut self) -> Result<()> {
        if let Backing::Spilled { writer, file, mmap } = &mut self.backing {
            if let Some(mut w) = writer.take() {
                w.flush()?;
                let f = w.into_inner().map_err(|e| LuckyStackError::Io(e.into_error()))?;
                if self.len > 0 {
                    // The file is private to this store and never written again.
                    *mmap = Some(unsafe { Mmap::map(f.as_file())? });
                }
                *file = Some(f);
            }
        }
        Ok(())
    }

    /// Copy rows `rows` of `channel` of frame `i` into `out`.
    pub fn read_rows(&self, i: usize, channel: usize, rows: Range<usize>, out: &mut [f32]) -> Result<()> {
        if i >= self.len || channel >= self.channels || rows.end > self.height {
            return Err(LuckyStackError::Stacking(format!(
                "read out of range: frame {i}, channel {channel}, rows {rows:?}"
            )));
        }
        let count = rows.len() * self.width;
        let out = &mut out[..count];
        match &self.backing {
            Backing::Resident(frames) => {
                let plane = &frames[i][channel];
                for (dst, src) in out
                    .chunks_exact_mut(self.width)
                    .zip(plane.outer_iter().skip(rows.start))
                {
                    dst.iter_mut().zip(src.iter()).for_each(|(d, &s)| *d = s);
                }
            }
            Backing::Spilled { mmap, .. } => {
                let mmap = mmap.as_ref().ok_or_else(|| {
                    LuckyStackError::Stacking("store read before finish".into())
                })?;
                let plane_len = self.height * self.width;
                let start = ((i * self.channels + channel) * plane_len + rows.start * self.width)
                    * F32_BYTES;
                LittleEndian::read_f32_into(&mmap[start..start + count * F32_BYTES], out);
            }
        }
        Ok(())
    }
}
