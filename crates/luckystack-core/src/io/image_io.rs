use std::path::Path;

use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, Rgb};
use ndarray::Array2;

use crate::error::{LuckyStackError, Result};
use crate::frame::Frame;

/// Load an image file as a frame with samples normalized to [0, 1].
///
/// Grayscale images give one channel, everything else three. Alpha is dropped.
pub fn load_image(path: &Path) -> Result<Frame> {
    let img = image::open(path)?;
    decode(img, 0)
}

pub(crate) fn decode(img: DynamicImage, index: usize) -> Result<Frame> {
    let color = img.color();
    let bit_depth = (color.bits_per_pixel() / color.channel_count() as u16).min(16) as u8;
    let (w, h) = (img.width() as usize, img.height() as usize);

    if !color.has_color() {
        let gray = img.to_luma32f();
        let data = Array2::from_shape_vec((h, w), gray.into_raw())
            .map_err(|_| LuckyStackError::InvalidDimensions {
                width: w,
                height: h,
            })?;
        return Ok(Frame::mono(data, index, bit_depth));
    }

    let rgb = img.to_rgb32f();
    let mut planes = vec![Array2::<f32>::zeros((h, w)); 3];
    for (x, y, px) in rgb.enumerate_pixels() {
        for (c, plane) in planes.iter_mut().enumerate() {
            plane[[y as usize, x as usize]] = px.0[c];
        }
    }
    Frame::from_channels(planes, index, bit_depth)
}

/// Save as 16-bit TIFF, mono or RGB by channel count.
pub fn save_tiff(frame: &Frame, path: &Path) -> Result<()> {
    let (w, h) = dims(frame)?;
    let samples = interleave(frame, |v| (v * 65535.0).round() as u16);
    if frame.is_color() {
        ImageBuffer::<Rgb<u16>, _>::from_raw(w, h, samples)
            .ok_or_else(|| buffer_error(frame))?
            .save_with_format(path, ImageFormat::Tiff)?;
    } else {
        ImageBuffer::<Luma<u16>, _>::from_raw(w, h, samples)
            .ok_or_else(|| buffer_error(frame))?
            .save_with_format(path, ImageFormat::Tiff)?;
    }
    Ok(())
}

/// Save as 8-bit PNG, mono or RGB by channel count.
pub fn save_png(frame: &Frame, path: &Path) -> Result<()> {
    let (w, h) = dims(frame)?;
    let samples = interleave(frame, |v| (v * 255.0).round() as u8);
    if frame.is_color() {
        ImageBuffer::<Rgb<u8>, _>::from_raw(w, h, samples)
            .ok_or_else(|| buffer_error(frame))?
            .save_with_format(path, ImageFormat::Png)?;
    } else {
        ImageBuffer::<Luma<u8>, _>::from_raw(w, h, samples)
            .ok_or_else(|| buffer_error(frame))?
            .save_with_format(path, ImageFormat::Png)?;
    }
    Ok(())
}

/// Save frame, choosing format from file extension. Unknown extensions get TIFF.
pub fn save_image(frame: &Frame, path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => save_png(frame, path),
        _ => save_tiff(frame, path),
    }
}

fn dims(frame: &Frame) -> Result<(u32, u32)> {
    let (w, h) = (frame.width(), frame.height());
    if w == 0 || h == 0 {
        return Err(LuckyStackError::InvalidDimensions {
            width: w,
            height: h,
        });
    }
    Ok((w as u32, h as u32))
}

/// Row-major, channel-interleaved samples clamped to [0, 1] before conversion.
fn interleave<T>(frame: &Frame, convert: impl Fn(f32) -> T) -> Vec<T> {
    let (h, w) = (frame.height(), frame.width());
    let mut out = Vec::with_capacity(h * w * frame.channel_count());
    for row in 0..h {
        for col in 0..w {
            for plane in &frame.channels {
                out.push(convert(plane[[row, col]].clamp(0.0, 1.0)));
            }
        }
    }
    out
}

fn buffer_error(frame: &Frame) -> LuckyStackError {
    LuckyStackError::InvalidDimensions {
        width: frame.width(),
        height: frame.height(),
    }
}
