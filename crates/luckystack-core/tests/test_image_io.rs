use std::fs;

use approx::assert_abs_diff_eq;
use ndarray::Array2;

use luckystack_core::error::LuckyStackError;
use luckystack_core::frame::Frame;
use luckystack_core::io::{
    load_image, save_image, FileSink, ImageSequenceSource, ImageSink, MemorySink,
};
use luckystack_core::source::FrameSource;

fn gradient(w: usize, h: usize) -> Array2<f32> {
    Array2::from_shape_fn((h, w), |(r, c)| (r * w + c) as f32 / (w * h - 1) as f32)
}

#[test]
fn test_mono_png_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mono.png");
    let data = gradient(20, 10);
    save_image(&Frame::mono(data.clone(), 0, 16), &path).unwrap();

    let loaded = load_image(&path).unwrap();
    assert_eq!(loaded.channel_count(), 1);
    assert_eq!(loaded.original_bit_depth, 8);
    assert_eq!((loaded.width(), loaded.height()), (20, 10));
    for (a, b) in loaded.channels[0].iter().zip(data.iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 0.5 / 255.0 + 1e-6);
    }
}

#[test]
fn test_rgb_tiff_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("color.tif");
    let base = gradient(16, 12);
    let frame = Frame::from_channels(
        vec![base.clone(), base.mapv(|v| 1.0 - v), base.mapv(|v| v * 0.5)],
        0,
        16,
    )
    .unwrap();
    save_image(&frame, &path).unwrap();

    let loaded = load_image(&path).unwrap();
    assert!(loaded.is_color());
    assert_eq!(loaded.original_bit_depth, 16);
    for (loaded_plane, plane) in loaded.channels.iter().zip(&frame.channels) {
        for (a, b) in loaded_plane.iter().zip(plane.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 0.5 / 65535.0 + 1e-6);
        }
    }
}

#[test]
fn test_unknown_extension_writes_tiff() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stack.out");
    save_image(&Frame::mono(gradient(8, 8), 0, 16), &path).unwrap();
    let bytes = fs::read(&path).unwrap();
    assert!(bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*"));
}

#[test]
fn test_values_are_clamped_on_save() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clamped.png");
    let data = Array2::from_shape_fn((4, 4), |(r, _)| if r < 2 { -0.5 } else { 1.5 });
    save_image(&Frame::mono(data, 0, 16), &path).unwrap();
    let loaded = load_image(&path).unwrap();
    assert_eq!(loaded.channels[0][[0, 0]], 0.0);
    assert_eq!(loaded.channels[0][[3, 3]], 1.0);
}

#[test]
fn test_empty_frame_cannot_be_saved() {
    let dir = tempfile::tempdir().unwrap();
    let frame = Frame::mono(Array2::zeros((0, 0)), 0, 8);
    assert!(matches!(
        save_image(&frame, &dir.path().join("empty.png")),
        Err(LuckyStackError::InvalidDimensions { .. })
    ));
}

#[test]
fn test_missing_file_is_an_error() {
    assert!(load_image(std::path::Path::new("/nonexistent/frame.png")).is_err());
}

// ---------------------------------------------------------------------------
// Image sequences
// ---------------------------------------------------------------------------

#[test]
fn test_sequence_orders_by_file_name() {
    let dir = tempfile::tempdir().unwrap();
    for (name, value) in [("frame_002.png", 0.8f32), ("frame_000.png", 0.2), ("frame_001.png", 0.5)] {
        let frame = Frame::mono(Array2::from_elem((6, 6), value), 0, 8);
        save_image(&frame, &dir.path().join(name)).unwrap();
    }
    fs::write(dir.path().join("notes.txt"), "not an image").unwrap();
    fs::create_dir(dir.path().join("sub.png")).unwrap();

    let source = ImageSequenceSource::open(dir.path()).unwrap();
    assert_eq!(source.frame_count(), 3);

    for (index, expected) in [(0usize, 0.2f32), (1, 0.5), (2, 0.8)] {
        let frame = source.get_frame(index).unwrap();
        assert_eq!(frame.index, index);
        assert_abs_diff_eq!(frame.channels[0][[3, 3]], expected, epsilon = 1.0 / 255.0);
    }
}

#[test]
fn test_sequence_reports_corrupt_frames() {
    let dir = tempfile::tempdir().unwrap();
    save_image(&Frame::mono(gradient(6, 6), 0, 8), &dir.path().join("a.png")).unwrap();
    fs::write(dir.path().join("b.png"), b"definitely not a png").unwrap();

    let source = ImageSequenceSource::open(dir.path()).unwrap();
    assert!(source.get_frame(0).is_ok());
    match source.get_frame(1) {
        Err(err @ LuckyStackError::FrameDecode { index: 1, .. }) => assert!(err.is_recoverable()),
        other => panic!("expected FrameDecode, got {other:?}"),
    }
    assert!(matches!(
        source.get_frame(2),
        Err(LuckyStackError::FrameIndexOutOfRange { index: 2, total: 2 })
    ));
}

#[test]
fn test_sequence_from_paths_keeps_given_order() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.png");
    let b = dir.path().join("b.png");
    save_image(&Frame::mono(Array2::from_elem((4, 4), 0.2), 0, 8), &a).unwrap();
    save_image(&Frame::mono(Array2::from_elem((4, 4), 0.8), 0, 8), &b).unwrap();

    let source = ImageSequenceSource::from_paths(vec![b.clone(), a.clone()]);
    assert_eq!(source.paths(), &[b, a]);
    let first = source.get_frame(0).unwrap();
    assert_abs_diff_eq!(first.channels[0][[1, 1]], 0.8, epsilon = 1.0 / 255.0);
}

#[test]
fn test_missing_directory_is_an_error() {
    assert!(matches!(
        ImageSequenceSource::open(std::path::Path::new("/nonexistent/sequence")),
        Err(LuckyStackError::Io(_))
    ));
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

#[test]
fn test_file_sink_writes_image() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("result.tiff");
    let mut sink = FileSink::new(&path);
    assert_eq!(sink.path(), path.as_path());
    sink.accept(&Frame::mono(gradient(8, 8), 0, 16)).unwrap();
    assert_eq!(sink.written(), 1);
    assert!(path.exists());
    assert_eq!(load_image(&path).unwrap().width(), 8);
}

#[test]
fn test_memory_sink_keeps_frames() {
    let mut sink = MemorySink::default();
    sink.accept(&Frame::mono(gradient(4, 4), 3, 8)).unwrap();
    assert_eq!(sink.frames.len(), 1);
    assert_eq!(sink.frames[0].index, 3);
}
