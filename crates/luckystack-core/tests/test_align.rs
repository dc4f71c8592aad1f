mod common;

use approx::assert_abs_diff_eq;
use ndarray::{s, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use luckystack_core::align::interpolation::{reflect_index, shift_bicubic};
use luckystack_core::align::{compute_offset, compute_offset_array, GlobalAligner};
use luckystack_core::error::LuckyStackError;
use luckystack_core::frame::{Frame, Roi};

use common::{random_blobs, render_blobs};

const SIZE: usize = 128;

fn pair(shift_x: f64, shift_y: f64) -> (Array2<f32>, Array2<f32>) {
    let blobs = random_blobs(SIZE, SIZE, 14, 7);
    (
        render_blobs(SIZE, SIZE, &blobs, 0.0, 0.0),
        render_blobs(SIZE, SIZE, &blobs, shift_x, shift_y),
    )
}

// ---------------------------------------------------------------------------
// Phase correlation
// ---------------------------------------------------------------------------

#[test]
fn test_recovers_subpixel_translation() {
    let (reference, target) = pair(3.7, -2.2);
    let measured = compute_offset_array(&reference, &target).unwrap();
    assert_abs_diff_eq!(measured.offset.dx, 3.7, epsilon = 0.2);
    assert_abs_diff_eq!(measured.offset.dy, -2.2, epsilon = 0.2);
    assert!(measured.confidence > 0.5, "confidence {}", measured.confidence);
}

#[test]
fn test_recovers_integer_translation() {
    let (reference, target) = pair(5.0, -3.0);
    let measured = compute_offset_array(&reference, &target).unwrap();
    assert_abs_diff_eq!(measured.offset.dx, 5.0, epsilon = 0.1);
    assert_abs_diff_eq!(measured.offset.dy, -3.0, epsilon = 0.1);
}

#[test]
fn test_identical_images_have_zero_offset() {
    let (reference, _) = pair(0.0, 0.0);
    let measured = compute_offset_array(&reference, &reference).unwrap();
    assert_abs_diff_eq!(measured.offset.dx, 0.0, epsilon = 0.05);
    assert_abs_diff_eq!(measured.offset.dy, 0.0, epsilon = 0.05);
    assert!(measured.confidence > 0.9);
}

#[test]
fn test_flat_images_have_zero_confidence() {
    let flat = Array2::<f32>::zeros((32, 32));
    let measured = compute_offset_array(&flat, &flat).unwrap();
    assert_eq!(measured.confidence, 0.0);
    assert_eq!(measured.offset.dx, 0.0);
}

#[test]
fn test_size_mismatch_fails() {
    let a = Array2::<f32>::zeros((32, 32));
    let b = Array2::<f32>::zeros((32, 16));
    assert!(matches!(
        compute_offset_array(&a, &b),
        Err(LuckyStackError::AlignmentFailure { .. })
    ));
}

#[test]
fn test_degenerate_size_fails() {
    let a = Array2::<f32>::zeros((1, 8));
    assert!(matches!(
        compute_offset_array(&a, &a),
        Err(LuckyStackError::InvalidDimensions { .. })
    ));
}

#[test]
fn test_color_frames_align_on_luminance() {
    let (reference, target) = pair(-1.5, 2.5);
    let to_rgb = |plane: &Array2<f32>, index| {
        Frame::from_channels(
            vec![plane.mapv(|v| v * 0.9), plane.clone(), plane.mapv(|v| v * 0.5)],
            index,
            8,
        )
        .unwrap()
    };
    let measured = compute_offset(&to_rgb(&reference, 0), &to_rgb(&target, 1)).unwrap();
    assert_abs_diff_eq!(measured.offset.dx, -1.5, epsilon = 0.2);
    assert_abs_diff_eq!(measured.offset.dy, 2.5, epsilon = 0.2);
}

// ---------------------------------------------------------------------------
// Resampling
// ---------------------------------------------------------------------------

#[test]
fn test_zero_shift_is_identity() {
    let (reference, _) = pair(0.0, 0.0);
    assert_eq!(shift_bicubic(&reference, 0.0, 0.0), reference);
}

#[test]
fn test_integer_shift_moves_pixels() {
    let data = Array2::from_shape_fn((16, 16), |(r, c)| (r * 16 + c) as f32);
    let shifted = shift_bicubic(&data, 2.0, 1.0);
    // out(x, y) = in(x + 2, y + 1)
    assert_abs_diff_eq!(shifted[[5, 5]], data[[6, 7]], epsilon = 1e-3);
}

#[test]
fn test_reflect_index() {
    assert_eq!(reflect_index(-1, 5), 1);
    assert_eq!(reflect_index(-2, 5), 2);
    assert_eq!(reflect_index(5, 5), 3);
    assert_eq!(reflect_index(2, 5), 2);
    assert_eq!(reflect_index(0, 1), 0);
}

// ---------------------------------------------------------------------------
// GlobalAligner
// ---------------------------------------------------------------------------

#[test]
fn test_global_aligner_registers_frame() {
    let (reference, target) = pair(2.3, 1.6);
    let aligner = GlobalAligner::new(reference.clone(), None, 0.1);
    let (result, aligned) = aligner.align(&Frame::mono(target, 4, 16)).unwrap();

    assert_eq!(result.frame_index, 4);
    assert!(!result.low_confidence);
    assert_abs_diff_eq!(result.dx, 2.3, epsilon = 0.2);
    assert_abs_diff_eq!(result.dy, 1.6, epsilon = 0.2);

    let inner = s![16..112, 16..112];
    let err = (&aligned.channels[0].slice(inner) - &reference.slice(inner))
        .mapv(f32::abs)
        .mean()
        .unwrap();
    assert!(err < 0.01, "mean residual {err}");
}

#[test]
fn test_global_aligner_with_region() {
    let (reference, target) = pair(-2.0, 1.0);
    let region = Roi { x: 16, y: 16, width: 96, height: 96 };
    let aligner = GlobalAligner::new(reference, Some(region), 0.1);
    assert_eq!(aligner.region(), region);
    let (result, _) = aligner.align(&Frame::mono(target, 0, 16)).unwrap();
    assert_abs_diff_eq!(result.dx, -2.0, epsilon = 0.2);
    assert_abs_diff_eq!(result.dy, 1.0, epsilon = 0.2);
}

#[test]
fn test_low_confidence_keeps_frame_unshifted() {
    let (reference, _) = pair(0.0, 0.0);
    let mut rng = StdRng::seed_from_u64(11);
    let noise = Array2::from_shape_fn((SIZE, SIZE), |_| rng.random_range(0.0f32..1.0));
    let aligner = GlobalAligner::new(reference, None, 0.5);
    let frame = Frame::mono(noise.clone(), 2, 8);
    let (result, aligned) = aligner.align(&frame).unwrap();

    assert!(result.low_confidence);
    assert_eq!(result.confidence, 0.0);
    assert_eq!((result.dx, result.dy), (0.0, 0.0));
    assert_eq!(aligned.channels[0], noise);
}

#[test]
fn test_global_aligner_rejects_wrong_size() {
    let (reference, _) = pair(0.0, 0.0);
    let aligner = GlobalAligner::new(reference, None, 0.1);
    let frame = Frame::mono(Array2::zeros((64, 64)), 9, 8);
    match aligner.align(&frame) {
        Err(LuckyStackError::AlignmentFailure { index, .. }) => assert_eq!(index, 9),
        other => panic!("expected AlignmentFailure, got {other:?}"),
    }
}
