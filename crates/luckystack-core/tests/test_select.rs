use luckystack_core::error::LuckyStackError;
use luckystack_core::frame::Roi;
use luckystack_core::pipeline::config::SelectionConfig;
use luckystack_core::quality::{QualityRecord, SharpnessMetrics};
use luckystack_core::select::{rank, select_frames, target_count};

fn records(scores: &[f64]) -> Vec<QualityRecord> {
    scores
        .iter()
        .enumerate()
        .map(|(i, &score)| QualityRecord {
            frame_index: i,
            metrics: SharpnessMetrics::default(),
            raw_metric: score,
            score,
            roi: Roi::full(8, 8),
        })
        .collect()
}

fn config(keep: f32, min: usize, max: usize) -> SelectionConfig {
    SelectionConfig {
        keep_percentage: keep,
        min_frames: min,
        max_frames: max,
        temporal_window: None,
    }
}

#[test]
fn test_hundred_frames_keep_quarter_min_fifty() {
    let scores: Vec<f64> = (0..100).map(|i| ((i * 37) % 100) as f64 / 100.0).collect();
    let selection = select_frames(&records(&scores), &config(0.25, 50, 500)).unwrap();
    assert_eq!(selection.indices.len(), 50);
    assert!(selection.indices.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_keeps_the_best_frames() {
    let scores: Vec<f64> = (0..20).map(|i| i as f64 / 20.0).collect();
    let selection = select_frames(&records(&scores), &config(0.25, 1, 100)).unwrap();
    assert_eq!(selection.indices, vec![15, 16, 17, 18, 19]);
    assert_eq!(selection.best, 19);
}

#[test]
fn test_target_count_clamps() {
    assert_eq!(target_count(100, &config(0.25, 50, 500)), 50);
    assert_eq!(target_count(1000, &config(0.25, 50, 500)), 250);
    assert_eq!(target_count(1000, &config(1.0, 50, 500)), 500);
    // Never more than available.
    assert_eq!(target_count(10, &config(0.25, 50, 500)), 10);
    // Rounds to nearest.
    assert_eq!(target_count(10, &config(0.25, 1, 500)), 3);
}

#[test]
fn test_equal_scores_keep_source_order() {
    let selection = select_frames(&records(&[0.5; 10]), &config(0.5, 1, 100)).unwrap();
    assert_eq!(selection.indices, vec![0, 1, 2, 3, 4]);
    assert_eq!(selection.best, 0);
}

#[test]
fn test_rank_orders_best_first() {
    let recs = records(&[0.2, 0.9, 0.5, 0.9]);
    let ranked: Vec<usize> = rank(&recs).iter().map(|r| r.frame_index).collect();
    assert_eq!(ranked, vec![1, 3, 2, 0]);
}

#[test]
fn test_temporal_window_spreads_selection() {
    // Early frames are best; plain ranking would take 0..25.
    let scores: Vec<f64> = (0..100).map(|i| 1.0 - i as f64 / 100.0).collect();
    let mut cfg = config(0.25, 1, 500);
    cfg.temporal_window = Some(10);
    let selection = select_frames(&records(&scores), &cfg).unwrap();

    assert_eq!(selection.indices.len(), 25);
    for window_start in (0..100).step_by(10) {
        assert!(
            selection.indices.contains(&window_start),
            "window starting at {window_start} not represented"
        );
    }
    assert_eq!(selection.best, 0);
    assert!(selection.indices.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_empty_batch_is_insufficient() {
    let err = select_frames(&[], &config(0.25, 50, 500)).unwrap_err();
    assert!(matches!(
        err,
        LuckyStackError::InsufficientFrames {
            usable: 0,
            required: 50
        }
    ));
}
