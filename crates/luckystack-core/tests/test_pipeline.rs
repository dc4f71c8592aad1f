mod common;

use std::sync::Arc;

use ndarray::Array2;

use luckystack_core::error::LuckyStackError;
use luckystack_core::frame::Frame;
use luckystack_core::pipeline::{
    run_pipeline, CancellationToken, ChannelReporter, PipelineConfig, PipelineControl,
    PipelineState, PipelineStatus, ProgressEvent, ProgressReporter,
};
use luckystack_core::source::InMemorySource;

use common::{blurred_sequence, jittered_planet_sequence, FlakySource, FragileSource};

const SIZE: usize = 96;

fn small_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.selection.keep_percentage = 0.5;
    config.selection.min_frames = 4;
    config.selection.max_frames = 100;
    config.alignment.confidence_threshold = 0.05;
    config.memory.chunk_size = 4;
    config.progress_interval = 2;
    config
}

/// Cancels the run as soon as `stage` reports progress.
struct CancelOn {
    stage: PipelineState,
    token: CancellationToken,
}

impl ProgressReporter for CancelOn {
    fn report(&self, event: ProgressEvent) {
        if event.stage == self.stage {
            self.token.cancel();
        }
    }
}

fn cancel_on(stage: PipelineState) -> PipelineControl {
    let token = CancellationToken::new();
    let reporter = CancelOn {
        stage,
        token: token.clone(),
    };
    PipelineControl::new(token, Arc::new(reporter))
}

// ---------------------------------------------------------------------------
// Successful runs
// ---------------------------------------------------------------------------

#[test]
fn test_pipeline_stacks_jittered_sequence() {
    let (frames, shifts) = jittered_planet_sequence(16, SIZE, 31);
    let source = InMemorySource::new(frames);
    let outcome = run_pipeline(&source, &small_config(), &PipelineControl::default()).unwrap();

    assert!(outcome.status.is_done(), "status {:?}", outcome.status);
    assert_eq!(outcome.records.len(), 16);
    assert_eq!(outcome.selected.len(), 8);
    assert!(outcome.selected.windows(2).all(|w| w[0] < w[1]));

    let reference = outcome.reference_index.unwrap();
    assert!(outcome.selected.contains(&reference));

    let image = outcome.image.as_ref().unwrap();
    assert_eq!((image.width(), image.height()), (SIZE, SIZE));
    assert!(image.channels[0].iter().all(|v| (0.0..=1.0).contains(v)));
    assert_eq!(outcome.stacked.as_ref().unwrap().len(), 1);

    // Every selected frame is either aligned or explained by a diagnostic.
    for index in &outcome.selected {
        let aligned = outcome.alignments.iter().any(|a| a.frame_index == *index);
        let diagnosed = outcome.diagnostics.iter().any(|d| d.frame_index == *index);
        assert!(aligned || diagnosed, "frame {index} vanished");
    }

    let (ref_x, ref_y) = shifts[reference];
    let confident: Vec<_> = outcome.alignments.iter().filter(|a| !a.low_confidence).collect();
    assert!(confident.len() * 2 >= outcome.alignments.len());
    for a in confident {
        let (sx, sy) = shifts[a.frame_index];
        assert!(
            (a.dx - (sx - ref_x)).abs() < 0.3 && (a.dy - (sy - ref_y)).abs() < 0.3,
            "frame {}: measured ({:.2}, {:.2}), expected ({:.2}, {:.2})",
            a.frame_index,
            a.dx,
            a.dy,
            sx - ref_x,
            sy - ref_y
        );
    }
}

#[test]
fn test_pipeline_without_local_alignment_or_sharpening() {
    let (frames, _) = jittered_planet_sequence(10, SIZE, 5);
    let source = InMemorySource::new(frames);
    let mut config = small_config();
    config.alignment.enable_local_align = false;
    config.sharpening = None;

    let (reporter, rx) = ChannelReporter::channel();
    let control = PipelineControl::new(CancellationToken::new(), Arc::new(reporter));
    let outcome = run_pipeline(&source, &config, &control).unwrap();

    assert!(outcome.status.is_done());
    let image = outcome.image.unwrap();
    assert_eq!(&image.channels, outcome.stacked.as_ref().unwrap());
    assert!(outcome.alignments.iter().all(|a| a.warp.is_none()));

    let stages: Vec<PipelineState> = rx.try_iter().map(|e| e.stage).collect();
    assert!(!stages.contains(&PipelineState::AligningLocal));
    assert!(!stages.contains(&PipelineState::Sharpening));
}

#[test]
fn test_progress_reports_stages_in_order() {
    let (frames, _) = jittered_planet_sequence(10, SIZE, 8);
    let source = InMemorySource::new(frames);
    let (reporter, rx) = ChannelReporter::channel();
    let control = PipelineControl::new(CancellationToken::new(), Arc::new(reporter));
    let outcome = run_pipeline(&source, &small_config(), &control).unwrap();
    assert!(outcome.status.is_done());

    let events: Vec<ProgressEvent> = rx.try_iter().collect();
    assert!(events.iter().all(|e| (0.0..=100.0).contains(&e.percent)));

    let mut first_seen: Vec<PipelineState> = Vec::new();
    for e in &events {
        if !first_seen.contains(&e.stage) {
            first_seen.push(e.stage);
        }
    }
    assert_eq!(
        first_seen,
        vec![
            PipelineState::Analyzing,
            PipelineState::Selecting,
            PipelineState::AligningGlobal,
            PipelineState::AligningLocal,
            PipelineState::Stacking,
            PipelineState::Sharpening,
        ]
    );
    assert!(events
        .iter()
        .any(|e| e.stage == PipelineState::Stacking && e.percent == 100.0));
}

// ---------------------------------------------------------------------------
// Per-frame failures
// ---------------------------------------------------------------------------

#[test]
fn test_unreadable_frames_are_skipped() {
    let (frames, _) = jittered_planet_sequence(12, SIZE, 12);
    let source = FlakySource {
        frames,
        broken: vec![1, 4],
    };
    let mut config = small_config();
    config.selection.keep_percentage = 1.0;
    let outcome = run_pipeline(&source, &config, &PipelineControl::default()).unwrap();

    assert!(outcome.status.is_done());
    assert_eq!(outcome.selected.len(), 10);
    assert!(!outcome.selected.contains(&1) && !outcome.selected.contains(&4));
    let diagnosed: Vec<usize> = outcome
        .diagnostics
        .iter()
        .filter(|d| d.stage == PipelineState::Analyzing)
        .map(|d| d.frame_index)
        .collect();
    assert_eq!(diagnosed.len(), 2);
    assert!(diagnosed.contains(&1) && diagnosed.contains(&4));
}

#[test]
fn test_mismatched_frame_is_excluded_from_stack() {
    let (mut frames, _) = jittered_planet_sequence(8, SIZE, 3);
    frames[5] = Frame::mono(Array2::from_elem((80, 80), 0.3), 5, 16);
    let source = InMemorySource::new(frames);
    let mut config = small_config();
    config.selection.keep_percentage = 1.0;
    let outcome = run_pipeline(&source, &config, &PipelineControl::default()).unwrap();

    assert!(outcome.status.is_done());
    assert!(outcome.selected.contains(&5));
    assert!(outcome.alignments.iter().all(|a| a.frame_index != 5));
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.frame_index == 5 && d.stage == PipelineState::AligningGlobal));
}

/// Reference and selection of an undisturbed run over `frames`.
fn clean_run(frames: Vec<Frame>, config: &PipelineConfig) -> (usize, Vec<usize>) {
    let outcome =
        run_pipeline(&InMemorySource::new(frames), config, &PipelineControl::default()).unwrap();
    assert!(outcome.status.is_done());
    (outcome.reference_index.unwrap(), outcome.selected)
}

#[test]
fn test_unreadable_reference_falls_back_to_next_best() {
    let (frames, _) = jittered_planet_sequence(10, SIZE, 44);
    let mut config = small_config();
    config.selection.keep_percentage = 1.0;
    let (best, _) = clean_run(frames.clone(), &config);

    // Readable during analysis, unreadable from then on.
    let source = FragileSource::new(frames, best, 1);
    let outcome = run_pipeline(&source, &config, &PipelineControl::default()).unwrap();

    assert!(outcome.status.is_done(), "status {:?}", outcome.status);
    assert!(outcome.image.is_some());
    let reference = outcome.reference_index.unwrap();
    assert_ne!(reference, best);
    assert!(outcome.selected.contains(&reference));
    assert!(!outcome.selected.contains(&best));
    assert_eq!(outcome.selected.len(), 9);
    assert!(outcome.alignments.iter().all(|a| a.frame_index != best));
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.frame_index == best && d.stage == PipelineState::AligningGlobal));
}

#[test]
fn test_frame_unreadable_during_global_alignment_is_excluded() {
    let (frames, _) = jittered_planet_sequence(10, SIZE, 45);
    let mut config = small_config();
    config.selection.keep_percentage = 1.0;
    let (best, selected) = clean_run(frames.clone(), &config);
    let victim = selected.into_iter().find(|&i| i != best).unwrap();

    let source = FragileSource::new(frames, victim, 1);
    let outcome = run_pipeline(&source, &config, &PipelineControl::default()).unwrap();

    assert!(outcome.status.is_done(), "status {:?}", outcome.status);
    assert_eq!(outcome.reference_index, Some(best));
    assert_eq!(outcome.alignments.len(), 9);
    assert!(outcome.alignments.iter().all(|a| a.frame_index != victim));
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.frame_index == victim && d.stage == PipelineState::AligningGlobal));
}

#[test]
fn test_frame_unreadable_during_local_alignment_is_excluded() {
    let (frames, _) = jittered_planet_sequence(10, SIZE, 46);
    let mut config = small_config();
    config.selection.keep_percentage = 1.0;
    let (best, selected) = clean_run(frames.clone(), &config);
    let victim = selected.into_iter().find(|&i| i != best).unwrap();

    // Analysis and the global pass succeed; the local pass re-read fails.
    let source = FragileSource::new(frames, victim, 2);
    let outcome = run_pipeline(&source, &config, &PipelineControl::default()).unwrap();

    assert!(outcome.status.is_done(), "status {:?}", outcome.status);
    assert_eq!(outcome.alignments.len(), 9);
    assert!(outcome.alignments.iter().all(|a| a.frame_index != victim));
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.frame_index == victim && d.stage == PipelineState::AligningLocal));
}

#[test]
fn test_unsharpened_stack_stays_in_range() {
    // Saturated square with anti-aliased edges at sub-pixel positions.
    let square = |x0: f64, y0: f64| {
        let cover = |p: usize, lo: f64| {
            let (a, b) = (p as f64, p as f64 + 1.0);
            (b.min(lo + 40.0) - a.max(lo)).clamp(0.0, 1.0)
        };
        Array2::from_shape_fn((SIZE, SIZE), |(r, c)| (cover(c, x0) * cover(r, y0)) as f32)
    };
    let frames: Vec<Frame> = (0..8)
        .map(|i| {
            let d = 0.37 * i as f64;
            Frame::mono(square(28.0 + d, 28.0 - 0.6 * d), i, 16)
        })
        .collect();
    let source = InMemorySource::new(frames);
    let mut config = small_config();
    config.selection.keep_percentage = 1.0;
    config.alignment.enable_local_align = false;
    config.sharpening = None;
    let outcome = run_pipeline(&source, &config, &PipelineControl::default()).unwrap();

    assert!(outcome.status.is_done(), "status {:?}", outcome.status);
    let image = outcome.image.unwrap();
    assert!(image.channels[0].iter().all(|v| (0.0..=1.0).contains(v)));
    let stacked = outcome.stacked.unwrap();
    assert!(stacked[0].iter().all(|v| (0.0..=1.0).contains(v)));
}

// ---------------------------------------------------------------------------
// Fatal outcomes
// ---------------------------------------------------------------------------

#[test]
fn test_too_few_frames_fails_without_image() {
    let source = InMemorySource::new(blurred_sequence(10, 48, 48, 1));
    let mut config = PipelineConfig::default();
    config.selection.min_frames = 20;
    let outcome = run_pipeline(&source, &config, &PipelineControl::default()).unwrap();

    match outcome.status {
        PipelineStatus::Failed(LuckyStackError::InsufficientFrames { usable, required }) => {
            assert_eq!((usable, required), (10, 20));
        }
        other => panic!("expected InsufficientFrames, got {other:?}"),
    }
    assert!(outcome.image.is_none());
    assert!(outcome.selected.is_empty());
    assert_eq!(outcome.records.len(), 10);
}

#[test]
fn test_too_few_frames_after_alignment_fails() {
    let (mut frames, _) = jittered_planet_sequence(10, SIZE, 14);
    for i in 5..10 {
        frames[i] = Frame::mono(Array2::from_elem((64, 64), 0.3), i, 16);
    }
    let source = InMemorySource::new(frames);
    let mut config = small_config();
    config.selection.keep_percentage = 1.0;
    config.selection.min_frames = 6;
    let outcome = run_pipeline(&source, &config, &PipelineControl::default()).unwrap();

    assert!(matches!(
        outcome.status,
        PipelineStatus::Failed(LuckyStackError::InsufficientFrames {
            usable: 5,
            required: 6
        })
    ));
    assert!(outcome.image.is_none());
}

#[test]
fn test_invalid_config_is_rejected_up_front() {
    let source = InMemorySource::new(blurred_sequence(4, 16, 16, 1));
    let mut config = PipelineConfig::default();
    config.selection.keep_percentage = 0.0;
    assert!(matches!(
        run_pipeline(&source, &config, &PipelineControl::default()),
        Err(LuckyStackError::Configuration(_))
    ));
}

#[test]
fn test_empty_source_fails() {
    let source = InMemorySource::new(Vec::new());
    let outcome = run_pipeline(&source, &small_config(), &PipelineControl::default()).unwrap();
    assert!(matches!(
        outcome.status,
        PipelineStatus::Failed(LuckyStackError::InsufficientFrames { usable: 0, .. })
    ));
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[test]
fn test_cancelled_before_start() {
    let source = InMemorySource::new(blurred_sequence(8, 32, 32, 2));
    let control = PipelineControl::default();
    control.cancel.cancel();
    let outcome = run_pipeline(&source, &small_config(), &control).unwrap();

    assert!(matches!(outcome.status, PipelineStatus::Cancelled));
    assert!(outcome.image.is_none());
    assert!(outcome.records.is_empty());
}

#[test]
fn test_cancel_during_alignment_stops_promptly() {
    let (frames, _) = jittered_planet_sequence(16, SIZE, 21);
    let source = InMemorySource::new(frames);
    let config = small_config();
    let outcome = run_pipeline(&source, &config, &cancel_on(PipelineState::AligningGlobal)).unwrap();

    assert!(matches!(outcome.status, PipelineStatus::Cancelled));
    assert!(outcome.image.is_none());
    assert_eq!(outcome.records.len(), 16);
    assert!(outcome.alignments.len() <= config.memory.chunk_size);
}

#[test]
fn test_cancel_during_stacking() {
    let (frames, _) = jittered_planet_sequence(10, SIZE, 22);
    let source = InMemorySource::new(frames);
    let outcome =
        run_pipeline(&source, &small_config(), &cancel_on(PipelineState::Stacking)).unwrap();

    assert!(matches!(outcome.status, PipelineStatus::Cancelled));
    assert!(outcome.image.is_none());
    assert!(outcome.stacked.is_none());
    assert!(!outcome.alignments.is_empty());
}
