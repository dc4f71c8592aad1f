use std::collections::HashMap;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::align::{shift_frame, AlignmentResult, GlobalAligner, LocalAligner};
use crate::error::{LuckyStackError, Result};
use crate::frame::{Frame, Roi};
use crate::quality::analyze;
use crate::select::select_frames;
use crate::sharpen::WaveletSharpener;
use crate::source::FrameSource;
use crate::stack::{frame_weight, stack_store, AlignedFrameStore};

use super::config::PipelineConfig;
use super::progress::{PipelineControl, ProgressThrottle};
use super::types::{FrameDiagnostic, PipelineOutcome, PipelineState, PipelineStatus};

/// Tracks the current state and rejects illegal transitions.
struct StateMachine<'a> {
    state: PipelineState,
    control: &'a PipelineControl,
}

impl<'a> StateMachine<'a> {
    fn new(control: &'a PipelineControl) -> Self {
        Self {
            state: PipelineState::Idle,
            control,
        }
    }

    fn enter(&mut self, next: PipelineState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal pipeline transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(from = ?self.state, to = ?next, "Pipeline transition");
        self.state = next;
        if !next.is_terminal() {
            self.control.emit(next, 0.0, next.to_string());
        }
    }
}

/// Run the whole pipeline over `source`.
///
/// Returns `Err` only when `config` is invalid. Every other failure, and
/// cancellation, is reported through the outcome's status.
pub fn run_pipeline(
    source: &dyn FrameSource,
    config: &PipelineConfig,
    control: &PipelineControl,
) -> Result<PipelineOutcome> {
    config.validate()?;

    let mut machine = StateMachine::new(control);
    let mut outcome = PipelineOutcome::empty();
    let result = execute(source, config, control, &mut machine, &mut outcome);

    match result {
        Ok(image) => {
            machine.enter(PipelineState::Done);
            info!(
                width = image.width(),
                height = image.height(),
                stacked = outcome.alignments.len(),
                "Pipeline complete"
            );
            outcome.image = Some(image);
            outcome.status = PipelineStatus::Done;
        }
        Err(LuckyStackError::Cancelled) => {
            warn!(stage = ?machine.state, "Pipeline cancelled");
            machine.enter(PipelineState::Cancelled);
            outcome.image = None;
            outcome.stacked = None;
            outcome.status = PipelineStatus::Cancelled;
        }
        Err(e) => {
            warn!(stage = ?machine.state, error = %e, "Pipeline failed");
            machine.enter(PipelineState::Failed);
            outcome.image = None;
            outcome.status = PipelineStatus::Failed(e);
        }
    }
    Ok(outcome)
}

fn execute(
    source: &dyn FrameSource,
    config: &PipelineConfig,
    control: &PipelineControl,
    machine: &mut StateMachine,
    outcome: &mut PipelineOutcome,
) -> Result<Frame> {
    let required = config.selection.min_frames;
    let chunk_size = config.memory.chunk_size;

    // -- Analyze ------------------------------------------------------------
    machine.enter(PipelineState::Analyzing);
    let report = analyze(
        source,
        &config.analysis,
        chunk_size,
        config.progress_interval,
        control,
    )?;
    outcome.diagnostics.extend(report.diagnostics);
    outcome.records = report.records;
    ensure_enough(outcome.records.len(), required)?;

    // -- Select -------------------------------------------------------------
    control.check_cancelled()?;
    machine.enter(PipelineState::Selecting);
    let selection = select_frames(&outcome.records, &config.selection)?;
    outcome.selected = selection.indices.clone();
    outcome.reference_index = Some(selection.best);
    let scores: HashMap<usize, (f64, Roi)> = outcome
        .records
        .iter()
        .map(|r| (r.frame_index, (r.score, r.roi)))
        .collect();

    // -- Global alignment ---------------------------------------------------
    control.check_cancelled()?;
    machine.enter(PipelineState::AligningGlobal);
    let mut selected = selection.indices;
    let reference = read_reference(
        source,
        &mut selected,
        &scores,
        required,
        &mut outcome.diagnostics,
    )?;
    outcome.selected = selected.clone();
    outcome.reference_index = Some(reference.index);
    ensure_enough(selected.len(), required)?;

    let reference_lum = reference.luminance();
    let (h, w) = reference_lum.dim();
    let roi = scores.get(&reference.index).map(|&(_, roi)| roi);
    let margin = config.alignment.tile_size / 2;
    let global = GlobalAligner::new(
        reference_lum.clone(),
        roi.map(|r| r.expand(margin, w, h)),
        config.alignment.confidence_threshold,
    );
    let local = config
        .alignment
        .enable_local_align
        .then(|| LocalAligner::new(&reference_lum, roi, config.alignment.local_params()));
    drop(reference_lum);

    let mut store = AlignedFrameStore::new(
        h,
        w,
        reference.channel_count(),
        selected.len(),
        chunk_size,
        config.memory.scratch_dir.as_deref(),
    )?;
    let mut weights: Vec<f32> = Vec::with_capacity(selected.len());
    let weight_of = |result: &AlignmentResult| {
        let score = scores.get(&result.frame_index).map_or(0.0, |s| s.0);
        frame_weight(score, result.confidence)
    };

    let throttle = ProgressThrottle::new(
        control,
        PipelineState::AligningGlobal,
        selected.len(),
        config.progress_interval,
    );
    // With local alignment enabled this pass only measures; frames are
    // re-read, shifted and warped in the local pass.
    let store_now = local.is_none();
    for chunk in selected.chunks(chunk_size) {
        control.check_cancelled()?;
        let results: Vec<std::result::Result<(AlignmentResult, Option<Frame>), FrameDiagnostic>> =
            chunk
                .par_iter()
                .map(|&index| {
                    control.check_cancelled()?;
                    let aligned = source
                        .get_frame(index)
                        .and_then(|frame| global.align(&frame))
                        .map(|(result, frame)| (result, store_now.then_some(frame)))
                        .map_err(|e| {
                            FrameDiagnostic::from_error(index, PipelineState::AligningGlobal, &e)
                        });
                    throttle.advance();
                    Ok(aligned)
                })
                .collect::<Result<_>>()?;

        for r in results {
            match r {
                Ok((result, frame)) => {
                    if let Some(frame) = frame {
                        store.push(&frame)?;
                        weights.push(weight_of(&result));
                    }
                    outcome.alignments.push(result);
                }
                Err(diag) => {
                    warn!(frame = diag.frame_index, reason = %diag.reason, "Frame excluded");
                    outcome.diagnostics.push(diag);
                }
            }
        }
    }
    throttle.finish();
    ensure_enough(outcome.alignments.len(), required)?;
    let low_confidence = outcome.alignments.iter().filter(|a| a.low_confidence).count();
    info!(
        aligned = outcome.alignments.len(),
        low_confidence,
        "Global alignment complete"
    );

    // -- Local alignment ----------------------------------------------------
    if let Some(local) = local {
        control.check_cancelled()?;
        machine.enter(PipelineState::AligningLocal);
        let throttle = ProgressThrottle::new(
            control,
            PipelineState::AligningLocal,
            outcome.alignments.len(),
            config.progress_interval,
        );
        let mut warped = 0usize;
        let mut measured: Vec<AlignmentResult> = Vec::with_capacity(outcome.alignments.len());
        for chunk in outcome.alignments.chunks(chunk_size) {
            control.check_cancelled()?;
            let results: Vec<(AlignmentResult, Result<Frame>, Option<FrameDiagnostic>)> = chunk
                .par_iter()
                .map(|result| {
                    control.check_cancelled()?;
                    let out = local_align_frame(source, &local, result);
                    throttle.advance();
                    Ok(out)
                })
                .collect::<Result<_>>()?;

            for (result, frame, diag) in results {
                match frame {
                    Ok(frame) => {
                        if result.warp.is_some() {
                            warped += 1;
                        }
                        store.push(&frame)?;
                        weights.push(weight_of(&result));
                        measured.push(result);
                    }
                    Err(e) => {
                        warn!(frame = result.frame_index, error = %e, "Frame excluded");
                        outcome.diagnostics.push(FrameDiagnostic::from_error(
                            result.frame_index,
                            PipelineState::AligningLocal,
                            &e,
                        ));
                    }
                }
                if let Some(diag) = diag {
                    debug!(frame = diag.frame_index, reason = %diag.reason, "Local alignment skipped");
                    outcome.diagnostics.push(diag);
                }
            }
        }
        throttle.finish();
        outcome.alignments = measured;
        ensure_enough(outcome.alignments.len(), required)?;
        info!(warped, passed_through = outcome.alignments.len() - warped, "Local alignment complete");
    }

    // -- Stack --------------------------------------------------------------
    control.check_cancelled()?;
    machine.enter(PipelineState::Stacking);
    store.finish()?;
    let mut planes = stack_store(&store, &weights, &config.stacking, chunk_size, control)?;
    drop(store);
    // Resampling can overshoot at hard edges.
    for plane in &mut planes {
        plane.mapv_inplace(|v| v.clamp(0.0, 1.0));
    }
    let stacked = Frame::from_channels(planes, reference.index, reference.original_bit_depth)?
        .with_roi(roi);
    outcome.stacked = Some(stacked.channels.clone());

    // -- Sharpen ------------------------------------------------------------
    let Some(ref wavelet) = config.sharpening else {
        return Ok(stacked);
    };
    control.check_cancelled()?;
    machine.enter(PipelineState::Sharpening);
    let sharpener = WaveletSharpener::new(&stacked, wavelet.num_layers);
    control.check_cancelled()?;
    let sharpened = sharpener.apply(&wavelet.gains)?;
    control.emit(PipelineState::Sharpening, 100.0, "Sharpening complete");
    Ok(sharpened)
}

/// Read the best-scoring decodable frame of `selected`.
///
/// Frames that fail with a recoverable error are dropped from `selected` and
/// recorded as diagnostics; the next-best frame is tried instead.
fn read_reference(
    source: &dyn FrameSource,
    selected: &mut Vec<usize>,
    scores: &HashMap<usize, (f64, Roi)>,
    required: usize,
    diagnostics: &mut Vec<FrameDiagnostic>,
) -> Result<Frame> {
    let score = |index: &usize| scores.get(index).map_or(0.0, |s| s.0);
    let mut candidates = selected.clone();
    candidates.sort_by(|a, b| score(b).total_cmp(&score(a)).then(a.cmp(b)));

    for index in candidates {
        match source.get_frame(index) {
            Ok(frame) => {
                debug!(frame = index, "Alignment reference");
                return Ok(frame);
            }
            Err(e) if e.is_recoverable() => {
                warn!(frame = index, error = %e, "Reference candidate could not be read");
                diagnostics.push(FrameDiagnostic::from_error(
                    index,
                    PipelineState::AligningGlobal,
                    &e,
                ));
                selected.retain(|&i| i != index);
            }
            Err(e) => return Err(e),
        }
    }
    Err(LuckyStackError::InsufficientFrames {
        usable: 0,
        required,
    })
}

/// Re-read a frame, apply its global shift, then warp it locally.
///
/// A failed local measurement passes the shifted frame through with a
/// diagnostic; a failed read excludes the frame.
fn local_align_frame(
    source: &dyn FrameSource,
    local: &LocalAligner,
    global: &AlignmentResult,
) -> (AlignmentResult, Result<Frame>, Option<FrameDiagnostic>) {
    let shifted = match source.get_frame(global.frame_index) {
        Ok(frame) => shift_frame(&frame, &global.offset()),
        Err(e) => return (global.clone(), Err(e), None),
    };
    match local.align(&shifted) {
        Ok((warped, field)) => {
            let mut result = global.clone();
            result.warp = Some(field);
            (result, Ok(warped), None)
        }
        Err(e) => {
            let diag = FrameDiagnostic::from_error(global.frame_index, PipelineState::AligningLocal, &e);
            (global.clone(), Ok(shifted), Some(diag))
        }
    }
}

fn ensure_enough(usable: usize, required: usize) -> Result<()> {
    if usable < required {
        return Err(LuckyStackError::InsufficientFrames { usable, required });
    }
    Ok(())
}

