use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;

use crate::error::{LuckyStackError, Result};

use super::types::PipelineState;

/// One progress update.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressEvent {
    pub stage: PipelineState,
    /// Completion of `stage`, 0..=100.
    pub percent: f32,
    pub message: String,
}

/// Thread-safe sink for progress events.
///
/// Called from worker threads; implementations must not block.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, _event: ProgressEvent) {}
}

/// Discards every event.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

/// Forwards events into an unbounded mpsc channel.
///
/// A dropped receiver is ignored; the pipeline keeps running.
pub struct ChannelReporter {
    tx: mpsc::Sender<ProgressEvent>,
}

impl ChannelReporter {
    pub fn new(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self { tx }
    }

    /// Reporter plus the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl ProgressReporter for ChannelReporter {
    fn report(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }
}

/// Set-once cancellation flag shared between the caller and the workers.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// `Err(Cancelled)` once the flag is set.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(LuckyStackError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Cancellation flag and progress sink handed to every stage.
#[derive(Clone)]
pub struct PipelineControl {
    pub cancel: CancellationToken,
    pub reporter: Arc<dyn ProgressReporter>,
}

impl Default for PipelineControl {
    fn default() -> Self {
        Self {
            cancel: CancellationToken::new(),
            reporter: Arc::new(NoOpReporter),
        }
    }
}

impl PipelineControl {
    pub fn new(cancel: CancellationToken, reporter: Arc<dyn ProgressReporter>) -> Self {
        Self { cancel, reporter }
    }

    pub fn emit(&self, stage: PipelineState, percent: f32, message: impl Into<String>) {
        self.reporter.report(ProgressEvent {
            stage,
            percent: percent.clamp(0.0, 100.0),
            message: message.into(),
        });
    }

    pub fn check_cancelled(&self) -> Result<()> {
        self.cancel.check()
    }
}

/// Emits at most one event per `interval` completed units of a stage.
///
/// Shared by reference across rayon workers.
pub struct ProgressThrottle<'a> {
    control: &'a PipelineControl,
    stage: PipelineState,
    total: usize,
    interval: usize,
    done: AtomicUsize,
}

impl<'a> ProgressThrottle<'a> {
    pub fn new(control: &'a PipelineControl, stage: PipelineState, total: usize, interval: usize) -> Self {
        control.emit(stage, 0.0, format!("{stage}: 0/{total}"));
        Self {
            control,
            stage,
            total,
            interval: interval.max(1),
            done: AtomicUsize::new(0),
        }
    }

    /// Record one completed unit.
    pub fn advance(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if done % self.interval == 0 && done < self.total {
            self.control.emit(
                self.stage,
                percent(done, self.total),
                format!("{}: {}/{}", self.stage, done, self.total),
            );
        }
    }

    pub fn completed(&self) -> usize {
        self.done.load(Ordering::Relaxed)
    }

    /// Stage-completion event.
    pub fn finish(self) {
        let done = self.completed();
        self.control
            .emit(self.stage, 100.0, format!("{}: {}/{}", self.stage, done, self.total));
    }
}

fn percent(done: usize, total: usize) -> f32 {
    if total == 0 {
        100.0
    } else {
        done as f32 * 100.0 / total as f32
    }
}
