use ndarray::Array2;

use crate::align::AlignmentResult;
use crate::error::LuckyStackError;
use crate::frame::Frame;
use crate::quality::QualityRecord;

/// Pipeline state, also used to tag progress events and diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Idle,
    Analyzing,
    Selecting,
    AligningGlobal,
    AligningLocal,
    Stacking,
    Sharpening,
    Done,
    Failed,
    Cancelled,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Analyzing => write!(f, "Assessing quality"),
            Self::Selecting => write!(f, "Selecting best frames"),
            Self::AligningGlobal => write!(f, "Aligning frames"),
            Self::AligningLocal => write!(f, "Local alignment"),
            Self::Stacking => write!(f, "Stacking"),
            Self::Sharpening => write!(f, "Sharpening"),
            Self::Done => write!(f, "Done"),
            Self::Failed => write!(f, "Failed"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }

    /// Legal edges: forward one stage (local alignment may be skipped,
    /// sharpening may be skipped), or from any running stage to Failed/Cancelled.
    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        if self.is_terminal() {
            return false;
        }
        if matches!(next, Failed | Cancelled) {
            return true;
        }
        matches!(
            (self, next),
            (Idle, Analyzing)
                | (Analyzing, Selecting)
                | (Selecting, AligningGlobal)
                | (AligningGlobal, AligningLocal)
                | (AligningGlobal, Stacking)
                | (AligningLocal, Stacking)
                | (Stacking, Sharpening)
                | (Stacking, Done)
                | (Sharpening, Done)
        )
    }
}

/// A recoverable per-frame problem.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameDiagnostic {
    pub frame_index: usize,
    pub stage: PipelineState,
    pub reason: String,
}

impl FrameDiagnostic {
    pub fn from_error(frame_index: usize, stage: PipelineState, err: &LuckyStackError) -> Self {
        Self {
            frame_index,
            stage,
            reason: err.to_string(),
        }
    }
}

/// Quality scores for every analyzed frame of a source.
#[derive(Clone, Debug, Default)]
pub struct AnalysisReport {
    pub total_frames: usize,
    /// Frames that decoded and were scored.
    pub analyzed: usize,
    /// Ascending by frame index.
    pub records: Vec<QualityRecord>,
    pub diagnostics: Vec<FrameDiagnostic>,
}

#[derive(Debug)]
pub enum PipelineStatus {
    Done,
    Failed(LuckyStackError),
    Cancelled,
}

impl PipelineStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Everything a run produced. `image` is only set when `status` is `Done`.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub status: PipelineStatus,
    /// Final (sharpened when enabled) image.
    pub image: Option<Frame>,
    /// Stack before sharpening, one plane per channel.
    pub stacked: Option<Vec<Array2<f32>>>,
    pub records: Vec<QualityRecord>,
    /// Selected frame indices, ascending.
    pub selected: Vec<usize>,
    pub reference_index: Option<usize>,
    pub alignments: Vec<AlignmentResult>,
    pub diagnostics: Vec<FrameDiagnostic>,
}

impl PipelineOutcome {
    pub(super) fn empty() -> Self {
        Self {
            status: PipelineStatus::Done,
            image: None,
            stacked: None,
            records: Vec::new(),
            selected: Vec::new(),
            reference_index: None,
            alignments: Vec::new(),
            diagnostics: Vec::new(),
        }
    }
}
