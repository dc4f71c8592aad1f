pub mod config;
mod orchestrator;
mod progress;
mod types;

pub use config::{
    AlignmentConfig, AnalysisConfig, MemoryConfig, PipelineConfig, Preset, SelectionConfig,
};
pub use orchestrator::run_pipeline;
pub use progress::{
    CancellationToken, ChannelReporter, NoOpReporter, PipelineControl, ProgressEvent,
    ProgressReporter, ProgressThrottle,
};
pub use types::{
    AnalysisReport, FrameDiagnostic, PipelineOutcome, PipelineState, PipelineStatus,
};
