use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use luckystack_core::io::ImageSequenceSource;
use luckystack_core::pipeline::{
    AnalysisConfig, CancellationToken, PipelineControl, ProgressEvent, ProgressReporter,
};
use luckystack_core::quality::analyze;
use luckystack_core::select::rank;

/// Drives a progress bar straight from worker threads.
struct BarReporter(ProgressBar);

impl ProgressReporter for BarReporter {
    fn report(&self, event: ProgressEvent) {
        self.0.set_position(event.percent.round() as u64);
    }
}

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Directory containing the frame sequence
    pub dir: PathBuf,

    /// Show top N frames only
    #[arg(long, default_value = "20")]
    pub top: usize,

    /// Score every n-th frame
    #[arg(long, default_value = "1")]
    pub sample_step: usize,

    /// Frames held in memory at once
    #[arg(long, default_value = "32")]
    pub chunk_size: usize,
}

pub fn run(args: &AnalyzeArgs) -> Result<()> {
    let source = ImageSequenceSource::open(&args.dir)
        .with_context(|| format!("Failed to open {}", args.dir.display()))?;
    let config = AnalysisConfig {
        sample_step: args.sample_step.max(1),
        ..Default::default()
    };

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40}] {pos}%")?
            .progress_chars("=> "),
    );
    pb.set_message("Scoring frames");
    let control = PipelineControl::new(
        CancellationToken::new(),
        Arc::new(BarReporter(pb.clone())),
    );

    let report = analyze(&source, &config, args.chunk_size.max(1), 1, &control)?;
    pb.finish_with_message(format!("Scored {} frames", report.analyzed));

    let ranked = rank(&report.records);
    println!(
        "\nTop {} frames by quality (of {}):",
        args.top.min(ranked.len()),
        report.total_frames
    );
    println!(
        "{:>5}  {:>8}  {:>8}  {:>20}",
        "Rank", "Frame #", "Score", "ROI"
    );
    println!("{}", "-".repeat(47));

    for (rank, record) in ranked.iter().take(args.top).enumerate() {
        let roi = record.roi;
        println!(
            "{:>5}  {:>8}  {:>8.6}  {:>20}",
            rank + 1,
            record.frame_index,
            record.score,
            format!("{}x{}+{}+{}", roi.width, roi.height, roi.x, roi.y)
        );
    }

    if let (Some(best), Some(worst)) = (ranked.first(), ranked.last()) {
        println!("\nBest raw metric:  {:.6}", best.raw_metric);
        println!("Worst raw metric: {:.6}", worst.raw_metric);
    }

    for diag in &report.diagnostics {
        println!("Skipped frame {}: {}", diag.frame_index, diag.reason);
    }

    Ok(())
}
