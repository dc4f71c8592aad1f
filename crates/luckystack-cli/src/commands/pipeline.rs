use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use luckystack_core::io::{FileSink, ImageSequenceSource, ImageSink};
use luckystack_core::pipeline::{
    run_pipeline, CancellationToken, ChannelReporter, PipelineConfig, PipelineControl,
    PipelineStatus, Preset,
};
use luckystack_core::sharpen::WaveletParams;
use luckystack_core::source::FrameSource;

use super::config::PresetArg;
use super::parse_gains;

#[derive(Args)]
pub struct RunArgs {
    /// Directory containing the frame sequence
    pub dir: PathBuf,

    /// Pipeline config file (TOML); overrides the preset
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Parameter preset
    #[arg(long, value_enum, default_value = "default")]
    pub preset: PresetArg,

    /// Fraction of best frames to keep, in (0, 1]
    #[arg(long)]
    pub keep: Option<f32>,

    /// Minimum number of frames to stack
    #[arg(long)]
    pub min_frames: Option<usize>,

    /// Maximum number of frames to stack
    #[arg(long)]
    pub max_frames: Option<usize>,

    /// Sigma-clip rejection threshold
    #[arg(long)]
    pub sigma: Option<f32>,

    /// Local alignment tile size (16, 32, 48 or 64)
    #[arg(long)]
    pub tile_size: Option<usize>,

    /// Skip local alignment
    #[arg(long)]
    pub no_local: bool,

    /// Comma-separated wavelet gains, finest layer first
    #[arg(long)]
    pub gains: Option<String>,

    /// Disable sharpening
    #[arg(long)]
    pub no_sharpen: bool,

    /// Frames held in memory at once
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Directory for the aligned-frame spill file
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,

    /// Output file path (.png for 8-bit, anything else writes 16-bit TIFF)
    #[arg(short, long, default_value = "result.tiff")]
    pub output: PathBuf,
}

pub fn run(args: &RunArgs) -> Result<()> {
    let config = build_config(args)?;
    let source = ImageSequenceSource::open(&args.dir)
        .with_context(|| format!("Failed to open {}", args.dir.display()))?;

    crate::summary::print_pipeline_summary(&config, &args.dir, &args.output, source.frame_count());

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg:24} [{bar:40}] {pos}%")?
            .progress_chars("=> "),
    );

    let (reporter, rx) = ChannelReporter::channel();
    let control = PipelineControl::new(CancellationToken::new(), Arc::new(reporter));
    let source_ref = &source;
    let config_ref = &config;

    // The worker owns the only sender; the loop ends when the pipeline returns.
    let outcome = std::thread::scope(|scope| {
        let worker = scope.spawn(move || run_pipeline(source_ref, config_ref, &control));
        for event in rx {
            pb.set_message(event.stage.to_string());
            pb.set_position(event.percent.round() as u64);
        }
        worker.join()
    })
    .map_err(|_| anyhow!("Pipeline thread panicked"))??;

    pb.finish_with_message("Done");
    crate::summary::print_outcome(&outcome);

    match outcome.status {
        PipelineStatus::Done => {}
        PipelineStatus::Cancelled => bail!("Pipeline cancelled"),
        PipelineStatus::Failed(e) => return Err(e).context("Pipeline failed"),
    }
    let image = outcome
        .image
        .ok_or_else(|| anyhow!("Pipeline finished without an image"))?;

    let mut sink = FileSink::new(&args.output);
    sink.accept(&image)
        .with_context(|| format!("Failed to write {}", sink.path().display()))?;
    println!("\nOutput saved to {}", sink.path().display());

    Ok(())
}

fn build_config(args: &RunArgs) -> Result<PipelineConfig> {
    let mut config = if let Some(ref config_path) = args.config {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config {}", config_path.display()))?;
        toml::from_str(&contents).context("Invalid pipeline config")?
    } else {
        PipelineConfig::preset(Preset::from(args.preset))
    };

    if let Some(keep) = args.keep {
        config.selection.keep_percentage = keep;
    }
    if let Some(min) = args.min_frames {
        config.selection.min_frames = min;
    }
    if let Some(max) = args.max_frames {
        config.selection.max_frames = max;
    }
    if let Some(sigma) = args.sigma {
        config.stacking.sigma = sigma;
    }
    if let Some(tile) = args.tile_size {
        config.alignment.tile_size = tile;
    }
    if args.no_local {
        config.alignment.enable_local_align = false;
    }
    if let Some(chunk) = args.chunk_size {
        config.memory.chunk_size = chunk;
    }
    if let Some(ref dir) = args.scratch_dir {
        config.memory.scratch_dir = Some(dir.clone());
    }
    if args.no_sharpen {
        config.sharpening = None;
    } else if let Some(ref list) = args.gains {
        let gains = parse_gains(list)?;
        config.sharpening = Some(WaveletParams {
            num_layers: gains.len(),
            gains,
        });
    }

    config.validate().context("Invalid pipeline config")?;
    Ok(config)
}
