mod commands;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "luckystack", about = "Lucky-imaging frame stacker")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline over a directory of frames
    Run(commands::pipeline::RunArgs),
    /// Score and rank frames by sharpness
    Analyze(commands::analyze::AnalyzeArgs),
    /// Apply wavelet sharpening to an image
    Sharpen(commands::sharpen::SharpenArgs),
    /// Print or save a pipeline config as TOML
    Config(commands::config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Run(args) => commands::pipeline::run(args),
        Commands::Analyze(args) => commands::analyze::run(args),
        Commands::Sharpen(args) => commands::sharpen::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}
