use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use luckystack_core::io::{load_image, save_image};
use luckystack_core::sharpen::wavelet::{self, WaveletParams};

use super::parse_gains;

#[derive(Args)]
pub struct SharpenArgs {
    /// Input image file (TIFF or PNG)
    pub file: PathBuf,

    /// Number of wavelet layers; ignored when --gains is given
    #[arg(long, default_value = "5")]
    pub layers: usize,

    /// Comma-separated gains per layer, finest first (e.g. 0.8,1.5,2.0,1.8,1.2)
    #[arg(long)]
    pub gains: Option<String>,

    /// Output file path
    #[arg(short, long, default_value = "sharpened.tiff")]
    pub output: PathBuf,
}

pub fn run(args: &SharpenArgs) -> Result<()> {
    let frame = load_image(&args.file)
        .with_context(|| format!("Failed to load {}", args.file.display()))?;

    println!("Loaded {}x{} image", frame.width(), frame.height());

    let params = if let Some(ref list) = args.gains {
        let gains = parse_gains(list)?;
        WaveletParams {
            num_layers: gains.len(),
            gains,
        }
    } else {
        // Default gains for the first layers, neutral beyond them.
        let mut gains = WaveletParams::default().gains;
        gains.resize(args.layers, 1.0);
        WaveletParams {
            num_layers: args.layers,
            gains,
        }
    };

    crate::summary::print_sharpen_summary(&params);

    let sharpened = wavelet::sharpen(&frame, &params)?;

    save_image(&sharpened, &args.output)?;
    println!("Saved to {}", args.output.display());

    Ok(())
}
