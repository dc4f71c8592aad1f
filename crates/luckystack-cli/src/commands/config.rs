use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use luckystack_core::pipeline::{PipelineConfig, Preset};

#[derive(Clone, Copy, ValueEnum)]
pub enum PresetArg {
    Default,
    HighContrast,
    LowContrast,
}

impl From<PresetArg> for Preset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Default => Preset::Default,
            PresetArg::HighContrast => Preset::HighContrast,
            PresetArg::LowContrast => Preset::LowContrast,
        }
    }
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Parameter preset to start from
    #[arg(long, value_enum, default_value = "default")]
    pub preset: PresetArg,

    /// Write config to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Print or save a full PipelineConfig as TOML.
pub fn run(args: &ConfigArgs) -> Result<()> {
    let preset = Preset::from(args.preset);
    let config = PipelineConfig::preset(preset);
    let toml_str = toml::to_string_pretty(&config)?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &toml_str)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        println!("{preset} config saved to {}", path.display());
    } else {
        print!("{}", toml_str);
    }

    Ok(())
}
