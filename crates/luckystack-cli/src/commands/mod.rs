pub mod analyze;
pub mod config;
pub mod pipeline;
pub mod sharpen;

use anyhow::{Context, Result};

/// Parse a comma-separated list of gains such as `1.2,1.8,1.5`.
pub fn parse_gains(list: &str) -> Result<Vec<f32>> {
    list.split(',')
        .map(|s| s.trim().parse::<f32>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("Invalid gain list '{list}'"))
}
