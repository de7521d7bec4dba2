use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use spotfish_core::pipeline::{run_pipeline, PipelineConfig};

#[derive(Args)]
pub struct RunArgs {
    /// Pipeline configuration (TOML)
    pub config: PathBuf,
}

pub fn run(args: &RunArgs) -> Result<()> {
    let text = std::fs::read_to_string(&args.config)
        .with_context(|| format!("cannot read config {}", args.config.display()))?;
    let config: PipelineConfig = toml::from_str(&text)?;
    tracing::info!(config = %args.config.display(), "starting pipeline");

    let output = run_pipeline(&config)?;

    println!(
        "Pipeline complete: {} spots merged, {} files skipped",
        output.merged_rows, output.skipped_files
    );
    for path in &output.outputs {
        println!("  wrote {}", path.display());
    }
    Ok(())
}
