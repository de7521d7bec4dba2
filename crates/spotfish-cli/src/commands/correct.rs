use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use spotfish_core::io::spots_csv::{read_spot_table, write_spot_table};
use spotfish_core::shift::{correct_table, ShiftConfig};
use spotfish_core::transform::TransformCatalog;

use super::files_with_extensions;

#[derive(Args)]
pub struct CorrectArgs {
    /// Directory of spot CSVs to correct
    pub input: PathBuf,

    /// Output directory
    #[arg(long)]
    pub out: PathBuf,

    /// Transform catalog JSON
    #[arg(long)]
    pub transforms: PathBuf,

    /// Reference channel every spot is aligned into
    #[arg(long)]
    pub reference_channel: String,

    /// Physical-unit coordinate columns (comma separated, 3 names)
    #[arg(long, value_delimiter = ',')]
    pub unit_columns: Option<Vec<String>>,

    /// Pixel coordinate columns (comma separated, 3 names)
    #[arg(long, value_delimiter = ',')]
    pub pixel_columns: Option<Vec<String>>,

    /// Per-axis pixel size (comma separated, 3 values)
    #[arg(long, value_delimiter = ',')]
    pub pixel_size: Option<Vec<f64>>,

    /// Column holding the channel label
    #[arg(long, default_value = "channel")]
    pub channel_column: String,
}

fn triple<T: Clone>(values: &Option<Vec<T>>, flag: &str) -> Result<Option<[T; 3]>> {
    match values {
        None => Ok(None),
        Some(v) if v.len() == 3 => Ok(Some([v[0].clone(), v[1].clone(), v[2].clone()])),
        Some(v) => bail!("--{flag} expects 3 comma-separated values, got {}", v.len()),
    }
}

pub fn run(args: &CorrectArgs) -> Result<()> {
    let config = ShiftConfig {
        channel_column: args.channel_column.clone(),
        unit_columns: triple(&args.unit_columns, "unit-columns")?,
        pixel_columns: triple(&args.pixel_columns, "pixel-columns")?,
        pixel_size: triple(&args.pixel_size, "pixel-size")?,
        ..ShiftConfig::default()
    };
    config.validate()?;

    let catalog = TransformCatalog::load(&args.transforms, TransformCatalog::default_aliases())?;
    let files = files_with_extensions(&args.input, &["csv"])?;
    std::fs::create_dir_all(&args.out)?;

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );
    pb.set_message("Correcting");

    for file in &files {
        // Pixel size is resolved per table, fresh for every file.
        let table = read_spot_table(file)?;
        let corrected = correct_table(&table, &catalog, &args.reference_channel, &config)?;

        let stem = file.file_stem().and_then(|s| s.to_str()).unwrap_or("spots");
        let out_path = args.out.join(format!("{stem}_shift-corrected.csv"));
        write_spot_table(&corrected, &out_path)?;
        pb.inc(1);
    }
    pb.finish_with_message(format!("Corrected {} files", files.len()));

    Ok(())
}
