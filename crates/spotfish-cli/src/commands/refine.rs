use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::Array3;
use ndarray_npy::ReadNpyExt;
use spotfish_core::consts::DEFAULT_REFINE_RADIUS;
use spotfish_core::io::spots_csv::{read_spot_table, write_spot_table};
use spotfish_core::refine::{refine_table, LmConfig};

#[derive(Args)]
pub struct RefineArgs {
    /// Input spot CSV
    pub spots: PathBuf,

    /// Directory of .npy image volumes named after img values
    #[arg(long)]
    pub volumes: PathBuf,

    /// Output CSV path
    #[arg(long)]
    pub out: PathBuf,

    /// Cubic ROI radius in voxels
    #[arg(long, default_value_t = DEFAULT_REFINE_RADIUS)]
    pub radius: usize,
}

/// Volumes are resaved as f32 or u16 .npy stacks; accept both.
fn load_volume(path: &Path) -> Result<Array3<f32>> {
    if let Ok(a) = Array3::<f32>::read_npy(File::open(path)?) {
        return Ok(a);
    }
    let a = Array3::<u16>::read_npy(File::open(path)?)
        .with_context(|| format!("cannot read volume {}", path.display()))?;
    Ok(a.mapv(f32::from))
}

pub fn run(args: &RefineArgs) -> Result<()> {
    let table = read_spot_table(&args.spots)?;
    let img_col = table
        .column_index("img")
        .context("spot table has no img column")?;

    // One volume per distinct image; the img value's file stem names it.
    let mut images: Vec<String> = Vec::new();
    for row in table.rows() {
        if !images.contains(&row[img_col]) {
            images.push(row[img_col].clone());
        }
    }

    let pb = ProgressBar::new(images.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );
    pb.set_message("Loading volumes");

    let mut volumes: HashMap<String, Array3<f32>> = HashMap::new();
    for img in &images {
        let stem = Path::new(img)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(img);
        let path = args.volumes.join(format!("{stem}.npy"));
        if path.exists() {
            volumes.insert(img.clone(), load_volume(&path)?);
        }
        pb.inc(1);
    }
    pb.finish_with_message(format!("Loaded {} volumes", volumes.len()));

    let refined = refine_table(&table, &volumes, Some(args.radius), &LmConfig::default())?;
    write_spot_table(&refined, &args.out)?;

    println!(
        "Refined {} of {} spots (radius {}) -> {}",
        refined.len(),
        table.len(),
        args.radius,
        args.out.display()
    );
    Ok(())
}
