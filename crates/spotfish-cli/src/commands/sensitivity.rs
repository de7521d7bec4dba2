use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use spotfish_core::cells::{sensitivity, SensitivityConfig};
use spotfish_core::consts::{DEFAULT_MASK_SUFFIX, DEFAULT_MIN_CELL_AREA};
use spotfish_core::io::spots_csv::{read_spot_table, write_spot_table};

use super::files_with_extensions;

#[derive(Args)]
pub struct SensitivityArgs {
    /// Directory of segmentation masks (.npy or .png)
    pub masks: PathBuf,

    /// Input spot CSV
    #[arg(long)]
    pub spots: PathBuf,

    /// Output CSV path
    #[arg(long)]
    pub out: PathBuf,

    /// Minimum cell area in pixels/voxels
    #[arg(long, default_value_t = DEFAULT_MIN_CELL_AREA)]
    pub min_cell_area: usize,

    /// Mask filename suffix stripped when deriving image names
    #[arg(long, default_value = DEFAULT_MASK_SUFFIX)]
    pub mask_suffix: String,
}

pub fn run(args: &SensitivityArgs) -> Result<()> {
    let masks = files_with_extensions(&args.masks, &["npy", "png"])?;
    let table = read_spot_table(&args.spots)?;

    let config = SensitivityConfig {
        min_cell_area: args.min_cell_area,
        mask_suffix: args.mask_suffix.clone(),
    };
    let cells = sensitivity(&masks, &table, &config)?;

    write_spot_table(&cells, &args.out)?;
    println!(
        "Wrote {} (image, cell) rows from {} masks -> {}",
        cells.len(),
        masks.len(),
        args.out.display()
    );
    Ok(())
}
