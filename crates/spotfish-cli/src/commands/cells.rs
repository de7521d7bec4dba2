use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use spotfish_core::cells::{assign_cells, AssignConfig};
use spotfish_core::consts::DEFAULT_MASK_SUFFIX;
use spotfish_core::io::spots_csv::{read_spot_table, write_spot_table};

use super::files_with_extensions;

#[derive(Args)]
pub struct CellsArgs {
    /// Directory of segmentation masks (.npy or .png)
    pub masks: PathBuf,

    /// Input spot CSV
    #[arg(long)]
    pub spots: PathBuf,

    /// Output CSV path
    #[arg(long)]
    pub out: PathBuf,

    /// Keep spots that fall outside every cell
    #[arg(long)]
    pub keep_unassigned: bool,

    /// Mask filename suffix stripped when deriving image names
    #[arg(long, default_value = DEFAULT_MASK_SUFFIX)]
    pub mask_suffix: String,
}

pub fn run(args: &CellsArgs) -> Result<()> {
    let masks = files_with_extensions(&args.masks, &["npy", "png"])?;
    let table = read_spot_table(&args.spots)?;

    let config = AssignConfig {
        filter_unassigned: !args.keep_unassigned,
        mask_suffix: args.mask_suffix.clone(),
    };
    let assigned = assign_cells(&masks, &table, &config)?;

    write_spot_table(&assigned, &args.out)?;
    println!(
        "Assigned cells for {} of {} spots across {} masks -> {}",
        assigned.len(),
        table.len(),
        masks.len(),
        args.out.display()
    );
    Ok(())
}
