use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use spotfish_core::consts::DEFAULT_VOXEL_SIZE;
use spotfish_core::io::spots_csv::{read_spot_table, write_spot_table};
use spotfish_core::pairing::{pair_spots, PairingConfig};

#[derive(Args)]
pub struct PairArgs {
    /// Input spot CSV
    pub spots: PathBuf,

    /// Output CSV path
    #[arg(long)]
    pub out: PathBuf,

    /// The two channel labels to pair (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub channels: Vec<String>,

    /// Physical voxel size z,y,x in nm
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_VOXEL_SIZE)]
    pub voxel_size: Vec<f64>,
}

pub fn run(args: &PairArgs) -> Result<()> {
    if args.channels.len() != 2 {
        bail!("--channels expects exactly 2 labels, got {}", args.channels.len());
    }
    if args.voxel_size.len() != 3 {
        bail!("--voxel-size expects 3 values, got {}", args.voxel_size.len());
    }

    let table = read_spot_table(&args.spots)?;
    let config = PairingConfig {
        channels: [args.channels[0].clone(), args.channels[1].clone()],
        voxel_size: [args.voxel_size[0], args.voxel_size[1], args.voxel_size[2]],
    };
    let pairs = pair_spots(&table, &config)?;

    write_spot_table(&pairs, &args.out)?;
    println!(
        "Paired {} spot pairs between channels {} and {} -> {}",
        pairs.len(),
        config.channels[0],
        config.channels[1],
        args.out.display()
    );
    Ok(())
}
