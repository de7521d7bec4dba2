use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use console::style;
use spotfish_core::io::combine::{combine_detections, CombineOutcome};
use spotfish_core::io::spots_csv::write_spot_table;

use super::files_with_extensions;

#[derive(Args)]
pub struct CombineArgs {
    /// Directory of per-image detection CSVs
    pub detections: PathBuf,

    /// Output CSV path
    #[arg(long, default_value = "merge.csv")]
    pub out: PathBuf,

    /// Directory of resaved tif stacks; prefixes img values
    #[arg(long)]
    pub tif_dir: Option<PathBuf>,
}

pub fn run(args: &CombineArgs) -> Result<()> {
    let files = files_with_extensions(&args.detections, &["csv"])?;
    let report = combine_detections(&files, args.tif_dir.as_deref())?;

    write_spot_table(&report.table, &args.out)?;

    let merged = report
        .files
        .iter()
        .filter(|(_, o)| matches!(o, CombineOutcome::Merged { .. }))
        .count();
    println!(
        "Merged {} of {} files ({} spots) into {}",
        merged,
        report.files.len(),
        report.table.len(),
        args.out.display()
    );
    for (path, reason) in report.skipped() {
        println!(
            "  {} {}: {}",
            style("skipped").yellow(),
            path.display(),
            reason
        );
    }
    Ok(())
}
