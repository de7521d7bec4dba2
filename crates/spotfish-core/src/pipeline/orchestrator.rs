use std::fs;
use std::path::PathBuf;

use tracing::info;

use crate::cells::{assign_cells, AssignConfig};
use crate::error::Result;
use crate::io::combine::combine_detections;
use crate::io::spots_csv::write_spot_table;
use crate::meta::AcquisitionInfo;
use crate::pairing::{pair_spots, PairingConfig};
use crate::shift::{correct_table, ShiftConfig};
use crate::transform::TransformCatalog;

use super::config::PipelineConfig;

/// Files written by a pipeline run, in stage order.
#[derive(Clone, Debug, Default)]
pub struct PipelineOutput {
    pub outputs: Vec<PathBuf>,
    pub merged_rows: usize,
    pub skipped_files: usize,
}

fn csv_files(dir: &std::path::Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("csv"))
        .collect();
    files.sort();
    Ok(files)
}

fn mask_files(dir: &std::path::Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("npy") | Some("png")
            )
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Run the configured stages: combine → annotate → shift correction →
/// cell assignment → pairing. Each optional stage is skipped when its
/// config section is absent; stages stay independently invokable via the
/// individual entry points.
pub fn run_pipeline(config: &PipelineConfig) -> Result<PipelineOutput> {
    fs::create_dir_all(&config.output)?;
    let mut result = PipelineOutput::default();

    let detections = csv_files(&config.detections)?;
    info!(files = detections.len(), "combining detections");
    let report = combine_detections(&detections, config.tif_dir.as_deref())?;
    result.merged_rows = report.table.len();
    result.skipped_files = report.skipped().count();

    let mut table = report.table;
    if let Some(info_path) = &config.acquisition_info {
        info!(path = %info_path.display(), "annotating with acquisition metadata");
        let acquisition = AcquisitionInfo::load(info_path)?;
        table = acquisition.annotate(&table, "channel")?;
    }

    let merge_path = config.output.join("merge.csv");
    write_spot_table(&table, &merge_path)?;
    result.outputs.push(merge_path);

    if let Some(shift) = &config.shift {
        info!(reference = %shift.reference_channel, "correcting chromatic shift");
        let catalog =
            TransformCatalog::load(&shift.transforms, TransformCatalog::default_aliases())?;
        let shift_config = ShiftConfig {
            channel_column: shift.channel_column.clone(),
            unit_columns: shift.unit_columns.clone(),
            pixel_columns: shift.pixel_columns.clone(),
            pixel_size: shift.pixel_size,
            ..ShiftConfig::default()
        };
        table = correct_table(&table, &catalog, &shift.reference_channel, &shift_config)?;

        let corrected_path = config.output.join("merge_shift-corrected.csv");
        write_spot_table(&table, &corrected_path)?;
        result.outputs.push(corrected_path);
    }

    if let Some(cells) = &config.cells {
        let masks = mask_files(&cells.masks)?;
        info!(masks = masks.len(), "assigning spots to cells");
        let assign_config = AssignConfig {
            filter_unassigned: cells.filter_unassigned,
            mask_suffix: cells.mask_suffix.clone(),
        };
        table = assign_cells(&masks, &table, &assign_config)?;

        let cells_path = config.output.join("spots_in_cells.csv");
        write_spot_table(&table, &cells_path)?;
        result.outputs.push(cells_path);
    }

    if let Some(pairing) = &config.pairing {
        info!(channels = ?pairing.channels, "pairing spots across channels");
        let pairing_config = PairingConfig {
            channels: pairing.channels.clone(),
            voxel_size: pairing.voxel_size,
        };
        let pairs = pair_spots(&table, &pairing_config)?;

        let pairs_path = config.output.join("spot_pairs.csv");
        write_spot_table(&pairs, &pairs_path)?;
        result.outputs.push(pairs_path);
    }

    info!(outputs = result.outputs.len(), "pipeline complete");
    Ok(result)
}
