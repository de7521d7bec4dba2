//! Merge per-image detection CSVs into one spot table.
//!
//! The external detector writes one CSV per image and channel, named
//! `<prefix>_results_<image>.tif_aniso<...>.csv` with a `_ch<n>.tif` token
//! carrying the channel. Merging tags every row with its image and channel
//! and numbers spots per (image, channel) group. Each file's outcome is
//! reported explicitly so malformed inputs surface instead of silently
//! shrinking the merged table.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::Result;
use crate::spot::SpotTable;

use super::spots_csv::read_spot_table;

/// What happened to one input file during the merge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CombineOutcome {
    Merged { rows: usize },
    Skipped { reason: String },
}

/// Merged table plus the per-file outcome ledger.
#[derive(Clone, Debug)]
pub struct CombineReport {
    pub table: SpotTable,
    pub files: Vec<(PathBuf, CombineOutcome)>,
}

impl CombineReport {
    pub fn skipped(&self) -> impl Iterator<Item = (&PathBuf, &str)> {
        self.files.iter().filter_map(|(path, outcome)| match outcome {
            CombineOutcome::Skipped { reason } => Some((path, reason.as_str())),
            CombineOutcome::Merged { .. } => None,
        })
    }
}

/// Parse `(image fragment, channel)` from a detection CSV file name.
pub fn parse_detection_filename(name: &str) -> Option<(String, u32)> {
    let after_results = name.split_once("_results_")?.1;
    let image = after_results
        .split_once("_aniso")
        .map(|(head, _)| head)
        .unwrap_or(after_results);
    let channel = name
        .split_once("_ch")?
        .1
        .split_once(".tif")?
        .0
        .parse::<u32>()
        .ok()?;
    Some((image.to_string(), channel))
}

/// Merge detection CSVs. `tif_dir` (when given) prefixes the parsed image
/// fragment so `img` values point at the resaved tif files.
pub fn combine_detections(files: &[PathBuf], tif_dir: Option<&Path>) -> Result<CombineReport> {
    let mut table = SpotTable::default();
    let mut outcomes: Vec<(PathBuf, CombineOutcome)> = Vec::new();

    for file in files {
        let name = file
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        // Never merge a previous merge output into itself.
        if name.contains("merge") {
            outcomes.push((
                file.clone(),
                CombineOutcome::Skipped {
                    reason: "merge output".to_string(),
                },
            ));
            continue;
        }

        let Some((fragment, channel)) = parse_detection_filename(&name) else {
            warn!(file = %file.display(), "unrecognized detection file name");
            outcomes.push((
                file.clone(),
                CombineOutcome::Skipped {
                    reason: "unrecognized file name".to_string(),
                },
            ));
            continue;
        };

        let mut part = match read_spot_table(file) {
            Ok(t) => t,
            Err(err) => {
                warn!(file = %file.display(), error = %err, "skipping unreadable detection CSV");
                outcomes.push((
                    file.clone(),
                    CombineOutcome::Skipped {
                        reason: err.to_string(),
                    },
                ));
                continue;
            }
        };

        let img = match tif_dir {
            Some(dir) => dir.join(&fragment).display().to_string(),
            None => fragment,
        };
        let rows = part.len();
        part.insert_column(0, "img", vec![img; rows]);
        part.insert_column(1, "channel", vec![channel.to_string(); rows]);

        match table.append(part) {
            Ok(()) => outcomes.push((file.clone(), CombineOutcome::Merged { rows })),
            Err(err) => outcomes.push((
                file.clone(),
                CombineOutcome::Skipped {
                    reason: err.to_string(),
                },
            )),
        }
    }

    // 1-based spot number within each (img, channel) group.
    if !table.is_empty() {
        let img_col = table.require_column("img")?;
        let channel_col = table.require_column("channel")?;
        let mut counters: HashMap<(String, String), usize> = HashMap::new();
        let indices: Vec<String> = table
            .rows()
            .iter()
            .map(|row| {
                let key = (row[img_col].clone(), row[channel_col].clone());
                let counter = counters.entry(key).or_insert(0);
                *counter += 1;
                counter.to_string()
            })
            .collect();
        table.set_column("spot_idx", indices);
    }

    let merged = outcomes
        .iter()
        .filter(|(_, o)| matches!(o, CombineOutcome::Merged { .. }))
        .count();
    info!(
        files = files.len(),
        merged,
        skipped = files.len() - merged,
        rows = table.len(),
        "combined detection CSVs"
    );

    Ok(CombineReport {
        table,
        files: outcomes,
    })
}
