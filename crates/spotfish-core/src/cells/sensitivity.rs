//! Spots-per-cell detection-efficiency metric.
//!
//! For every (image, cell) pair, including cells with zero spots, count
//! the spots falling inside the cell and record the cell's pixel area.
//! Border-touching cells are excluded up front (they are not whole), and
//! regions below a minimum area are segmentation artifacts, not cells.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::debug;

use crate::consts::{DEFAULT_MASK_SUFFIX, DEFAULT_MIN_CELL_AREA, SPOT_SPECIFIC_COLUMNS};
use crate::error::Result;
use crate::spot::SpotTable;

use super::assign::{extract_channel_tag, image_name_for_mask};
use super::mask::load_mask;

#[derive(Clone, Debug)]
pub struct SensitivityConfig {
    /// Minimum cell area (pixels/voxels); smaller regions are dropped.
    pub min_cell_area: usize,
    /// Mask filename suffix to strip when deriving the image name.
    pub mask_suffix: String,
}

impl Default for SensitivityConfig {
    fn default() -> Self {
        Self {
            min_cell_area: DEFAULT_MIN_CELL_AREA,
            mask_suffix: DEFAULT_MASK_SUFFIX.to_string(),
        }
    }
}

/// Compute per-cell spot counts across all masks, joined with per-image
/// acquisition metadata (spot-specific columns excluded).
pub fn sensitivity(
    mask_paths: &[PathBuf],
    table: &SpotTable,
    config: &SensitivityConfig,
) -> Result<SpotTable> {
    let img_col = table.require_column("img")?;
    let coord_cols = [
        table.column_index("z"),
        table.column_index("y"),
        table.column_index("x"),
    ];

    // Metadata columns carried onto the per-cell rows.
    let meta_cols: Vec<usize> = table
        .columns()
        .iter()
        .enumerate()
        .filter(|(i, name)| {
            *i != img_col && !SPOT_SPECIFIC_COLUMNS.contains(&name.as_str())
        })
        .map(|(i, _)| i)
        .collect();

    let mut columns = vec![
        "img".to_string(),
        "cell".to_string(),
        "channel".to_string(),
        "count".to_string(),
        "cell_size".to_string(),
    ];
    columns.extend(meta_cols.iter().map(|&i| table.columns()[i].clone()));
    let mut out = SpotTable::new(columns);

    // First metadata row per image value.
    let mut meta_by_img: HashMap<&str, &Vec<String>> = HashMap::new();
    for row in table.rows() {
        meta_by_img.entry(&row[img_col]).or_insert(row);
    }

    for mask_path in mask_paths {
        let name = image_name_for_mask(mask_path, &config.mask_suffix);
        let rows: Vec<usize> = (0..table.len())
            .filter(|&r| table.value(r, img_col).contains(&name))
            .collect();

        let cleared = load_mask(mask_path)?.relabel().clear_border();
        let areas = cleared.region_areas();
        let labels = cleared.labels();

        // Spot counts per (image, cell label), labels from the cleared mask.
        let mut counts: HashMap<(String, u32), usize> = HashMap::new();
        let mut images: Vec<String> = Vec::new();
        for &row in &rows {
            let img = table.value(row, img_col).to_string();
            if !images.contains(&img) {
                images.push(img.clone());
            }
            let mut coords = [0.0; 3];
            for (i, col) in coord_cols.iter().enumerate() {
                if let Some(c) = col {
                    coords[i] = table.value(row, *c).trim().parse().unwrap_or(-1.0);
                }
            }
            let cell = cleared.label_at(coords).unwrap_or(0);
            *counts.entry((img, cell)).or_insert(0) += 1;
        }
        debug!(
            mask = %mask_path.display(),
            cells = labels.len().saturating_sub(1),
            images = images.len(),
            "computed spot counts"
        );

        // Full cross product of images × labels; zero-spot cells included.
        for img in &images {
            let channel = extract_channel_tag(img);
            for &label in &labels {
                let Some(&area) = areas.get(&label) else {
                    continue; // background or empty label
                };
                if area <= config.min_cell_area {
                    continue;
                }
                let Some(channel) = channel.clone() else {
                    continue; // image name carries no channel tag
                };
                let count = counts.get(&(img.clone(), label)).copied().unwrap_or(0);

                let mut row = vec![
                    img.clone(),
                    label.to_string(),
                    channel,
                    count.to_string(),
                    area.to_string(),
                ];
                let meta = meta_by_img.get(img.as_str()).expect("img seen in table");
                row.extend(meta_cols.iter().map(|&i| meta[i].clone()));
                out.push_row(row);
            }
        }
    }
    Ok(out)
}
