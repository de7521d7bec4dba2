//! Spot-to-cell assignment.
//!
//! Each segmentation mask covers one image; its filename encodes the image
//! name through a tool suffix (`_cp_masks` for Cellpose) plus an optional
//! channel tag. Spots are matched to masks by that derived name, then looked
//! up in the labeled mask at their rounded pixel coordinate.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::consts::DEFAULT_MASK_SUFFIX;
use crate::error::Result;
use crate::spot::SpotTable;

use super::mask::load_mask;

/// Remove a `_ch<digits>` token anywhere in `name`.
pub(crate) fn strip_channel_tag(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut rest = name;
    while let Some(pos) = rest.find("_ch") {
        let after = &rest[pos + 3..];
        let digits = after.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits > 0 {
            out.push_str(&rest[..pos]);
            rest = &after[digits..];
        } else {
            out.push_str(&rest[..pos + 3]);
            rest = after;
        }
    }
    out.push_str(rest);
    out
}

/// Extract the digits of the first `ch<digits>` token in `name`.
pub(crate) fn extract_channel_tag(name: &str) -> Option<String> {
    let mut rest = name;
    while let Some(pos) = rest.find("ch") {
        let after = &rest[pos + 2..];
        let digits: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
        if !digits.is_empty() {
            return Some(digits);
        }
        rest = after;
    }
    None
}

/// Image name a mask file corresponds to: file stem minus the mask suffix
/// and any channel tag.
pub fn image_name_for_mask(path: &Path, mask_suffix: &str) -> String {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    strip_channel_tag(&stem.replace(mask_suffix, ""))
}

#[derive(Clone, Debug)]
pub struct AssignConfig {
    /// Drop spots with cell label 0 (not inside any cell).
    pub filter_unassigned: bool,
    /// Mask filename suffix to strip when deriving the image name.
    pub mask_suffix: String,
}

impl Default for AssignConfig {
    fn default() -> Self {
        Self {
            filter_unassigned: true,
            mask_suffix: DEFAULT_MASK_SUFFIX.to_string(),
        }
    }
}

/// Row coordinates (z, y, x) for mask lookup; z falls back to 0 for tables
/// without a z column (2-D data).
fn row_coords(table: &SpotTable, row: usize, cols: [Option<usize>; 3]) -> [f64; 3] {
    let mut out = [0.0; 3];
    for (i, col) in cols.iter().enumerate() {
        if let Some(c) = col {
            out[i] = table.value(row, *c).trim().parse::<f64>().unwrap_or(-1.0);
        }
    }
    out
}

/// Assign every spot to the cell whose labeled region contains it.
///
/// Per mask: connected-component relabel, compute the border-cleared
/// variant, subset spots whose `img` value contains the derived image name
/// (a mask matching no image silently contributes nothing), and attach
/// `cell` plus a `whole_cell` flag (true iff the cell does not touch the
/// image boundary). Spots from images without a mask are dropped.
pub fn assign_cells(
    mask_paths: &[PathBuf],
    table: &SpotTable,
    config: &AssignConfig,
) -> Result<SpotTable> {
    let img_col = table.require_column("img")?;
    let coord_cols = [
        table.column_index("z"),
        table.column_index("y"),
        table.column_index("x"),
    ];

    let mut out = SpotTable::default();
    for mask_path in mask_paths {
        let name = image_name_for_mask(mask_path, &config.mask_suffix);
        let rows: Vec<usize> = (0..table.len())
            .filter(|&r| table.value(r, img_col).contains(&name))
            .collect();
        if rows.is_empty() {
            warn!(mask = %mask_path.display(), image = %name, "mask matched no spots");
        }

        let labelled = load_mask(mask_path)?.relabel();
        let cleared = labelled.clear_border();
        debug!(
            mask = %mask_path.display(),
            ndim = labelled.ndim(),
            spots = rows.len(),
            "assigning cells"
        );

        let mut subset = table.subset(&rows);
        let mut cells = Vec::with_capacity(rows.len());
        let mut whole = Vec::with_capacity(rows.len());
        for &row in &rows {
            let coords = row_coords(table, row, coord_cols);
            let cell = labelled.label_at(coords).unwrap_or(0);
            let in_cleared = cleared.label_at(coords).map(|l| l != 0).unwrap_or(false);
            cells.push(cell.to_string());
            whole.push(in_cleared.to_string());
        }
        subset.insert_column(1, "cell", cells);
        subset.insert_column(2, "whole_cell", whole);
        out.append(subset)?;
    }

    if config.filter_unassigned && !out.is_empty() {
        let cell_col = out.require_column("cell")?;
        out.retain_rows(|row| row[cell_col] != "0");
    }
    Ok(out)
}
