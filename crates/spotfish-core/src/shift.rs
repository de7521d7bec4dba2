//! Chromatic-shift correction of spot tables.
//!
//! Optics shift each fluorescence channel against the others by a few tens of
//! nanometers. A pre-calibrated affine per channel pair re-expresses every
//! spot in a designated reference channel's coordinate frame.

use std::fs;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use tracing::info;

use crate::consts::SHIFT_REFERENCE_COLUMN;
use crate::error::{Result, SpotfishError};
use crate::io::spots_csv::{read_spot_table, write_spot_table};
use crate::spot::{format_float, SpotTable};
use crate::transform::{apply_affine, TransformCatalog};

/// Column selection and pixel-size handling for one correction run.
#[derive(Clone, Debug)]
pub struct ShiftConfig {
    /// Column holding the channel label each spot was detected in.
    pub channel_column: String,
    /// Physical-unit coordinate columns (z, y, x order not required;
    /// transforms apply in the order given here).
    pub unit_columns: Option<[String; 3]>,
    /// Pixel coordinate columns, same axis order as `unit_columns`.
    pub pixel_columns: Option<[String; 3]>,
    /// Per-axis pixel size. When absent and both column sets are present it
    /// is derived per file from the first row's unit/pixel ratio.
    pub pixel_size: Option<[f64; 3]>,
    /// Suffix for written coordinate columns; empty replaces in place.
    pub column_suffix: String,
}

impl Default for ShiftConfig {
    fn default() -> Self {
        Self {
            channel_column: "channel".to_string(),
            unit_columns: None,
            pixel_columns: None,
            pixel_size: None,
            column_suffix: String::new(),
        }
    }
}

impl ShiftConfig {
    /// Reject impossible configurations before any file is touched.
    pub fn validate(&self) -> Result<()> {
        if self.unit_columns.is_none() && self.pixel_columns.is_none() {
            return Err(SpotfishError::Config(
                "specify unit or pixel coordinate columns to transform (or both)".to_string(),
            ));
        }
        if self.pixel_size.is_none() && self.unit_columns.is_none() {
            return Err(SpotfishError::Config(
                "pixel size is required when only pixel coordinates are given".to_string(),
            ));
        }
        Ok(())
    }

    /// Pixel size for one table: explicit, or derived from the first row's
    /// unit/pixel column ratio (constant across a file by construction).
    /// `None` when unit columns alone are in play.
    fn resolve_pixel_size(&self, table: &SpotTable) -> Result<Option<[f64; 3]>> {
        if self.pixel_size.is_some() {
            return Ok(self.pixel_size);
        }
        match (&self.unit_columns, &self.pixel_columns) {
            (Some(unit), Some(pixel)) => {
                if table.is_empty() {
                    return Ok(None);
                }
                let mut size = [0.0; 3];
                for i in 0..3 {
                    let u = table.f64_column(&unit[i])?[0];
                    let p = table.f64_column(&pixel[i])?[0];
                    size[i] = u / p;
                }
                Ok(Some(size))
            }
            _ => Ok(None),
        }
    }
}

/// Correct one spot table into `reference_channel`'s coordinate frame.
///
/// Spots are partitioned by channel; each partition goes through the
/// catalog transform for (channel, reference). A missing transform fails the
/// whole table. Row order is preserved.
pub fn correct_table(
    table: &SpotTable,
    catalog: &TransformCatalog,
    reference_channel: &str,
    config: &ShiftConfig,
) -> Result<SpotTable> {
    config.validate()?;

    let channel_col = table.require_column(&config.channel_column)?;
    let pixel_size = config.resolve_pixel_size(table)?;

    // Source coordinates in physical units: unit columns when present,
    // pixel columns scaled by pixel size otherwise.
    let coords_unit: Array2<f64> = match (&config.unit_columns, &config.pixel_columns) {
        (Some(unit), _) => table.coords(unit)?,
        (None, Some(pixel)) => {
            let size = pixel_size.expect("validated: pixel size present");
            let mut coords = table.coords(pixel)?;
            for mut row in coords.rows_mut() {
                for i in 0..3 {
                    row[i] *= size[i];
                }
            }
            coords
        }
        (None, None) => unreachable!("validated"),
    };

    let mut transformed = Array2::<f64>::zeros((table.len(), 3));
    for (channel, rows) in table.group_by(channel_col) {
        let matrix = catalog.get(&channel, reference_channel)?;

        let mut group = Array2::<f64>::zeros((rows.len(), 3));
        for (k, &row) in rows.iter().enumerate() {
            group.row_mut(k).assign(&coords_unit.row(row));
        }
        let corrected = apply_affine(&matrix.view(), &group.view());
        for (k, &row) in rows.iter().enumerate() {
            transformed.row_mut(row).assign(&corrected.row(k));
        }
    }

    let mut out = table.clone();
    if let Some(unit) = &config.unit_columns {
        for i in 0..3 {
            let name = format!("{}{}", unit[i], config.column_suffix);
            let values = transformed.column(i).iter().map(|&v| format_float(v)).collect();
            out.set_column(&name, values);
        }
    }
    // Pixel size is always available here for a non-empty table: explicit
    // when pixel columns stand alone, derived when unit columns coexist.
    if let (Some(pixel), Some(size)) = (&config.pixel_columns, pixel_size) {
        for i in 0..3 {
            let name = format!("{}{}", pixel[i], config.column_suffix);
            let values = transformed
                .column(i)
                .iter()
                .map(|&v| format_float(v / size[i]))
                .collect();
            out.set_column(&name, values);
        }
    }
    out.set_column(
        SHIFT_REFERENCE_COLUMN,
        vec![reference_channel.to_string(); table.len()],
    );
    Ok(out)
}

/// Correct a batch of CSV files, writing `<stem>_shift-corrected.csv` into
/// `out_dir`. Auto-derived pixel size is resolved fresh for every file.
pub fn correct_files(
    inputs: &[PathBuf],
    out_dir: &Path,
    catalog: &TransformCatalog,
    reference_channel: &str,
    config: &ShiftConfig,
) -> Result<Vec<PathBuf>> {
    config.validate()?;
    fs::create_dir_all(out_dir)?;

    let mut outputs = Vec::with_capacity(inputs.len());
    for input in inputs {
        let table = read_spot_table(input)?;
        let corrected = correct_table(&table, catalog, reference_channel, config)?;

        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("spots");
        let out_path = out_dir.join(format!("{stem}_shift-corrected.csv"));
        write_spot_table(&corrected, &out_path)?;
        info!(
            input = %input.display(),
            output = %out_path.display(),
            rows = corrected.len(),
            "shift-corrected spot table"
        );
        outputs.push(out_path);
    }
    Ok(outputs)
}
