//! Scan-field geometry and pixel ↔ world coordinate conversion.
//!
//! One acquisition's physical geometry combines stage offsets (coarse
//! positioning), scan offsets (galvo/piezo), field-of-view length and pixel
//! size, each per axis in (z, y, x) order. Stage and scan axes may run
//! against pixel coordinates, so each carries a ±1 direction vector.

use std::collections::HashMap;

use ndarray::{Array2, ArrayView2};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::Value;

use crate::consts::{SCAN_DIRECTIONS_DEFAULT, STAGE_DIRECTIONS_DEFAULT};
use crate::error::{Result, SpotfishError};

use super::affine::{invert_affine, scale_matrix, translation_matrix};

/// Physical geometry of one acquisition. All vectors are (z, y, x).
#[derive(Clone, Debug, PartialEq)]
pub struct ScanFieldMetadata {
    pub stage_offset: [f64; 3],
    pub stage_offset_global: [f64; 3],
    pub scan_offset: [f64; 3],
    pub scan_offset_global: [f64; 3],
    pub fov_length: [f64; 3],
    pub pixel_size: [f64; 3],
    pub stage_direction: [f64; 3],
    pub scan_direction: [f64; 3],
}

impl ScanFieldMetadata {
    /// World coordinate of pixel (0, 0, 0).
    ///
    /// Stage and scan offsets are direction-corrected and summed; the
    /// instrument reports them for the image center, so half the
    /// field-of-view length shifts the origin to the image corner.
    pub fn origin(&self) -> [f64; 3] {
        let mut origin = [0.0; 3];
        for i in 0..3 {
            origin[i] = self.scan_direction[i] * (self.scan_offset[i] + self.scan_offset_global[i])
                + self.stage_direction[i]
                    * (self.stage_offset[i] + self.stage_offset_global[i])
                - 0.5 * self.fov_length[i];
        }
        origin
    }
}

/// Convert pixel coordinates (N×3, z/y/x) to world coordinates.
pub fn pixel_to_world(pixels: &ArrayView2<f64>, meta: &ScanFieldMetadata) -> Array2<f64> {
    let origin = meta.origin();
    let mut out = pixels.to_owned();
    for mut row in out.rows_mut() {
        for i in 0..3 {
            row[i] = origin[i] + row[i] * meta.pixel_size[i];
        }
    }
    out
}

/// Exact inverse of [`pixel_to_world`].
pub fn world_to_pixel(world: &ArrayView2<f64>, meta: &ScanFieldMetadata) -> Array2<f64> {
    let origin = meta.origin();
    let mut out = world.to_owned();
    for mut row in out.rows_mut() {
        for i in 0..3 {
            row[i] = (row[i] - origin[i]) / meta.pixel_size[i];
        }
    }
    out
}

/// Re-express a world-coordinate affine as a transform on pixel coordinates.
///
/// The composition, right-to-left as applied to a column vector: scale
/// moving pixels to world units, translate to the moving image's world
/// origin, apply `transform`, translate back from the reference origin,
/// scale back to reference pixels.
///
/// `transform` must map moving → reference. Passing the inverse direction is
/// not detected and silently produces garbage coordinates.
pub fn world_transform_to_pixel_transform(
    transform: &ArrayView2<f64>,
    origin_ref: &[f64; 3],
    origin_moving: &[f64; 3],
    pixel_size_ref: &[f64; 3],
    pixel_size_moving: &[f64; 3],
) -> Result<Array2<f64>> {
    let to_ref_pixels = invert_affine(&scale_matrix(pixel_size_ref).view())?;
    let from_ref_origin = invert_affine(&translation_matrix(origin_ref).view())?;

    let m = to_ref_pixels
        .dot(&from_ref_origin)
        .dot(transform)
        .dot(&translation_matrix(origin_moving))
        .dot(&scale_matrix(pixel_size_moving));
    Ok(m)
}

const AXES: [&str; 3] = ["z", "y", "x"];

fn axis_vector(values: &HashMap<String, f64>, template: &str) -> Result<[f64; 3]> {
    let mut out = [0.0; 3];
    for (i, axis) in AXES.iter().enumerate() {
        let key = template.replace("{d}", axis);
        out[i] = *values
            .get(&key)
            .ok_or_else(|| SpotfishError::MetadataKey(key.clone()))?;
    }
    Ok(out)
}

fn metadata_from_values(
    values: &HashMap<String, f64>,
    stage_direction: [f64; 3],
    scan_direction: [f64; 3],
) -> Result<ScanFieldMetadata> {
    Ok(ScanFieldMetadata {
        stage_offset: axis_vector(values, "coarse_{d}/off")?,
        stage_offset_global: axis_vector(values, "coarse_{d}/g_off")?,
        scan_offset: axis_vector(values, "{d}/off")?,
        scan_offset_global: axis_vector(values, "{d}/g_off")?,
        fov_length: axis_vector(values, "{d}/len")?,
        pixel_size: axis_vector(values, "{d}/psz")?,
        stage_direction,
        scan_direction,
    })
}

/// Parse scan-field metadata from an Imspector XML blob.
///
/// The scan range lives under `doc/ExpControl/scan/range`, with per-axis
/// elements `coarse_{d}/off`, `coarse_{d}/g_off`, `{d}/off`, `{d}/g_off`,
/// `{d}/len` and `{d}/psz`. Newer MSR containers no longer carry stage/scan
/// direction flags, so the defaults apply.
pub fn from_imspector_xml(xml: &str) -> Result<ScanFieldMetadata> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<String> = Vec::new();
    let mut values: HashMap<String, f64> = HashMap::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                stack.push(String::from_utf8_lossy(e.name().as_ref()).into_owned());
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(t) => {
                // Only element paths below the scan range element matter.
                if let Some(pos) = stack.iter().position(|name| name == "range") {
                    let key = stack[pos + 1..].join("/");
                    if !key.is_empty() {
                        let text = String::from_utf8_lossy(t.as_ref());
                        if let Ok(v) = text.trim().parse::<f64>() {
                            values.insert(key, v);
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    metadata_from_values(&values, STAGE_DIRECTIONS_DEFAULT, SCAN_DIRECTIONS_DEFAULT)
}

/// Look up a slash-separated path in nested JSON. Each segment is resolved
/// by depth-first search from the current node, so intermediate wrapper
/// objects in instrument dumps do not need to be spelled out.
pub fn recursive_query<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    fn find_key<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
        match value {
            Value::Object(map) => map
                .get(key)
                .or_else(|| map.values().find_map(|v| find_key(v, key))),
            _ => None,
        }
    }

    let mut current = value;
    for segment in path.split('/') {
        current = find_key(current, segment)?;
    }
    Some(current)
}

fn query_flag(value: &Value, path: &str) -> Result<bool> {
    let v = recursive_query(value, path)
        .ok_or_else(|| SpotfishError::MetadataKey(path.to_string()))?;
    v.as_bool()
        .or_else(|| v.as_i64().map(|n| n != 0))
        .ok_or_else(|| SpotfishError::MetadataKey(path.to_string()))
}

/// Stage axis directions from hardware metadata (`OlympusIX/stage/invert_*`).
pub fn load_stage_directions(hardware: &Value) -> Result<[f64; 3]> {
    let x_inverted = query_flag(hardware, "OlympusIX/stage/invert_x")?;
    let y_inverted = query_flag(hardware, "OlympusIX/stage/invert_y")?;
    Ok([
        1.0,
        if y_inverted { -1.0 } else { 1.0 },
        if x_inverted { -1.0 } else { 1.0 },
    ])
}

/// Scan axis directions from hardware metadata
/// (`ExpControl/calibration/scan/flip_*_axis`). A flipped z axis runs with
/// the stage, so it maps to +1.
pub fn load_scan_directions(hardware: &Value) -> Result<[f64; 3]> {
    let x_flipped = query_flag(hardware, "ExpControl/calibration/scan/flip_x_axis")?;
    let y_flipped = query_flag(hardware, "ExpControl/calibration/scan/flip_y_axis")?;
    let z_flipped = query_flag(hardware, "ExpControl/calibration/scan/flip_z_axis")?;
    Ok([
        if z_flipped { 1.0 } else { -1.0 },
        if y_flipped { -1.0 } else { 1.0 },
        if x_flipped { -1.0 } else { 1.0 },
    ])
}

/// Parse scan-field metadata from the JSON attribute blobs of an HDF5
/// container: `measurement` holds the `ExpControl/scan/range` hierarchy,
/// `hardware` the stage/scan direction flags.
pub fn from_measurement_json(measurement: &Value, hardware: &Value) -> Result<ScanFieldMetadata> {
    let range = recursive_query(measurement, "ExpControl/scan/range")
        .ok_or_else(|| SpotfishError::MetadataKey("ExpControl/scan/range".to_string()))?;

    let mut values = HashMap::new();
    for template in [
        "coarse_{d}/off",
        "coarse_{d}/g_off",
        "{d}/off",
        "{d}/g_off",
        "{d}/len",
        "{d}/psz",
    ] {
        for axis in AXES {
            let key = template.replace("{d}", axis);
            if let Some(v) = recursive_query(range, &key).and_then(Value::as_f64) {
                values.insert(key, v);
            }
        }
    }

    let stage_direction = load_stage_directions(hardware)?;
    let scan_direction = load_scan_directions(hardware)?;
    metadata_from_values(&values, stage_direction, scan_direction)
}
