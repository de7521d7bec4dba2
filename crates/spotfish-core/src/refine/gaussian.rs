//! Sub-pixel spot refinement by 3-D Gaussian fitting.
//!
//! The external detector reports integer-voxel centroids. Fitting an
//! additive-background Gaussian intensity model in a small region of
//! interest around each centroid recovers the true center to a fraction of
//! a voxel. Refinement is best-effort: spots whose ROI leaves the image, or
//! whose fit does not converge, are dropped from the output.

use std::collections::HashMap;

use ndarray::{Array3, ArrayView3};
use rayon::prelude::*;

use crate::consts::{DEFAULT_REFINE_RADIUS, PARALLEL_SPOT_THRESHOLD};
use crate::error::Result;
use crate::spot::{format_float, SpotTable};

use super::lm::{optimize, LmConfig, LmModel};

/// Converged fit of the 3-D Gaussian model.
#[derive(Clone, Debug)]
pub struct GaussianFit {
    /// Fitted center (z, y, x), sub-voxel.
    pub center: [f64; 3],
    /// Fitted standard deviation per axis (z, y, x).
    pub sigma: [f64; 3],
    pub amplitude: f64,
    pub background: f64,
}

/// 8 parameters: center z/y/x, sigma z/y/x, amplitude, background.
struct Gaussian3d;

impl LmModel<8> for Gaussian3d {
    fn evaluate(&self, pos: [f64; 3], p: &[f64; 8]) -> f64 {
        let e: f64 = (0..3)
            .map(|i| {
                let d = pos[i] - p[i];
                d * d / (2.0 * p[i + 3] * p[i + 3])
            })
            .sum();
        p[7] + p[6] * (-e).exp()
    }

    fn jacobian_row(&self, pos: [f64; 3], p: &[f64; 8]) -> [f64; 8] {
        let mut exponent = 0.0;
        let mut d = [0.0; 3];
        for i in 0..3 {
            d[i] = pos[i] - p[i];
            exponent += d[i] * d[i] / (2.0 * p[i + 3] * p[i + 3]);
        }
        let g = (-exponent).exp();

        let mut row = [0.0; 8];
        for i in 0..3 {
            let s2 = p[i + 3] * p[i + 3];
            // d/d(center_i)
            row[i] = p[6] * g * d[i] / s2;
            // d/d(sigma_i)
            row[i + 3] = p[6] * g * d[i] * d[i] / (s2 * p[i + 3]);
        }
        row[6] = g;
        row[7] = 1.0;
        row
    }

    fn constrain(&self, p: &mut [f64; 8]) {
        for i in 3..6 {
            p[i] = p[i].abs().max(1e-3);
        }
    }
}

/// Fit the Gaussian model in a cubic ROI of `radius` voxels around an
/// integer centroid (z, y, x). `None` when the ROI leaves the image or the
/// fit does not converge.
pub fn refine_spot(
    image: &ArrayView3<f32>,
    center: [i64; 3],
    radius: usize,
    config: &LmConfig,
) -> Option<GaussianFit> {
    let (d, h, w) = image.dim();
    let dims = [d as i64, h as i64, w as i64];
    let r = radius as i64;
    for i in 0..3 {
        if center[i] - r < 0 || center[i] + r >= dims[i] {
            return None;
        }
    }

    let mut samples = Vec::with_capacity((2 * radius + 1).pow(3));
    let mut max = f64::NEG_INFINITY;
    let mut min = f64::INFINITY;
    for z in (center[0] - r)..=(center[0] + r) {
        for y in (center[1] - r)..=(center[1] + r) {
            for x in (center[2] - r)..=(center[2] + r) {
                let v = f64::from(image[[z as usize, y as usize, x as usize]]);
                max = max.max(v);
                min = min.min(v);
                samples.push(([z as f64, y as f64, x as f64], v));
            }
        }
    }

    let sigma0 = (radius as f64 / 2.0).max(1.0);
    let initial = [
        center[0] as f64,
        center[1] as f64,
        center[2] as f64,
        sigma0,
        sigma0,
        sigma0,
        max - min,
        min,
    ];

    let result = optimize(&Gaussian3d, &samples, initial, config);
    if !result.converged {
        return None;
    }
    let p = result.params;
    Some(GaussianFit {
        center: [p[0], p[1], p[2]],
        sigma: [p[3], p[4], p[5]],
        amplitude: p[6],
        background: p[7],
    })
}

/// Refine many centroids against one image. Failed spots are omitted from
/// the result; the original index identifies survivors.
pub fn refine_spots(
    image: &ArrayView3<f32>,
    centers: &[[i64; 3]],
    radius: usize,
    config: &LmConfig,
) -> Vec<(usize, GaussianFit)> {
    if centers.len() >= PARALLEL_SPOT_THRESHOLD {
        centers
            .par_iter()
            .enumerate()
            .filter_map(|(i, &c)| refine_spot(image, c, radius, config).map(|f| (i, f)))
            .collect()
    } else {
        centers
            .iter()
            .enumerate()
            .filter_map(|(i, &c)| refine_spot(image, c, radius, config).map(|f| (i, f)))
            .collect()
    }
}

/// Refine a spot table against its source volumes, keyed by the `img`
/// column. Spots whose image has no volume, whose ROI leaves the image, or
/// whose fit fails are dropped. Coordinates are replaced by the fitted
/// center; sigma, amplitude and background are appended.
pub fn refine_table(
    table: &SpotTable,
    volumes: &HashMap<String, Array3<f32>>,
    radius: Option<usize>,
    config: &LmConfig,
) -> Result<SpotTable> {
    let radius = radius.unwrap_or(DEFAULT_REFINE_RADIUS);
    let img_col = table.require_column("img")?;
    let z_col = table.require_column("z")?;
    let y_col = table.require_column("y")?;
    let x_col = table.require_column("x")?;

    let mut out = SpotTable::new(
        table
            .columns()
            .iter()
            .cloned()
            .chain(
                ["sigma_z", "sigma_y", "sigma_x", "amplitude", "background"]
                    .iter()
                    .map(|s| s.to_string()),
            )
            .collect(),
    );

    for (img, rows) in table.group_by(img_col) {
        let Some(volume) = volumes.get(&img) else {
            continue;
        };

        let centers: Vec<[i64; 3]> = rows
            .iter()
            .map(|&r| {
                let parse = |col: usize| {
                    table
                        .value(r, col)
                        .trim()
                        .parse::<f64>()
                        .map(|v| v.round() as i64)
                        .unwrap_or(-1)
                };
                [parse(z_col), parse(y_col), parse(x_col)]
            })
            .collect();

        for (k, fit) in refine_spots(&volume.view(), &centers, radius, config) {
            let mut row = table.rows()[rows[k]].clone();
            row[z_col] = format_float(fit.center[0]);
            row[y_col] = format_float(fit.center[1]);
            row[x_col] = format_float(fit.center[2]);
            row.push(format_float(fit.sigma[0]));
            row.push(format_float(fit.sigma[1]));
            row.push(format_float(fit.sigma[2]));
            row.push(format_float(fit.amplitude));
            row.push(format_float(fit.background));
            out.push_row(row);
        }
    }
    Ok(out)
}
