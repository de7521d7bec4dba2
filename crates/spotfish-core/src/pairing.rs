//! Cross-channel spot pairing via optimal assignment.
//!
//! Two channels image the same molecules; matching their detections gives a
//! per-spot colocalization distance. Greedy nearest-neighbor matching can
//! produce a suboptimal total distance, so pairing solves the assignment
//! problem exactly over the full pairwise distance matrix.

use ndarray::{Array2, ArrayView2};
use tracing::debug;

use crate::consts::DEFAULT_VOXEL_SIZE;
use crate::error::Result;
use crate::spot::{format_float, SpotTable};

#[derive(Clone, Debug)]
pub struct PairingConfig {
    /// The two channel labels to pair, in output order.
    pub channels: [String; 2],
    /// Physical voxel size (z, y, x) scaling pixel differences to distance.
    pub voxel_size: [f64; 3],
}

impl PairingConfig {
    pub fn new(channels: [String; 2]) -> Self {
        Self {
            channels,
            voxel_size: DEFAULT_VOXEL_SIZE,
        }
    }
}

/// Exact minimum-cost one-to-one assignment (Hungarian algorithm, shortest
/// augmenting path with potentials, O(n³)).
///
/// Returns (row, col) pairs covering `min(nrows, ncols)` rows; with unequal
/// set sizes the surplus stays unmatched.
pub fn linear_sum_assignment(cost: &ArrayView2<f64>) -> Vec<(usize, usize)> {
    let (rows, cols) = cost.dim();
    if rows == 0 || cols == 0 {
        return Vec::new();
    }
    if rows > cols {
        // Solve the transposed problem and swap back.
        let transposed = cost.t().to_owned();
        let mut pairs: Vec<(usize, usize)> = linear_sum_assignment(&transposed.view())
            .into_iter()
            .map(|(r, c)| (c, r))
            .collect();
        pairs.sort_unstable();
        return pairs;
    }

    // 1-indexed potentials over rows (u) and columns (v); p[j] is the row
    // assigned to column j, column 0 is the virtual start.
    let n = rows;
    let m = cols;
    let mut u = vec![0.0f64; n + 1];
    let mut v = vec![0.0f64; m + 1];
    let mut p = vec![0usize; m + 1];
    let mut way = vec![0usize; m + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0usize;
        let mut minv = vec![f64::INFINITY; m + 1];
        let mut used = vec![false; m + 1];

        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0usize;

            for j in 1..=m {
                if used[j] {
                    continue;
                }
                let cur = cost[[i0 - 1, j - 1]] - u[i0] - v[j];
                if cur < minv[j] {
                    minv[j] = cur;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }

            for j in 0..=m {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }

            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }

        // Augment along the found path.
        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut pairs: Vec<(usize, usize)> = (1..=m)
        .filter(|&j| p[j] != 0)
        .map(|j| (p[j] - 1, j - 1))
        .collect();
    pairs.sort_unstable();
    pairs
}

fn physical_distance(a: &[f64; 3], b: &[f64; 3], voxel_size: &[f64; 3]) -> f64 {
    (0..3)
        .map(|i| ((a[i] - b[i]) * voxel_size[i]).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Image name with the trailing `_<token>` (channel tag) removed, so all
/// channels of one acquisition group together.
fn strip_trailing_token(name: &str) -> &str {
    name.rfind('_').map(|i| &name[..i]).unwrap_or(name)
}

fn row_coords(table: &SpotTable, row: usize, cols: [Option<usize>; 3]) -> [f64; 3] {
    let mut out = [0.0; 3];
    for (i, col) in cols.iter().enumerate() {
        if let Some(c) = col {
            out[i] = table.value(row, *c).trim().parse().unwrap_or(0.0);
        }
    }
    out
}

/// Pair spots of two channels per image and report physical distances.
///
/// Output: one row per matched pair with both coordinates, `distance_um`,
/// and both spots' metadata (suffixed `_1`/`_2`; columns whose values
/// duplicate an earlier column are dropped). Only `min(|ch1|, |ch2|)` pairs
/// are produced per image; surplus spots of the larger channel are silently
/// dropped, a documented limitation of the assignment formulation.
pub fn pair_spots(table: &SpotTable, config: &PairingConfig) -> Result<SpotTable> {
    let img_col = table.require_column("img")?;
    let channel_col = table.require_column("channel")?;
    let coord_cols = [
        table.column_index("z"),
        table.column_index("y"),
        table.column_index("x"),
    ];

    // Metadata columns merged back per matched spot; join keys and the
    // per-frame counters are excluded.
    let meta_cols: Vec<usize> = table
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, name)| !["img", "x", "y", "z", "c", "t"].contains(&name.as_str()))
        .map(|(i, _)| i)
        .collect();

    let mut columns = vec![
        "img".to_string(),
        "distance_um".to_string(),
        "z_1".to_string(),
        "y_1".to_string(),
        "x_1".to_string(),
        "z_2".to_string(),
        "y_2".to_string(),
        "x_2".to_string(),
    ];
    for suffix in ["_1", "_2"] {
        columns.extend(
            meta_cols
                .iter()
                .map(|&i| format!("{}{}", table.columns()[i], suffix)),
        );
    }
    let mut out = SpotTable::new(columns);

    // Group rows by acquisition (image name minus the channel token).
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    for row in 0..table.len() {
        let img = strip_trailing_token(table.value(row, img_col)).to_string();
        match groups.iter_mut().find(|(k, _)| *k == img) {
            Some((_, rows)) => rows.push(row),
            None => groups.push((img, vec![row])),
        }
    }

    for (img, rows) in groups {
        let ch1: Vec<usize> = rows
            .iter()
            .copied()
            .filter(|&r| table.value(r, channel_col) == config.channels[0])
            .collect();
        let ch2: Vec<usize> = rows
            .iter()
            .copied()
            .filter(|&r| table.value(r, channel_col) == config.channels[1])
            .collect();
        if ch1.is_empty() || ch2.is_empty() {
            continue;
        }

        let coords1: Vec<[f64; 3]> = ch1.iter().map(|&r| row_coords(table, r, coord_cols)).collect();
        let coords2: Vec<[f64; 3]> = ch2.iter().map(|&r| row_coords(table, r, coord_cols)).collect();

        let mut cost = Array2::<f64>::zeros((ch1.len(), ch2.len()));
        for (i, c1) in coords1.iter().enumerate() {
            for (j, c2) in coords2.iter().enumerate() {
                cost[[i, j]] = physical_distance(c1, c2, &config.voxel_size);
            }
        }

        let pairs = linear_sum_assignment(&cost.view());
        debug!(img = %img, pairs = pairs.len(), "paired spots");

        for (i, j) in pairs {
            let mut row = vec![img.clone(), format_float(cost[[i, j]])];
            row.extend(coords1[i].iter().map(|&v| format_float(v)));
            row.extend(coords2[j].iter().map(|&v| format_float(v)));
            for &source in [ch1[i], ch2[j]].iter() {
                row.extend(meta_cols.iter().map(|&c| table.value(source, c).to_string()));
            }
            out.push_row(row);
        }
    }

    Ok(drop_duplicate_columns(out))
}

/// Drop any column whose full value vector equals an earlier column's
/// (channel-independent metadata would otherwise appear twice).
fn drop_duplicate_columns(table: SpotTable) -> SpotTable {
    if table.is_empty() {
        return table;
    }
    let n = table.columns().len();
    let mut keep: Vec<usize> = Vec::with_capacity(n);
    for i in 0..n {
        let duplicate = keep.iter().any(|&k| {
            table.rows().iter().all(|row| row[i] == row[k])
        });
        if !duplicate {
            keep.push(i);
        }
    }
    if keep.len() == n {
        return table;
    }

    let mut out = SpotTable::new(keep.iter().map(|&i| table.columns()[i].clone()).collect());
    for row in table.rows() {
        out.push_row(keep.iter().map(|&i| row[i].clone()).collect());
    }
    out
}
