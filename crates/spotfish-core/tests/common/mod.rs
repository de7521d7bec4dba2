use ndarray::{Array2, Array3};

use spotfish_core::spot::SpotTable;
use spotfish_core::transform::TransformCatalog;

/// Build a spot table from literal rows.
pub fn table(columns: &[&str], rows: &[&[&str]]) -> SpotTable {
    let mut t = SpotTable::new(columns.iter().map(|c| c.to_string()).collect());
    for row in rows {
        t.push_row(row.iter().map(|c| c.to_string()).collect());
    }
    t
}

/// Catalog with a single 4×4 identity transform for (channel, reference).
pub fn identity_catalog(channel: &str, reference: &str) -> TransformCatalog {
    let mut catalog = TransformCatalog::new(Default::default());
    catalog.insert(channel, reference, Array2::eye(4));
    catalog
}

/// 4×4 translation used to build known-offset catalogs in tests.
pub fn translation(offset: [f64; 3]) -> Array2<f64> {
    let mut m = Array2::eye(4);
    for (i, &o) in offset.iter().enumerate() {
        m[[i, 3]] = o;
    }
    m
}

/// Synthetic volume holding one additive-background Gaussian blob.
pub fn gaussian_volume(
    dim: usize,
    center: [f64; 3],
    sigma: [f64; 3],
    amplitude: f64,
    background: f64,
) -> Array3<f32> {
    let mut volume = Array3::<f32>::zeros((dim, dim, dim));
    for z in 0..dim {
        for y in 0..dim {
            for x in 0..dim {
                let pos = [z as f64, y as f64, x as f64];
                let e: f64 = (0..3)
                    .map(|i| {
                        let d = pos[i] - center[i];
                        d * d / (2.0 * sigma[i] * sigma[i])
                    })
                    .sum();
                volume[[z, y, x]] = (background + amplitude * (-e).exp()) as f32;
            }
        }
    }
    volume
}
