//! 4×4 affine transform helpers.
//!
//! Transforms act on homogeneous augmented 3D coordinates (z, y, x, 1) and
//! always map source frame to target frame; composing happens right-to-left
//! as applied to a column vector.

use ndarray::{s, Array2, ArrayView2};

use crate::error::{Result, SpotfishError};

/// Append a homogeneous 1 to each coordinate row (N×3 → N×4).
pub fn augment(coords: &ArrayView2<f64>) -> Array2<f64> {
    let (n, d) = coords.dim();
    let mut out = Array2::ones((n, d + 1));
    out.slice_mut(s![.., ..d]).assign(coords);
    out
}

/// 4×4 translation by `offset`, axes in (z, y, x) order.
pub fn translation_matrix(offset: &[f64; 3]) -> Array2<f64> {
    let mut m = Array2::eye(4);
    for (i, &o) in offset.iter().enumerate() {
        m[[i, 3]] = o;
    }
    m
}

/// 4×4 anisotropic scaling by `scale`, axes in (z, y, x) order.
pub fn scale_matrix(scale: &[f64; 3]) -> Array2<f64> {
    let mut m = Array2::eye(4);
    for (i, &s) in scale.iter().enumerate() {
        m[[i, i]] = s;
    }
    m
}

/// Apply a 4×4 affine to N×3 coordinates, returning the transformed N×3.
pub fn apply_affine(m: &ArrayView2<f64>, coords: &ArrayView2<f64>) -> Array2<f64> {
    // (M @ augmented.T).T == augmented @ M.T
    let transformed = augment(coords).dot(&m.t());
    transformed.slice(s![.., ..3]).to_owned()
}

/// Invert a 4×4 matrix by Gauss-Jordan elimination with partial pivoting.
pub fn invert_affine(m: &ArrayView2<f64>) -> Result<Array2<f64>> {
    let n = m.nrows();
    assert_eq!(m.dim(), (n, n), "square matrix required");

    let mut a = m.to_owned();
    let mut inv = Array2::<f64>::eye(n);

    for col in 0..n {
        let mut pivot = col;
        for row in (col + 1)..n {
            if a[[row, col]].abs() > a[[pivot, col]].abs() {
                pivot = row;
            }
        }
        if a[[pivot, col]].abs() < 1e-12 {
            return Err(SpotfishError::SingularTransform);
        }
        if pivot != col {
            for j in 0..n {
                a.swap([col, j], [pivot, j]);
                inv.swap([col, j], [pivot, j]);
            }
        }

        let diag = a[[col, col]];
        for j in 0..n {
            a[[col, j]] /= diag;
            inv[[col, j]] /= diag;
        }

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = a[[row, col]];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                let ac = a[[col, j]];
                let ic = inv[[col, j]];
                a[[row, j]] -= factor * ac;
                inv[[row, j]] -= factor * ic;
            }
        }
    }

    Ok(inv)
}
