//! Labeled segmentation masks, 2-D or 3-D.
//!
//! Masks come from an external segmentation tool as `.npy` integer arrays or
//! `.png` label images: 0 is background, positive values are cell instances.
//! Both ranks share one coordinate-lookup capability instead of branching on
//! array rank at every call site.

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::path::Path;

use ndarray::{Array2, Array3};
use ndarray_npy::ReadNpyExt;
use num_traits::ToPrimitive;

use crate::error::{Result, SpotfishError};

/// A labeled integer image. `label_at` takes (z, y, x); z is ignored for 2-D.
#[derive(Clone, Debug, PartialEq)]
pub enum LabelMask {
    TwoD(Array2<u32>),
    ThreeD(Array3<u32>),
}

impl LabelMask {
    pub fn ndim(&self) -> usize {
        match self {
            LabelMask::TwoD(_) => 2,
            LabelMask::ThreeD(_) => 3,
        }
    }

    /// Label under a spot's rounded pixel coordinate, `None` outside bounds.
    pub fn label_at(&self, coords: [f64; 3]) -> Option<u32> {
        let [z, y, x] = coords.map(|c| c.round());
        if y < 0.0 || x < 0.0 {
            return None;
        }
        let (yi, xi) = (y as usize, x as usize);
        match self {
            LabelMask::TwoD(a) => {
                let (h, w) = a.dim();
                (yi < h && xi < w).then(|| a[[yi, xi]])
            }
            LabelMask::ThreeD(a) => {
                if z < 0.0 {
                    return None;
                }
                let zi = z as usize;
                let (d, h, w) = a.dim();
                (zi < d && yi < h && xi < w).then(|| a[[zi, yi, xi]])
            }
        }
    }

    /// Distinct label values, sorted ascending. Background 0 is included
    /// when present.
    pub fn labels(&self) -> Vec<u32> {
        let set: HashSet<u32> = match self {
            LabelMask::TwoD(a) => a.iter().copied().collect(),
            LabelMask::ThreeD(a) => a.iter().copied().collect(),
        };
        let mut labels: Vec<u32> = set.into_iter().collect();
        labels.sort_unstable();
        labels
    }

    /// Pixel/voxel count per nonzero label.
    pub fn region_areas(&self) -> HashMap<u32, usize> {
        let mut areas = HashMap::new();
        let mut count = |v: u32| {
            if v != 0 {
                *areas.entry(v).or_insert(0) += 1;
            }
        };
        match self {
            LabelMask::TwoD(a) => a.iter().for_each(|&v| count(v)),
            LabelMask::ThreeD(a) => a.iter().for_each(|&v| count(v)),
        }
        areas
    }

    /// Connected-component relabeling: two-pass union-find, merging
    /// neighbors of equal nonzero value (4-connectivity in 2-D,
    /// 6-connectivity in 3-D). Output labels are sequential from 1 in
    /// scan order.
    pub fn relabel(&self) -> LabelMask {
        match self {
            LabelMask::TwoD(a) => LabelMask::TwoD(relabel_nd(
                a.as_slice().expect("contiguous mask"),
                &[a.nrows(), a.ncols()],
            )
            .into_shape_with_order((a.nrows(), a.ncols()))
            .expect("shape preserved")),
            LabelMask::ThreeD(a) => {
                let (d, h, w) = a.dim();
                LabelMask::ThreeD(
                    relabel_nd(a.as_slice().expect("contiguous mask"), &[d, h, w])
                        .into_shape_with_order((d, h, w))
                        .expect("shape preserved"),
                )
            }
        }
    }

    /// Zero out every label that touches the image boundary (any face).
    /// Remaining labels keep their values.
    pub fn clear_border(&self) -> LabelMask {
        let mut border: HashSet<u32> = HashSet::new();
        match self {
            LabelMask::TwoD(a) => {
                let (h, w) = a.dim();
                for ((y, x), &v) in a.indexed_iter() {
                    if v != 0 && (y == 0 || y == h - 1 || x == 0 || x == w - 1) {
                        border.insert(v);
                    }
                }
            }
            LabelMask::ThreeD(a) => {
                let (d, h, w) = a.dim();
                for ((z, y, x), &v) in a.indexed_iter() {
                    if v != 0
                        && (z == 0
                            || z == d - 1
                            || y == 0
                            || y == h - 1
                            || x == 0
                            || x == w - 1)
                    {
                        border.insert(v);
                    }
                }
            }
        }

        let clear = |v: u32| if border.contains(&v) { 0 } else { v };
        match self {
            LabelMask::TwoD(a) => LabelMask::TwoD(a.mapv(clear)),
            LabelMask::ThreeD(a) => LabelMask::ThreeD(a.mapv(clear)),
        }
    }
}

/// Union-find relabeling over a flat buffer with row-major strides.
///
/// For each element, the previous neighbor along every axis is inspected;
/// equal nonzero source values union into one component.
fn relabel_nd(data: &[u32], shape: &[usize]) -> ndarray::Array1<u32> {
    let n = data.len();
    let mut strides = vec![1usize; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }

    let mut labels = vec![0u32; n];
    let mut parent: Vec<u32> = vec![0];
    let mut next_label: u32 = 1;

    for idx in 0..n {
        if data[idx] == 0 {
            continue;
        }

        let mut assigned = 0u32;
        // Decompose idx to know when a neighbor crosses an axis boundary.
        let mut rem = idx;
        for &stride in &strides {
            let coord = rem / stride;
            rem %= stride;
            if coord == 0 {
                continue;
            }
            let neighbor = idx - stride;
            if data[neighbor] != data[idx] || labels[neighbor] == 0 {
                continue;
            }
            let root = find(&parent, labels[neighbor]);
            if assigned == 0 {
                assigned = root;
                labels[idx] = root;
            } else if assigned != root {
                union(&mut parent, assigned, root);
                assigned = find(&parent, assigned);
                labels[idx] = assigned;
            }
        }

        if assigned == 0 {
            parent.push(next_label);
            labels[idx] = next_label;
            next_label += 1;
        }
    }

    // Resolve to sequential labels in scan order.
    let mut remap: HashMap<u32, u32> = HashMap::new();
    let mut next_out: u32 = 1;
    let out: Vec<u32> = labels
        .iter()
        .map(|&l| {
            if l == 0 {
                0
            } else {
                let root = find(&parent, l);
                *remap.entry(root).or_insert_with(|| {
                    let v = next_out;
                    next_out += 1;
                    v
                })
            }
        })
        .collect();

    ndarray::Array1::from_vec(out)
}

fn find(parent: &[u32], mut x: u32) -> u32 {
    while parent[x as usize] != x {
        x = parent[x as usize];
    }
    x
}

fn union(parent: &mut [u32], a: u32, b: u32) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        let (small, big) = if ra < rb { (ra, rb) } else { (rb, ra) };
        parent[big as usize] = small;
    }
}

/// Load a labeled mask; the extension decides the decoder. Anything other
/// than `.npy` or `.png` is a fatal input error.
pub fn load_mask(path: &Path) -> Result<LabelMask> {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("npy") => load_npy(path),
        Some("png") => load_png(path),
        _ => Err(SpotfishError::UnsupportedMaskFormat(path.to_path_buf())),
    }
}

fn load_npy(path: &Path) -> Result<LabelMask> {
    let bytes = std::fs::read(path)?;

    if let Some(a) = read_npy_2d(&bytes) {
        return Ok(LabelMask::TwoD(a));
    }
    if let Some(a) = read_npy_3d(&bytes) {
        return Ok(LabelMask::ThreeD(a));
    }
    Err(SpotfishError::MaskRead {
        path: path.to_path_buf(),
        reason: "expected a 2-D or 3-D integer array".to_string(),
    })
}

fn to_label<T: ToPrimitive>(v: T) -> u32 {
    v.to_u32().unwrap_or(0)
}

/// Segmentation tools save uint16 or uint32 depending on cell count;
/// accept the common integer dtypes.
fn read_npy_2d(bytes: &[u8]) -> Option<Array2<u32>> {
    if let Ok(a) = Array2::<u32>::read_npy(Cursor::new(bytes)) {
        return Some(a);
    }
    if let Ok(a) = Array2::<u8>::read_npy(Cursor::new(bytes)) {
        return Some(a.mapv(to_label));
    }
    if let Ok(a) = Array2::<u16>::read_npy(Cursor::new(bytes)) {
        return Some(a.mapv(to_label));
    }
    if let Ok(a) = Array2::<i32>::read_npy(Cursor::new(bytes)) {
        return Some(a.mapv(to_label));
    }
    if let Ok(a) = Array2::<u64>::read_npy(Cursor::new(bytes)) {
        return Some(a.mapv(to_label));
    }
    if let Ok(a) = Array2::<i64>::read_npy(Cursor::new(bytes)) {
        return Some(a.mapv(to_label));
    }
    None
}

fn read_npy_3d(bytes: &[u8]) -> Option<Array3<u32>> {
    if let Ok(a) = Array3::<u32>::read_npy(Cursor::new(bytes)) {
        return Some(a);
    }
    if let Ok(a) = Array3::<u8>::read_npy(Cursor::new(bytes)) {
        return Some(a.mapv(to_label));
    }
    if let Ok(a) = Array3::<u16>::read_npy(Cursor::new(bytes)) {
        return Some(a.mapv(to_label));
    }
    if let Ok(a) = Array3::<i32>::read_npy(Cursor::new(bytes)) {
        return Some(a.mapv(to_label));
    }
    if let Ok(a) = Array3::<u64>::read_npy(Cursor::new(bytes)) {
        return Some(a.mapv(to_label));
    }
    if let Ok(a) = Array3::<i64>::read_npy(Cursor::new(bytes)) {
        return Some(a.mapv(to_label));
    }
    None
}

fn load_png(path: &Path) -> Result<LabelMask> {
    // Label values must come through unscaled; to_luma16 would rescale
    // 8-bit labels by 257.
    let data = match image::open(path)? {
        image::DynamicImage::ImageLuma8(img) => {
            let (w, h) = img.dimensions();
            let mut data = Array2::<u32>::zeros((h as usize, w as usize));
            for (x, y, pixel) in img.enumerate_pixels() {
                data[[y as usize, x as usize]] = u32::from(pixel.0[0]);
            }
            data
        }
        image::DynamicImage::ImageLuma16(img) => {
            let (w, h) = img.dimensions();
            let mut data = Array2::<u32>::zeros((h as usize, w as usize));
            for (x, y, pixel) in img.enumerate_pixels() {
                data[[y as usize, x as usize]] = u32::from(pixel.0[0]);
            }
            data
        }
        other => {
            return Err(SpotfishError::MaskRead {
                path: path.to_path_buf(),
                reason: format!("unsupported PNG color type {:?}", other.color()),
            })
        }
    };
    Ok(LabelMask::TwoD(data))
}
