mod common;

use std::fs::File;
use std::path::PathBuf;

use ndarray::{Array2, Array3};
use ndarray_npy::WriteNpyExt;

use common::table;
use spotfish_core::cells::{assign_cells, load_mask, sensitivity, AssignConfig, SensitivityConfig};
use spotfish_core::error::SpotfishError;

fn write_npy_2d(dir: &std::path::Path, name: &str, mask: &Array2<u16>) -> PathBuf {
    let path = dir.join(name);
    mask.write_npy(File::create(&path).unwrap()).unwrap();
    path
}

/// 12×12 mask with three foreground blobs of value 1: one touching the
/// border, two interior. Connected-component relabeling numbers them in
/// scan order.
fn three_blob_mask() -> Array2<u16> {
    let mut mask = Array2::<u16>::zeros((12, 12));
    // Blob touching the top-left corner -> label 1, not a whole cell.
    for y in 0..2 {
        for x in 0..2 {
            mask[[y, x]] = 1;
        }
    }
    // Interior blob -> label 2.
    for y in 2..4 {
        for x in 5..7 {
            mask[[y, x]] = 1;
        }
    }
    // Interior blob -> label 3.
    for y in 6..10 {
        for x in 2..10 {
            mask[[y, x]] = 1;
        }
    }
    mask
}

#[test]
fn spot_in_interior_cell_is_labeled_whole() {
    let dir = tempfile::tempdir().unwrap();
    let mask_path = write_npy_2d(dir.path(), "imgA_ch1_cp_masks.npy", &three_blob_mask());

    let spots = table(
        &["img", "channel", "y", "x"],
        &[
            &["imgA.tif", "0", "7", "5"],   // centroid of label 3
            &["imgA.tif", "0", "0", "0"],   // border blob, label 1
            &["imgA.tif", "0", "11", "11"], // background
        ],
    );

    let out = assign_cells(&[mask_path], &spots, &AssignConfig::default()).unwrap();
    // The background spot (cell 0) is filtered.
    assert_eq!(out.len(), 2);

    let cell = out.column_index("cell").unwrap();
    let whole = out.column_index("whole_cell").unwrap();
    assert_eq!(out.value(0, cell), "3");
    assert_eq!(out.value(0, whole), "true");
    assert_eq!(out.value(1, cell), "1");
    assert_eq!(out.value(1, whole), "false");
}

#[test]
fn unfiltered_output_keeps_background_spots() {
    let dir = tempfile::tempdir().unwrap();
    let mask_path = write_npy_2d(dir.path(), "imgA_cp_masks.npy", &three_blob_mask());

    let spots = table(&["img", "channel", "y", "x"], &[&["imgA.tif", "0", "11", "11"]]);
    let config = AssignConfig {
        filter_unassigned: false,
        ..AssignConfig::default()
    };
    let out = assign_cells(&[mask_path], &spots, &config).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out.value(0, out.column_index("cell").unwrap()), "0");
}

#[test]
fn three_dimensional_masks_use_the_z_column() {
    let dir = tempfile::tempdir().unwrap();
    let mut mask = Array3::<u16>::zeros((5, 8, 8));
    for z in 1..4 {
        for y in 2..6 {
            for x in 2..6 {
                mask[[z, y, x]] = 7;
            }
        }
    }
    let path = dir.path().join("imgB_cp_masks.npy");
    mask.write_npy(File::create(&path).unwrap()).unwrap();

    let spots = table(
        &["img", "channel", "z", "y", "x"],
        &[&["imgB.tif", "0", "2", "3", "3"], &["imgB.tif", "0", "0", "0", "0"]],
    );
    let out = assign_cells(&[path], &spots, &AssignConfig::default()).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out.value(0, out.column_index("cell").unwrap()), "1");
    // The blob spans neither z face nor any y/x border.
    assert_eq!(out.value(0, out.column_index("whole_cell").unwrap()), "true");
}

#[test]
fn mask_matching_no_image_yields_empty_output() {
    // Lossy by design: a mask whose derived name matches no img value
    // contributes nothing instead of erroring.
    let dir = tempfile::tempdir().unwrap();
    let mask_path = write_npy_2d(dir.path(), "unrelated_cp_masks.npy", &three_blob_mask());

    let spots = table(&["img", "channel", "y", "x"], &[&["imgA.tif", "0", "7", "5"]]);
    let out = assign_cells(&[mask_path], &spots, &AssignConfig::default()).unwrap();
    assert!(out.is_empty());
}

#[test]
fn unsupported_mask_extension_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("imgA_cp_masks.tif");
    std::fs::write(&path, b"not a mask").unwrap();

    assert!(matches!(
        load_mask(&path),
        Err(SpotfishError::UnsupportedMaskFormat(_))
    ));
}

/// 12×12 sensitivity mask: a 9-pixel cell, a 6-pixel cell with no spots,
/// and a 2-pixel fragment below any reasonable area threshold.
fn sensitivity_mask() -> Array2<u16> {
    let mut mask = Array2::<u16>::zeros((12, 12));
    for y in 2..5 {
        for x in 2..5 {
            mask[[y, x]] = 1; // label 1, area 9
        }
    }
    for y in 2..5 {
        for x in 8..10 {
            mask[[y, x]] = 1; // label 2, area 6
        }
    }
    mask[[7, 7]] = 1;
    mask[[8, 7]] = 1; // label 3, area 2
    mask
}

#[test]
fn sensitivity_counts_spots_per_cell() {
    let dir = tempfile::tempdir().unwrap();
    let mask_path = write_npy_2d(dir.path(), "imgA_ch1_cp_masks.npy", &sensitivity_mask());

    let spots = table(
        &["img", "channel", "y", "x", "intensity", "experiment.name"],
        &[
            &["imgA_ch0.tif", "0", "3", "3", "10", "expX"],
            &["imgA_ch0.tif", "0", "4", "4", "11", "expX"],
            &["imgA_ch0.tif", "0", "7", "7", "12", "expX"], // tiny fragment
        ],
    );
    let config = SensitivityConfig {
        min_cell_area: 4,
        ..SensitivityConfig::default()
    };
    let out = sensitivity(&[mask_path], &spots, &config).unwrap();

    // Cells above the area threshold: label 1 (2 spots) and label 2 (0 spots).
    // The 2-pixel fragment is absent even though it contains a spot.
    assert_eq!(out.len(), 2);

    let cell = out.column_index("cell").unwrap();
    let count = out.column_index("count").unwrap();
    let size = out.column_index("cell_size").unwrap();
    let channel = out.column_index("channel").unwrap();

    assert_eq!(out.value(0, cell), "1");
    assert_eq!(out.value(0, count), "2");
    assert_eq!(out.value(0, size), "9");
    assert_eq!(out.value(0, channel), "0");

    assert_eq!(out.value(1, cell), "2");
    assert_eq!(out.value(1, count), "0");
    assert_eq!(out.value(1, size), "6");

    // Acquisition metadata joined; spot-specific columns dropped.
    let name = out.column_index("experiment.name").unwrap();
    assert_eq!(out.value(0, name), "expX");
    assert!(out.column_index("intensity").is_none());
}

#[test]
fn border_cells_are_not_counted() {
    let dir = tempfile::tempdir().unwrap();
    let mut mask = Array2::<u16>::zeros((12, 12));
    for y in 0..5 {
        for x in 0..5 {
            mask[[y, x]] = 1; // touches the border
        }
    }
    let mask_path = write_npy_2d(dir.path(), "imgA_cp_masks.npy", &mask);

    let spots = table(
        &["img", "channel", "y", "x"],
        &[&["imgA_ch0.tif", "0", "2", "2"]],
    );
    let config = SensitivityConfig {
        min_cell_area: 1,
        ..SensitivityConfig::default()
    };
    let out = sensitivity(&[mask_path], &spots, &config).unwrap();
    assert!(out.is_empty());
}
