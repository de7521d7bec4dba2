//! End-to-end pipeline run over a synthetic acquisition: two channels of
//! one image, an identity transform catalog, acquisition metadata, and a
//! segmentation mask.

use std::fs::{self, File};

use ndarray::Array2;
use ndarray_npy::WriteNpyExt;
use serde_json::json;

use spotfish_core::consts::SHIFT_REFERENCE_COLUMN;
use spotfish_core::io::spots_csv::read_spot_table;
use spotfish_core::pipeline::config::{
    CellStageConfig, PairingStageConfig, PipelineConfig, ShiftStageConfig,
};
use spotfish_core::pipeline::run_pipeline;

#[test]
fn pipeline_runs_all_stages() {
    let dir = tempfile::tempdir().unwrap();
    let detections = dir.path().join("detections");
    let masks = dir.path().join("masks");
    let output = dir.path().join("out");
    fs::create_dir_all(&detections).unwrap();
    fs::create_dir_all(&masks).unwrap();

    // Two detection CSVs, one per channel, same image position.
    fs::write(
        detections.join("RS_results_posA_ch0.tif_aniso_1.0.csv"),
        "x,y,z,intensity\n10,20,3,100\n40,45,3,110\n",
    )
    .unwrap();
    fs::write(
        detections.join("RS_results_posA_ch1.tif_aniso_1.0.csv"),
        "x,y,z,intensity\n11,20,3,200\n41,45,3,210\n",
    )
    .unwrap();

    // Identity transforms into reference channel "0".
    let identity: Vec<f64> = (0..16)
        .map(|i| if i % 5 == 0 { 1.0 } else { 0.0 })
        .collect();
    fs::write(
        dir.path().join("transforms.json"),
        serde_json::to_string(&json!({
            "transforms": [
                {"channels": ["0", "0"], "parameters": identity.clone()},
                {"channels": ["1", "0"], "parameters": identity},
            ]
        }))
        .unwrap(),
    )
    .unwrap();

    fs::write(
        dir.path().join("acquisition_info.json"),
        serde_json::to_string(&json!({
            "experiment": {"name": "integration"},
            "preparation": {},
            "acquisition": {"channels": ["ch-a", "ch-b"]}
        }))
        .unwrap(),
    )
    .unwrap();

    // One large interior cell covering both spot positions.
    let mut mask = Array2::<u16>::zeros((64, 64));
    for y in 5..60 {
        for x in 5..60 {
            mask[[y, x]] = 1;
        }
    }
    mask.write_npy(File::create(masks.join("posA_cp_masks.npy")).unwrap()).unwrap();

    let config = PipelineConfig {
        detections,
        output: output.clone(),
        tif_dir: None,
        acquisition_info: Some(dir.path().join("acquisition_info.json")),
        shift: Some(ShiftStageConfig {
            transforms: dir.path().join("transforms.json"),
            reference_channel: "0".to_string(),
            unit_columns: None,
            pixel_columns: Some(["x".to_string(), "y".to_string(), "z".to_string()]),
            pixel_size: Some([0.13, 0.13, 0.3]),
            channel_column: "channel".to_string(),
        }),
        cells: Some(CellStageConfig {
            masks,
            filter_unassigned: true,
            mask_suffix: "_cp_masks".to_string(),
        }),
        pairing: Some(PairingStageConfig {
            channels: ["0".to_string(), "1".to_string()],
            voxel_size: [300.0, 130.0, 130.0],
        }),
    };

    let result = run_pipeline(&config).unwrap();
    assert_eq!(result.merged_rows, 4);
    assert_eq!(result.skipped_files, 0);
    assert_eq!(result.outputs.len(), 4);

    // Merge: all four spots, annotated with acquisition metadata.
    let merged = read_spot_table(&output.join("merge.csv")).unwrap();
    assert_eq!(merged.len(), 4);
    assert!(merged.column_index("experiment.name").is_some());

    // Shift correction under identity transforms changes nothing.
    let corrected = read_spot_table(&output.join("merge_shift-corrected.csv")).unwrap();
    let x = corrected.f64_column("x").unwrap();
    assert_eq!(x, vec![10.0, 40.0, 11.0, 41.0]);
    let reference = corrected.column_index(SHIFT_REFERENCE_COLUMN).unwrap();
    assert_eq!(corrected.value(0, reference), "0");

    // All spots sit inside the one whole cell.
    let in_cells = read_spot_table(&output.join("spots_in_cells.csv")).unwrap();
    assert_eq!(in_cells.len(), 4);
    let cell = in_cells.column_index("cell").unwrap();
    assert!(in_cells.rows().iter().all(|row| row[cell] == "1"));

    // Pairing matches spots one-to-one per acquisition.
    let pairs = read_spot_table(&output.join("spot_pairs.csv")).unwrap();
    assert_eq!(pairs.len(), 2);
    let distance = pairs.f64_column("distance_um").unwrap();
    assert!(distance.iter().all(|&d| (d - 130.0).abs() < 1e-6));
}
