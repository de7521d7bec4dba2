mod common;

use serde_json::json;

use common::table;
use spotfish_core::error::SpotfishError;
use spotfish_core::meta::AcquisitionInfo;

fn sample_info() -> AcquisitionInfo {
    AcquisitionInfo::from_value(&json!({
        "experiment": {"name": "exp42", "probes": ["p640", "p561"]},
        "preparation": {"fixation": "PFA"},
        "acquisition": {
            "channels": ["640 CSU-W1", "561 CSU-W1"],
            "exposure_ms": [200, 150],
            "objective": "60x"
        }
    }))
    .unwrap()
}

#[test]
fn channels_define_the_row_count() {
    assert_eq!(sample_info().channel_count(), 2);
}

#[test]
fn metadata_joins_by_numeric_channel() {
    let spots = table(
        &["img", "channel", "x", "y"],
        &[
            &["a.tif", "0", "1", "2"],
            &["a.tif", "1", "3", "4"],
            &["a.tif", "7", "5", "6"], // channel outside the mapping
        ],
    );

    let out = sample_info().annotate(&spots, "channel").unwrap();
    assert_eq!(out.len(), 3);

    let name = out.column_index("experiment.name").unwrap();
    let probe = out.column_index("experiment.probes").unwrap();
    let exposure = out.column_index("acquisition.exposure_ms").unwrap();
    let objective = out.column_index("acquisition.objective").unwrap();

    // Scalars repeat; list values explode per channel index.
    assert_eq!(out.value(0, name), "exp42");
    assert_eq!(out.value(0, probe), "p640");
    assert_eq!(out.value(1, probe), "p561");
    assert_eq!(out.value(0, exposure), "200");
    assert_eq!(out.value(1, exposure), "150");
    assert_eq!(out.value(1, objective), "60x");

    // Left join: unmapped channels get empty metadata cells.
    assert_eq!(out.value(2, name), "");
}

#[test]
fn channel_names_become_indices() {
    let spots = table(&["img", "channel"], &[&["a.tif", "0"], &["a.tif", "1"]]);
    let out = sample_info().annotate(&spots, "channel").unwrap();

    let channels = out.column_index("acquisition.channels").unwrap();
    assert_eq!(out.value(0, channels), "0");
    assert_eq!(out.value(1, channels), "1");
}

#[test]
fn missing_channels_key_is_an_error() {
    let result = AcquisitionInfo::from_value(&json!({
        "experiment": {"name": "exp42"},
        "acquisition": {"objective": "60x"}
    }));
    assert!(matches!(result, Err(SpotfishError::MetadataKey(_))));
}
