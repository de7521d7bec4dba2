use approx::assert_abs_diff_eq;
use ndarray::array;
use serde_json::json;

use spotfish_core::error::SpotfishError;
use spotfish_core::transform::scan_field::{
    from_imspector_xml, from_measurement_json, load_scan_directions, load_stage_directions,
    recursive_query, world_transform_to_pixel_transform,
};
use spotfish_core::transform::{apply_affine, pixel_to_world, world_to_pixel, ScanFieldMetadata};

fn sample_metadata() -> ScanFieldMetadata {
    ScanFieldMetadata {
        stage_offset: [5.0, -3.0, 2.0],
        stage_offset_global: [0.5, 0.5, 0.5],
        scan_offset: [1.0, 2.0, 3.0],
        scan_offset_global: [0.0, -1.0, 0.0],
        fov_length: [10.0, 80.0, 80.0],
        pixel_size: [0.5, 0.1, 0.1],
        stage_direction: [1.0, 1.0, -1.0],
        scan_direction: [1.0, 1.0, 1.0],
    }
}

#[test]
fn pixel_world_round_trip() {
    let meta = sample_metadata();
    let pixels = array![[0.0, 0.0, 0.0], [3.0, 17.5, 41.25], [19.0, 799.0, 1.0]];

    let world = pixel_to_world(&pixels.view(), &meta);
    let back = world_to_pixel(&world.view(), &meta);
    for (a, b) in back.iter().zip(pixels.iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
    }
}

#[test]
fn origin_respects_axis_directions() {
    let meta = sample_metadata();
    let origin = meta.origin();

    // z: scan (1 + 0) + stage (5 + 0.5) - fov/2 (5) = 1.5
    assert_abs_diff_eq!(origin[0], 1.5, epsilon = 1e-12);
    // y: scan (2 - 1) + stage (-3 + 0.5) - 40 = -41.5
    assert_abs_diff_eq!(origin[1], -41.5, epsilon = 1e-12);
    // x: scan (3 + 0) + stage -(2 + 0.5) - 40 = -39.5
    assert_abs_diff_eq!(origin[2], -39.5, epsilon = 1e-12);
}

#[test]
fn identity_world_transform_maps_pixels_between_frames() {
    // Two acquisitions of the same field: world transform is identity, but
    // differing origins and pixel sizes must still compose correctly.
    let origin_ref = [0.0, 10.0, 10.0];
    let origin_moving = [0.0, 12.0, 13.0];
    let pixel_size_ref = [1.0, 0.5, 0.5];
    let pixel_size_moving = [1.0, 1.0, 1.0];

    let identity = ndarray::Array2::<f64>::eye(4);
    let m = world_transform_to_pixel_transform(
        &identity.view(),
        &origin_ref,
        &origin_moving,
        &pixel_size_ref,
        &pixel_size_moving,
    )
    .unwrap();

    // Moving pixel (0, 0, 0) sits at world (0, 12, 13), which is reference
    // pixel (0, 4, 6).
    let out = apply_affine(&m.view(), &array![[0.0, 0.0, 0.0]].view());
    assert_abs_diff_eq!(out[[0, 0]], 0.0, epsilon = 1e-9);
    assert_abs_diff_eq!(out[[0, 1]], 4.0, epsilon = 1e-9);
    assert_abs_diff_eq!(out[[0, 2]], 6.0, epsilon = 1e-9);
}

const SCAN_RANGE_XML: &str = r#"<root>
  <doc>
    <ExpControl>
      <scan>
        <range>
          <coarse_z><off>5.0</off><g_off>0.5</g_off></coarse_z>
          <coarse_y><off>-3.0</off><g_off>0.5</g_off></coarse_y>
          <coarse_x><off>2.0</off><g_off>0.5</g_off></coarse_x>
          <z><off>1.0</off><g_off>0.0</g_off><len>10.0</len><psz>0.5</psz></z>
          <y><off>2.0</off><g_off>-1.0</g_off><len>80.0</len><psz>0.1</psz></y>
          <x><off>3.0</off><g_off>0.0</g_off><len>80.0</len><psz>0.1</psz></x>
        </range>
      </scan>
    </ExpControl>
  </doc>
</root>"#;

#[test]
fn xml_parser_reads_scan_range() {
    let meta = from_imspector_xml(SCAN_RANGE_XML).unwrap();
    assert_eq!(meta, sample_metadata());
}

#[test]
fn xml_parser_fails_on_missing_axis() {
    let truncated = SCAN_RANGE_XML.replace("<psz>0.1</psz></x>", "</x>");
    match from_imspector_xml(&truncated) {
        Err(SpotfishError::MetadataKey(key)) => assert_eq!(key, "x/psz"),
        other => panic!("expected MetadataKey error, got {other:?}"),
    }
}

fn sample_hardware() -> serde_json::Value {
    json!({
        "OlympusIX": {"stage": {"invert_x": true, "invert_y": false}},
        "ExpControl": {"calibration": {"scan": {
            "flip_x_axis": false, "flip_y_axis": false, "flip_z_axis": true
        }}}
    })
}

#[test]
fn json_parser_agrees_with_xml() {
    let measurement = json!({
        "ExpControl": {"scan": {"range": {
            "coarse_z": {"off": 5.0, "g_off": 0.5},
            "coarse_y": {"off": -3.0, "g_off": 0.5},
            "coarse_x": {"off": 2.0, "g_off": 0.5},
            "z": {"off": 1.0, "g_off": 0.0, "len": 10.0, "psz": 0.5},
            "y": {"off": 2.0, "g_off": -1.0, "len": 80.0, "psz": 0.1},
            "x": {"off": 3.0, "g_off": 0.0, "len": 80.0, "psz": 0.1}
        }}}
    });

    let meta = from_measurement_json(&measurement, &sample_hardware()).unwrap();
    let from_xml = from_imspector_xml(SCAN_RANGE_XML).unwrap();

    // Offsets agree; directions come from the hardware flags instead of the
    // defaults the XML path falls back to.
    assert_eq!(meta.stage_offset, from_xml.stage_offset);
    assert_eq!(meta.scan_offset, from_xml.scan_offset);
    assert_eq!(meta.fov_length, from_xml.fov_length);
    assert_eq!(meta.pixel_size, from_xml.pixel_size);
    assert_eq!(meta.stage_direction, [1.0, 1.0, -1.0]);
    assert_eq!(meta.scan_direction, [1.0, 1.0, 1.0]);
}

#[test]
fn direction_flags_map_to_signs() {
    let stage = load_stage_directions(&sample_hardware()).unwrap();
    assert_eq!(stage, [1.0, 1.0, -1.0]);

    let scan = load_scan_directions(&sample_hardware()).unwrap();
    // Flipped z runs with the stage; unflipped x/y stay positive.
    assert_eq!(scan, [1.0, 1.0, 1.0]);

    let missing = json!({"OlympusIX": {"stage": {"invert_x": true}}});
    assert!(matches!(
        load_stage_directions(&missing),
        Err(SpotfishError::MetadataKey(_))
    ));
}

#[test]
fn recursive_query_descends_through_wrappers() {
    let value = json!({"outer": {"noise": 1, "ExpControl": {"scan": {"range": 42}}}});
    let found = recursive_query(&value, "ExpControl/scan/range").unwrap();
    assert_eq!(found.as_i64(), Some(42));
    assert!(recursive_query(&value, "ExpControl/missing").is_none());
}
