mod common;

use std::collections::HashMap;

use approx::assert_abs_diff_eq;

use common::{gaussian_volume, table};
use spotfish_core::refine::{refine_spot, refine_table, LmConfig};

#[test]
fn known_gaussian_is_recovered() {
    let center = [10.3, 9.7, 10.2];
    let sigma = [1.5, 1.2, 1.1];
    let volume = gaussian_volume(21, center, sigma, 100.0, 10.0);

    let fit = refine_spot(&volume.view(), [10, 10, 10], 5, &LmConfig::default())
        .expect("fit converges on a clean blob");

    for i in 0..3 {
        assert_abs_diff_eq!(fit.center[i], center[i], epsilon = 0.1);
        assert_abs_diff_eq!(fit.sigma[i], sigma[i], epsilon = 0.1);
    }
    assert_abs_diff_eq!(fit.amplitude, 100.0, epsilon = 1.0);
    assert_abs_diff_eq!(fit.background, 10.0, epsilon = 1.0);
}

#[test]
fn roi_leaving_the_image_drops_the_spot() {
    let volume = gaussian_volume(21, [10.0, 10.0, 10.0], [1.5, 1.5, 1.5], 50.0, 5.0);

    // Radius 5 around z=2 would need z=-3.
    assert!(refine_spot(&volume.view(), [2, 10, 10], 5, &LmConfig::default()).is_none());
    assert!(refine_spot(&volume.view(), [10, 19, 10], 5, &LmConfig::default()).is_none());
}

#[test]
fn refine_table_replaces_coordinates_and_appends_fit_columns() {
    let center = [9.8, 10.4, 10.1];
    let volume = gaussian_volume(21, center, [1.4, 1.4, 1.4], 80.0, 8.0);
    let volumes: HashMap<_, _> = [("imgA.tif".to_string(), volume)].into_iter().collect();

    let spots = table(
        &["img", "channel", "z", "y", "x", "intensity"],
        &[
            &["imgA.tif", "0", "10", "10", "10", "88"],
            // ROI out of bounds: dropped from the refined output.
            &["imgA.tif", "0", "1", "10", "10", "12"],
            // No volume for this image: dropped as well.
            &["imgB.tif", "0", "10", "10", "10", "55"],
        ],
    );

    let out = refine_table(&spots, &volumes, Some(5), &LmConfig::default()).unwrap();
    assert_eq!(out.len(), 1);

    let z = out.f64_column("z").unwrap();
    let y = out.f64_column("y").unwrap();
    let x = out.f64_column("x").unwrap();
    assert_abs_diff_eq!(z[0], center[0], epsilon = 0.1);
    assert_abs_diff_eq!(y[0], center[1], epsilon = 0.1);
    assert_abs_diff_eq!(x[0], center[2], epsilon = 0.1);

    for column in ["sigma_z", "sigma_y", "sigma_x", "amplitude", "background"] {
        assert!(out.column_index(column).is_some(), "missing {column}");
    }
    // Untouched metadata survives refinement.
    assert_eq!(out.value(0, out.column_index("intensity").unwrap()), "88");
}
