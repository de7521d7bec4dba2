/// Minimum spot count to fan Gaussian refinement out across Rayon threads.
pub const PARALLEL_SPOT_THRESHOLD: usize = 64;

/// Default cubic ROI radius (voxels) for sub-pixel Gaussian refinement.
pub const DEFAULT_REFINE_RADIUS: usize = 5;

/// Default minimum cell area (pixels/voxels) for the sensitivity metric.
/// Regions below this are treated as segmentation artifacts. Tuned for
/// 130 nm pixels; adjust for other instruments.
pub const DEFAULT_MIN_CELL_AREA: usize = 50_000;

/// Default physical voxel size in nm, (z, y, x), for the pairing distance.
pub const DEFAULT_VOXEL_SIZE: [f64; 3] = [300.0, 130.0, 130.0];

/// Filename suffix Cellpose appends to segmentation mask files.
pub const DEFAULT_MASK_SUFFIX: &str = "_cp_masks";

/// Stage axis directions relative to pixel coordinates, (z, y, x).
pub const STAGE_DIRECTIONS_DEFAULT: [f64; 3] = [1.0, 1.0, -1.0];

/// Scan axis directions relative to pixel coordinates, (z, y, x).
pub const SCAN_DIRECTIONS_DEFAULT: [f64; 3] = [1.0, 1.0, 1.0];

/// Column recording the reference channel after chromatic-shift correction.
pub const SHIFT_REFERENCE_COLUMN: &str = "shift_reference_channel";

/// Spot-specific columns excluded when joining acquisition metadata
/// onto per-cell sensitivity rows.
pub const SPOT_SPECIFIC_COLUMNS: [&str; 10] = [
    "x",
    "y",
    "z",
    "spot_idx",
    "channel",
    "t",
    "c",
    "intensity",
    "cell",
    "whole_cell",
];
