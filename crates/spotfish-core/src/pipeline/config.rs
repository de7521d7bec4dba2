use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_MASK_SUFFIX, DEFAULT_VOXEL_SIZE};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory of per-image detection CSVs.
    pub detections: PathBuf,
    /// Directory for stage outputs.
    pub output: PathBuf,
    /// Directory of resaved tif stacks; prefixes `img` values when set.
    pub tif_dir: Option<PathBuf>,
    /// `acquisition_info.json` sidecar; joined onto spots when set.
    pub acquisition_info: Option<PathBuf>,
    pub shift: Option<ShiftStageConfig>,
    pub cells: Option<CellStageConfig>,
    pub pairing: Option<PairingStageConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShiftStageConfig {
    /// Transform catalog JSON.
    pub transforms: PathBuf,
    pub reference_channel: String,
    pub unit_columns: Option<[String; 3]>,
    pub pixel_columns: Option<[String; 3]>,
    pub pixel_size: Option<[f64; 3]>,
    #[serde(default = "default_channel_column")]
    pub channel_column: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CellStageConfig {
    /// Directory of segmentation masks (`.npy`/`.png`).
    pub masks: PathBuf,
    #[serde(default = "default_true")]
    pub filter_unassigned: bool,
    #[serde(default = "default_mask_suffix")]
    pub mask_suffix: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PairingStageConfig {
    pub channels: [String; 2],
    #[serde(default = "default_voxel_size")]
    pub voxel_size: [f64; 3],
}

fn default_channel_column() -> String {
    "channel".to_string()
}

fn default_true() -> bool {
    true
}

fn default_mask_suffix() -> String {
    DEFAULT_MASK_SUFFIX.to_string()
}

fn default_voxel_size() -> [f64; 3] {
    DEFAULT_VOXEL_SIZE
}
