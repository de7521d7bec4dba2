use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpotfishError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Image format error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("No transform for channel pair ({channel} -> {reference})")]
    TransformMissing { channel: String, reference: String },

    #[error("Missing metadata key: {0}")]
    MetadataKey(String),

    #[error("Unsupported mask format: {}", .0.display())]
    UnsupportedMaskFormat(PathBuf),

    #[error("Mask read error ({}): {reason}", .path.display())]
    MaskRead { path: PathBuf, reason: String },

    #[error("Missing column '{0}' in spot table")]
    MissingColumn(String),

    #[error("Invalid value '{value}' in column '{column}', row {row}")]
    InvalidValue {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Singular transform matrix")]
    SingularTransform,
}

pub type Result<T> = std::result::Result<T, SpotfishError>;
