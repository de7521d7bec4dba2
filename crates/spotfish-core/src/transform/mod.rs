pub mod affine;
pub mod catalog;
pub mod scan_field;

pub use affine::{apply_affine, augment, invert_affine, scale_matrix, translation_matrix};
pub use catalog::{AliasResolution, TransformCatalog};
pub use scan_field::{pixel_to_world, world_to_pixel, ScanFieldMetadata};
