pub mod assign;
pub mod mask;
pub mod sensitivity;

pub use assign::{assign_cells, AssignConfig};
pub use mask::{load_mask, LabelMask};
pub use sensitivity::{sensitivity, SensitivityConfig};
