pub mod gaussian;
pub mod lm;

pub use gaussian::{refine_spot, refine_spots, refine_table, GaussianFit};
pub use lm::{LmConfig, LmResult};
