pub mod combine;
pub mod spots_csv;

pub use combine::{combine_detections, CombineOutcome, CombineReport};
pub use spots_csv::{read_spot_table, write_spot_table};
