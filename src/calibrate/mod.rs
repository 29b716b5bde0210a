pub mod table;

pub use table::{BucketStats, CalibrationTable, IsotonicMapping};
