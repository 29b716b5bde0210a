pub mod rebuilder;

pub use rebuilder::{Reconstructor, Repair};
