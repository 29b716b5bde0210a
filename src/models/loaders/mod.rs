pub mod json_loader;

pub use json_loader::{load_all_record_files, load_record_batch};
