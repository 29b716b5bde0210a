pub mod metrics;

pub use metrics::{
    build_calibration_table, calculate_ece, evaluate, load_gold_labels, EvaluationReport, GoldLabel,
};
