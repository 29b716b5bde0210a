pub mod engine;

pub use engine::{RuleDecision, RuleEngine};
