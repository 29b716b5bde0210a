pub mod features;
pub mod loaders;
pub mod question;
pub mod question_type;

pub use features::{AnswerPattern, FeatureVector, FEATURE_DIM, FEATURE_NAMES};
pub use loaders::{load_all_record_files, load_record_batch};
pub use question::{
    ClassificationResult, Evidence, NormalizedQuestionRecord, ParseFlags, ResultSource, TopFeature,
};
pub use question_type::QuestionType;
