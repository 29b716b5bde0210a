use serde::Deserialize;

use crate::models::question_type::QuestionType;

/// 各题型的人工复核阈值
///
/// 已裁决结果的校准置信度低于对应阈值时标记复核（题型保留）
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct ReviewThresholds {
    #[serde(default = "default_threshold")]
    pub single_choice: f64,
    #[serde(default = "default_threshold")]
    pub multiple_choice: f64,
    #[serde(default = "default_threshold")]
    pub true_false: f64,
    #[serde(default = "default_threshold")]
    pub fill_blank: f64,
    #[serde(default = "default_threshold")]
    pub subjective: f64,
}

fn default_threshold() -> f64 {
    0.5
}

impl Default for ReviewThresholds {
    fn default() -> Self {
        Self {
            single_choice: 0.5,
            multiple_choice: 0.5,
            true_false: 0.5,
            fill_blank: 0.5,
            subjective: 0.5,
        }
    }
}

impl ReviewThresholds {
    pub fn for_type(&self, question_type: QuestionType) -> f64 {
        match question_type {
            QuestionType::SingleChoice => self.single_choice,
            QuestionType::MultipleChoice => self.multiple_choice,
            QuestionType::TrueFalse => self.true_false,
            QuestionType::FillBlank => self.fill_blank,
            QuestionType::Subjective => self.subjective,
        }
    }
}

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 同时处理的记录数量
    pub max_concurrent_records: usize,
    /// 记录 JSON 文件存放目录（上游解析器的输出）
    pub input_folder: String,
    /// 分类结果输出文件
    pub output_file: String,
    /// 运行日志文件
    pub run_log_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- 模型与校准 ---
    pub model_artifact_path: String,
    pub calibration_table_path: String,
    // --- 阈值 ---
    /// 低置信度统计阈值
    pub min_confidence: f64,
    /// 各题型复核阈值
    pub review_thresholds: ReviewThresholds,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_records: 64,
            input_folder: "input_records".to_string(),
            output_file: "classification_results.json".to_string(),
            run_log_file: "output.txt".to_string(),
            verbose_logging: false,
            model_artifact_path: "model/gbdt_model.json".to_string(),
            calibration_table_path: "model/calibration_table.json".to_string(),
            min_confidence: 0.4,
            review_thresholds: ReviewThresholds::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_concurrent_records: std::env::var("MAX_CONCURRENT_RECORDS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent_records),
            input_folder: std::env::var("INPUT_FOLDER").unwrap_or(default.input_folder),
            output_file: std::env::var("OUTPUT_FILE").unwrap_or(default.output_file),
            run_log_file: std::env::var("RUN_LOG_FILE").unwrap_or(default.run_log_file),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            model_artifact_path: std::env::var("MODEL_ARTIFACT_PATH").unwrap_or(default.model_artifact_path),
            calibration_table_path: std::env::var("CALIBRATION_TABLE_PATH").unwrap_or(default.calibration_table_path),
            min_confidence: std::env::var("MIN_CONFIDENCE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.min_confidence),
            review_thresholds: default.review_thresholds,
        }
    }

    /// 从 TOML 配置文件加载，环境变量优先级更高
    ///
    /// 配置文件不存在时直接使用环境变量 + 默认值
    pub fn load(config_path: &str) -> anyhow::Result<Self> {
        let from_env = Self::from_env();
        let path = std::path::Path::new(config_path);
        if !path.exists() {
            return Ok(from_env);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("无法读取配置文件 ({}): {}", config_path, e))?;
        let file_config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("无法解析配置文件 ({}): {}", config_path, e))?;

        // 环境变量显式设置的项覆盖文件值
        Ok(Self {
            max_concurrent_records: env_or("MAX_CONCURRENT_RECORDS", file_config.max_concurrent_records),
            input_folder: std::env::var("INPUT_FOLDER").unwrap_or(file_config.input_folder),
            output_file: std::env::var("OUTPUT_FILE").unwrap_or(file_config.output_file),
            run_log_file: std::env::var("RUN_LOG_FILE").unwrap_or(file_config.run_log_file),
            verbose_logging: env_or("VERBOSE_LOGGING", file_config.verbose_logging),
            model_artifact_path: std::env::var("MODEL_ARTIFACT_PATH").unwrap_or(file_config.model_artifact_path),
            calibration_table_path: std::env::var("CALIBRATION_TABLE_PATH").unwrap_or(file_config.calibration_table_path),
            min_confidence: env_or("MIN_CONFIDENCE", file_config.min_confidence),
            review_thresholds: file_config.review_thresholds,
        })
    }
}

fn env_or<T: std::str::FromStr>(var_name: &str, fallback: T) -> T {
    std::env::var(var_name).ok().and_then(|v| v.parse().ok()).unwrap_or(fallback)
}
