//! # Question Recog
//!
//! 一个用于批量识别试题题型的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 数据模型层（Models）
//! - `models/` - 规范化记录、特征向量、题型与分类结果
//! - 记录由上游文档解析器（Excel/Word/PDF）产出，本系统不碰原始字节
//!
//! ### ② 业务能力层（Capabilities）
//! - `features/` - 特征提取：记录 → 19 维特征向量（纯函数、全函数）
//! - `rules/` - 强规则引擎：高置信度短路判定，显式"无结论"
//! - `classifier/` - 统计分类器：GBDT 产物推理，缺失时降级
//! - `reconstruct/` - 题目重构器：选项块并回 / 熔接拆分，每血缘至多一次
//! - `arbiter/` - 双通道仲裁：合并两路判定，保证无"未知"输出
//! - `calibrate/` - 校准表：原始置信度 → 与实测精度一致的概率
//!
//! ### ③ 流程层（Pipeline）
//! - `pipeline/` - 定义"一条记录"的完整识别流程
//! - 提取 → 两路识别 → 按需重构 → 仲裁 → 校准
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量识别处理器，管理资源和并发
//! - `evaluation/` - 离线评估与校准表重建（不在识别热路径上）
//!
//! ## 模块结构

pub mod arbiter;
pub mod calibrate;
pub mod classifier;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod reconstruct;
pub mod rules;
pub mod utils;

// 重新导出常用类型
pub use arbiter::DualSystemArbiter;
pub use calibrate::CalibrationTable;
pub use classifier::StatisticalClassifier;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use features::FeatureExtractor;
pub use models::question::{ClassificationResult, NormalizedQuestionRecord};
pub use models::QuestionType;
pub use orchestrator::App;
pub use pipeline::{OutputPair, PipelineStats, RecognitionPipeline};
pub use reconstruct::Reconstructor;
pub use rules::RuleEngine;
