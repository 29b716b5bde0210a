//! 批量识别处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量记录的识别和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：启动日志、载入模型产物与校准表（一次性，失败快速退出）
//! 2. **批量加载**：扫描并加载所有待识别的记录（`Vec<NormalizedQuestionRecord>`）
//! 3. **并发控制**：使用 Semaphore 限制识别阶段的并发数量
//! 4. **顺序保持**：输出顺序与输入顺序一致，保证 source_id 可回溯
//! 5. **资源管理**：模型与校准表以 Arc 共享，只读无锁
//! 6. **全局统计**：汇总识别、重构、复核计数
//!
//! ## 设计特点
//!
//! - **识别并发、收尾串行**：recognize 阶段纯函数可并发；
//!   重构需要序列上下文（选项块并回前一题），在收尾阶段按序执行
//! - **向下委托**：具体识别逻辑全部在 pipeline 流程层

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::calibrate::CalibrationTable;
use crate::classifier::StatisticalClassifier;
use crate::config::Config;
use crate::error::{AppError, ConfigError};
use crate::models::load_all_record_files;
use crate::models::question::NormalizedQuestionRecord;
use crate::pipeline::{log_stats, OutputPair, PipelineStats, RecognitionDraft, RecognitionPipeline};
use crate::utils::logging::{init_run_log_file, log_records_loaded, log_startup};

/// 应用主结构
pub struct App {
    config: Config,
    pipeline: Arc<RecognitionPipeline>,
}

impl App {
    /// 初始化应用
    ///
    /// 模型产物与校准表在此一次性载入；校准表损坏或模型产物
    /// 声明了另一套分类体系属于配置错误，在任何记录进入流水线
    /// 之前快速失败
    pub async fn initialize(config: Config) -> Result<Self> {
        if !std::path::Path::new(&config.input_folder).exists() {
            return Err(AppError::Config(ConfigError::InputFolderMissing {
                path: config.input_folder.clone(),
            })
            .into());
        }

        init_run_log_file(&config.run_log_file)?;

        let classifier = StatisticalClassifier::load(&config.model_artifact_path)
            .await
            .with_context(|| "模型产物与推理端不一致，请重新导出产物")?;

        let calibration = CalibrationTable::load(&config.calibration_table_path).await?;

        log_startup(config.max_concurrent_records, classifier.is_available());

        let pipeline = Arc::new(RecognitionPipeline::new(
            Arc::new(classifier),
            Arc::new(calibration),
            &config,
        ));

        Ok(Self { config, pipeline })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        let records = self.load_records().await?;

        if records.is_empty() {
            warn!("⚠️ 没有找到待识别的记录，程序结束");
            return Ok(());
        }

        log_records_loaded(records.len(), self.config.max_concurrent_records);

        // 识别阶段并发，收尾阶段串行
        let drafts = self.recognize_all(records).await?;
        let (pairs, stats) = self.pipeline.finalize(drafts);

        self.write_results(&pairs).await?;
        log_stats(&stats);
        self.log_run_summary(&stats)?;

        Ok(())
    }

    /// 加载记录
    async fn load_records(&self) -> Result<Vec<NormalizedQuestionRecord>> {
        info!("\n📁 正在扫描待识别的记录...");
        load_all_record_files(&self.config.input_folder).await
    }

    /// 并发执行两路识别，结果按输入顺序收集
    async fn recognize_all(
        &self,
        records: Vec<NormalizedQuestionRecord>,
    ) -> Result<Vec<RecognitionDraft>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_records));
        let mut handles = Vec::with_capacity(records.len());

        for record in records {
            let permit = semaphore.clone().acquire_owned().await?;
            let pipeline = self.pipeline.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                pipeline.recognize(&record)
            }));
        }

        // join_all 保持提交顺序，即输入顺序
        let mut drafts = Vec::with_capacity(handles.len());
        for joined in join_all(handles).await {
            drafts.push(joined.context("识别任务执行失败")?);
        }

        Ok(drafts)
    }

    /// 写出结果文件（与输入同序的 record/result 对）
    async fn write_results(&self, pairs: &[OutputPair]) -> Result<()> {
        let json = serde_json::to_string_pretty(pairs)?;
        tokio::fs::write(&self.config.output_file, json)
            .await
            .with_context(|| format!("无法写入结果文件: {}", self.config.output_file))?;

        info!("💾 结果已保存至: {}", self.config.output_file);
        Ok(())
    }

    /// 追加运行摘要到日志文件
    fn log_run_summary(&self, stats: &PipelineStats) -> Result<()> {
        use std::io::Write;

        let summary = format!(
            "总计: {} | 规则: {} | 模型: {} | 仲裁: {} | 重构: {} | 待复核: {}\n",
            stats.total,
            stats.rule_wins,
            stats.model_wins,
            stats.consensus_wins,
            stats.reconstructed,
            stats.manual_review
        );

        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&self.config.run_log_file)?;
        file.write_all(summary.as_bytes())?;
        Ok(())
    }
}
