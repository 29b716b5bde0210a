//! 题型识别流水线 - 流程层
//!
//! 定义"一条记录"的完整识别流程：
//! 1. 特征提取 → 规则引擎与统计模型两路独立识别
//! 2. 两路冲突或双双失败时触发重构（每条血缘至多一次）
//! 3. 重构产出的记录重新提取、重新识别
//! 4. 双通道仲裁 + 校准，必得唯一结果
//!
//! 流水线不持有可变状态，同一实例可跨工作线程共享

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::arbiter::DualSystemArbiter;
use crate::calibrate::CalibrationTable;
use crate::classifier::{ModelPrediction, StatisticalClassifier};
use crate::config::{Config, ReviewThresholds};
use crate::features::FeatureExtractor;
use crate::models::features::FeatureVector;
use crate::models::question::{ClassificationResult, NormalizedQuestionRecord, ResultSource};
use crate::reconstruct::{Reconstructor, Repair};
use crate::rules::{RuleDecision, RuleEngine};

/// 单条记录的两路识别草稿（仲裁前的中间态）
#[derive(Debug)]
pub struct RecognitionDraft {
    pub record: NormalizedQuestionRecord,
    pub features: FeatureVector,
    pub rule_decision: Option<RuleDecision>,
    pub model_prediction: Option<ModelPrediction>,
}

/// 输出对：记录与其唯一分类结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputPair {
    pub record: NormalizedQuestionRecord,
    pub result: ClassificationResult,
}

/// 流水线统计
#[derive(Debug, Default, Clone)]
pub struct PipelineStats {
    pub total: usize,
    pub rule_wins: usize,
    pub model_wins: usize,
    pub consensus_wins: usize,
    pub reconstructed: usize,
    pub manual_review: usize,
    pub low_confidence: usize,
}

/// 题型识别流水线
pub struct RecognitionPipeline {
    extractor: FeatureExtractor,
    rule_engine: RuleEngine,
    reconstructor: Reconstructor,
    arbiter: DualSystemArbiter,
    classifier: Arc<StatisticalClassifier>,
    calibration: Arc<CalibrationTable>,
    review_thresholds: ReviewThresholds,
    min_confidence: f64,
}

impl RecognitionPipeline {
    /// 创建流水线
    ///
    /// 分类器与校准表是进程级只读共享状态，由启动流程载入
    pub fn new(
        classifier: Arc<StatisticalClassifier>,
        calibration: Arc<CalibrationTable>,
        config: &Config,
    ) -> Self {
        if let Some(reason) = classifier.unavailable_reason() {
            warn!("⚠️ 流水线以纯规则模式运行: {}", reason);
        }
        Self {
            extractor: FeatureExtractor::new(),
            rule_engine: RuleEngine::new(),
            reconstructor: Reconstructor::new(),
            arbiter: DualSystemArbiter::new(),
            classifier,
            calibration,
            review_thresholds: config.review_thresholds,
            min_confidence: config.min_confidence,
        }
    }

    /// 两路识别：特征提取 + 规则 + 模型
    ///
    /// 纯计算，无副作用，可安全并发调用
    pub fn recognize(&self, record: &NormalizedQuestionRecord) -> RecognitionDraft {
        debug!("[{}] 题干: {}", record.source_id, record.stem_preview());

        let features = self.extractor.extract(record);
        let rule_decision = self.rule_engine.apply(record, &features);
        let model_prediction = self.classifier.predict(&features);

        RecognitionDraft {
            record: record.clone(),
            features,
            rule_decision,
            model_prediction,
        }
    }

    /// 收尾：重构修复 + 仲裁 + 复核阈值
    ///
    /// 重构需要序列上下文（选项块并回前一题），必须按输入顺序执行；
    /// 输出顺序与输入顺序一致
    pub fn finalize(&self, drafts: Vec<RecognitionDraft>) -> (Vec<OutputPair>, PipelineStats) {
        let mut stats = PipelineStats::default();
        let mut finals: Vec<RecognitionDraft> = Vec::with_capacity(drafts.len());

        for draft in drafts {
            let conflicted = DualSystemArbiter::needs_reconstruction(
                draft.rule_decision.as_ref(),
                draft.model_prediction.as_ref(),
            );

            if conflicted && !draft.record.parse_flags.reconstructed() {
                let previous = finals.last().map(|d| &d.record);
                match self.reconstructor.try_repair(&draft.record, previous) {
                    Repair::MergedIntoPrevious { merged } => {
                        debug!("选项块并回前题并重新识别: {}", merged.source_id);
                        let redone = self.recognize(&merged);
                        if let Some(last) = finals.last_mut() {
                            *last = redone;
                        }
                        stats.reconstructed += 1;
                        continue;
                    }
                    Repair::Split { derived } => {
                        debug!("熔接记录拆分并重新识别: {}", derived.source_id);
                        finals.push(self.recognize(&derived));
                        stats.reconstructed += 1;
                        continue;
                    }
                    Repair::None => {}
                }
            }

            finals.push(draft);
        }

        let mut pairs = Vec::with_capacity(finals.len());
        for draft in finals {
            let mut result = self.arbiter.arbitrate(
                &draft.record,
                &draft.features,
                draft.rule_decision.as_ref(),
                draft.model_prediction.as_ref(),
                &self.calibration,
            );

            // 低置信度的已裁决结果保留题型但标记复核
            if let Some(question_type) = result.question_type {
                let threshold = self.review_thresholds.for_type(question_type);
                if result.confidence < threshold {
                    result.needs_manual_review = true;
                    result.explanations.push(format!(
                        "置信度 {:.2} 低于{}复核阈值 {:.2}",
                        result.confidence,
                        question_type.name(),
                        threshold
                    ));
                }
            }

            stats.total += 1;
            match result.source {
                ResultSource::Rule => stats.rule_wins += 1,
                ResultSource::Model => stats.model_wins += 1,
                ResultSource::Consensus => stats.consensus_wins += 1,
            }
            if result.needs_manual_review {
                stats.manual_review += 1;
            }
            if result.question_type.is_some() && result.confidence < self.min_confidence {
                stats.low_confidence += 1;
            }

            pairs.push(OutputPair {
                record: draft.record,
                result,
            });
        }

        (pairs, stats)
    }

    /// 便捷入口：顺序识别一批记录
    ///
    /// 批量编排层对 recognize 阶段做并发，这里提供的是
    /// 单线程等价流程（测试与离线评估使用）
    pub fn classify_batch(
        &self,
        records: &[NormalizedQuestionRecord],
    ) -> (Vec<OutputPair>, PipelineStats) {
        let drafts = records.iter().map(|r| self.recognize(r)).collect();
        self.finalize(drafts)
    }

    pub fn classifier_available(&self) -> bool {
        self.classifier.is_available()
    }
}

/// 输出批次统计
pub fn log_stats(stats: &PipelineStats) {
    info!("\n{}", "=".repeat(60));
    info!("📊 识别完成统计");
    info!("完成时间: {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
    info!("{}", "=".repeat(60));
    info!("✅ 总记录数: {}", stats.total);
    info!("📐 规则判定: {} / 🤖 模型判定: {} / ⚖️ 仲裁判定: {}",
        stats.rule_wins, stats.model_wins, stats.consensus_wins);
    info!("🔧 重构修复: {}", stats.reconstructed);
    info!("⚠️ 待人工复核: {} (低置信度 {})", stats.manual_review, stats.low_confidence);
    info!("{}", "=".repeat(60));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::classifier::test_util::tiny_artifact;
    use crate::models::question::ParseFlags;
    use crate::models::question_type::QuestionType;

    fn record(id: &str, stem: &str, answer: &str, options: &[(char, &str)]) -> NormalizedQuestionRecord {
        NormalizedQuestionRecord {
            source_id: id.to_string(),
            question_text: stem.to_string(),
            options: options
                .iter()
                .map(|(k, v)| (*k, v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            answer_raw: answer.to_string(),
            explanation_raw: None,
            layout_score: 0.9,
            parse_flags: ParseFlags::default(),
        }
    }

    fn pipeline() -> RecognitionPipeline {
        let classifier =
            StatisticalClassifier::from_artifact(tiny_artifact()).expect("测试产物应合法");
        RecognitionPipeline::new(
            Arc::new(classifier),
            Arc::new(CalibrationTable::identity()),
            &Config::default(),
        )
    }

    fn rule_only_pipeline() -> RecognitionPipeline {
        RecognitionPipeline::new(
            Arc::new(StatisticalClassifier::unavailable("测试: 产物缺失")),
            Arc::new(CalibrationTable::identity()),
            &Config::default(),
        )
    }

    #[test]
    fn test_single_choice_end_to_end() {
        let records = vec![record(
            "t#q1",
            "下列关于验电操作的说法，正确的是（ ）",
            "B",
            &[('A', "不验电"), ('B', "先验电后接地"), ('C', "带电合闸"), ('D', "随意操作")],
        )];

        let (pairs, stats) = pipeline().classify_batch(&records);

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].result.question_type, Some(QuestionType::SingleChoice));
        assert_eq!(stats.total, 1);
    }

    #[test]
    fn test_every_record_gets_exactly_one_result() {
        let records = vec![
            record("t#q1", "该说法是否正确。", "√", &[]),
            record("t#q2", "信息完全不足", "", &[]),
            record("t#q3", "额定电压为____伏", "220", &[]),
        ];

        let (pairs, stats) = pipeline().classify_batch(&records);

        assert_eq!(pairs.len(), records.len());
        assert_eq!(stats.total, records.len());
        // 每条结果要么是五种题型之一，要么标记人工复核——绝无未知
        for pair in &pairs {
            assert!(pair.result.question_type.is_some() || pair.result.needs_manual_review);
        }
    }

    #[test]
    fn test_option_block_merged_and_reclassified() {
        let records = vec![
            record("t#q1", "停电检修的正确顺序是（ ）", "B", &[]),
            record("t#q2", "A、断开电源 B、验电 C、装设接地线 D、悬挂标示牌", "", &[]),
        ];

        let (pairs, stats) = pipeline().classify_batch(&records);

        // 选项块被并回前题，两条输入产出一条结果
        assert_eq!(pairs.len(), 1);
        assert_eq!(stats.reconstructed, 1);
        assert_eq!(pairs[0].record.source_id, "t#q1");
        assert_eq!(pairs[0].record.options.len(), 4);
        assert_eq!(pairs[0].result.question_type, Some(QuestionType::SingleChoice));
    }

    #[test]
    fn test_reconstruction_round_trip_matches_unsplit_original() {
        let original = record(
            "t#q1",
            "停电检修的正确顺序是（ ）",
            "B",
            &[('A', "断开电源"), ('B', "验电"), ('C', "装设接地线"), ('D', "悬挂标示牌")],
        );
        let (original_pairs, _) = pipeline().classify_batch(std::slice::from_ref(&original));

        let split = vec![
            record("t#q1", "停电检修的正确顺序是（ ）", "B", &[]),
            record("t#q2", "A、断开电源 B、验电 C、装设接地线 D、悬挂标示牌", "", &[]),
        ];
        let (merged_pairs, _) = pipeline().classify_batch(&split);

        assert_eq!(merged_pairs.len(), 1);
        assert_eq!(merged_pairs[0].record.options, original.options);
        assert_eq!(
            merged_pairs[0].result.question_type,
            original_pairs[0].result.question_type
        );
    }

    #[test]
    fn test_fused_answer_without_options_goes_to_manual_review() {
        // 题干内嵌括号答案但无法恢复选项：拆出答案后仍不能臆断单选
        let records = vec![record(
            "t#q1",
            "13．检修工作（ A )应进行工作布置，明确人员分工",
            "(A)",
            &[],
        )];

        let (pairs, stats) = rule_only_pipeline().classify_batch(&records);

        assert_eq!(pairs.len(), 1);
        assert_eq!(stats.reconstructed, 1);
        let result = &pairs[0].result;
        assert!(result.needs_manual_review);
        assert_eq!(result.lineage, "t#q1");
    }

    #[test]
    fn test_idempotent_on_already_reconstructed_record() {
        let mut repaired = record("t#q1#r1", "下列正确的是（ ）", "", &[]);
        repaired.parse_flags.answer_split = true;

        let pipeline = rule_only_pipeline();
        let (first_pairs, first_stats) = pipeline.classify_batch(std::slice::from_ref(&repaired));
        assert_eq!(first_stats.reconstructed, 0);

        // 对输出记录再跑一遍，结果不变、不再触发重构
        let (second_pairs, second_stats) =
            pipeline.classify_batch(std::slice::from_ref(&first_pairs[0].record));
        assert_eq!(second_stats.reconstructed, 0);
        assert_eq!(
            first_pairs[0].result.question_type,
            second_pairs[0].result.question_type
        );
        assert_eq!(first_pairs[0].result.confidence, second_pairs[0].result.confidence);
    }

    #[test]
    fn test_rule_only_mode_still_covers_all_records() {
        let records = vec![
            record("t#q1", "该说法是否正确。", "对", &[]),
            record("t#q2", "下列正确的是（ ）", "A", &[('A', "甲"), ('B', "乙")]),
        ];

        let pipeline = rule_only_pipeline();
        assert!(!pipeline.classifier_available());

        let (pairs, _) = pipeline.classify_batch(&records);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].result.question_type, Some(QuestionType::TrueFalse));
        assert_eq!(pairs[1].result.question_type, Some(QuestionType::SingleChoice));
    }

    #[test]
    fn test_multiple_choice_deterministic() {
        let records = vec![record(
            "t#q1",
            "下列哪些属于安全工器具（ ）",
            "ABD",
            &[('A', "绝缘手套"), ('B', "验电器"), ('C', "普通手套"), ('D', "接地线")],
        )];

        let (pairs, _) = pipeline().classify_batch(&records);
        assert_eq!(pairs[0].result.question_type, Some(QuestionType::MultipleChoice));
        assert_eq!(pairs[0].result.source, ResultSource::Rule);
    }
}
