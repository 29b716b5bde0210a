//! 双通道仲裁器 - 业务能力层
//!
//! 以两条独立通道（规则优先 / 模型优先）各得一个候选判定，
//! 再合并为唯一结论。一致则按通道历史精度加权并加成；
//! 不一致则高精度通道胜出并打折；两路皆空时只在有空白标记
//! 证据的空题上落填空兜底，其余一律转人工复核。
//! 这是"不输出未知题型、也不捏造置信度"的落地机制

use tracing::debug;

use crate::calibrate::CalibrationTable;
use crate::classifier::ModelPrediction;
use crate::models::features::FeatureVector;
use crate::models::question::{
    ClassificationResult, Evidence, NormalizedQuestionRecord, ResultSource,
};
use crate::models::question_type::QuestionType;
use crate::rules::RuleDecision;

/// 两通道一致时的置信度加成系数
const AGREEMENT_BONUS: f64 = 0.1;

/// 两通道冲突时的置信度折减系数
const DISAGREEMENT_PENALTY: f64 = 0.8;

/// 模型判定可用的最低头部概率
///
/// 分布过平说明特征没有提供区分信号，该通道视为无结论，
/// 而不是把噪声当成判定
const MODEL_USABLE_MIN_PROB: f64 = 0.5;

/// 单条通道的候选判定
#[derive(Debug, Clone)]
struct PassDecision {
    source: ResultSource,
    question_type: QuestionType,
    raw_confidence: f64,
    /// 校准分桶键（规则标识或模型十分位）
    bucket: String,
    evidence: Evidence,
}

/// 双通道仲裁器
pub struct DualSystemArbiter;

impl DualSystemArbiter {
    pub fn new() -> Self {
        Self
    }

    /// 两路识别是否需要触发重构（冲突或双双无可用结论）
    pub fn needs_reconstruction(
        rule_decision: Option<&RuleDecision>,
        model_prediction: Option<&ModelPrediction>,
    ) -> bool {
        let model_usable = model_prediction.filter(|m| m.best().1 >= MODEL_USABLE_MIN_PROB);
        match (rule_decision, model_usable) {
            (Some(rule), Some(model)) => rule.question_type != model.best().0,
            (None, None) => true,
            _ => false,
        }
    }

    /// 仲裁：合并两条通道的判定为唯一结论
    ///
    /// 每条记录必得且仅得一条结果；无法裁决时结果为人工复核，
    /// 绝不猜测默认题型
    pub fn arbitrate(
        &self,
        record: &NormalizedQuestionRecord,
        features: &FeatureVector,
        rule_decision: Option<&RuleDecision>,
        model_prediction: Option<&ModelPrediction>,
        table: &CalibrationTable,
    ) -> ClassificationResult {
        let rule_pass = rule_decision.map(build_rule_pass);
        let model_pass = model_prediction
            .filter(|m| m.best().1 >= MODEL_USABLE_MIN_PROB)
            .map(build_model_pass);

        // 通道一：规则优先；通道二：模型优先
        let first = rule_pass.clone().or_else(|| model_pass.clone());
        let second = model_pass.or(rule_pass);

        match (first, second) {
            (Some(a), Some(b)) if a.source == b.source => {
                // 某一识别器缺席时两条通道退化为同一判定，不做一致加成
                self.single_pass_result(record, a, table)
            }
            (Some(a), Some(b)) if a.question_type == b.question_type => {
                self.agreement_result(record, a, b, table)
            }
            (Some(a), Some(b)) => self.conflict_result(record, a, b, table),
            (Some(a), None) | (None, Some(a)) => self.single_pass_result(record, a, table),
            (None, None) => self.fallback_result(record, features, table),
        }
    }

    /// 单通道结论
    fn single_pass_result(
        &self,
        record: &NormalizedQuestionRecord,
        pass: PassDecision,
        table: &CalibrationTable,
    ) -> ClassificationResult {
        let confidence = table.calibrate(pass.source, &pass.bucket, pass.raw_confidence);
        ClassificationResult::resolved(record, pass.question_type, confidence, pass.source, pass.evidence)
            .with_explanation(format!("单通道判定: {} (分桶 {})", pass.source, pass.bucket))
    }

    /// 两通道一致：按历史精度加权平均并加成
    fn agreement_result(
        &self,
        record: &NormalizedQuestionRecord,
        a: PassDecision,
        b: PassDecision,
        table: &CalibrationTable,
    ) -> ClassificationResult {
        let (winner, runner_up) = order_by_source_precision(a, b, table);

        let winner_weight = table.source_precision(winner.source);
        let runner_weight = table.source_precision(runner_up.source);
        let winner_confidence = table.calibrate(winner.source, &winner.bucket, winner.raw_confidence);
        let runner_confidence =
            table.calibrate(runner_up.source, &runner_up.bucket, runner_up.raw_confidence);

        let weighted = if winner_weight + runner_weight > 0.0 {
            (winner_weight * winner_confidence + runner_weight * runner_confidence)
                / (winner_weight + runner_weight)
        } else {
            winner_confidence
        };
        // 一致是增信事件：加成后不得低于胜出通道自身的校准值
        let base = weighted.max(winner_confidence);
        let boosted = (base + AGREEMENT_BONUS * (1.0 - base)).min(0.99);

        debug!(
            "双通道一致: {} ({:.3} -> {:.3})",
            winner.question_type, base, boosted
        );

        ClassificationResult::resolved(
            record,
            winner.question_type,
            boosted,
            winner.source,
            winner.evidence,
        )
        .with_explanation(format!(
            "双通道一致: {} 与 {} 均判为{}",
            winner.source, runner_up.source, winner.question_type
        ))
    }

    /// 两通道冲突：高历史精度通道胜出，置信度折减
    fn conflict_result(
        &self,
        record: &NormalizedQuestionRecord,
        a: PassDecision,
        b: PassDecision,
        table: &CalibrationTable,
    ) -> ClassificationResult {
        let (winner, loser) = order_by_source_precision(a, b, table);
        let confidence = table.calibrate(winner.source, &winner.bucket, winner.raw_confidence)
            * DISAGREEMENT_PENALTY;

        debug!(
            "双通道冲突: {} 胜出 ({} 负)",
            winner.question_type, loser.question_type
        );

        ClassificationResult::resolved(
            record,
            winner.question_type,
            confidence,
            ResultSource::Consensus,
            Evidence::Consensus {
                winner: winner.bucket.clone(),
                agreed: false,
            },
        )
        .with_explanation(format!(
            "双通道冲突: {}({}) 对 {}({})，按通道历史精度取前者",
            winner.question_type, winner.source, loser.question_type, loser.source
        ))
    }

    /// 两路皆空的兜底
    ///
    /// 仅当选项为空、答案为空且题干带空白标记时落填空；
    /// 其余情况没有证据支撑任何题型，转人工复核
    fn fallback_result(
        &self,
        record: &NormalizedQuestionRecord,
        features: &FeatureVector,
        table: &CalibrationTable,
    ) -> ClassificationResult {
        let blank_evidence =
            features.blank_underline_count + features.blank_parenthesis_count >= 1;

        if record.options.is_empty() && record.answer_raw.trim().is_empty() && blank_evidence {
            let confidence = table.source_precision(ResultSource::Consensus) * DISAGREEMENT_PENALTY;
            return ClassificationResult::resolved(
                record,
                QuestionType::FillBlank,
                confidence,
                ResultSource::Consensus,
                Evidence::Consensus {
                    winner: "fallback_fill_blank".to_string(),
                    agreed: false,
                },
            )
            .with_explanation("兜底判定: 空选项空答案且题干含空白标记".to_string());
        }

        ClassificationResult::manual_review(record, "双通道均无结论且无兜底证据")
            .with_explanation("两路识别均未产出可用判定".to_string())
    }
}

impl Default for DualSystemArbiter {
    fn default() -> Self {
        Self::new()
    }
}

fn build_rule_pass(decision: &RuleDecision) -> PassDecision {
    PassDecision {
        source: ResultSource::Rule,
        question_type: decision.question_type,
        raw_confidence: decision.confidence,
        bucket: decision.rule_id.to_string(),
        evidence: Evidence::Rule {
            rule_id: decision.rule_id.to_string(),
        },
    }
}

fn build_model_pass(prediction: &ModelPrediction) -> PassDecision {
    let (question_type, top_probability) = prediction.best();
    PassDecision {
        source: ResultSource::Model,
        question_type,
        raw_confidence: top_probability,
        bucket: CalibrationTable::model_bucket(top_probability),
        evidence: Evidence::Model {
            top_features: prediction.top_features.clone(),
        },
    }
}

/// 按通道历史精度排序，精度相同时规则通道优先（可解释性更强）
fn order_by_source_precision(
    a: PassDecision,
    b: PassDecision,
    table: &CalibrationTable,
) -> (PassDecision, PassDecision) {
    let precision_a = table.source_precision(a.source);
    let precision_b = table.source_precision(b.source);
    if precision_b > precision_a {
        (b, a)
    } else {
        (a, b)
    }
}
