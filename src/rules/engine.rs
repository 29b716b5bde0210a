//! 强规则引擎 - 业务能力层
//!
//! 按优先级评估确定性启发式规则，强信号存在时短路判定，
//! 不进入统计模型。规则不命中时显式返回"无结论"，绝不猜测默认值。
//! 引擎是纯函数：无副作用，同一输入必得同一输出

use tracing::debug;

use crate::features::lexicon;
use crate::models::features::FeatureVector;
use crate::models::question::NormalizedQuestionRecord;
use crate::models::question_type::QuestionType;

/// 简答题答案的最小字符数
const SUBJECTIVE_ANSWER_CHARS: usize = 15;

/// 规则条件
///
/// `required` 条件是规则语义的一部分，必须全部成立；
/// 可选条件只影响满足度（进而影响原始置信度）
struct Condition {
    name: &'static str,
    weight: f64,
    required: bool,
    check: fn(&NormalizedQuestionRecord, &FeatureVector) -> bool,
}

/// 规则定义
struct Rule {
    /// 稳定标识，同时是校准层的分桶键
    id: &'static str,
    /// 优先级，数字越小越先评估
    priority: u8,
    question_type: QuestionType,
    /// 内置先验置信度（无校准数据时的兜底精度）
    prior: f64,
    /// 满足度阈值
    threshold: f64,
    conditions: &'static [Condition],
    explanation: &'static str,
}

/// 规则判定结果
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDecision {
    pub rule_id: &'static str,
    pub question_type: QuestionType,
    /// 原始置信度 = 先验 × 条件满足度，校准层再映射为经验精度
    pub confidence: f64,
    pub explanation: String,
    pub priority: u8,
}

// ========== 条件检查函数 ==========

fn answer_is_tf(record: &NormalizedQuestionRecord, _f: &FeatureVector) -> bool {
    lexicon::is_true_false_answer(&record.answer_raw)
}

fn at_most_one_option(record: &NormalizedQuestionRecord, _f: &FeatureVector) -> bool {
    record.option_count() <= 1
}

fn tf_hints_in_stem(_r: &NormalizedQuestionRecord, features: &FeatureVector) -> bool {
    features.hint_keywords_tf >= 1
}

fn has_blank_markers(_r: &NormalizedQuestionRecord, features: &FeatureVector) -> bool {
    features.blank_underline_count + features.blank_parenthesis_count >= 1
}

fn answer_not_single_letter(_r: &NormalizedQuestionRecord, features: &FeatureVector) -> bool {
    features.answer_is_single_letter == 0
}

fn blank_hints_in_stem(_r: &NormalizedQuestionRecord, features: &FeatureVector) -> bool {
    features.hint_keywords_blank >= 1
}

fn answer_is_single_option_key(record: &NormalizedQuestionRecord, _f: &FeatureVector) -> bool {
    let answer = record.answer_raw.trim();
    let mut chars = answer.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), None) => letter.is_ascii_uppercase() && record.options.contains_key(&letter),
        _ => false,
    }
}

fn valid_option_count(record: &NormalizedQuestionRecord, _f: &FeatureVector) -> bool {
    (2..=6).contains(&record.option_count())
}

fn answer_letters_all_option_keys(record: &NormalizedQuestionRecord, features: &FeatureVector) -> bool {
    if features.answer_is_multi_letters == 0 {
        return false;
    }
    let answer = record.answer_raw.trim();
    let mut seen = std::collections::BTreeSet::new();
    answer
        .chars()
        .all(|letter| record.options.contains_key(&letter) && seen.insert(letter))
}

fn multi_hints_in_stem(_r: &NormalizedQuestionRecord, features: &FeatureVector) -> bool {
    features.hint_keywords_multi >= 1
}

fn at_least_three_options(record: &NormalizedQuestionRecord, _f: &FeatureVector) -> bool {
    record.option_count() >= 3
}

fn no_options(record: &NormalizedQuestionRecord, _f: &FeatureVector) -> bool {
    record.options.is_empty()
}

fn long_free_answer(record: &NormalizedQuestionRecord, features: &FeatureVector) -> bool {
    features.answer_is_single_letter == 0
        && features.answer_is_multi_letters == 0
        && !lexicon::is_true_false_answer(&record.answer_raw)
        && record.answer_raw.trim().chars().count() > SUBJECTIVE_ANSWER_CHARS
}

fn subjective_hints_in_stem(_r: &NormalizedQuestionRecord, features: &FeatureVector) -> bool {
    features.hint_keywords_subj >= 1
}

// ========== 规则表 ==========

/// 规则按优先级排列；顺序即领域知识：
/// 判断类答案是最强信号，其次是填空标记，再到选项/答案一致性
static RULES: [Rule; 5] = [
    Rule {
        id: "true_false_answer",
        priority: 1,
        question_type: QuestionType::TrueFalse,
        prior: 0.95,
        threshold: 0.6,
        conditions: &[
            Condition { name: "answer_is_tf", weight: 2.0, required: true, check: answer_is_tf },
            Condition { name: "at_most_one_option", weight: 1.0, required: true, check: at_most_one_option },
            Condition { name: "tf_hints_in_stem", weight: 1.0, required: false, check: tf_hints_in_stem },
        ],
        explanation: "强规则命中：答案为判断类词表",
    },
    Rule {
        id: "fill_blank_markers",
        priority: 2,
        question_type: QuestionType::FillBlank,
        prior: 0.90,
        threshold: 0.6,
        conditions: &[
            Condition { name: "has_blank_markers", weight: 1.5, required: true, check: has_blank_markers },
            Condition { name: "answer_not_single_letter", weight: 1.0, required: true, check: answer_not_single_letter },
            Condition { name: "at_most_one_option", weight: 0.5, required: true, check: at_most_one_option },
            Condition { name: "blank_hints_in_stem", weight: 1.0, required: false, check: blank_hints_in_stem },
        ],
        explanation: "强规则命中：题干含填空标记",
    },
    Rule {
        id: "single_choice_answer",
        priority: 3,
        question_type: QuestionType::SingleChoice,
        prior: 0.85,
        threshold: 0.6,
        conditions: &[
            Condition { name: "answer_is_single_option_key", weight: 1.5, required: true, check: answer_is_single_option_key },
            Condition { name: "valid_option_count", weight: 1.0, required: false, check: valid_option_count },
        ],
        explanation: "强规则命中：单字母答案且为有效选项键",
    },
    Rule {
        id: "multiple_choice_answer",
        priority: 4,
        question_type: QuestionType::MultipleChoice,
        prior: 0.85,
        threshold: 0.6,
        conditions: &[
            Condition { name: "answer_letters_all_option_keys", weight: 2.0, required: true, check: answer_letters_all_option_keys },
            Condition { name: "multi_hints_in_stem", weight: 1.0, required: false, check: multi_hints_in_stem },
            Condition { name: "at_least_three_options", weight: 0.5, required: false, check: at_least_three_options },
        ],
        explanation: "强规则命中：多字母答案且全部为有效选项键",
    },
    Rule {
        id: "subjective_fallback",
        priority: 5,
        question_type: QuestionType::Subjective,
        prior: 0.80,
        threshold: 0.6,
        conditions: &[
            Condition { name: "no_options", weight: 1.0, required: true, check: no_options },
            Condition { name: "long_free_answer", weight: 1.5, required: true, check: long_free_answer },
            Condition { name: "subjective_hints_in_stem", weight: 1.0, required: false, check: subjective_hints_in_stem },
        ],
        explanation: "强规则命中：无选项且答案为自由长文本",
    },
];

/// 强规则引擎
pub struct RuleEngine;

impl RuleEngine {
    pub fn new() -> Self {
        Self
    }

    /// 按优先级应用规则，首个命中者胜出
    ///
    /// # 返回
    /// 命中时返回判定；无规则命中时返回 `None`（显式无结论）
    pub fn apply(
        &self,
        record: &NormalizedQuestionRecord,
        features: &FeatureVector,
    ) -> Option<RuleDecision> {
        for rule in RULES.iter() {
            if let Some(decision) = evaluate_rule(rule, record, features) {
                debug!("规则命中: {} -> {}", decision.rule_id, decision.question_type);
                return Some(decision);
            }
        }

        debug!("无规则命中: {}", record.source_id);
        None
    }

    /// 全部规则标识（校准层按此枚举分桶）
    pub fn rule_ids() -> impl Iterator<Item = &'static str> {
        RULES.iter().map(|rule| rule.id)
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// 评估单条规则
///
/// 必要条件须全部成立；满足度 = 通过权重 / 总权重，
/// 低于阈值时视为未命中
fn evaluate_rule(
    rule: &Rule,
    record: &NormalizedQuestionRecord,
    features: &FeatureVector,
) -> Option<RuleDecision> {
    let mut passed_weight = 0.0;
    let mut total_weight = 0.0;

    for condition in rule.conditions {
        total_weight += condition.weight;
        if (condition.check)(record, features) {
            passed_weight += condition.weight;
        } else if condition.required {
            return None;
        }
    }

    let satisfaction = if total_weight > 0.0 {
        passed_weight / total_weight
    } else {
        0.0
    };

    if satisfaction < rule.threshold {
        return None;
    }

    Some(RuleDecision {
        rule_id: rule.id,
        question_type: rule.question_type,
        confidence: rule.prior * satisfaction,
        explanation: rule.explanation.to_string(),
        priority: rule.priority,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::features::FeatureExtractor;
    use crate::models::question::ParseFlags;

    fn record(stem: &str, answer: &str, options: &[(char, &str)]) -> NormalizedQuestionRecord {
        NormalizedQuestionRecord {
            source_id: "test#q1".to_string(),
            question_text: stem.to_string(),
            options: options
                .iter()
                .map(|(k, v)| (*k, v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            answer_raw: answer.to_string(),
            explanation_raw: None,
            layout_score: 1.0,
            parse_flags: ParseFlags::default(),
        }
    }

    fn apply(record: &NormalizedQuestionRecord) -> Option<RuleDecision> {
        let features = FeatureExtractor::new().extract(record);
        RuleEngine::new().apply(record, &features)
    }

    #[test]
    fn test_true_false_answer_wins() {
        let record = record("该说法是否正确。", "√", &[]);
        let decision = apply(&record).unwrap();
        assert_eq!(decision.question_type, QuestionType::TrueFalse);
        assert_eq!(decision.rule_id, "true_false_answer");
    }

    #[test]
    fn test_tf_answer_with_many_options_does_not_fire_rule_one() {
        // 答案形似判断题但有四个选项，规则1不得命中
        let record = record(
            "下列说法正确的是",
            "对",
            &[('A', "甲"), ('B', "乙"), ('C', "丙"), ('D', "丁")],
        );
        let decision = apply(&record);
        assert!(decision.map(|d| d.rule_id) != Some("true_false_answer"));
    }

    #[test]
    fn test_single_choice_requires_valid_option_key() {
        let valid = record(
            "下列正确的是（ ）",
            "B",
            &[('A', "甲"), ('B', "乙"), ('C', "丙"), ('D', "丁")],
        );
        let decision = apply(&valid).unwrap();
        assert_eq!(decision.question_type, QuestionType::SingleChoice);
        assert_eq!(decision.rule_id, "single_choice_answer");

        // E 不在选项表中，规则3不得命中
        let invalid = record("下列正确的是", "E", &[('A', "甲"), ('B', "乙")]);
        let decision = apply(&invalid);
        assert!(decision.map(|d| d.rule_id) != Some("single_choice_answer"));
    }

    #[test]
    fn test_multiple_choice_all_letters_must_be_keys() {
        let valid = record(
            "下列哪些说法正确",
            "ABD",
            &[('A', "甲"), ('B', "乙"), ('C', "丙"), ('D', "丁")],
        );
        let decision = apply(&valid).unwrap();
        assert_eq!(decision.question_type, QuestionType::MultipleChoice);

        let invalid = record("下列哪些说法正确", "ABX", &[('A', "甲"), ('B', "乙")]);
        let decision = apply(&invalid);
        assert!(decision.map(|d| d.question_type) != Some(QuestionType::MultipleChoice));
    }

    #[test]
    fn test_fill_blank_markers_with_no_options() {
        let record = record("变压器的额定容量应填____千伏安", "500", &[]);
        let decision = apply(&record).unwrap();
        assert_eq!(decision.question_type, QuestionType::FillBlank);
    }

    #[test]
    fn test_subjective_long_answer() {
        let record = record(
            "简述变电站倒闸操作的基本要求。",
            "应按照操作票顺序逐项执行，操作前核对设备名称编号，操作中认真监护复诵",
            &[],
        );
        let decision = apply(&record).unwrap();
        assert_eq!(decision.question_type, QuestionType::Subjective);
    }

    #[test]
    fn test_no_match_is_explicit_none() {
        // 无选项、无答案、无填空标记：规则引擎必须显式无结论
        let record = record("本题信息不足", "", &[]);
        assert!(apply(&record).is_none());
    }

    #[test]
    fn test_confidence_scaled_by_satisfaction() {
        let full = record(
            "下列正确的是（ ）",
            "A",
            &[('A', "甲"), ('B', "乙"), ('C', "丙"), ('D', "丁")],
        );
        let decision = apply(&full).unwrap();
        assert!((decision.confidence - 0.85).abs() < 1e-9);

        // 七个选项超出常规范围，可选条件失败，置信度按满足度折减
        let crowded = record(
            "下列正确的是（ ）",
            "A",
            &[
                ('A', "甲"), ('B', "乙"), ('C', "丙"), ('D', "丁"),
                ('E', "戊"), ('F', "己"), ('G', "庚"),
            ],
        );
        let decision = apply(&crowded).unwrap();
        assert!(decision.confidence < 0.85);
        assert!(decision.confidence >= 0.5);
    }
}
