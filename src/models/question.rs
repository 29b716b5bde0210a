use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::question_type::QuestionType;

/// 上游解析器已执行过的修复标记
///
/// 重构器依据这些标记避免对同一条记录重复修复
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseFlags {
    /// 上游已合并过断行
    #[serde(default)]
    pub merged_lines: bool,
    /// 上游已剥离过题尾答案
    #[serde(default)]
    pub tail_answer_stripped: bool,
    /// 重构器已将选项块并入本题
    #[serde(default)]
    pub options_merged: bool,
    /// 重构器已从题干中拆出答案
    #[serde(default)]
    pub answer_split: bool,
}

impl ParseFlags {
    /// 本条记录是否已经历过一次重构修复
    pub fn reconstructed(&self) -> bool {
        self.options_merged || self.answer_split
    }
}

/// 规范化题目记录 - 各阶段之间传递的统一单元
///
/// 由上游文档解析器（Excel/Word/PDF）产出，保证 `question_text` 非空、
/// `source_id` 在单次运行内唯一；选项与答案不保证规整
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedQuestionRecord {
    /// 数据源标识（文件 + 文件内序号）
    pub source_id: String,
    /// 题干（不含题号、不含题尾括号答案）
    pub question_text: String,
    /// 选项表，键为连续的大写字母（从 A 起）；填空/简答题为空
    #[serde(default)]
    pub options: BTreeMap<char, String>,
    /// 原始答案串，例如 "B"、"ABD"、"×"
    #[serde(default)]
    pub answer_raw: String,
    /// 原始解析文本
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation_raw: Option<String>,
    /// 上游解析器给出的版面置信度，取值 [0,1]
    #[serde(default)]
    pub layout_score: f64,
    /// 已执行修复的标记集合
    #[serde(default)]
    pub parse_flags: ParseFlags,
}

impl NormalizedQuestionRecord {
    pub fn option_count(&self) -> usize {
        self.options.len()
    }

    /// 选项键是否为从 A 起的连续字母前缀
    pub fn options_contiguous(&self) -> bool {
        self.options
            .keys()
            .enumerate()
            .all(|(i, k)| *k as u32 == 'A' as u32 + i as u32)
    }

    /// 血缘标识：拆分/合并产生的衍生记录共享原始 source_id 前缀
    pub fn lineage(&self) -> &str {
        match self.source_id.find("#r") {
            Some(pos) => &self.source_id[..pos],
            None => &self.source_id,
        }
    }

    /// 生成衍生记录的 source_id（`原id#r序号`）
    pub fn derived_source_id(&self, n: usize) -> String {
        format!("{}#r{}", self.lineage(), n)
    }

    /// 题干预览（最多80个字符）
    pub fn stem_preview(&self) -> String {
        crate::utils::logging::truncate_text(&self.question_text, 80)
    }
}

/// 获胜识别通道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    /// 规则引擎
    Rule,
    /// 统计模型
    Model,
    /// 双通道仲裁
    Consensus,
}

impl ResultSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ResultSource::Rule => "rule",
            ResultSource::Model => "model",
            ResultSource::Consensus => "consensus",
        }
    }
}

impl std::fmt::Display for ResultSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 特征权重项（模型判据中的头部特征）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopFeature {
    pub name: String,
    pub weight: f64,
}

/// 判定依据 - 审计与标注回流所需
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evidence {
    /// 规则命中：记录规则标识
    Rule { rule_id: String },
    /// 模型判定：记录头部特征权重
    Model { top_features: Vec<TopFeature> },
    /// 仲裁判定：记录获胜通道与是否一致
    Consensus { winner: String, agreed: bool },
    /// 无法裁决：记录原因
    Unresolved { reason: String },
}

/// 最终分类结果
///
/// 每条输入记录恰好产出一条结果。`question_type` 为空时
/// `needs_manual_review` 必为真；低置信度的已裁决结果
/// 也可能被标记复核，但题型保留
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// 对应记录的 source_id
    pub source_id: String,
    /// 血缘标识（拆分产生的多条结果共享该值）
    pub lineage: String,
    /// 题型；需人工复核时为空
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_type: Option<QuestionType>,
    /// 校准后置信度，取值 [0,1]
    pub confidence: f64,
    /// 获胜识别通道
    pub source: ResultSource,
    /// 判定依据
    pub evidence: Evidence,
    /// 是否需要人工复核
    pub needs_manual_review: bool,
    /// 解释链（每一步的可读说明）
    #[serde(default)]
    pub explanations: Vec<String>,
}

impl ClassificationResult {
    /// 构造已裁决结果
    pub fn resolved(
        record: &NormalizedQuestionRecord,
        question_type: QuestionType,
        confidence: f64,
        source: ResultSource,
        evidence: Evidence,
    ) -> Self {
        Self {
            source_id: record.source_id.clone(),
            lineage: record.lineage().to_string(),
            question_type: Some(question_type),
            confidence,
            source,
            evidence,
            needs_manual_review: false,
            explanations: Vec::new(),
        }
    }

    /// 构造需人工复核的结果
    pub fn manual_review(record: &NormalizedQuestionRecord, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            source_id: record.source_id.clone(),
            lineage: record.lineage().to_string(),
            question_type: None,
            confidence: 0.0,
            source: ResultSource::Consensus,
            evidence: Evidence::Unresolved { reason },
            needs_manual_review: true,
            explanations: Vec::new(),
        }
    }

    pub fn with_explanation(mut self, text: impl Into<String>) -> Self {
        self.explanations.push(text.into());
        self
    }
}

impl std::fmt::Display for ClassificationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.question_type {
            Some(t) => write!(
                f,
                "{} -> {} (置信度: {:.2}, 来源: {})",
                self.source_id, t, self.confidence, self.source
            ),
            None => write!(f, "{} -> 待人工复核", self.source_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_id(id: &str) -> NormalizedQuestionRecord {
        NormalizedQuestionRecord {
            source_id: id.to_string(),
            question_text: "下列说法正确的是（ ）".to_string(),
            options: BTreeMap::new(),
            answer_raw: String::new(),
            explanation_raw: None,
            layout_score: 1.0,
            parse_flags: ParseFlags::default(),
        }
    }

    #[test]
    fn test_lineage_of_derived_record() {
        let record = record_with_id("excel/a.xlsx#q3");
        assert_eq!(record.lineage(), "excel/a.xlsx#q3");
        assert_eq!(record.derived_source_id(1), "excel/a.xlsx#q3#r1");

        let derived = record_with_id("excel/a.xlsx#q3#r1");
        assert_eq!(derived.lineage(), "excel/a.xlsx#q3");
    }

    #[test]
    fn test_options_contiguous() {
        let mut record = record_with_id("t#q1");
        record.options.insert('A', "甲".to_string());
        record.options.insert('B', "乙".to_string());
        assert!(record.options_contiguous());

        record.options.insert('D', "丁".to_string());
        assert!(!record.options_contiguous());
    }

    #[test]
    fn test_manual_review_result_has_no_type() {
        let record = record_with_id("t#q1");
        let result = ClassificationResult::manual_review(&record, "双通道均无结论");
        assert!(result.needs_manual_review);
        assert!(result.question_type.is_none());
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_record_json_roundtrip() {
        let mut record = record_with_id("word/b.docx#q12");
        record.options.insert('A', "选项一".to_string());
        record.answer_raw = "A".to_string();

        let json = serde_json::to_string(&record).unwrap();
        let back: NormalizedQuestionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.source_id, record.source_id);
        assert_eq!(back.options.get(&'A').map(String::as_str), Some("选项一"));
    }
}
