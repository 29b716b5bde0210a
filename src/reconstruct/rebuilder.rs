//! 题目重构器 - 业务能力层
//!
//! 检测并修复两类破坏下游分类的结构缺陷：
//! 1. 选项块被误解析为无题干的独立"题目"——并回前一题的选项表
//! 2. 题干中熔接了题号或括号答案——重新拆分为干净题干 + 答案
//!
//! 每条血缘最多修复一次（通过 parse_flags 硬性封顶），
//! 修复后的记录必须重新提取特征并重跑规则

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::models::question::NormalizedQuestionRecord;

/// 选项条目标记：大写字母后接中西文列举符
static OPTION_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-F][、.．:：]").unwrap());

/// 题号前缀：行首数字加点号
static LEADING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d{1,3}\s*[.、．]\s*").unwrap());

/// 题干中的括号答案：括号内单个字母或判断符号（容忍中西括号混用）
static EMBEDDED_ANSWER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[（(]\s*([A-Z]|√|×|对|错)\s*[)）]").unwrap());

/// 括号包裹的原始答案，如 "(A)"、"（√）"
static WRAPPED_ANSWER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[（(]\s*(.+?)\s*[)）]$").unwrap());

/// 句末收束标点
static SENTENCE_ENDING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[。？！?!]\s*$").unwrap());

/// 重构动作
#[derive(Debug, Clone)]
pub enum Repair {
    /// 无缺陷或本血缘已修复过
    None,
    /// 当前记录是选项块：并入前一题后的替换记录，当前记录丢弃
    MergedIntoPrevious { merged: NormalizedQuestionRecord },
    /// 熔接记录已拆分为干净记录
    Split { derived: NormalizedQuestionRecord },
}

/// 题目重构器
pub struct Reconstructor;

impl Reconstructor {
    pub fn new() -> Self {
        Self
    }

    /// 记录是否呈选项块形态
    ///
    /// 判据：以选项标记开头、含至少两个选项标记、无句末收束标点
    pub fn is_option_block(&self, record: &NormalizedQuestionRecord) -> bool {
        let text = record.question_text.trim();
        if SENTENCE_ENDING.is_match(text) {
            return false;
        }
        let Some(first) = OPTION_MARKER.find(text) else {
            return false;
        };
        first.start() == 0 && OPTION_MARKER.find_iter(text).count() >= 2
    }

    /// 记录是否呈熔接形态（题号或括号答案残留在题干/答案中）
    pub fn is_fused(&self, record: &NormalizedQuestionRecord) -> bool {
        LEADING_NUMBER.is_match(&record.question_text)
            || EMBEDDED_ANSWER.is_match(&record.question_text)
            || WRAPPED_ANSWER.is_match(record.answer_raw.trim())
    }

    /// 尝试修复一条记录
    ///
    /// # 参数
    /// - `record`: 待检记录
    /// - `previous`: 序列中的前一题（选项块并回的目标）
    ///
    /// # 返回
    /// 修复动作；已修复过的血缘一律返回 [`Repair::None`]
    pub fn try_repair(
        &self,
        record: &NormalizedQuestionRecord,
        previous: Option<&NormalizedQuestionRecord>,
    ) -> Repair {
        // 迭代硬上限：每条血缘只允许一次重构，防止修复-再修复震荡
        if record.parse_flags.reconstructed() {
            return Repair::None;
        }

        if self.is_option_block(record) {
            if let Some(previous) = previous {
                if previous.options.is_empty() && !previous.parse_flags.options_merged {
                    return self.merge_option_block(record, previous);
                }
            }
            debug!("选项块无可并回的前题: {}", record.source_id);
        }

        if self.is_fused(record) {
            return self.split_fused(record);
        }

        Repair::None
    }

    /// 将选项块并回前一题
    fn merge_option_block(
        &self,
        block: &NormalizedQuestionRecord,
        previous: &NormalizedQuestionRecord,
    ) -> Repair {
        let mut merged = previous.clone();

        for (key, text) in parse_option_items(&block.question_text) {
            merged.options.entry(key).or_insert(text);
        }

        // 选项块可能携带了整题的答案
        if merged.answer_raw.trim().is_empty() && !block.answer_raw.trim().is_empty() {
            merged.answer_raw = block.answer_raw.clone();
        }

        merged.parse_flags.options_merged = true;
        debug!(
            "选项块并回: {} -> {} ({} 个选项)",
            block.source_id,
            merged.source_id,
            merged.options.len()
        );

        Repair::MergedIntoPrevious { merged }
    }

    /// 拆分熔接记录：剥离题号、抽出括号答案
    fn split_fused(&self, record: &NormalizedQuestionRecord) -> Repair {
        let mut derived = record.clone();
        let mut stem = record.question_text.clone();

        if let Some(m) = LEADING_NUMBER.find(&stem) {
            stem = stem[m.end()..].to_string();
        }

        // 括号包裹的答案先解包
        let mut answer = record.answer_raw.trim().to_string();
        if let Some(caps) = WRAPPED_ANSWER.captures(&answer) {
            answer = caps[1].trim().to_string();
        }

        // 题干内嵌括号答案：抽出字母，原位留下空白标记
        let embedded = EMBEDDED_ANSWER
            .captures(&stem)
            .map(|caps| (caps[1].trim().to_string(), caps.get(0).unwrap().range()));
        if let Some((embedded, range)) = embedded {
            if answer.is_empty() || answer == embedded {
                answer = embedded;
                stem.replace_range(range, "（ ）");
                derived.parse_flags.tail_answer_stripped = true;
            }
        }

        derived.question_text = stem.trim().to_string();
        derived.answer_raw = answer;
        derived.parse_flags.answer_split = true;
        derived.source_id = record.derived_source_id(1);

        debug!("熔接记录拆分: {} -> {}", record.source_id, derived.source_id);
        Repair::Split { derived }
    }
}

impl Default for Reconstructor {
    fn default() -> Self {
        Self::new()
    }
}

/// 手工切分选项块文本为 (键, 文本) 序列
///
/// regex crate 不支持前瞻，这里按标记位置切片
fn parse_option_items(text: &str) -> Vec<(char, String)> {
    let text = text.trim();
    let markers: Vec<_> = OPTION_MARKER.find_iter(text).collect();
    let mut items = Vec::with_capacity(markers.len());

    for (i, marker) in markers.iter().enumerate() {
        let key = text[marker.start()..].chars().next().unwrap_or('A');
        let body_start = marker.end();
        let body_end = markers.get(i + 1).map_or(text.len(), |next| next.start());
        let body = text[body_start..body_end].trim().trim_end_matches(['，', '；', ',', ';']);
        if !body.is_empty() {
            items.push((key, body.to_string()));
        }
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::models::question::ParseFlags;

    fn record(id: &str, stem: &str, answer: &str) -> NormalizedQuestionRecord {
        NormalizedQuestionRecord {
            source_id: id.to_string(),
            question_text: stem.to_string(),
            options: BTreeMap::new(),
            answer_raw: answer.to_string(),
            explanation_raw: None,
            layout_score: 0.6,
            parse_flags: ParseFlags::default(),
        }
    }

    #[test]
    fn test_option_block_detection() {
        let reconstructor = Reconstructor::new();

        let block = record("t#q2", "A、断开电源 B、验电 C、装设接地线 D、悬挂标示牌", "");
        assert!(reconstructor.is_option_block(&block));

        let question = record("t#q1", "停电检修的第一步是什么？", "");
        assert!(!reconstructor.is_option_block(&question));
    }

    #[test]
    fn test_option_block_merges_into_previous() {
        let reconstructor = Reconstructor::new();
        let previous = record("t#q1", "停电检修的正确顺序是（ ）", "B");
        let block = record("t#q2", "A、断开电源 B、验电 C、装设接地线 D、悬挂标示牌", "");

        let Repair::MergedIntoPrevious { merged } =
            reconstructor.try_repair(&block, Some(&previous))
        else {
            panic!("应并回前题");
        };

        assert_eq!(merged.source_id, "t#q1");
        assert_eq!(merged.options.len(), 4);
        assert_eq!(merged.options.get(&'B').map(String::as_str), Some("验电"));
        assert!(merged.parse_flags.options_merged);
    }

    #[test]
    fn test_fused_record_split_extracts_embedded_answer() {
        let reconstructor = Reconstructor::new();
        let fused = record("t#q3", "12．检修工作（ A )应进行工作布置，明确人员分工", "(A)");

        let Repair::Split { derived } = reconstructor.try_repair(&fused, None) else {
            panic!("应拆分熔接记录");
        };

        assert_eq!(derived.answer_raw, "A");
        assert!(!LEADING_NUMBER.is_match(&derived.question_text));
        assert!(derived.question_text.contains("（ ）"));
        assert!(derived.parse_flags.answer_split);
        assert_eq!(derived.source_id, "t#q3#r1");
        assert_eq!(derived.lineage(), "t#q3");
    }

    #[test]
    fn test_repair_runs_at_most_once_per_lineage() {
        let reconstructor = Reconstructor::new();
        let mut fused = record("t#q3", "12．下列正确的是（ A ）", "");
        fused.parse_flags.answer_split = true;

        assert!(matches!(reconstructor.try_repair(&fused, None), Repair::None));
    }

    #[test]
    fn test_clean_record_needs_no_repair() {
        let reconstructor = Reconstructor::new();
        let clean = record("t#q4", "下列说法正确的是（ ）", "B");
        assert!(matches!(reconstructor.try_repair(&clean, None), Repair::None));
    }

    #[test]
    fn test_merge_skipped_when_previous_already_has_options() {
        let reconstructor = Reconstructor::new();
        let mut previous = record("t#q1", "下列正确的是（ ）", "A");
        previous.options.insert('A', "甲".to_string());
        let block = record("t#q2", "A、乙 B、丙", "");

        // 前题选项完整，选项块不应并回；块本身也非熔接形态
        assert!(matches!(
            reconstructor.try_repair(&block, Some(&previous)),
            Repair::None
        ));
    }
}
