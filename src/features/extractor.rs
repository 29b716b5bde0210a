//! 特征提取器 - 业务能力层
//!
//! 从规范化记录确定性导出 19 维特征向量。提取是全函数：
//! 任何输入都能产出向量，缺失信号取哨兵默认值而不是报错。
//! 所有特征与题型标签无关，避免与规则引擎形成循环论证

use std::sync::LazyLock;

use regex::Regex;

use crate::features::lexicon;
use crate::models::features::{AnswerPattern, FeatureVector};
use crate::models::question::NormalizedQuestionRecord;

static SINGLE_LETTER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]$").unwrap());
static MULTI_LETTER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]{2,}$").unwrap());
static BLANK_UNDERLINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_{2,}").unwrap());
static BLANK_BRACKETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"（\s*）|\(\s*\)|【\s*】").unwrap());
static PUNCT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[。，！？；：、""''（）【】《》〈〉.,!?;:()\[\]<>"]"#).unwrap()
});
static QUESTION_MARK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[？?]").unwrap());

/// 关键词命中数上限，避免长题干上的过拟合
const KEYWORD_CAP: u8 = 3;

/// 长文本答案的字符数阈值
const LONG_ANSWER_CHARS: usize = 20;

/// 特征提取器
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// 提取题目特征
    ///
    /// # 参数
    /// - `record`: 规范化题目记录
    ///
    /// # 返回
    /// 返回 19 维特征向量；记录被重构后必须重新调用
    pub fn extract(&self, record: &NormalizedQuestionRecord) -> FeatureVector {
        let stem = record.question_text.as_str();
        let answer = record.answer_raw.trim();

        let question_len = stem.chars().count();
        let punct_count = PUNCT.find_iter(stem).count();
        let punct_density = if question_len > 0 {
            punct_count as f64 / question_len as f64
        } else {
            0.0
        };

        let option_lengths: Vec<usize> = record
            .options
            .values()
            .map(|text| text.chars().count())
            .collect();
        let option_len_mean = if option_lengths.is_empty() {
            0.0
        } else {
            option_lengths.iter().sum::<usize>() as f64 / option_lengths.len() as f64
        };

        FeatureVector {
            has_options: u8::from(!record.options.is_empty()),
            num_options: record.options.len().min(u8::MAX as usize) as u8,
            answer_is_single_letter: u8::from(SINGLE_LETTER.is_match(answer)),
            answer_is_multi_letters: u8::from(MULTI_LETTER.is_match(answer)),
            question_len: question_len as u32,
            option_len_mean,
            answer_len: answer.chars().count() as u32,
            punct_density,
            question_mark_count: QUESTION_MARK.find_iter(stem).count() as u32,
            hint_keywords_multi: lexicon::count_keyword_hits(
                stem,
                &lexicon::MULTI_CHOICE_KEYWORDS,
                KEYWORD_CAP,
            ),
            hint_keywords_tf: lexicon::count_keyword_hits(
                stem,
                &lexicon::TRUE_FALSE_KEYWORDS,
                KEYWORD_CAP,
            ),
            hint_keywords_blank: lexicon::count_keyword_hits(
                stem,
                &lexicon::FILL_BLANK_KEYWORDS,
                KEYWORD_CAP,
            ),
            hint_keywords_subj: lexicon::count_keyword_hits(
                stem,
                &lexicon::SUBJECTIVE_KEYWORDS,
                KEYWORD_CAP,
            ),
            blank_underline_count: BLANK_UNDERLINE.find_iter(stem).count() as u32,
            blank_parenthesis_count: BLANK_BRACKETS.find_iter(stem).count() as u32,
            option_alignment_score: option_alignment(&option_lengths),
            layout_score: record.layout_score.clamp(0.0, 1.0),
            // OCR 置信度由上游在 layout_score 之外单独给出时才有意义，
            // 当前输入契约未携带，取默认值
            ocr_conf_mean: 1.0,
            answer_pattern_id: answer_pattern(answer).id(),
        }
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// 答案形态编码
fn answer_pattern(answer: &str) -> AnswerPattern {
    if SINGLE_LETTER.is_match(answer) {
        AnswerPattern::SingleLetter
    } else if MULTI_LETTER.is_match(answer) {
        AnswerPattern::MultiLetter
    } else if lexicon::is_true_false_answer(answer) {
        AnswerPattern::TrueFalse
    } else if answer.chars().count() > LONG_ANSWER_CHARS {
        AnswerPattern::LongText
    } else if !answer.is_empty() && answer.chars().all(|c| c.is_ascii_digit()) {
        AnswerPattern::Numeric
    } else {
        AnswerPattern::Other
    }
}

/// 选项对齐度：选项长度变异系数越小，对齐度越高
fn option_alignment(lengths: &[usize]) -> f64 {
    if lengths.len() < 2 {
        return 0.0;
    }

    let mean = lengths.iter().sum::<usize>() as f64 / lengths.len() as f64;
    if mean == 0.0 {
        return 0.0;
    }

    let variance = lengths
        .iter()
        .map(|l| {
            let d = *l as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / lengths.len() as f64;
    let cv = variance.sqrt() / mean;

    (1.0 - cv).max(0.0)
}
