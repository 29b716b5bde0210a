use serde::{Deserialize, Serialize};

/// 特征维度
pub const FEATURE_DIM: usize = 19;

/// 特征名称（固定顺序，训练脚本与推理端共享）
pub const FEATURE_NAMES: [&str; FEATURE_DIM] = [
    "has_options",
    "num_options",
    "answer_is_single_letter",
    "answer_is_multi_letters",
    "question_len",
    "option_len_mean",
    "answer_len",
    "punct_density",
    "question_mark_count",
    "hint_keywords_multi",
    "hint_keywords_tf",
    "hint_keywords_blank",
    "hint_keywords_subj",
    "blank_underline_count",
    "blank_parenthesis_count",
    "option_alignment_score",
    "layout_score",
    "ocr_conf_mean",
    "answer_pattern_id",
];

/// 答案形态编码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerPattern {
    /// 其他
    Other,
    /// 单个大写字母
    SingleLetter,
    /// 多个大写字母
    MultiLetter,
    /// 判断类答案（对/错/√/× 等）
    TrueFalse,
    /// 长文本（超过20字符）
    LongText,
    /// 纯数字
    Numeric,
}

impl AnswerPattern {
    pub fn id(self) -> u8 {
        match self {
            AnswerPattern::Other => 0,
            AnswerPattern::SingleLetter => 1,
            AnswerPattern::MultiLetter => 2,
            AnswerPattern::TrueFalse => 3,
            AnswerPattern::LongText => 4,
            AnswerPattern::Numeric => 5,
        }
    }
}

/// 题目特征向量
///
/// 由特征提取器从规范化记录确定性导出；产出后不可变，
/// 记录经重构后必须重新提取。特征均与题型标签无关
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    // 基础特征
    pub has_options: u8,
    pub num_options: u8,
    pub answer_is_single_letter: u8,
    pub answer_is_multi_letters: u8,

    // 长度特征（按字符计数，不按字节）
    pub question_len: u32,
    pub option_len_mean: f64,
    pub answer_len: u32,

    // 标点特征
    pub punct_density: f64,
    pub question_mark_count: u32,

    // 关键词特征（命中数截断到3）
    pub hint_keywords_multi: u8,
    pub hint_keywords_tf: u8,
    pub hint_keywords_blank: u8,
    pub hint_keywords_subj: u8,

    // 模式特征
    pub blank_underline_count: u32,
    pub blank_parenthesis_count: u32,
    pub option_alignment_score: f64,

    // 版面特征
    pub layout_score: f64,
    pub ocr_conf_mean: f64,

    // 答案形态特征
    pub answer_pattern_id: u8,
}

impl FeatureVector {
    /// 转为模型输入行，顺序与 [`FEATURE_NAMES`] 一致
    pub fn to_array(&self) -> [f64; FEATURE_DIM] {
        [
            f64::from(self.has_options),
            f64::from(self.num_options),
            f64::from(self.answer_is_single_letter),
            f64::from(self.answer_is_multi_letters),
            f64::from(self.question_len),
            self.option_len_mean,
            f64::from(self.answer_len),
            self.punct_density,
            f64::from(self.question_mark_count),
            f64::from(self.hint_keywords_multi),
            f64::from(self.hint_keywords_tf),
            f64::from(self.hint_keywords_blank),
            f64::from(self.hint_keywords_subj),
            f64::from(self.blank_underline_count),
            f64::from(self.blank_parenthesis_count),
            self.option_alignment_score,
            self.layout_score,
            self.ocr_conf_mean,
            f64::from(self.answer_pattern_id),
        ]
    }

    pub fn answer_pattern(&self) -> AnswerPattern {
        match self.answer_pattern_id {
            1 => AnswerPattern::SingleLetter,
            2 => AnswerPattern::MultiLetter,
            3 => AnswerPattern::TrueFalse,
            4 => AnswerPattern::LongText,
            5 => AnswerPattern::Numeric,
            _ => AnswerPattern::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_order_matches_names() {
        let vector = FeatureVector {
            has_options: 1,
            num_options: 4,
            answer_is_single_letter: 1,
            answer_is_multi_letters: 0,
            question_len: 30,
            option_len_mean: 6.5,
            answer_len: 1,
            punct_density: 0.1,
            question_mark_count: 1,
            hint_keywords_multi: 0,
            hint_keywords_tf: 0,
            hint_keywords_blank: 0,
            hint_keywords_subj: 0,
            blank_underline_count: 0,
            blank_parenthesis_count: 1,
            option_alignment_score: 0.9,
            layout_score: 1.0,
            ocr_conf_mean: 1.0,
            answer_pattern_id: AnswerPattern::SingleLetter.id(),
        };

        let array = vector.to_array();
        assert_eq!(array.len(), FEATURE_NAMES.len());
        assert_eq!(array[0], 1.0);
        assert_eq!(array[1], 4.0);
        assert_eq!(array[18], 1.0);
    }
}
