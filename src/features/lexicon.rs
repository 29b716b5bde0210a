//! 静态词典 - 题型线索词与判断类答案词表
//!
//! 词表在编译期固化，识别热路径上零分配

use phf::phf_set;

/// 判断类答案词表
///
/// 命中即认为答案属于判断题形态（匹配前先 trim）
pub static TRUE_FALSE_ANSWERS: phf::Set<&'static str> = phf_set! {
    "对", "错", "√", "×", "True", "False", "TRUE", "FALSE",
    "T", "F", "正确", "错误", "是", "否",
};

/// 多选题提示词
pub const MULTI_CHOICE_KEYWORDS: [&str; 10] = [
    "多选", "多项", "至少两项", "两个以上", "不止一个",
    "哪些", "哪几个", "包括", "多个", "几个",
];

/// 判断题提示词
pub const TRUE_FALSE_KEYWORDS: [&str; 10] = [
    "判断对错", "是否正确", "对吗", "对么", "是非题",
    "判断题", "说法", "表述", "观点", "是否准确",
];

/// 填空题提示词
pub const FILL_BLANK_KEYWORDS: [&str; 10] = [
    "填写", "填入", "应填", "等于", "约为", "标准",
    "规定", "数值", "参数", "单位",
];

/// 简答题提示词
pub const SUBJECTIVE_KEYWORDS: [&str; 21] = [
    "简述", "说明", "论述", "分析", "阐述", "解释", "描述",
    "如何", "为什么", "什么是", "怎样", "请", "试", "谈谈",
    "基本要求", "工作原理", "主要特点", "注意事项", "定义",
    "比较", "列举",
];

/// 答案是否属于判断类词表
pub fn is_true_false_answer(answer: &str) -> bool {
    TRUE_FALSE_ANSWERS.contains(answer.trim())
}

/// 统计文本命中词表的条目数，截断到 `cap`
pub fn count_keyword_hits(text: &str, keywords: &[&str], cap: u8) -> u8 {
    let hits = keywords.iter().filter(|kw| text.contains(*kw)).count();
    (hits as u8).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_true_false_answer_lexicon() {
        assert!(is_true_false_answer("对"));
        assert!(is_true_false_answer("×"));
        assert!(is_true_false_answer(" √ "));
        assert!(is_true_false_answer("F"));
        assert!(!is_true_false_answer("A"));
        assert!(!is_true_false_answer(""));
    }

    #[test]
    fn test_keyword_hits_capped() {
        let text = "简述其工作原理，说明主要特点并分析注意事项";
        assert_eq!(count_keyword_hits(text, &SUBJECTIVE_KEYWORDS, 3), 3);
        assert_eq!(count_keyword_hits("无关文本", &SUBJECTIVE_KEYWORDS, 3), 0);
    }
}
