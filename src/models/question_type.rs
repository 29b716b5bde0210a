/// 题型枚举
///
/// 识别结果只能是这五种题型之一，流水线保证不输出"未知"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    /// 单选题
    SingleChoice,
    /// 多选题
    MultipleChoice,
    /// 判断题
    TrueFalse,
    /// 填空题
    FillBlank,
    /// 简答题
    Subjective,
}

impl QuestionType {
    /// 全部题型（固定顺序，与模型产物的类别顺序一致）
    pub const ALL: [QuestionType; 5] = [
        QuestionType::SingleChoice,
        QuestionType::MultipleChoice,
        QuestionType::TrueFalse,
        QuestionType::FillBlank,
        QuestionType::Subjective,
    ];

    /// 获取稳定的英文标识（序列化、校准桶、标注文件均使用该标识）
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "single_choice",
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::TrueFalse => "true_false",
            QuestionType::FillBlank => "fill_blank",
            QuestionType::Subjective => "subjective",
        }
    }

    /// 获取中文名称
    pub fn name(self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "单选题",
            QuestionType::MultipleChoice => "多选题",
            QuestionType::TrueFalse => "判断题",
            QuestionType::FillBlank => "填空题",
            QuestionType::Subjective => "简答题",
        }
    }

    /// 类别在模型输出向量中的下标
    pub fn class_index(self) -> usize {
        match self {
            QuestionType::SingleChoice => 0,
            QuestionType::MultipleChoice => 1,
            QuestionType::TrueFalse => 2,
            QuestionType::FillBlank => 3,
            QuestionType::Subjective => 4,
        }
    }

    /// 从下标解析题型
    pub fn from_class_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// 尝试从字符串解析题型（接受英文标识或中文名称）
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "single_choice" | "单选题" | "单选" => Some(QuestionType::SingleChoice),
            "multiple_choice" | "多选题" | "多选" => Some(QuestionType::MultipleChoice),
            "true_false" | "判断题" | "判断" => Some(QuestionType::TrueFalse),
            "fill_blank" | "填空题" | "填空" => Some(QuestionType::FillBlank),
            "subjective" | "简答题" | "简答" | "问答题" => Some(QuestionType::Subjective),
            _ => None,
        }
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_roundtrip() {
        for t in QuestionType::ALL {
            assert_eq!(QuestionType::from_str(t.as_str()), Some(t));
            assert_eq!(QuestionType::from_str(t.name()), Some(t));
        }
        assert_eq!(QuestionType::from_str("unknown"), None);
    }

    #[test]
    fn test_class_index_stable() {
        for (i, t) in QuestionType::ALL.iter().enumerate() {
            assert_eq!(t.class_index(), i);
            assert_eq!(QuestionType::from_class_index(i), Some(*t));
        }
        assert_eq!(QuestionType::from_class_index(5), None);
    }
}
