//! 统计分类器 - 业务能力层
//!
//! 消费与规则引擎相同的特征向量，输出五类题型的概率分布。
//! 模型产物缺失或损坏时分类器进入不可用状态，流水线降级为
//! 纯规则模式，绝不因此崩溃

pub mod model;

use std::path::Path;

use tracing::{info, warn};

use crate::models::features::{FeatureVector, FEATURE_DIM, FEATURE_NAMES};
use crate::models::question::TopFeature;
use crate::models::question_type::QuestionType;

pub use model::{DecisionTree, GbdtModelArtifact, TreeNode};

/// 模型产物载入错误
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("无法读取模型产物 ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("无法解析模型产物 ({path}): {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("模型产物与推理端不一致: {0}")]
    Mismatch(String),
}

/// 模型预测结果
#[derive(Debug, Clone)]
pub struct ModelPrediction {
    /// 概率分布，下标与 [`QuestionType::ALL`] 对应
    pub probabilities: [f64; 5],
    /// 判据：决策路径上权重最高的特征
    pub top_features: Vec<TopFeature>,
    pub model_version: String,
}

impl ModelPrediction {
    /// 概率最高的类别
    pub fn best(&self) -> (QuestionType, f64) {
        let mut best_index = 0;
        for i in 1..self.probabilities.len() {
            if self.probabilities[i] > self.probabilities[best_index] {
                best_index = i;
            }
        }
        (QuestionType::ALL[best_index], self.probabilities[best_index])
    }
}

/// 统计分类器
///
/// 载入后只读，可跨工作线程安全共享
pub enum StatisticalClassifier {
    Loaded(GbdtModelArtifact),
    /// 产物缺失或损坏，降级为纯规则模式
    Unavailable { reason: String },
}

impl StatisticalClassifier {
    /// 从产物文件载入分类器
    ///
    /// 文件缺失或解析失败只告警降级；产物声明了另一套分类体系
    /// 则视为配置错误向上抛出（由启动流程快速失败）
    pub async fn load(artifact_path: &str) -> Result<Self, ArtifactError> {
        match Self::try_load(artifact_path).await {
            Ok(artifact) => {
                info!("✓ 模型产物载入成功: 版本 {}", artifact.version);
                Ok(Self::Loaded(artifact))
            }
            Err(mismatch @ ArtifactError::Mismatch(_)) => Err(mismatch),
            Err(e) => {
                warn!("⚠️ 模型产物不可用，降级为纯规则模式: {}", e);
                Ok(Self::Unavailable { reason: e.to_string() })
            }
        }
    }

    async fn try_load(artifact_path: &str) -> Result<GbdtModelArtifact, ArtifactError> {
        let content = tokio::fs::read_to_string(Path::new(artifact_path))
            .await
            .map_err(|source| ArtifactError::Io {
                path: artifact_path.to_string(),
                source,
            })?;

        let artifact: GbdtModelArtifact =
            serde_json::from_str(&content).map_err(|source| ArtifactError::Json {
                path: artifact_path.to_string(),
                source,
            })?;

        artifact.validate().map_err(ArtifactError::Mismatch)?;
        Ok(artifact)
    }

    /// 直接由产物构造（测试与离线评估用）
    pub fn from_artifact(artifact: GbdtModelArtifact) -> Result<Self, ArtifactError> {
        artifact.validate().map_err(ArtifactError::Mismatch)?;
        Ok(Self::Loaded(artifact))
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable { reason: reason.into() }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        match self {
            Self::Loaded(_) => None,
            Self::Unavailable { reason } => Some(reason),
        }
    }

    /// 推理：特征向量 → 概率分布
    ///
    /// 纯查询，无副作用；不可用时返回 `None`，由仲裁层降级处理
    pub fn predict(&self, features: &FeatureVector) -> Option<ModelPrediction> {
        let artifact = match self {
            Self::Loaded(artifact) => artifact,
            Self::Unavailable { .. } => return None,
        };

        let row = features.to_array();
        let mut margins = [artifact.base_score; 5];
        let mut feature_weight = [0.0f64; FEATURE_DIM];

        for (class_index, trees) in artifact.class_trees.iter().enumerate().take(5) {
            for tree in trees {
                let mut visited = Vec::new();
                let leaf = tree.score(&row, &mut visited);
                margins[class_index] += leaf;
                for feature_index in visited {
                    feature_weight[feature_index] += leaf.abs();
                }
            }
        }

        let probabilities = softmax(&margins);
        let top_features = top_features(&feature_weight, 3);

        Some(ModelPrediction {
            probabilities,
            top_features,
            model_version: artifact.version.clone(),
        })
    }
}

/// softmax 归一化（减最大值防上溢）
fn softmax(margins: &[f64; 5]) -> [f64; 5] {
    let max = margins.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut exp = [0.0; 5];
    let mut sum = 0.0;
    for (i, margin) in margins.iter().enumerate() {
        exp[i] = (margin - max).exp();
        sum += exp[i];
    }
    for value in exp.iter_mut() {
        *value /= sum;
    }
    exp
}

/// 按累计权重取头部特征（权重相同时按特征下标，保证确定性）
fn top_features(weights: &[f64; FEATURE_DIM], count: usize) -> Vec<TopFeature> {
    let mut indexed: Vec<(usize, f64)> = weights
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, w)| *w > 0.0)
        .collect();
    indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
    indexed
        .into_iter()
        .take(count)
        .map(|(i, weight)| TopFeature {
            name: FEATURE_NAMES[i].to_string(),
            weight,
        })
        .collect()
}

/// 测试与离线评估共用的微型产物构造器
#[cfg(test)]
pub(crate) mod test_util {
    use super::*;

    fn stump(feature_index: usize, low: f64, high: f64) -> DecisionTree {
        DecisionTree {
            nodes: vec![
                TreeNode { feature_index, threshold: 0.5, left: 1, right: 2, leaf_value: None },
                TreeNode { feature_index: 0, threshold: 0.0, left: 0, right: 0, leaf_value: Some(low) },
                TreeNode { feature_index: 0, threshold: 0.0, left: 0, right: 0, leaf_value: Some(high) },
            ],
        }
    }

    /// 构造一个形态敏感的微型产物：
    /// 每个类别由对应的形态特征驱动（选项、字母答案、判断形态、空白标记、长答案）
    pub(crate) fn tiny_artifact() -> GbdtModelArtifact {
        GbdtModelArtifact {
            version: "test-1".to_string(),
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            classes: QuestionType::ALL.iter().map(|t| t.as_str().to_string()).collect(),
            base_score: 0.0,
            class_trees: vec![
                // single_choice: 有选项 + 单字母答案
                vec![stump(0, -1.0, 1.0), stump(2, -1.0, 2.0)],
                // multiple_choice: 多字母答案
                vec![stump(3, -1.0, 2.5)],
                // true_false: 答案形态已识别时的弱信号
                vec![stump(18, -0.5, 0.5)],
                // fill_blank: 题干含下划线空白
                vec![stump(13, -0.5, 2.0)],
                // subjective: 长答案
                vec![stump(6, -0.5, 0.8)],
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::tiny_artifact;
    use super::*;

    fn features_for_single_choice() -> FeatureVector {
        FeatureVector {
            has_options: 1,
            num_options: 4,
            answer_is_single_letter: 1,
            answer_is_multi_letters: 0,
            question_len: 24,
            option_len_mean: 5.0,
            answer_len: 1,
            punct_density: 0.08,
            question_mark_count: 0,
            hint_keywords_multi: 0,
            hint_keywords_tf: 0,
            hint_keywords_blank: 0,
            hint_keywords_subj: 0,
            blank_underline_count: 0,
            blank_parenthesis_count: 1,
            option_alignment_score: 0.9,
            layout_score: 1.0,
            ocr_conf_mean: 1.0,
            answer_pattern_id: 1,
        }
    }

    #[test]
    fn test_predict_prefers_single_choice_shape() {
        let classifier = StatisticalClassifier::from_artifact(tiny_artifact()).unwrap();
        let prediction = classifier.predict(&features_for_single_choice()).unwrap();
        let (best, prob) = prediction.best();

        assert_eq!(best, QuestionType::SingleChoice);
        assert!(prob > 0.2);
        assert!(!prediction.top_features.is_empty());
    }

    #[test]
    fn test_predict_is_deterministic() {
        let classifier = StatisticalClassifier::from_artifact(tiny_artifact()).unwrap();
        let features = features_for_single_choice();

        let first = classifier.predict(&features).unwrap();
        let second = classifier.predict(&features).unwrap();
        assert_eq!(first.probabilities, second.probabilities);
    }

    #[test]
    fn test_distribution_sums_to_one() {
        let classifier = StatisticalClassifier::from_artifact(tiny_artifact()).unwrap();
        let prediction = classifier.predict(&features_for_single_choice()).unwrap();
        let sum: f64 = prediction.probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unavailable_returns_none() {
        let classifier = StatisticalClassifier::unavailable("产物缺失");
        assert!(!classifier.is_available());
        assert!(classifier.predict(&features_for_single_choice()).is_none());
    }
}
