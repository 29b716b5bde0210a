//! 模型产物 - 梯度提升决策树的序列化表示
//!
//! 产物由离线训练任务导出为带版本的 JSON 文件；推理端只读。
//! 固定产物 + 固定特征向量 ⇒ 输出分布逐位可复现

use serde::{Deserialize, Serialize};

use crate::models::features::{FEATURE_DIM, FEATURE_NAMES};
use crate::models::question_type::QuestionType;

/// 树节点
///
/// `leaf_value` 非空表示叶子；内部节点按
/// `features[feature_index] < threshold` 走左子树，否则走右子树
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(default)]
    pub feature_index: usize,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub left: usize,
    #[serde(default)]
    pub right: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaf_value: Option<f64>,
}

/// 单棵决策树，节点以下标数组存储，0 号为根
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// 沿决策路径累加叶子边际值；`visited` 记录路径上用到的特征下标
    pub fn score(&self, features: &[f64; FEATURE_DIM], visited: &mut Vec<usize>) -> f64 {
        let mut index = 0usize;
        // 节点数即路径长度上限，防御损坏产物中的环
        for _ in 0..self.nodes.len() {
            let Some(node) = self.nodes.get(index) else {
                return 0.0;
            };
            if let Some(leaf) = node.leaf_value {
                return leaf;
            }
            if node.feature_index >= FEATURE_DIM {
                return 0.0;
            }
            visited.push(node.feature_index);
            index = if features[node.feature_index] < node.threshold {
                node.left
            } else {
                node.right
            };
        }
        0.0
    }
}

/// 梯度提升模型产物
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbdtModelArtifact {
    /// 产物版本号，随每次离线训练递增
    pub version: String,
    /// 训练时的特征名顺序，载入时与推理端核对
    pub feature_names: Vec<String>,
    /// 类别标识，顺序与每类树列表对应
    pub classes: Vec<String>,
    /// 各类别的初始边际值
    #[serde(default)]
    pub base_score: f64,
    /// 每个类别一组树，类别顺序与 `classes` 一致
    pub class_trees: Vec<Vec<DecisionTree>>,
}

impl GbdtModelArtifact {
    /// 校验产物自洽性
    ///
    /// 特征名与类别表必须与推理端完全一致——类别表不符说明
    /// 产物来自另一套分类体系，属于配置错误而非可降级故障
    pub fn validate(&self) -> Result<(), String> {
        if self.feature_names.len() != FEATURE_DIM {
            return Err(format!(
                "特征维度不符: 产物 {} 维, 推理端 {} 维",
                self.feature_names.len(),
                FEATURE_DIM
            ));
        }
        for (i, name) in self.feature_names.iter().enumerate() {
            if name != FEATURE_NAMES[i] {
                return Err(format!(
                    "特征名不符: 第 {} 维产物为 {}, 推理端为 {}",
                    i, name, FEATURE_NAMES[i]
                ));
            }
        }
        if self.classes.len() != QuestionType::ALL.len() {
            return Err(format!("类别数不符: 产物 {} 类", self.classes.len()));
        }
        for (i, class) in self.classes.iter().enumerate() {
            if class != QuestionType::ALL[i].as_str() {
                return Err(format!("类别表不符: 第 {} 类产物为 {}", i, class));
            }
        }
        if self.class_trees.len() != self.classes.len() {
            return Err("每个类别必须有对应的树列表".to_string());
        }
        Ok(())
    }
}
