//! 离线评估 - 指标计算与校准表构建
//!
//! 消费金标标注（source_id + gold_type），产出准确率、各题型
//! 精确率/召回率/F1、混淆矩阵与期望校准误差；并从同一份标注
//! 重建校准表的分桶精度。只在批处理离线路径运行，
//! 绝不进入识别热路径

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::calibrate::table::BucketStats;
use crate::calibrate::CalibrationTable;
use crate::models::question::Evidence;
use crate::models::question_type::QuestionType;
use crate::pipeline::OutputPair;

/// 金标标注行（JSONL，每行一条）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldLabel {
    pub source_id: String,
    pub gold_type: QuestionType,
}

/// 从 JSONL 文件加载金标标注
pub async fn load_gold_labels(labels_path: &str) -> Result<HashMap<String, QuestionType>> {
    let path = Path::new(labels_path);
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取标注文件: {}", labels_path))?;

    let mut labels = HashMap::new();
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let label: GoldLabel = serde_json::from_str(line)
            .with_context(|| format!("标注文件第 {} 行非法: {}", line_no + 1, labels_path))?;
        labels.insert(label.source_id, label.gold_type);
    }

    info!("📊 加载了 {} 条金标标注", labels.len());
    Ok(labels)
}

/// 单题型指标
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// 评估报告
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    /// 输出对总数
    pub total: usize,
    /// 命中金标的样本数
    pub labeled: usize,
    pub accuracy: f64,
    pub per_class: HashMap<String, ClassMetrics>,
    pub macro_f1: f64,
    /// 行为金标、列为预测，顺序同 [`QuestionType::ALL`]
    pub confusion_matrix: [[usize; 5]; 5],
    /// 期望校准误差
    pub ece: f64,
    pub manual_review_rate: f64,
}

/// 对一批输出与金标计算评估指标
pub fn evaluate(pairs: &[OutputPair], gold: &HashMap<String, QuestionType>) -> EvaluationReport {
    let mut confusion = [[0usize; 5]; 5];
    let mut labeled = 0usize;
    let mut correct = 0usize;
    let mut manual_review = 0usize;
    let mut ece_samples: Vec<(f64, bool)> = Vec::new();

    for pair in pairs {
        if pair.result.needs_manual_review {
            manual_review += 1;
        }
        let Some(gold_type) = gold.get(&pair.result.lineage) else {
            continue;
        };
        let Some(predicted) = pair.result.question_type else {
            continue;
        };

        labeled += 1;
        let hit = predicted == *gold_type;
        if hit {
            correct += 1;
        }
        confusion[gold_type.class_index()][predicted.class_index()] += 1;
        ece_samples.push((pair.result.confidence, hit));
    }

    let accuracy = if labeled > 0 {
        correct as f64 / labeled as f64
    } else {
        0.0
    };

    let mut per_class = HashMap::new();
    let mut f1_sum = 0.0;
    for question_type in QuestionType::ALL {
        let i = question_type.class_index();
        let true_positive = confusion[i][i];
        let predicted_total: usize = (0..5).map(|row| confusion[row][i]).sum();
        let gold_total: usize = confusion[i].iter().sum();

        let precision = ratio(true_positive, predicted_total);
        let recall = ratio(true_positive, gold_total);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        f1_sum += f1;

        per_class.insert(
            question_type.as_str().to_string(),
            ClassMetrics { precision, recall, f1, support: gold_total },
        );
    }

    EvaluationReport {
        total: pairs.len(),
        labeled,
        accuracy,
        per_class,
        macro_f1: f1_sum / QuestionType::ALL.len() as f64,
        confusion_matrix: confusion,
        ece: calculate_ece(&ece_samples, 10),
        manual_review_rate: ratio(manual_review, pairs.len()),
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator > 0 {
        numerator as f64 / denominator as f64
    } else {
        0.0
    }
}

/// 期望校准误差（ECE）
///
/// 按置信度分箱，累加每箱 |平均置信度 - 实际准确率| × 箱内占比
pub fn calculate_ece(samples: &[(f64, bool)], n_bins: usize) -> f64 {
    if samples.is_empty() || n_bins == 0 {
        return 0.0;
    }

    let total = samples.len() as f64;
    let mut ece = 0.0;

    for bin in 0..n_bins {
        let lower = bin as f64 / n_bins as f64;
        let upper = (bin + 1) as f64 / n_bins as f64;

        let in_bin: Vec<&(f64, bool)> = samples
            .iter()
            .filter(|(confidence, _)| {
                // 首箱包含下边界，其余左开右闭
                (*confidence > lower || (bin == 0 && *confidence >= lower)) && *confidence <= upper
            })
            .collect();
        if in_bin.is_empty() {
            continue;
        }

        let bin_size = in_bin.len() as f64;
        let avg_confidence: f64 = in_bin.iter().map(|(c, _)| c).sum::<f64>() / bin_size;
        let accuracy: f64 =
            in_bin.iter().filter(|(_, hit)| *hit).count() as f64 / bin_size;

        ece += (avg_confidence - accuracy).abs() * (bin_size / total);
    }

    ece
}

/// 从金标结果重建校准表
///
/// 每个 (通道, 分桶) 的精度 = 桶内预测正确的比例；
/// 模型分桶按最终置信度的十分位落桶
pub fn build_calibration_table(
    pairs: &[OutputPair],
    gold: &HashMap<String, QuestionType>,
    min_samples: u32,
) -> CalibrationTable {
    struct Tally {
        correct: u32,
        total: u32,
    }

    let mut bucket_tally: HashMap<String, Tally> = HashMap::new();
    let mut source_tally: HashMap<String, Tally> = HashMap::new();
    let mut global_correct = 0u32;
    let mut global_total = 0u32;

    for pair in pairs {
        let Some(gold_type) = gold.get(&pair.result.lineage) else {
            continue;
        };
        let Some(predicted) = pair.result.question_type else {
            continue;
        };

        let bucket = match &pair.result.evidence {
            Evidence::Rule { rule_id } => rule_id.clone(),
            Evidence::Model { .. } => CalibrationTable::model_bucket(pair.result.confidence),
            Evidence::Consensus { winner, .. } => winner.clone(),
            Evidence::Unresolved { .. } => continue,
        };
        let source = pair.result.source.as_str().to_string();
        let hit = predicted == *gold_type;

        let entry = bucket_tally
            .entry(format!("{}:{}", source, bucket))
            .or_insert(Tally { correct: 0, total: 0 });
        entry.total += 1;
        entry.correct += u32::from(hit);

        let entry = source_tally.entry(source).or_insert(Tally { correct: 0, total: 0 });
        entry.total += 1;
        entry.correct += u32::from(hit);

        global_total += 1;
        global_correct += u32::from(hit);
    }

    let to_stats = |tally: &Tally| BucketStats {
        precision: if tally.total > 0 {
            f64::from(tally.correct) / f64::from(tally.total)
        } else {
            0.0
        },
        samples: tally.total,
    };

    let mut table = CalibrationTable::identity();
    table.version = format!("eval-{}", chrono::Local::now().format("%Y%m%d%H%M%S"));
    table.min_samples = min_samples;
    if global_total > 0 {
        table.global_prior = f64::from(global_correct) / f64::from(global_total);
    }
    table.sources = source_tally.iter().map(|(k, t)| (k.clone(), to_stats(t))).collect();
    table.buckets = bucket_tally.iter().map(|(k, t)| (k.clone(), to_stats(t))).collect();

    info!(
        "✓ 校准表重建完成: {} 个分桶, 全局先验 {:.3}",
        table.buckets.len(),
        table.global_prior
    );
    table
}
