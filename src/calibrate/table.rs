//! 校准表 - 把原始置信度映射为与实测精度一致的概率
//!
//! 表由离线评估任务从留出标注集构建（见 evaluation 模块），
//! 推理端只做纯查表：固定表 + 固定输入 ⇒ 固定输出。
//! 查找链：细分桶 → 通道级 → 全局先验，样本不足逐级回退

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::models::question::ResultSource;

/// 桶内样本数低于该值时回退到更粗的层级
pub const DEFAULT_MIN_SAMPLES: u32 = 20;

/// 无任何评估数据时的全局先验
pub const DEFAULT_GLOBAL_PRIOR: f64 = 0.5;

/// 分桶统计：留出集上该桶的实测精度与样本量
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BucketStats {
    pub precision: f64,
    pub samples: u32,
}

/// 保序映射点列（x 为原始置信度，y 为实测精度，越界截断）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsotonicMapping {
    pub x_thresholds: Vec<f64>,
    pub y_thresholds: Vec<f64>,
}

impl IsotonicMapping {
    /// 分段线性插值，越界按端点截断
    pub fn apply(&self, x: f64) -> f64 {
        let points = &self.x_thresholds;
        let values = &self.y_thresholds;
        if points.is_empty() {
            return x;
        }
        if x <= points[0] {
            return values[0];
        }
        if x >= points[points.len() - 1] {
            return values[values.len() - 1];
        }
        for i in 1..points.len() {
            if x <= points[i] {
                let span = points[i] - points[i - 1];
                if span <= 0.0 {
                    return values[i];
                }
                let t = (x - points[i - 1]) / span;
                return values[i - 1] + t * (values[i] - values[i - 1]);
            }
        }
        values[values.len() - 1]
    }

    fn validate(&self) -> Result<(), String> {
        if self.x_thresholds.len() != self.y_thresholds.len() {
            return Err("保序映射的 x/y 点数不一致".to_string());
        }
        if self.x_thresholds.windows(2).any(|w| w[0] > w[1]) {
            return Err("保序映射的 x 点列必须非递减".to_string());
        }
        if self.y_thresholds.windows(2).any(|w| w[0] > w[1]) {
            return Err("保序映射的 y 点列必须非递减".to_string());
        }
        Ok(())
    }
}

/// 校准表
///
/// 载入后只读，跨工作线程共享无须加锁
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationTable {
    pub version: String,
    #[serde(default = "default_min_samples")]
    pub min_samples: u32,
    #[serde(default = "default_global_prior")]
    pub global_prior: f64,
    /// 通道级统计，键为 "rule" / "model" / "consensus"
    #[serde(default)]
    pub sources: HashMap<String, BucketStats>,
    /// 细分桶统计，键形如 "rule:single_choice_answer"、"model:model_p8"
    #[serde(default)]
    pub buckets: HashMap<String, BucketStats>,
    /// 模型分桶的保序映射（可选，缺失时退化为桶精度）
    #[serde(default)]
    pub isotonic_mappings: HashMap<String, IsotonicMapping>,
}

fn default_min_samples() -> u32 {
    DEFAULT_MIN_SAMPLES
}

fn default_global_prior() -> f64 {
    DEFAULT_GLOBAL_PRIOR
}

impl CalibrationTable {
    /// 无评估数据时的恒等表
    pub fn identity() -> Self {
        Self {
            version: "identity".to_string(),
            min_samples: DEFAULT_MIN_SAMPLES,
            global_prior: DEFAULT_GLOBAL_PRIOR,
            sources: HashMap::new(),
            buckets: HashMap::new(),
            isotonic_mappings: HashMap::new(),
        }
    }

    /// 从文件载入校准表
    ///
    /// 文件缺失只告警并退化为恒等表；表存在但格式损坏属于
    /// 配置错误，必须在任何记录进入流水线之前快速失败
    pub async fn load(table_path: &str) -> anyhow::Result<Self> {
        let path = Path::new(table_path);
        if !path.exists() {
            warn!("⚠️ 校准表不存在: {}，使用全局先验", table_path);
            return Ok(Self::identity());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| anyhow::anyhow!("校准表读取失败 ({}): {}", table_path, e))?;
        let table: CalibrationTable = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("校准表解析失败 ({}): {}", table_path, e))?;

        table
            .validate()
            .map_err(|e| anyhow::anyhow!("校准表非法 ({}): {}", table_path, e))?;

        info!("✓ 校准表载入成功: 版本 {} ({} 个分桶)", table.version, table.buckets.len());
        Ok(table)
    }

    /// 表自检：所有精度与先验必须落在 [0,1]，映射点列必须保序
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.global_prior) {
            return Err(format!("全局先验越界: {}", self.global_prior));
        }
        for (key, stats) in self.sources.iter().chain(self.buckets.iter()) {
            if !(0.0..=1.0).contains(&stats.precision) {
                return Err(format!("桶 {} 的精度越界: {}", key, stats.precision));
            }
        }
        for (key, mapping) in &self.isotonic_mappings {
            mapping.validate().map_err(|e| format!("桶 {} 的映射非法: {}", key, e))?;
        }
        Ok(())
    }

    /// 校准：`(通道, 分桶, 原始置信度) → 校准置信度`
    ///
    /// 回退链：细分桶（样本充足）→ 通道级（样本充足）→ 全局先验。
    /// 细分桶命中时优先走保序映射，否则直接取桶精度
    pub fn calibrate(&self, source: ResultSource, bucket: &str, raw_confidence: f64) -> f64 {
        let key = format!("{}:{}", source.as_str(), bucket);

        if let Some(stats) = self.buckets.get(&key) {
            if stats.samples >= self.min_samples {
                if let Some(mapping) = self.isotonic_mappings.get(bucket) {
                    return mapping.apply(raw_confidence).clamp(0.0, 1.0);
                }
                return stats.precision;
            }
        }

        self.source_precision(source)
    }

    /// 通道级历史精度（仲裁层用它比较两条通道）
    pub fn source_precision(&self, source: ResultSource) -> f64 {
        match self.sources.get(source.as_str()) {
            Some(stats) if stats.samples >= self.min_samples => stats.precision,
            _ => self.global_prior,
        }
    }

    /// 模型分桶键：最高概率按十分位落桶
    pub fn model_bucket(top_probability: f64) -> String {
        let decile = ((top_probability * 10.0).floor() as i64).clamp(0, 9);
        format!("model_p{}", decile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with_bucket(key: &str, precision: f64, samples: u32) -> CalibrationTable {
        let mut table = CalibrationTable::identity();
        table.buckets.insert(key.to_string(), BucketStats { precision, samples });
        table
    }

    #[test]
    fn test_bucket_lookup() {
        let table = table_with_bucket("rule:true_false_answer", 0.97, 300);
        let calibrated = table.calibrate(ResultSource::Rule, "true_false_answer", 0.9);
        assert!((calibrated - 0.97).abs() < 1e-9);
    }

    #[test]
    fn test_fallback_chain_on_thin_bucket() {
        // 桶样本不足 → 回退通道级 → 再回退全局先验
        let mut table = table_with_bucket("rule:true_false_answer", 0.97, 5);
        let calibrated = table.calibrate(ResultSource::Rule, "true_false_answer", 0.9);
        assert!((calibrated - table.global_prior).abs() < 1e-9);

        table.sources.insert(
            "rule".to_string(),
            BucketStats { precision: 0.88, samples: 500 },
        );
        let calibrated = table.calibrate(ResultSource::Rule, "true_false_answer", 0.9);
        assert!((calibrated - 0.88).abs() < 1e-9);
    }

    #[test]
    fn test_isotonic_interpolation_and_clipping() {
        let mapping = IsotonicMapping {
            x_thresholds: vec![0.2, 0.5, 0.9],
            y_thresholds: vec![0.3, 0.6, 0.95],
        };
        assert!((mapping.apply(0.05) - 0.3).abs() < 1e-9);
        assert!((mapping.apply(0.99) - 0.95).abs() < 1e-9);
        assert!((mapping.apply(0.35) - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_calibration_monotonic_in_bucket_precision() {
        // 同一分桶，实测精度越高校准值不得更低
        let low = table_with_bucket("rule:single_choice_answer", 0.7, 100);
        let high = table_with_bucket("rule:single_choice_answer", 0.9, 100);
        let raw = 0.85;
        let low_value = low.calibrate(ResultSource::Rule, "single_choice_answer", raw);
        let high_value = high.calibrate(ResultSource::Rule, "single_choice_answer", raw);
        assert!(high_value >= low_value);
    }

    #[test]
    fn test_validate_rejects_bad_precision() {
        let table = table_with_bucket("rule:x", 1.3, 100);
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_model_bucket_deciles() {
        assert_eq!(CalibrationTable::model_bucket(0.0), "model_p0");
        assert_eq!(CalibrationTable::model_bucket(0.85), "model_p8");
        assert_eq!(CalibrationTable::model_bucket(1.0), "model_p9");
    }
}
