use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;

use crate::models::question::NormalizedQuestionRecord;

/// 从 JSON 文件加载一批规范化题目记录
///
/// 上游文档解析器按批产出 JSON 数组；本函数只做反序列化与契约校验，
/// 不做任何结构修复（修复属于重构器职责）
pub async fn load_record_batch(json_file_path: &Path) -> Result<Vec<NormalizedQuestionRecord>> {
    let content = fs::read_to_string(json_file_path)
        .await
        .with_context(|| format!("无法读取记录文件: {}", json_file_path.display()))?;

    let records: Vec<NormalizedQuestionRecord> = serde_json::from_str(&content)
        .with_context(|| format!("无法解析记录文件: {}", json_file_path.display()))?;

    validate_batch(&records)
        .with_context(|| format!("记录文件不满足输入契约: {}", json_file_path.display()))?;

    Ok(records)
}

/// 校验上游解析器的输入契约：题干非空、source_id 唯一
///
/// 选项与答案不在保证范围内（可能残缺），只告警不拒收
fn validate_batch(records: &[NormalizedQuestionRecord]) -> Result<()> {
    let mut seen = HashSet::new();
    for record in records {
        if record.question_text.trim().is_empty() {
            anyhow::bail!("记录 {} 的题干为空", record.source_id);
        }
        if !seen.insert(record.source_id.as_str()) {
            anyhow::bail!("source_id 重复: {}", record.source_id);
        }
        if !record.options_contiguous() {
            tracing::warn!("记录 {} 的选项键不是从 A 起的连续字母", record.source_id);
        }
    }
    Ok(())
}

/// 扫描文件夹并加载所有 JSON 记录文件
///
/// 单个文件加载失败只告警并跳过，不中断整批
pub async fn load_all_record_files(folder_path: &str) -> Result<Vec<NormalizedQuestionRecord>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut all_records = Vec::new();
    let mut seen = HashSet::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            files.push(path);
        }
    }
    // 目录遍历顺序不稳定，按文件名排序保证输出顺序可复现
    files.sort();

    for path in files {
        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_record_batch(&path).await {
            Ok(records) => {
                let count = records.len();
                for record in records {
                    if !seen.insert(record.source_id.clone()) {
                        anyhow::bail!("跨文件 source_id 重复: {}", record.source_id);
                    }
                    all_records.push(record);
                }
                tracing::info!("成功加载 {} 条记录", count);
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {}", path.display(), e);
            }
        }
    }

    Ok(all_records)
}
