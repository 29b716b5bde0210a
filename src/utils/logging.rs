use anyhow::Result;
/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::fs;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化 tracing 日志
///
/// 默认 info 级别，可通过 RUST_LOG 覆盖
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// 初始化运行日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
///
/// # 返回
/// 返回是否成功初始化
pub fn init_run_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n题型识别日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(max_concurrent: usize, classifier_available: bool) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 批量题型识别模式");
    info!("📊 最大并发数: {}", max_concurrent);
    if classifier_available {
        info!("🤖 统计分类器: 可用");
    } else {
        info!("⚠️ 统计分类器: 不可用，降级为纯规则模式");
    }
    info!("{}", "=".repeat(60));
}

/// 记录记录加载信息
pub fn log_records_loaded(total: usize, max_concurrent: usize) {
    info!("✓ 找到 {} 条待识别的记录", total);
    info!("📋 将以最多 {} 路并发进行识别\n", max_concurrent);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
