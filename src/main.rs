use anyhow::Result;
use question_recog::utils::logging;
use question_recog::{App, Config};

/// 默认配置文件路径
const CONFIG_FILE: &str = "question_recog.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置（TOML 文件可选，环境变量优先）
    let config = Config::load(CONFIG_FILE)?;

    // 初始化并运行应用
    App::initialize(config).await?.run().await?;

    Ok(())
}
