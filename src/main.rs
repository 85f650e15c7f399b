use anyhow::{Context, Result};
use questionnaire_core::utils::logging;
use questionnaire_core::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置：命令行给出 TOML 路径时使用文件，否则读取环境变量
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_toml_file(&path).with_context(|| format!("加载配置文件失败: {}", path))?,
        None => Config::from_env().context("读取环境变量配置失败")?,
    };

    // 初始化日志
    let filter = if config.verbose_logging { "debug" } else { config.log_filter.as_str() };
    logging::init(filter);

    // 初始化并运行应用
    let stats = App::initialize(config).await?.run().await?;
    if stats.failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}
