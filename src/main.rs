use std::path::PathBuf;

use anyhow::{Context, Result};
use transcript_compliance::{logger, App, Config};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load().context("加载配置失败")?;

    // 初始化日志
    logger::init(config.verbose_logging);

    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("TRANSCRIPT_FILE").map(PathBuf::from))
        .context("用法: transcript-compliance <file.txt>")?;

    // 初始化并运行应用
    App::initialize(config)?.run(&path).await?;

    Ok(())
}
