use std::path::PathBuf;

use analysis_submit::{logger, App, Config};
use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logger::init();

    // 加载配置
    let config = Config::from_env();

    // 命令行参数即待提交的文件
    let paths: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();

    // 初始化并运行应用
    App::initialize(config).await?.run(&paths).await?;

    Ok(())
}
