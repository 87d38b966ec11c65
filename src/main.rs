use anyhow::Result;
use paper_review::{logger, App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置（TOML + 环境变量）
    let config = Config::load()?;

    // 初始化日志
    logger::try_init(config.verbose_logging);

    // 初始化并运行应用
    let report = App::initialize(config).await?.run().await?;
    if let Some(review) = report.gen_review {
        println!("{}", review);
    }

    Ok(())
}
