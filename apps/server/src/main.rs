use anyhow::Context;
use vanish::domain::config::AppConfig;
use vanish::kernel::config::load_config;
use vanish_logger::{Logger, parse_level};
use vanish_server::Server;

#[vanish_runtime::main(high_performance)]
async fn main() -> anyhow::Result<()> {
    let cfg: AppConfig = load_config(Some("server")).context("Critical: Configuration is malformed")?;

    let logger = Logger::builder()
        .name(env!("CARGO_PKG_NAME"))
        .level(parse_level(&cfg.log.level)?);
    let _log = match &cfg.log.path {
        Some(path) => logger.path(path).json(cfg.log.json).init()?,
        None => logger.init()?,
    };

    Server::builder().config(cfg).build().await?.run().await
}
