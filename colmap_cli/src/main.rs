#![forbid(unsafe_code)]

mod app;
mod config;
mod logger;
mod model;
mod strategies;

use clap::Parser;

use crate::config::CliConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();
    logger::init_cli_logger(config.verbose);
    tracing::debug!(?config, "CLI config");
    config.validate()?;

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    app::run(&config, stdin.lock(), &mut stdout).await
}
