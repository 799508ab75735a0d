use anyhow::Result;
use cloud_logging_datasource::{config::Config, server};
use colored::Colorize;
use tracing::info;

/// Execute the serve command (blocks until shutdown)
pub async fn execute(cfg: Config) -> Result<()> {
    println!("{}", "Starting cloud logging datasource...".green());
    info!(
        host = %cfg.server.host,
        port = cfg.server.port,
        "Starting datasource server"
    );

    server::start_server(cfg).await
}
