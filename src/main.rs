use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cloud_logging_datasource::{config, init_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = cli::Cli::parse();

    // Logging settings come from the config file, so load it before tracing starts
    let loaded = config::load_config(&args.config);
    match &loaded {
        Ok(cfg) => init_tracing(&cfg.server.log_level, cfg.server.log_format == "json"),
        Err(_) => init_tracing("info", false),
    }

    // Dispatch to appropriate command handler
    match args.get_command() {
        cli::Commands::Serve => {
            commands::serve::execute(loaded?).await?;
        }
        cli::Commands::Check => {
            commands::check::execute(loaded?).await?;
        }
        cli::Commands::Groups { folder_id, key_file } => {
            commands::groups::execute(loaded?, folder_id, key_file).await?;
        }
        cli::Commands::Config { action } => match action {
            cli::ConfigCommands::Show => commands::config::show(&loaded?)?,
            cli::ConfigCommands::Validate => commands::config::validate(&args.config, loaded)?,
        },
        cli::Commands::Version => {
            println!("Cloud Logging datasource v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
