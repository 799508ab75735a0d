use anyhow::{bail, Result};
use cloud_logging_datasource::{config::Config, datasource::Datasource, models::query::HealthStatus};
use colored::Colorize;

/// Execute the check command
///
/// Builds the client from configuration and runs one health probe
pub async fn execute(cfg: Config) -> Result<()> {
    println!("{}", "Checking cloud logging connection...".yellow());
    println!("  {}: {}", "Endpoint".cyan(), cfg.datasource.api_endpoint);
    println!(
        "  {}: {}",
        "Credentials".cyan(),
        if cfg.datasource.api_key_json.is_empty() {
            "instance metadata"
        } else {
            "service account key"
        }
    );

    let datasource = Datasource::new(&cfg.datasource)?;
    let result = datasource.check_health().await;
    datasource.dispose().await;

    match result.status {
        HealthStatus::Ok => {
            println!("{}", "✓ Connection OK".green());
            Ok(())
        }
        HealthStatus::Error => {
            println!("{} {}", "✗ Connection failed:".red(), result.message);
            bail!("health check failed: {}", result.message)
        }
    }
}
