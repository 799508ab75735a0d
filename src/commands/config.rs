use anyhow::Result;
use cloud_logging_datasource::config::Config;
use colored::Colorize;
use std::path::Path;
use tracing::info;

/// Execute the config show command
///
/// Displays the effective configuration with the service account key masked
pub fn show(cfg: &Config) -> Result<()> {
    info!("Displaying configuration");

    let sanitized = sanitize_secrets(cfg);

    println!("{}", "Current Configuration:".green().bold());
    println!();

    let toml_string = toml::to_string_pretty(&sanitized)?;
    println!("{}", toml_string);

    Ok(())
}

/// Execute the config validate command
pub fn validate(path: &Path, loaded: Result<Config>) -> Result<()> {
    println!(
        "{} {}",
        "Validating configuration...".yellow(),
        path.display()
    );

    let cfg = match loaded {
        Ok(cfg) => cfg,
        Err(e) => {
            println!("{} {}", "✗ Configuration is invalid:".red(), e);
            return Err(e);
        }
    };

    println!("{}", "✓ Configuration is valid".green());
    println!();
    println!("{}", "Summary:".bold());
    println!("  {}: {}:{}", "Server".cyan(), cfg.server.host, cfg.server.port);
    println!("  {}: {}", "API Endpoint".cyan(), cfg.datasource.api_endpoint);
    println!(
        "  {}: {}",
        "Folder".cyan(),
        if cfg.datasource.folder_id.is_empty() {
            "(none)"
        } else {
            cfg.datasource.folder_id.as_str()
        }
    );
    println!(
        "  {}: {}",
        "Credentials".cyan(),
        if cfg.datasource.api_key_json.is_empty() {
            "instance metadata"
        } else {
            "service account key"
        }
    );
    println!("  {}: {}", "Derived Links".cyan(), cfg.datasource.derived_links.len());
    println!(
        "  {}: {}",
        "Metrics".cyan(),
        if cfg.metrics.enabled {
            "enabled".green()
        } else {
            "disabled".red()
        }
    );

    info!("Configuration validation successful");
    Ok(())
}

/// Mask secrets in configuration for safe display
fn sanitize_secrets(cfg: &Config) -> Config {
    let mut sanitized = cfg.clone();
    sanitized.datasource.api_key_json = mask_key_json(&sanitized.datasource.api_key_json);
    sanitized
}

/// Keep only the key id of a service account key
///
/// Example: `{"id":"ajeabc",...}` -> `*** (key ajeabc)`
fn mask_key_json(key_json: &str) -> String {
    if key_json.is_empty() {
        return String::new();
    }

    let key_id = serde_json::from_str::<serde_json::Value>(key_json)
        .ok()
        .and_then(|v| v.get("id").and_then(|id| id.as_str()).map(str::to_string));

    match key_id {
        Some(id) => format!("*** (key {})", id),
        None => "***".to_string(),
    }
}
