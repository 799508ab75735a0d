use anyhow::{bail, Context, Result};
use cloud_logging_datasource::{config::Config, datasource::Datasource, suggest};
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

/// Execute the groups command
///
/// Lists every log group of the folder with its name and id. `--folder-id`
/// and `--key-file` override the configured values.
pub async fn execute(
    mut cfg: Config,
    folder_id: Option<String>,
    key_file: Option<PathBuf>,
) -> Result<()> {
    if let Some(folder_id) = folder_id {
        cfg.datasource.folder_id = folder_id;
    }
    if let Some(path) = key_file {
        cfg.datasource.api_key_json = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read key file {}", path.display()))?;
    }
    if cfg.datasource.folder_id.is_empty() {
        bail!("No folder id configured; pass --folder-id or set datasource.folder_id");
    }

    let datasource = Datasource::new(&cfg.datasource)?;
    let groups = suggest::list_groups(datasource.service(), datasource.folder_id()).await;
    datasource.dispose().await;
    let groups = groups?;

    info!(folder_id = %cfg.datasource.folder_id, count = groups.len(), "Listed log groups");
    println!(
        "{} {}",
        "Log groups in folder".bold(),
        cfg.datasource.folder_id.cyan()
    );
    for group in &groups {
        println!("  {}  {}", group.id.cyan(), group.name);
    }
    println!("{} group(s)", groups.len());

    Ok(())
}
