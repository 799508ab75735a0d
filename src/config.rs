use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_API_ENDPOINT: &str = "https://logging.api.cloud.yandex.net";
pub const DEFAULT_IAM_ENDPOINT: &str = "https://iam.api.cloud.yandex.net/iam/v1/tokens";
pub const DEFAULT_METADATA_ENDPOINT: &str = "http://169.254.169.254";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub datasource: DatasourceSettings,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

/// Per-instance datasource settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatasourceSettings {
    pub api_endpoint: String,
    pub iam_endpoint: String,
    pub metadata_endpoint: String,
    pub folder_id: String,
    /// Service-account key JSON; empty means instance metadata credentials
    pub api_key_json: String,
    pub timeout_seconds: u64,
    pub derived_links: Vec<DerivedLinkConfig>,
}

impl Default for DatasourceSettings {
    fn default() -> Self {
        Self {
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            iam_endpoint: DEFAULT_IAM_ENDPOINT.to_string(),
            metadata_endpoint: DEFAULT_METADATA_ENDPOINT.to_string(),
            folder_id: String::new(),
            api_key_json: String::new(),
            timeout_seconds: 30,
            derived_links: Vec::new(),
        }
    }
}

/// A data link attached to every output field named `field`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DerivedLinkConfig {
    pub field: String,
    pub title: String,
    pub url: String,
    pub target_blank: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "/metrics".to_string(),
        }
    }
}

/// Load the optional TOML file at `path`, then overlay `LOGGING_DS__*` variables
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(config::Environment::with_prefix("LOGGING_DS").separator("__"))
        .build()?;

    let cfg: Config = config.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

pub fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    let ds = &cfg.datasource;
    validate_endpoint("api_endpoint", &ds.api_endpoint)?;
    validate_endpoint("iam_endpoint", &ds.iam_endpoint)?;
    validate_endpoint("metadata_endpoint", &ds.metadata_endpoint)?;

    if ds.timeout_seconds == 0 {
        anyhow::bail!("datasource.timeout_seconds must be greater than zero");
    }

    for link in &ds.derived_links {
        if link.field.is_empty() || link.url.is_empty() {
            anyhow::bail!("Derived link '{}' needs both field and url", link.title);
        }
    }

    if !matches!(cfg.server.log_format.as_str(), "text" | "json") {
        anyhow::bail!("Invalid log format: {}", cfg.server.log_format);
    }

    if cfg.metrics.enabled && !cfg.metrics.endpoint.starts_with('/') {
        anyhow::bail!("Metrics endpoint must start with '/': {}", cfg.metrics.endpoint);
    }

    Ok(())
}

fn validate_endpoint(name: &str, value: &str) -> anyhow::Result<()> {
    let url = reqwest::Url::parse(value)
        .map_err(|e| anyhow::anyhow!("datasource.{} is not a valid URL ({}): {}", name, e, value))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("datasource.{} must use http or https: {}", name, value);
    }
    Ok(())
}
