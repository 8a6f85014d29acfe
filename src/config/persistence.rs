//! Config file load and validation.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::types::MonitorConfig;

pub const DEFAULT_CONFIG_FILE: &str = "config.json";

pub async fn load_config(path: Option<&Path>) -> Result<MonitorConfig> {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    if config_path.exists() {
        let content = tokio::fs::read_to_string(&config_path)
            .await
            .with_context(|| format!("Failed to read config file {:?}", config_path))?;
        let config: MonitorConfig = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {:?}", config_path))?;
        config.validate()?;

        if config.devices.is_empty() {
            warn!("No devices configured in {:?}; nothing will be monitored.", config_path);
        }
        info!("Loaded configuration from: {:?}", config_path);
        Ok(config)
    } else {
        warn!("Config file {:?} not found, using built-in defaults.", config_path);
        Ok(MonitorConfig::default())
    }
}
