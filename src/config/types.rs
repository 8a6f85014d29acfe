//! Agent configuration structs and defaults.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub log: LogSettings,
    #[serde(default)]
    pub snmp: SnmpSettings,
}

/// One UPS endpoint. `name` is the unique fleet-wide key and the log-file
/// stem for the device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub name: String,
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_community")]
    pub community: String,
    #[serde(default = "default_version")]
    pub version: u8, // SNMP version (1 or 2)
    #[serde(default)]
    pub timeout_secs: Option<u64>, // overrides snmp.timeout_secs
    #[serde(default)]
    pub retries: Option<u32>, // overrides snmp.retries
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnmpSettings {
    pub timeout_secs: u64,
    pub retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    pub directory: String,
    pub format: LogFormat,
    pub rotation: bool, // new file per calendar day
    pub max_size_mb: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Csv,
    Jsonl,
}

impl LogFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            LogFormat::Csv => "csv",
            LogFormat::Jsonl => "jsonl",
        }
    }
}

fn default_poll_interval() -> u64 {
    60
}
fn default_port() -> u16 {
    161
}
fn default_community() -> String {
    "public".to_string()
}
fn default_version() -> u8 {
    2
}

impl Default for SnmpSettings {
    fn default() -> Self {
        Self { timeout_secs: 5, retries: 3 }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            directory: "logs".to_string(),
            format: LogFormat::Csv,
            rotation: true,
            max_size_mb: 100,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            poll_interval_secs: default_poll_interval(),
            log: LogSettings::default(),
            snmp: SnmpSettings::default(),
        }
    }
}

impl MonitorConfig {
    /// Reject configurations the rest of the system assumes away: duplicate
    /// or file-hostile device names and unsupported protocol versions.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for device in &self.devices {
            if device.name.is_empty() {
                bail!("device with address {} has an empty name", device.address);
            }
            if device.name.contains(['/', '\\']) {
                bail!("device name '{}' must not contain path separators", device.name);
            }
            if !seen.insert(device.name.as_str()) {
                bail!("duplicate device name '{}'", device.name);
            }
            if device.version != 1 && device.version != 2 {
                bail!(
                    "unsupported SNMP version {} for device '{}'",
                    device.version,
                    device.name
                );
            }
        }
        Ok(())
    }
}
