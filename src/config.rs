use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{DEFAULT_STORAGE_ROOT, DEFAULT_TIMEOUT_SECS};

#[derive(Debug, Deserialize, Serialize)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub timeout_secs: Option<u64>,      // Optional to allow default value
    pub storage_root: Option<String>,   // Optional to allow default value
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub client: ClientConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: 21,
            timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            storage_root: Some(String::from(DEFAULT_STORAGE_ROOT)),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn storage_root(&self) -> &str {
        self.storage_root.as_deref().unwrap_or(DEFAULT_STORAGE_ROOT)
    }
}

impl Config {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path))?;
        let config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse configuration file: {}", path))?;
        Ok(config)
    }
}
