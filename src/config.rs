//! Node configuration
//!
//! Read from a JSON file, then overridden from `ASSET_TRAIL_*` environment
//! variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::StorageConfig;

pub const ENV_DATA_DIR: &str = "ASSET_TRAIL_DATA_DIR";
pub const ENV_LOG_LEVEL: &str = "ASSET_TRAIL_LOG_LEVEL";
pub const ENV_EVENT_BUFFER: &str = "ASSET_TRAIL_EVENT_BUFFER";
pub const ENV_PERSIST_INSTANCES: &str = "ASSET_TRAIL_PERSIST_INSTANCES";

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetTrailConfig {
    /// Root of every on-disk collaborator
    pub data_dir: PathBuf,
    pub log_level: String,
    /// Capacity of the ledger event channel
    pub event_buffer: usize,
    /// Write instances to `instances/` under `data_dir`
    pub persist_instances: bool,
}

impl Default for AssetTrailConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./asset_trail_data"),
            log_level: "info".to_string(),
            event_buffer: 256,
            persist_instances: true,
        }
    }
}

impl AssetTrailConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = std::fs::read(path.as_ref())?;
        let config: Self =
            serde_json::from_slice(&data).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validated()
    }

    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        if let Some(buffer) = lookup(ENV_EVENT_BUFFER) {
            self.event_buffer = buffer
                .trim()
                .parse()
                .map_err(|_| invalid(ENV_EVENT_BUFFER, &buffer))?;
        }
        if let Some(persist) = lookup(ENV_PERSIST_INSTANCES) {
            self.persist_instances = match persist.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => return Err(invalid(ENV_PERSIST_INSTANCES, &persist)),
            };
        }
        self.validated()
    }

    fn validated(mut self) -> Result<Self, ConfigError> {
        self.log_level = self.log_level.trim().to_ascii_lowercase();
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(invalid("log_level", &self.log_level));
        }
        if self.event_buffer == 0 {
            return Err(invalid("event_buffer", "0"));
        }
        Ok(self)
    }

    pub fn storage(&self) -> StorageConfig {
        StorageConfig::under(&self.data_dir)
    }

    pub fn instances_dir(&self) -> PathBuf {
        self.data_dir.join("instances")
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}
