//! Database configuration.

use crate::storage::StorageFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Storage format must be 'json' or 'binary', got '{0}'")]
    InvalidFormat(String),
}

/// Where tables are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database name, used in logs.
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default)]
    pub storage: StorageKind,

    /// Directory for table and metadata files. Ignored for memory storage.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Table file format; metadata is always JSON.
    #[serde(default)]
    pub format: StorageFormat,
}

fn default_name() -> String {
    "minidb".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            storage: StorageKind::default(),
            data_dir: default_data_dir(),
            format: StorageFormat::default(),
        }
    }
}

impl DatabaseConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Volatile storage, nothing touches the filesystem.
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            storage: StorageKind::Memory,
            ..Self::default()
        }
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.storage = StorageKind::File;
        self.data_dir = data_dir.into();
        self
    }

    pub fn with_format(mut self, format: StorageFormat) -> Self {
        self.format = format;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}
