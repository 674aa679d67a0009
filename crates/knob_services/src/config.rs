//! Provider configuration

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::storage::FileStorage;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// How a `SettingsProvider` stores and applies settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Key under which the whole registry is stored.
    pub storage_key: String,
    /// Directory for `FileStorage`; the platform config dir when unset.
    pub storage_dir: Option<PathBuf>,
    /// Whether new settings push to their connection on every change.
    pub apply_immediately: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            storage_key: "KnobSettings".to_string(),
            storage_dir: None,
            apply_immediately: false,
        }
    }
}

impl ProviderConfig {
    /// Read a JSON config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_owned(),
                    source,
                })
            }
        };

        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.storage_dir
            .clone()
            .unwrap_or_else(FileStorage::default_dir)
    }
}
