//! Configuration types for STOWAGE

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::StowageError;
use crate::traits::StowageResult;

/// Main host configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Host name for logging
    pub name: String,

    /// Data directory
    pub data_dir: PathBuf,

    /// API configuration
    pub api: ApiConfig,

    /// Ephemeral account configuration
    pub accounts: AccountsConfig,

    /// Logging level
    pub log_level: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            name: "stowage-host".to_string(),
            data_dir: PathBuf::from("./data"),
            api: ApiConfig::default(),
            accounts: AccountsConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl HostConfig {
    /// Load a configuration from a JSON file; missing fields take their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> StowageResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            StowageError::ConfigError(format!("{}: {}", path.as_ref().display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| StowageError::ConfigError(e.to_string()))
    }

    /// Path of the host database inside the data directory
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("host.db")
    }
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Enable HTTP API
    pub enabled: bool,

    /// API listen address
    pub listen_addr: String,

    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: "127.0.0.1:9980".to_string(),
            enable_cors: false,
        }
    }
}

/// Ephemeral account configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountsConfig {
    /// Maximum balance a single account may hold, in hastings
    pub max_account_balance: u128,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            max_account_balance: 10_000 * crate::types::Currency::ONE_SC, // 10k SC
        }
    }
}
