use serde::Deserialize;
use std::path::PathBuf;

use crate::connection::factory::EngineSettings;

/// `[api]` section: where the HTTP control surface listens.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 4050,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    File,
    Database,
}

/// `[storage]` section: history persistence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// "file" or "database"
    pub backend: String,
    /// Directory holding the history files or the database
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "file".to_string(),
            path: PathBuf::from(".veil"),
        }
    }
}

impl StorageConfig {
    pub fn backend(&self) -> Option<StorageBackend> {
        match self.backend.as_str() {
            "file" => Some(StorageBackend::File),
            "database" => Some(StorageBackend::Database),
            _ => None,
        }
    }
}

/// `[provider]` section: identity and services offered in provider mode.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    pub identity: String,
    pub passphrase: String,
    /// Comma-delimited service types, e.g. "openvpn,wireguard"
    pub active_services: String,
    pub chain_id: i64,
    /// Start every active service once the node is up
    pub autostart: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            identity: String::new(),
            passphrase: String::new(),
            active_services: "wireguard".to_string(),
            chain_id: 1,
            autostart: false,
        }
    }
}

impl ProviderConfig {
    pub fn service_types(&self) -> Vec<String> {
        self.active_services
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// `[engine]` section: native tunnel engine tuning.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineOptions {
    pub gui_version: String,
    pub compression_mode: String,
    /// 0 reconnects forever
    pub conn_timeout: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        let settings = EngineSettings::default();
        Self {
            gui_version: settings.gui_version,
            compression_mode: settings.compression_mode,
            conn_timeout: settings.conn_timeout,
        }
    }
}

impl From<&EngineOptions> for EngineSettings {
    fn from(options: &EngineOptions) -> Self {
        EngineSettings {
            gui_version: options.gui_version.clone(),
            compression_mode: options.compression_mode.clone(),
            conn_timeout: options.conn_timeout,
        }
    }
}
