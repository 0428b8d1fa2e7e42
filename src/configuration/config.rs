use log::{debug, info};
use serde::Deserialize;
use std::net::IpAddr;
use std::path::Path;

use super::types::*;
use crate::error_handling::types::ConfigError;
use crate::service_management::types::Location;

/// Application configuration loaded from a TOML file.
///
/// Every section is optional and falls back to its defaults. Unknown keys are
/// rejected so that typos surface at startup instead of being ignored.
///
/// # Examples
///
/// ```toml
/// [api]
/// bind_address = "0.0.0.0"
/// port = 4050
///
/// [storage]
/// backend = "database"
/// path = "/var/lib/veil"
///
/// [provider]
/// identity = "0x1234..."
/// passphrase = ""
/// active_services = "openvpn,wireguard"
/// autostart = true
///
/// [location]
/// country = "LT"
/// city = "Vilnius"
/// ```
///
/// # Fields Overview
///
/// - `api`: bind address and port of the HTTP control surface
/// - `storage`: history backend and its directory
/// - `provider`: identity, passphrase and services for provider mode
/// - `location`: advertised location; when absent every service start is
///   rejected with an invalid location
/// - `engine`: settings handed to the native tunnel engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub provider: ProviderConfig,
    pub location: Option<Location>,
    pub engine: EngineOptions,
}

impl Config {
    /// Reads, parses and validates the configuration file at `path`.
    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        debug!("Reading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Config, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.api
            .bind_address
            .parse::<IpAddr>()
            .map_err(|_| ConfigError::BadIPFormatting(self.api.bind_address.clone()))?;

        if self.api.port == 0 {
            return Err(ConfigError::BadPort("api port must not be 0".to_string()));
        }

        if self.storage.backend().is_none() {
            return Err(ConfigError::UnknownStorageBackend(
                self.storage.backend.clone(),
            ));
        }

        if self.provider.autostart && self.provider.service_types().is_empty() {
            return Err(ConfigError::ServicesEmpty(
                "autostart needs at least one active service".to_string(),
            ));
        }
        Ok(())
    }
}
