//! Application configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::storage::StorageConfig;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Generated document storage.
    #[serde(default)]
    pub storage: StorageSettings,
    /// Permit engine behaviour.
    #[serde(default)]
    pub permit: PermitConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Where rendered permit documents are written.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Base directory for stored files.
    #[serde(default = "default_storage_path")]
    pub base_path: PathBuf,
    /// Base URL the files are served from.
    #[serde(default = "default_storage_url")]
    pub base_url: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            base_path: default_storage_path(),
            base_url: default_storage_url(),
        }
    }
}

impl StorageSettings {
    /// Convert into a storage backend configuration.
    #[must_use]
    pub fn to_storage_config(&self) -> StorageConfig {
        StorageConfig::Local {
            base_path: self.base_path.clone(),
            base_url: self.base_url.clone(),
        }
    }
}

/// Permit engine options.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PermitConfig {
    /// Reject submissions missing a document for a mandatory requirement.
    #[serde(default)]
    pub enforce_mandatory_requirements: bool,
    /// Check submitted values against their declared field kind.
    #[serde(default)]
    pub strict_field_types: bool,
    /// Prefix prepended to every register number.
    #[serde(default)]
    pub register_prefix: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./files")
}

fn default_storage_url() -> String {
    "/files".to_string()
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `PERMIT_HUB_ENV`)
    /// 3. Environment variables with `PERMIT_HUB_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("PERMIT_HUB_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("PERMIT_HUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("PERMIT_HUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: Config = config::Config::builder()
            .set_override("database.url", "postgres://localhost/permits")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.max_connections, 20);
        assert!(!config.permit.enforce_mandatory_requirements);
        assert!(!config.permit.strict_field_types);
        assert!(config.permit.register_prefix.is_none());
        assert_eq!(config.storage.base_url, "/files");
    }

    #[test]
    fn test_permit_section_overrides() {
        let config: Config = config::Config::builder()
            .set_override("database.url", "postgres://localhost/permits")
            .unwrap()
            .set_override("permit.strict_field_types", true)
            .unwrap()
            .set_override("permit.register_prefix", "KEC")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert!(config.permit.strict_field_types);
        assert_eq!(config.permit.register_prefix.as_deref(), Some("KEC"));
    }
}
