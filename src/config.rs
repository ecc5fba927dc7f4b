//! Application configuration loaded from TOML.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::schedule::DEFAULT_TRAILING_DAYS;

/// Environment variable that overrides `server.admin_password`.
pub const ADMIN_PASSWORD_ENV: &str = "ADMIN_PASSWORD";

const DEFAULT_LOCATIONS: [&str; 2] = ["office-parking.toml", "config.toml"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub allocation: AllocationConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::ReadFile)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when given, otherwise the first default location that exists, otherwise
    /// defaults. The admin password environment variable is applied last.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                tracing::info!("Loading config from: {}", path.display());
                Self::from_file(path)?
            }
            None => match DEFAULT_LOCATIONS.iter().map(PathBuf::from).find(|p| p.exists()) {
                Some(found) => {
                    tracing::info!("Loading config from: {}", found.display());
                    Self::from_file(&found)?
                }
                None => {
                    tracing::info!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        if let Ok(password) = std::env::var(ADMIN_PASSWORD_ENV) {
            config.apply_admin_password(password);
        }
        Ok(config)
    }

    pub fn apply_admin_password(&mut self, password: String) {
        if !password.is_empty() {
            self.server.admin_password = password;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.admin_password.is_empty() {
            return Err(ConfigError::Invalid("server.admin_password must not be empty".to_string()));
        }
        if self.storage.snapshot_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("storage.snapshot_path must not be empty".to_string()));
        }
        if self.allocation.trailing_days == 0 {
            return Err(ConfigError::Invalid("allocation.trailing_days must be > 0".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Value expected in the `X-Admin-Password` header
    pub admin_password: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            admin_password: "admin123".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON snapshot holding users, attendance, inventory, settings and assignments
    pub snapshot_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("data/office-parking.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    /// Days of history used for scoring and the attendance minimum
    pub trailing_days: u32,
    /// Extra attempts per date after a commit conflict
    pub commit_retries: u32,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            trailing_days: DEFAULT_TRAILING_DAYS,
            commit_retries: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive; `RUST_LOG` takes precedence
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,actix_web=info".to_string(),
        }
    }
}
