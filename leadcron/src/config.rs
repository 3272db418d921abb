// Configuration management with layered configuration (file, env)

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::RegistrationError;

/// Main settings structure for a scheduler host process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub lock: LockSettings,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Cluster coordination settings, shared by every member of the cluster.
///
/// The url scheme selects the backend: `postgres*` for the lease backend,
/// `redis*` for the lock backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockSettings {
    pub url: String,
    /// Lease/lock identifier, identical across the cluster.
    pub key: String,
    /// Lease/lock time-to-live in milliseconds.
    pub ttl_ms: u64,
    /// Lease renew interval in milliseconds.
    pub retry_ms: u64,
}

impl LockSettings {
    /// Presence checks applied during job registration, before any
    /// connection attempt is made.
    pub fn validate(&self) -> Result<(), RegistrationError> {
        if self.url.is_empty() {
            return Err(RegistrationError::MissingLockUrl);
        }
        if self.key.is_empty() {
            return Err(RegistrationError::MissingLockKey);
        }
        if self.ttl_ms == 0 {
            return Err(RegistrationError::MissingLockTtl);
        }
        if self.retry_ms == 0 {
            return Err(RegistrationError::MissingLockRetry);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
}

impl Settings {
    /// Load configuration with layered precedence: defaults → file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Local overrides, not committed to git
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate host-level settings before startup
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port must be greater than 0".to_string());
        }
        if self.observability.log_level.is_empty() {
            return Err("Log level cannot be empty".to_string());
        }
        self.lock
            .validate()
            .map_err(|e| format!("Invalid lock settings: {e}"))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            lock: LockSettings {
                url: "postgres://localhost/leadcron".to_string(),
                key: "leadcron:leader".to_string(),
                ttl_ms: 5000,
                retry_ms: 1000,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
            },
        }
    }
}
