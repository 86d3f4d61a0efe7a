//! Configuration loading and types.
//!
//! Settings come from an optional YAML file deserialized into [`Config`],
//! then the environment overrides the connection settings:
//!
//! | Variable                         | Field                        |
//! |----------------------------------|------------------------------|
//! | `DATABASE_URI`                   | `database.uri`               |
//! | `BLOB_STORAGE_CONNECTION_STRING` | `storage.connection_string`  |
//! | `CONTAINER_NAME`                 | `storage.container`          |
//!
//! Startup aborts if any of the three ends up empty.

use serde::Deserialize;
use std::path::Path;

pub const ENV_DATABASE_URI: &str = "DATABASE_URI";
pub const ENV_CONNECTION_STRING: &str = "BLOB_STORAGE_CONNECTION_STRING";
pub const ENV_CONTAINER_NAME: &str = "CONTAINER_NAME";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Note database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Image storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Observability settings.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind host address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum request body size in bytes (bounds image uploads).
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_size: default_max_upload_size(),
        }
    }
}

/// Note database configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DatabaseConfig {
    /// Database URI, e.g. `sqlite://./data/notes.db`.
    #[serde(default)]
    pub uri: String,
}

/// Image storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Backend type: `azure` or `memory`.
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// Azure storage connection string (account name and key).
    #[serde(default)]
    pub connection_string: String,

    /// Blob container holding the images.
    #[serde(default)]
    pub container: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            connection_string: String::new(),
            container: String::new(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.  `RUST_LOG` wins if set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Enable Prometheus metrics collection and the `/metrics` endpoint.
    #[serde(default = "default_true")]
    pub metrics: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { metrics: true }
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_max_upload_size() -> usize {
    32 * 1024 * 1024
}

fn default_storage_backend() -> String {
    "azure".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Loader ------------------------------------------------------------------

impl Config {
    /// Override connection settings with values from `lookup` (normally
    /// `std::env::var`).  Unset or empty variables leave the field alone.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(v) = get(ENV_DATABASE_URI) {
            self.database.uri = v;
        }
        if let Some(v) = get(ENV_CONNECTION_STRING) {
            self.storage.connection_string = v;
        }
        if let Some(v) = get(ENV_CONTAINER_NAME) {
            self.storage.container = v;
        }
    }

    /// Check that every required setting is present and the backend is known.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut missing = Vec::new();
        if self.database.uri.trim().is_empty() {
            missing.push(ENV_DATABASE_URI);
        }
        if self.storage.connection_string.trim().is_empty() {
            missing.push(ENV_CONNECTION_STRING);
        }
        if self.storage.container.trim().is_empty() {
            missing.push(ENV_CONTAINER_NAME);
        }
        if !missing.is_empty() {
            anyhow::bail!("missing required configuration: {}", missing.join(", "));
        }

        match self.storage.backend.as_str() {
            "azure" | "memory" => {}
            other => anyhow::bail!("unknown storage.backend '{}' (expected azure or memory)", other),
        }
        match self.logging.format.as_str() {
            "text" | "json" => {}
            other => anyhow::bail!("unknown logging.format '{}' (expected text or json)", other),
        }
        Ok(())
    }
}

/// Parse configuration from a YAML string.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
}

/// Load configuration: YAML file at `path` (if given), then the process
/// environment, then validation.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> anyhow::Result<Config> {
    let mut config = match path {
        Some(path) => {
            let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
                anyhow::anyhow!("cannot read config {}: {}", path.as_ref().display(), e)
            })?;
            parse_config(&contents)?
        }
        None => Config::default(),
    };
    config.apply_env(|name| std::env::var(name).ok());
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.storage.backend, "azure");
        assert_eq!(config.logging.level, "info");
        assert!(config.observability.metrics);
    }

    #[test]
    fn test_parse_yaml() {
        let config = parse_config(
            "
server:
  port: 8080
database:
  uri: sqlite://notes.db
storage:
  backend: memory
  connection_string: AccountName=a;AccountKey=YWI=
  container: images
logging:
  format: json
observability:
  metrics: false
",
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.database.uri, "sqlite://notes.db");
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.storage.container, "images");
        assert_eq!(config.logging.format, "json");
        assert!(!config.observability.metrics);
        config.validate().unwrap();
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = parse_config("storage:\n  container: from-file\n").unwrap();
        config.apply_env(env(&[
            (ENV_DATABASE_URI, "sqlite::memory:"),
            (ENV_CONNECTION_STRING, "AccountName=a;AccountKey=YWI="),
            (ENV_CONTAINER_NAME, "from-env"),
        ]));
        assert_eq!(config.storage.container, "from-env");
        assert_eq!(config.database.uri, "sqlite::memory:");
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_env_does_not_override() {
        let mut config = parse_config("storage:\n  container: from-file\n").unwrap();
        config.apply_env(env(&[(ENV_CONTAINER_NAME, "  ")]));
        assert_eq!(config.storage.container, "from-file");
    }

    #[test]
    fn test_validate_reports_all_missing() {
        let err = Config::default().validate().unwrap_err().to_string();
        assert!(err.contains(ENV_DATABASE_URI));
        assert!(err.contains(ENV_CONNECTION_STRING));
        assert!(err.contains(ENV_CONTAINER_NAME));
    }

    #[test]
    fn test_validate_rejects_unknown_backend() {
        let mut config = Config::default();
        config.apply_env(env(&[
            (ENV_DATABASE_URI, "notes.db"),
            (ENV_CONNECTION_STRING, "AccountName=a;AccountKey=YWI="),
            (ENV_CONTAINER_NAME, "images"),
        ]));
        config.storage.backend = "s3".to_string();
        assert!(config.validate().is_err());
    }
}
