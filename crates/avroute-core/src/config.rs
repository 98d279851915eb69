/*!
 * Configuration management for avroute.
 *
 * Settings are layered: built-in defaults, then an optional TOML file, then
 * environment variables (`AVROUTE__TRANSPORT__CONNECT_TIMEOUT_MS=2000`).
 */
use std::path::Path;
use std::time::Duration;

use config::{Config as ConfigLib, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Default environment variable prefix.
pub const ENV_PREFIX: &str = "AVROUTE";

/// Core configuration for avroute
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// General configuration
    #[serde(default)]
    pub general: GeneralConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Transport configuration
    #[serde(default)]
    pub transport: TransportConfig,
}

/// General configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Application name
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Application environment (development, production, etc.)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// List experimental drivers alongside stable ones
    #[serde(default)]
    pub show_experimental: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to include the event target in each line
    #[serde(default = "default_true")]
    pub show_target: bool,

    /// Whether to colour the output
    #[serde(default = "default_true")]
    pub ansi: bool,
}

/// Transport configuration
///
/// These values override the per-vendor defaults; serial framing is never
/// configurable here because it is fixed by each device family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Connect and write timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// TCP port used when an `ip:` location carries none
    #[serde(default = "default_network_port")]
    pub network_port: u16,
}

impl TransportConfig {
    /// The configured timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            environment: default_environment(),
            show_experimental: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            show_target: true,
            ansi: true,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            network_port: default_network_port(),
        }
    }
}

fn default_app_name() -> String {
    "avroute".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_network_port() -> u16 {
    23
}

/// A builder for creating a configuration
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_file: Option<String>,
    environment_prefix: Option<String>,
}

impl ConfigBuilder {
    /// Create a new ConfigBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the config file path
    pub fn with_config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Set the environment variable prefix for configuration
    pub fn with_environment_prefix<S: AsRef<str>>(mut self, prefix: S) -> Self {
        self.environment_prefix = Some(prefix.as_ref().to_string());
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<Config> {
        let mut config_builder = ConfigLib::builder();

        let default_config = Config::default();
        config_builder = config_builder.add_source(
            ConfigLib::try_from(&default_config)
                .map_err(|e| Error::config(format!("Failed to create default config: {}", e)))?,
        );

        if let Some(config_file) = self.config_file {
            let path = Path::new(&config_file);
            if path.exists() {
                debug!("Loading configuration from {}", config_file);
                config_builder = config_builder.add_source(File::from(path));
            } else {
                debug!("Configuration file {} does not exist, using defaults", config_file);
            }
        }

        if let Some(prefix) = self.environment_prefix {
            debug!("Loading configuration from environment variables with prefix {}", prefix);
            config_builder = config_builder.add_source(
                Environment::with_prefix(&prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config_lib = config_builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build configuration: {}", e)))?;

        let config: Config = config_lib
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize configuration: {}", e)))?;

        if config.transport.connect_timeout_ms == 0 {
            return Err(Error::config("transport.connect_timeout_ms must be positive"));
        }
        if config.transport.network_port == 0 {
            return Err(Error::config("transport.network_port must be positive"));
        }

        info!("Configuration loaded successfully");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs::File as StdFile;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.app_name, "avroute");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.transport.connect_timeout_ms, 5_000);
        assert_eq!(config.transport.network_port, 23);
        assert_eq!(config.transport.connect_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_config_builder_defaults() {
        let config = ConfigBuilder::new().build().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_builder_with_file() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("avroute.toml");

        {
            let mut file = StdFile::create(&file_path)?;
            file.write_all(
                br#"
                [general]
                environment = "studio"
                show_experimental = true

                [logging]
                level = "debug"

                [transport]
                connect_timeout_ms = 1500
                network_port = 4001
            "#,
            )?;
        }

        let config = ConfigBuilder::new().with_config_file(&file_path).build()?;

        assert_eq!(config.general.environment, "studio");
        assert!(config.general.show_experimental);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.transport.connect_timeout_ms, 1500);
        assert_eq!(config.transport.network_port, 4001);

        Ok(())
    }

    #[test]
    fn test_config_builder_missing_file_uses_defaults() -> Result<()> {
        let dir = tempdir()?;
        let config = ConfigBuilder::new()
            .with_config_file(dir.path().join("absent.toml"))
            .build()?;
        assert_eq!(config, Config::default());
        Ok(())
    }

    #[test]
    fn test_config_builder_rejects_zero_timeout() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("zero.toml");
        std::fs::write(&file_path, "[transport]\nconnect_timeout_ms = 0\n")?;

        let result = ConfigBuilder::new().with_config_file(&file_path).build();
        assert!(matches!(result, Err(Error::Config(_))));
        Ok(())
    }

    #[test]
    fn test_config_builder_with_env() -> Result<()> {
        env::set_var("AVROUTE_TEST__TRANSPORT__NETWORK_PORT", "10001");
        env::set_var("AVROUTE_TEST__LOGGING__LEVEL", "trace");

        let config = ConfigBuilder::new()
            .with_environment_prefix("AVROUTE_TEST")
            .build()?;

        assert_eq!(config.transport.network_port, 10001);
        assert_eq!(config.logging.level, "trace");

        env::remove_var("AVROUTE_TEST__TRANSPORT__NETWORK_PORT");
        env::remove_var("AVROUTE_TEST__LOGGING__LEVEL");

        Ok(())
    }
}
