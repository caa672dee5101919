use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use config::{Config as ConfigBuilder, ConfigError, Environment, File, FileFormat};

use super::{
    BackendConfig, ExportConfig, HistoryConfig, HttpConfig, LoggingConfig, RefreshConfig,
    TargetConfig,
};

/// Main application configuration
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Router queried right after startup
    #[serde(default)]
    pub target: TargetConfig,

    /// Statistics backend
    #[serde(default)]
    pub backend: BackendConfig,

    /// Auto-refresh timer
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// CSV reports
    #[serde(default)]
    pub export: ExportConfig,

    /// Performance history
    #[serde(default)]
    pub history: HistoryConfig,

    /// HTTP API configuration
    #[serde(default)]
    pub http: HttpConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Default configuration directory
    pub const CONFIG_DIR: &'static str = "config";

    /// Environment variable prefix
    const ENV_PREFIX: &'static str = "MIKROTIK_MONITOR";

    /// Build configuration using the following priority (highest to lowest):
    /// 1. Environment variables (MIKROTIK_MONITOR_<SECTION>__<KEY>)
    /// 2. Local configuration file (config/local.yaml)
    /// 3. Environment specific file (config/{env}.yaml)
    /// 4. Default configuration (config/default.yaml)
    /// 5. Built-in defaults
    pub fn new() -> Result<Self, ConfigError> {
        let environment = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        // Start with built-in defaults
        let defaults = Config::default();

        let builder = ConfigBuilder::builder()
            // Backend configuration
            .set_default("backend.base_url", defaults.backend.base_url)?
            .set_default(
                "backend.request_timeout",
                format!("{}ms", defaults.backend.request_timeout.as_millis()),
            )?
            // Refresh configuration
            .set_default(
                "refresh.interval",
                format!("{}ms", defaults.refresh.interval.as_millis()),
            )?
            .set_default("refresh.enabled", defaults.refresh.enabled)?
            .set_default("refresh.print_table", defaults.refresh.print_table)?
            // Export configuration
            .set_default("export.directory", defaults.export.directory)?
            .set_default("export.quote_mode", defaults.export.quote_mode.to_string())?
            // History configuration
            .set_default("history.enabled", defaults.history.enabled)?
            .set_default("history.path", defaults.history.path)?
            .set_default(
                "history.save_interval",
                format!("{}s", defaults.history.save_interval.as_secs()),
            )?
            // HTTP configuration
            .set_default("http.enabled", defaults.http.enabled)?
            .set_default("http.bind_addr", defaults.http.bind_addr)?
            .set_default("http.bind_port", defaults.http.bind_port)?
            // Logging configuration
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.format", defaults.logging.format)?;

        let config = builder
            // Load default config file
            .add_source(
                File::new(&format!("{}/default", Self::CONFIG_DIR), FileFormat::Yaml)
                    .required(false),
            )
            // Load environment specific config
            .add_source(
                File::new(
                    &format!("{}/{}", Self::CONFIG_DIR, environment),
                    FileFormat::Yaml,
                )
                .required(false),
            )
            // Load local overrides
            .add_source(
                File::new(&format!("{}/local", Self::CONFIG_DIR), FileFormat::Yaml).required(false),
            )
            // Add environment variables
            .add_source(Self::environment())
            .build()?;

        // Deserialize and validate
        let config = config.try_deserialize()?;
        Self::validate(&config)?;

        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn from_file(path: PathBuf) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            // Load the specified config file
            .add_source(File::from(path))
            // Add env vars as overrides
            .add_source(Self::environment())
            .build()?;

        let config = config.try_deserialize()?;
        Self::validate(&config)?;

        Ok(config)
    }

    fn environment() -> Environment {
        Environment::with_prefix(Self::ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("target.interfaces")
            .try_parsing(true)
    }

    /// Validate configuration
    pub fn validate(config: &Self) -> Result<(), ConfigError> {
        // Helper to convert validation errors
        fn validation_error(msg: &str) -> ConfigError {
            ConfigError::Message(msg.to_string())
        }

        // Validate backend configuration
        if config.backend.base_url.is_empty() {
            return Err(validation_error("Backend base URL must not be empty"));
        }
        if reqwest::Url::parse(&config.backend.base_url).is_err() {
            return Err(validation_error("Backend base URL is not a valid URL"));
        }
        if config.backend.request_timeout.is_zero() {
            return Err(validation_error("Request timeout must be non-zero"));
        }

        // Validate refresh configuration
        if config.refresh.interval.is_zero() {
            return Err(validation_error("Refresh interval must be non-zero"));
        }
        if config.refresh.command_buffer == 0 {
            return Err(validation_error("Command buffer must be non-zero"));
        }

        // Validate export configuration
        if config.export.directory.is_empty() {
            return Err(validation_error("Export directory must not be empty"));
        }

        // Validate history configuration
        if config.history.enabled {
            if config.history.path.is_empty() {
                return Err(validation_error("History path must not be empty"));
            }
            if config.history.save_interval.is_zero() {
                return Err(validation_error("History save interval must be non-zero"));
            }
        }

        // Validate HTTP configuration
        if config.http.enabled {
            if config.http.bind_addr.is_empty() {
                return Err(validation_error("HTTP bind address must not be empty"));
            }
            if config.http.bind_port == 0 {
                return Err(validation_error("HTTP port must be non-zero"));
            }
        }

        config
            .logging
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::{fs, time::Duration};
    use tempfile::tempdir;

    #[test]
    #[serial]
    fn test_default_config() {
        let config = Config::new().unwrap();
        assert_eq!(config.refresh.interval, Duration::from_millis(3000));
        assert!(config.refresh.enabled);
        assert_eq!(config.backend.base_url, "http://127.0.0.1:5000");
        assert!(config.target.to_target().is_none());
        assert!(config.history.enabled);
        assert_eq!(config.history.save_interval, Duration::from_secs(60));
    }

    #[test]
    #[serial]
    fn test_env_override() {
        std::env::set_var("MIKROTIK_MONITOR_HTTP__BIND_PORT", "9090");
        std::env::set_var("MIKROTIK_MONITOR_TARGET__ADDRESS", "192.168.88.1");
        let config = Config::new();
        std::env::remove_var("MIKROTIK_MONITOR_HTTP__BIND_PORT");
        std::env::remove_var("MIKROTIK_MONITOR_TARGET__ADDRESS");

        let config = config.unwrap();
        assert_eq!(config.http.bind_port, 9090);
        assert_eq!(config.target.address, "192.168.88.1");
    }

    #[test]
    #[serial]
    fn test_file_config() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");

        fs::write(
            &config_path,
            r#"
            target:
              address: "10.0.0.1"
              username: "monitor"
              password: "hunter2"
              interfaces: ["ether1", "ether2"]
            refresh:
              interval: 5s
            export:
              quote_mode: compatible
            "#,
        )
        .unwrap();

        let config = Config::from_file(config_path).unwrap();
        assert_eq!(config.refresh.interval, Duration::from_secs(5));
        assert_eq!(config.export.quote_mode, crate::config::QuoteMode::Compatible);

        let target = config.target.to_target().unwrap();
        assert_eq!(target.address, "10.0.0.1");
        assert_eq!(target.username, "monitor");
        assert_eq!(target.password.expose_secret(), "hunter2");
        assert_eq!(target.interfaces, vec!["ether1", "ether2"]);
    }

    #[test]
    #[serial]
    fn test_validation() {
        std::env::set_var("MIKROTIK_MONITOR_REFRESH__INTERVAL", "0s");
        let result = Config::new();
        std::env::remove_var("MIKROTIK_MONITOR_REFRESH__INTERVAL");
        assert!(result.is_err());

        let mut config = Config::default();
        config.backend.base_url = "not a url".to_string();
        assert!(Config::validate(&config).is_err());

        let mut config = Config::default();
        config.history.save_interval = Duration::ZERO;
        assert!(Config::validate(&config).is_err());

        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(Config::validate(&config).is_err());
    }

    #[test]
    fn test_password_is_not_serialized() {
        let mut config = Config::default();
        config.target.password = secrecy::SecretString::from("hunter2".to_string());
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(!yaml.contains("hunter2"));
        assert!(!yaml.contains("password"));
    }
}
