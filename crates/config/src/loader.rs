//! Configuration loading and validation
//!
//! Defaults first, then the first configuration file found (or the one
//! given on the command line), then `CHAINRUN_*` environment variables.

use std::path::{Path, PathBuf};

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::RunnerConfig;

/// Configuration loader
#[derive(Debug)]
pub struct ConfigLoader {
    /// Command-line specified config path
    cli_config_path: Option<PathBuf>,

    /// Environment variable prefix
    env_prefix: String,

    /// Search paths for configuration files
    search_paths: Vec<PathBuf>,

    /// Default configuration
    default_config: RunnerConfig,

    /// Configuration sources that were used
    used_sources: Vec<String>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            cli_config_path: None,
            env_prefix: "CHAINRUN".to_string(),
            search_paths: vec![
                PathBuf::from("./chainrun.yaml"),
                PathBuf::from("./chainrun.json"),
                Self::user_config_path(),
            ],
            default_config: RunnerConfig::default(),
            used_sources: Vec::new(),
        }
    }

    /// Set command-line specified config path
    pub fn with_cli_config_path<P: AsRef<Path>>(mut self, path: Option<P>) -> Self {
        self.cli_config_path = path.map(|p| p.as_ref().to_path_buf());
        self
    }

    /// Set environment variable prefix
    pub fn with_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Replace the search paths
    pub fn with_search_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.search_paths = paths;
        self
    }

    /// Set default configuration
    pub fn with_default_config(mut self, config: RunnerConfig) -> Self {
        self.default_config = config;
        self
    }

    /// Load configuration
    pub fn load(&mut self) -> ConfigResult<RunnerConfig> {
        info!("Loading configuration...");

        let defaults = serde_json::to_string(&self.default_config)?;
        let mut builder = Config::builder().add_source(File::from_str(&defaults, FileFormat::Json));
        self.used_sources.push("default configuration".to_string());

        if let Some(path) = self.cli_config_path.clone() {
            if !path.exists() {
                warn!("CLI-specified config file not found: {:?}", path);
                return Err(ConfigError::LoadError(format!(
                    "CLI-specified config file not found: {:?}",
                    path
                )));
            }
            debug!("Loading configuration from CLI-specified path: {:?}", path);
            builder = Self::add_file_source(builder, &path)?;
            self.used_sources.push(format!("CLI-specified config: {:?}", path));
        } else if let Some(path) = self.search_paths.iter().find(|path| path.exists()).cloned() {
            debug!("Loading configuration from: {:?}", path);
            builder = Self::add_file_source(builder, &path)?;
            self.used_sources.push(format!("config file: {:?}", path));
        }

        builder = builder.add_source(
            Environment::with_prefix(&self.env_prefix)
                .separator("__")
                .try_parsing(true),
        );
        self.used_sources
            .push(format!("environment variables with prefix {}", self.env_prefix));

        let config: RunnerConfig = builder.build()?.try_deserialize()?;
        Self::validate_config(&config)?;

        info!("Configuration loaded from: {}", self.used_sources.join(", "));
        Ok(config)
    }

    fn add_file_source(
        builder: ConfigBuilder<DefaultState>,
        path: &Path,
    ) -> ConfigResult<ConfigBuilder<DefaultState>> {
        let format = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => FileFormat::Json,
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            _ => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    ConfigError::LoadError(format!("Could not read {:?}: {}", path, e))
                })?;
                if content.trim_start().starts_with('{') {
                    FileFormat::Json
                } else {
                    FileFormat::Yaml
                }
            }
        };

        Ok(builder.add_source(File::from(path).format(format).required(true)))
    }

    /// Validate configuration
    pub fn validate_config(config: &RunnerConfig) -> ConfigResult<()> {
        if config.gas_poll_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "Gas poll interval must be greater than 0".to_string(),
            ));
        }

        if config.proxy_retry_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "Proxy retry interval must be greater than 0".to_string(),
            ));
        }

        if config.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        if config.default_sleep.min < 0.0 || config.default_sleep.min > config.default_sleep.max {
            return Err(ConfigError::ValidationError(
                "Default sleep range must satisfy 0 <= min <= max".to_string(),
            ));
        }

        if let Some(endpoint) = config.rpc_endpoints.iter().find(|e| e.url.trim().is_empty()) {
            return Err(ConfigError::ValidationError(format!(
                "RPC endpoint for {} is empty",
                endpoint.network
            )));
        }

        if config.state_file.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "State file path cannot be empty".to_string(),
            ));
        }

        config.catalog.validate()
    }

    fn user_config_path() -> PathBuf {
        match dirs::home_dir() {
            Some(mut path) => {
                path.push(".chainrun");
                path.push("config.yaml");
                path
            }
            None => PathBuf::from("~/.chainrun/config.yaml"),
        }
    }

    /// Save configuration to a file
    pub fn save_config(&self, config: &RunnerConfig, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => std::fs::write(path, serde_yaml::to_string(config)?)?,
            _ => std::fs::write(path, serde_json::to_string_pretty(config)?)?,
        }

        info!("Configuration saved to: {:?}", path);
        Ok(())
    }

    /// Get the sources that were used to load the configuration
    pub fn get_used_sources(&self) -> &[String] {
        &self.used_sources
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainrun_tasks::{ModuleName, NetworkName};
    use tempfile::tempdir;

    fn isolated() -> ConfigLoader {
        ConfigLoader::default()
            .with_search_paths(Vec::new())
            .with_env_prefix("CHAINRUN_TEST_UNSET")
    }

    #[test]
    fn test_config_loader_default() {
        let loader = ConfigLoader::default();
        assert_eq!(loader.env_prefix, "CHAINRUN");
        assert_eq!(loader.search_paths.len(), 3);
        assert!(loader.cli_config_path.is_none());
    }

    #[test]
    fn test_defaults_load_without_files() -> ConfigResult<()> {
        let config = isolated().load()?;
        assert_eq!(config, RunnerConfig::default());
        Ok(())
    }

    #[test]
    fn test_missing_cli_path_is_an_error() {
        let mut loader = isolated().with_cli_config_path(Some("does-not-exist.yaml"));
        assert!(matches!(loader.load(), Err(ConfigError::LoadError(_))));
    }

    #[test]
    fn test_yaml_file_overrides_defaults() -> ConfigResult<()> {
        let dir = tempdir()?;
        let path = dir.path().join("chainrun.yaml");
        std::fs::write(
            &path,
            "gas_poll_interval_secs: 30\nstate_file: state/last.json\nlogging:\n  level: debug\n",
        )?;

        let mut loader = isolated().with_cli_config_path(Some(&path));
        let config = loader.load()?;
        assert_eq!(config.gas_poll_interval_secs, 30);
        assert_eq!(config.state_file, PathBuf::from("state/last.json"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.proxy_retry_interval_secs, 15);
        assert_eq!(
            config.rpc_url(NetworkName::Ethereum),
            Some("https://rpc.ankr.com/eth")
        );
        assert!(loader
            .get_used_sources()
            .iter()
            .any(|s| s.contains(&*path.to_string_lossy())));
        Ok(())
    }

    #[test]
    fn test_save_and_load_config() -> ConfigResult<()> {
        let dir = tempdir()?;
        let config_path = dir.path().join("config.json");

        let mut config = RunnerConfig::default();
        config.default_max_retries = 5;
        isolated().save_config(&config, &config_path)?;

        let loaded = isolated().with_cli_config_path(Some(&config_path)).load()?;
        assert_eq!(loaded.default_max_retries, 5);
        assert!(loaded.catalog.is_swap_module(ModuleName::Avnu));
        Ok(())
    }

    #[test]
    fn test_validation_rejects_zero_interval() {
        let config = RunnerConfig {
            gas_poll_interval_secs: 0,
            ..RunnerConfig::default()
        };
        assert!(matches!(
            ConfigLoader::validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
