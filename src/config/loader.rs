//! Configuration Loader
//!
//! Environment-aware loading on top of the `config` crate. Sources, lowest precedence first:
//!
//! 1. `<dir>/event-core.{toml,yaml,json}` (optional)
//! 2. `<dir>/<environment>.{toml,yaml,json}` (optional)
//! 3. `EVENT_CORE__<SECTION>__<KEY>` environment variables

use super::error::{ConfigResult, ConfigurationError};
use super::EventCoreConfig;
use config::{Config, Environment, File};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub const BASE_CONFIG_NAME: &str = "event-core";
pub const ENV_PREFIX: &str = "EVENT_CORE";
pub const ENV_SEPARATOR: &str = "__";

pub struct ConfigManager {
    config: EventCoreConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_with_sources(config_dir, environment, None)
    }

    /// Same as [`load_from_directory_with_env`](Self::load_from_directory_with_env), reading
    /// overrides from `vars` instead of the process environment
    pub fn load_with_env_vars(
        config_dir: Option<PathBuf>,
        environment: &str,
        vars: HashMap<String, String>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_with_sources(config_dir, environment, Some(vars))
    }

    fn load_with_sources(
        config_dir: Option<PathBuf>,
        environment: &str,
        vars: Option<HashMap<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            environment = %environment,
            config_directory = %config_directory.display(),
            "Loading configuration"
        );

        let config = Self::build(&config_directory, environment, vars)?;
        config.validate()?;

        info!(
            environment = %environment,
            subscriber_id = %config.subscriber.id,
            mode = ?config.subscriber.mode,
            storage_backend = ?config.storage.backend,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    fn build(
        config_directory: &Path,
        environment: &str,
        vars: Option<HashMap<String, String>>,
    ) -> ConfigResult<EventCoreConfig> {
        let base = config_directory.join(BASE_CONFIG_NAME);
        let overlay = config_directory.join(environment);

        let env_source = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .source(vars);

        let merged = Config::builder()
            .add_source(File::with_name(&base.to_string_lossy()).required(false))
            .add_source(File::with_name(&overlay.to_string_lossy()).required(false))
            .add_source(env_source)
            .build()
            .map_err(|e| ConfigurationError::load_error(environment, e))?;

        Ok(merged.try_deserialize()?)
    }

    pub fn config(&self) -> &EventCoreConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect environment from `EVENT_CORE_ENV`, then `APP_ENV`, defaulting to development
    pub fn detect_environment() -> String {
        env::var("EVENT_CORE_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    /// `EVENT_CORE_CONFIG_DIR`, or `./config`
    fn default_config_directory() -> PathBuf {
        env::var("EVENT_CORE_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }
}
