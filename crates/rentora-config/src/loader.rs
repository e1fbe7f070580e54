//! Configuration loader with layered sources.

use crate::{validation::validate_config, AppConfig};
use config::{Config, ConfigError, Environment, File};
use rentora_core::RentoraError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Environment variable selecting `config/{environment}.toml`.
pub const ENVIRONMENT_VAR: &str = "RENTORA_ENVIRONMENT";

/// Configuration loader with runtime refresh support.
#[derive(Clone)]
pub struct ConfigLoader {
    config: Arc<RwLock<AppConfig>>,
    config_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new configuration loader.
    ///
    /// Configuration is loaded from multiple sources in order:
    /// 1. `config/default.toml` - Default values
    /// 2. `config/{environment}.toml` - Environment-specific overrides
    /// 3. `config/local.toml` - Local, uncommitted overrides
    /// 4. Environment variables with `RENTORA_` prefix and `__` nesting
    pub fn new(config_dir: impl Into<PathBuf>) -> Result<Self, RentoraError> {
        let config_dir = config_dir.into();
        let config = load_config(&config_dir)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_dir,
        })
    }

    /// Loads configuration from the default location (`./config`).
    pub fn from_default_location() -> Result<Self, RentoraError> {
        Self::new("./config")
    }

    /// Returns the current configuration.
    pub async fn get(&self) -> AppConfig {
        self.config.read().await.clone()
    }

    /// Reloads the configuration from disk; the previous value is kept on error.
    pub async fn reload(&self) -> Result<(), RentoraError> {
        let new_config = load_config(&self.config_dir)?;
        *self.config.write().await = new_config;
        info!("Configuration reloaded successfully");
        Ok(())
    }
}

/// Loads and validates configuration from `config_dir`.
pub fn load_config(config_dir: &Path) -> Result<AppConfig, RentoraError> {
    if let Err(e) = dotenvy::dotenv() {
        debug!("No .env file found or error loading it: {}", e);
    }

    let environment =
        std::env::var(ENVIRONMENT_VAR).unwrap_or_else(|_| "development".to_string());

    info!(environment = %environment, dir = %config_dir.display(), "Loading configuration");

    let mut builder = Config::builder();

    for name in ["default".to_string(), environment, "local".to_string()] {
        let path = config_dir.join(format!("{name}.toml"));
        if path.exists() {
            debug!("Loading config from: {}", path.display());
            builder = builder.add_source(File::from(path).required(false));
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("RENTORA")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let app_config: AppConfig = builder
        .build()
        .and_then(Config::try_deserialize)
        .map_err(config_error)?;

    validate_config(&app_config)?;

    Ok(app_config)
}

fn config_error(err: ConfigError) -> RentoraError {
    RentoraError::Configuration(err.to_string())
}
