use crate::error::ConfigError;
use crate::settings::{DEFAULT_ACQUIRE_TIMEOUT_SECS, DEFAULT_FILTER, DEFAULT_MAX_CONNECTIONS};
use std::path::{Path, PathBuf};

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;
pub mod telemetry;

// Re-export the core types to provide a clean public API.
pub use settings::{Config, DatabaseSettings, LoggingSettings, PoolSettings};
pub use telemetry::init_tracing;

/// The file looked up in the working directory when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Values that take precedence over every file and environment source.
///
/// With the `clap` feature enabled these can be flattened straight into a CLI.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct Overrides {
    /// Path to the configuration file. Defaults to `./config.toml` (optional).
    #[cfg_attr(feature = "clap", arg(long, global = true))]
    pub config: Option<PathBuf>,

    /// Database connection string, overriding `database.url`.
    #[cfg_attr(feature = "clap", arg(long, global = true))]
    pub database_url: Option<String>,
}

/// Loads the application configuration from the default sources.
///
/// Precedence, lowest first: built-in defaults, `config.toml` (if present),
/// `APP_<SECTION>__<KEY>` environment variables, then `DATABASE_URL`.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_with(&Overrides::default())
}

/// Loads the configuration from the default sources plus explicit overrides.
///
/// A `.env` file in the working directory is read first so that
/// `DATABASE_URL` can live there. An explicitly given config path must exist.
pub fn load_config_with(overrides: &Overrides) -> Result<Config, ConfigError> {
    dotenvy::dotenv().ok();

    let file = match &overrides.config {
        Some(path) => config::File::from(path.as_path()).required(true),
        None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let config = defaults()?
        .add_source(file)
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
        .set_override_option("database.url", overrides.database_url.clone())?
        .build()?
        .try_deserialize::<Config>()?;

    config.validate()?;
    tracing::debug!(source = ?overrides.config, "configuration loaded");
    Ok(config)
}

/// Loads the configuration from a single file, with no environment layering.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config = defaults()?
        .add_source(config::File::from(path).required(true))
        .build()?
        .try_deserialize::<Config>()?;

    config.validate()?;
    Ok(config)
}

fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    Ok(config::Config::builder()
        .set_default("database.pool.max_connections", i64::from(DEFAULT_MAX_CONNECTIONS))?
        .set_default(
            "database.pool.acquire_timeout_secs",
            DEFAULT_ACQUIRE_TIMEOUT_SECS as i64,
        )?
        .set_default("logging.filter", DEFAULT_FILTER)?)
}

impl Config {
    /// Rejects values that would only fail later, at engine construction.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "database.url must not be empty".to_string(),
            ));
        }
        if self.database.pool.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.pool.max_connections must be at least 1".to_string(),
            ));
        }
        if self.database.pool.acquire_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "database.pool.acquire_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
