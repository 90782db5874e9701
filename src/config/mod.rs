//! Configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables use the `DOC_LINEAGE` prefix and
//! nested values are separated by double underscores.
//!
//! # Example
//!
//! ```no_run
//! use doc_lineage::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Chains are bounded at {}", config.lineage.max_chain_depth);
//! ```

mod database;
mod error;
mod lineage;
mod telemetry;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use lineage::{LineageConfig, MAX_CHAIN_DEPTH_LIMIT};
pub use telemetry::{LogFormat, TelemetryConfig};

use serde::Deserialize;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL ledger. Absent when running on the in-memory ledger.
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Supersession chain traversal limits
    #[serde(default)]
    pub lineage: LineageConfig,

    /// Logging filter and format
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// Loads `.env` if present, then reads variables such as
    /// `DOC_LINEAGE__DATABASE__URL` or `DOC_LINEAGE__LINEAGE__MAX_CHAIN_DEPTH`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("DOC_LINEAGE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(database) = &self.database {
            database.validate()?;
        }
        self.lineage.validate()?;
        self.telemetry.validate()?;
        Ok(())
    }
}
