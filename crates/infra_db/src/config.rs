//! Ledger configuration
//!
//! Settings are read from `LEDGER_*` environment variables (after loading a
//! `.env` file if present), with `DATABASE_URL` accepted as a fallback for the
//! connection string.

use serde::Deserialize;
use std::time::Duration;

use core_kernel::CoreError;
use domain_billing::EngineSettings;

use crate::pool::DatabaseConfig;

/// Ledger service configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// PostgreSQL connection string
    pub database_url: String,
    /// Maximum number of pooled connections
    pub max_connections: u32,
    /// Minimum number of pooled connections
    pub min_connections: u32,
    /// Seconds to wait for a pooled connection
    pub connect_timeout_secs: u64,
    /// Log level: trace, debug, info, warn, error
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,
    /// History length used when a query gives none
    pub default_history_limit: u32,
    /// Upper bound for history queries
    pub max_history_limit: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/ledger".to_string(),
            max_connections: 10,
            min_connections: 2,
            connect_timeout_secs: 30,
            log_level: "info".to_string(),
            log_json: false,
            default_history_limit: 50,
            max_history_limit: 500,
        }
    }
}

impl LedgerConfig {
    /// Loads configuration from the environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder()
            .add_source(config::Environment::with_prefix("LEDGER"));
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if std::env::var("LEDGER_DATABASE_URL").is_err() {
                builder = builder.set_override("database_url", url)?;
            }
        }

        builder.build()?.try_deserialize()
    }

    /// Checks the values for combinations the pool or engine cannot use
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.database_url.trim().is_empty() {
            return Err(CoreError::configuration("database_url is empty"));
        }
        if self.max_connections == 0 {
            return Err(CoreError::configuration("max_connections must be positive"));
        }
        if self.min_connections > self.max_connections {
            return Err(CoreError::configuration(format!(
                "min_connections ({}) exceeds max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }
        if self.max_history_limit == 0 {
            return Err(CoreError::configuration("max_history_limit must be positive"));
        }
        if self.default_history_limit > self.max_history_limit {
            return Err(CoreError::configuration(format!(
                "default_history_limit ({}) exceeds max_history_limit ({})",
                self.default_history_limit, self.max_history_limit
            )));
        }
        Ok(())
    }

    /// Pool settings derived from this configuration
    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.database_url.clone())
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
    }

    /// Engine settings derived from this configuration
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            default_history_limit: self.default_history_limit,
            max_history_limit: self.max_history_limit,
        }
    }
}
