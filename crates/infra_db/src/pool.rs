//! Connection pool and embedded migrations for the ledger schema

use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

use crate::error::DatabaseError;

/// Schema migrations shipped with the crate
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Pool settings for the ledger database
///
/// ```rust,ignore
/// let config = DatabaseConfig::new("postgres://localhost/ledger").max_connections(20);
/// let pool = create_pool(config).await?;
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long an operation waits for a pooled connection
    pub connect_timeout: Duration,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new("postgres://localhost/ledger")
    }
}

/// Opens the pool every ledger unit of work draws its connection from
///
/// # Errors
///
/// `DatabaseError::ConnectionFailed` if the database cannot be reached
pub async fn create_pool(config: DatabaseConfig) -> Result<PgPool, DatabaseError> {
    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Opening ledger database pool"
    );

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout)
        .connect(&config.url)
        .await
        .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))
}

/// Applies the ledger schema; already-applied migrations are skipped
pub async fn run_migrations(pool: &PgPool) -> Result<(), DatabaseError> {
    info!(count = MIGRATOR.iter().count(), "Running ledger migrations");
    MIGRATOR.run(pool).await?;
    info!("Ledger schema is up to date");
    Ok(())
}
