//! Infrastructure Database Layer
//!
//! This crate provides the PostgreSQL side of the group ledger: connection
//! pooling, schema migrations, configuration, and the `LedgerStore` adapter
//! the billing engine runs against.
//!
//! # Architecture
//!
//! The crate follows the repository pattern. `LedgerRepository` owns the SQL;
//! `PostgresLedgerStore` implements the domain port on top of it and maps
//! database failures into `LedgerError`.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, LedgerConfig, PostgresLedgerStore};
//! use domain_billing::BillingEngine;
//!
//! let config = LedgerConfig::from_env()?;
//! let pool = create_pool(config.database_config()).await?;
//! run_migrations(&pool).await?;
//! let engine = BillingEngine::with_settings(PostgresLedgerStore::new(pool), config.engine_settings());
//! ```

pub mod adapters;
pub mod config;
pub mod error;
pub mod pool;
pub mod repositories;

pub use adapters::{PgLedgerTransaction, PostgresLedgerStore};
pub use config::LedgerConfig;
pub use error::DatabaseError;
pub use pool::{create_pool, run_migrations, DatabaseConfig, MIGRATOR};
pub use repositories::LedgerRepository;
