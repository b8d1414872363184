//! Domain Adapters
//!
//! This module provides adapter implementations for domain ports,
//! connecting domain interfaces to the PostgreSQL database layer.
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresLedgerStore;
//! use domain_billing::{BillingEngine, LedgerCommand};
//!
//! let engine = BillingEngine::new(PostgresLedgerStore::new(pool));
//! let history = engine.history("-100123", Some(20)).await?;
//! ```

pub mod ledger;

pub use ledger::{PgLedgerTransaction, PostgresLedgerStore};
