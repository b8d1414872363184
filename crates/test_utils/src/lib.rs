//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the group
//! ledger test suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built amounts, chat ids, and commands
//! - `builders`: Builders for accounts and record logs
//! - `database`: PostgreSQL testcontainer management
//! - `assertions`: Ledger-specific assertion helpers
//! - `generators`: Property-based generators for operation sequences

pub mod assertions;
pub mod builders;
pub mod database;
pub mod fixtures;
pub mod generators;

pub use assertions::*;
pub use builders::*;
pub use database::*;
pub use fixtures::*;
pub use generators::*;
