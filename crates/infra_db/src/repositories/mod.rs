//! Repository implementations for ledger entities
//!
//! Repositories encapsulate SQL queries and map between database rows and
//! domain types. Queries are checked at runtime, so building the crate does
//! not need a live database.

pub mod ledger;

pub use ledger::{AccountRow, LedgerRepository, TransactionRow};
