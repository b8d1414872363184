//! Billing Domain - Group Ledger
//!
//! This crate keeps a per-chat ledger of two balances: a prepaid **reserve**
//! and an outstanding **pending** amount, plus a per-chat **service rate**
//! charged as a fee on pending debits and reserve deposits.
//!
//! # Operations
//!
//! - **credit_pending**: the chat owes more (or less, for a negative amount);
//!   reserve absorbs debits first
//! - **reduce_pending**: a payment; anything beyond pending becomes reserve
//! - **deposit_to_reserve**: a top-up that clears principal plus fee from pending
//! - **withdraw_from_reserve**: usage; any shortfall becomes pending
//! - **set_service_rate**: replaces the fee rate
//!
//! Each operation is atomic: the account update and its audit record are
//! committed together or not at all.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{BillingEngine, InMemoryLedgerStore, LedgerCommand};
//!
//! let engine = BillingEngine::new(InMemoryLedgerStore::new());
//! engine.set_service_rate(LedgerCommand::new("-100", "0.05".parse()?)).await?;
//! let outcome = engine.credit_pending(LedgerCommand::new("-100", "100".parse()?)).await?;
//! assert_eq!(outcome.account.pending.to_display_string(), "105.00");
//! ```

pub mod account;
pub mod engine;
pub mod error;
pub mod operations;
pub mod replay;
pub mod store;
pub mod transaction;

pub use account::{Account, Balances};
pub use engine::{BillingEngine, EngineSettings, LedgerCommand, LedgerOutcome};
pub use error::LedgerError;
pub use operations::{LedgerOperation, Transition};
pub use replay::{ReplayError, ReplayedBalances};
pub use store::{InMemoryLedgerStore, LedgerStore, LedgerStoreExt, LedgerTransaction, TxFuture};
pub use transaction::{NewTransactionRecord, TransactionRecord, TransactionType};
