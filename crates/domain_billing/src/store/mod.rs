//! Ledger Store Port
//!
//! This module defines the storage contract the billing engine runs against.
//! A store hands out units of work ([`LedgerTransaction`]); every ledger
//! operation performs its load, save, and append inside exactly one of them
//! via [`LedgerStoreExt::with_transaction`].
//!
//! # Adapters
//!
//! - **PostgreSQL**: `infra_db::adapters::PostgresLedgerStore`, row locks on
//!   the account and a unique constraint on `chat_id`
//! - **In-memory**: [`memory::InMemoryLedgerStore`], per-account async locks,
//!   used by tests and tooling
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_billing::store::{LedgerStoreExt, LedgerTransaction};
//!
//! let account = store
//!     .with_transaction(move |tx| {
//!         Box::pin(async move {
//!             let mut account = tx.load_or_create_account(&chat_id, None).await?;
//!             account.set_service_rate(rate);
//!             tx.save_account(&account).await?;
//!             Ok(account)
//!         })
//!     })
//!     .await?;
//! ```

pub mod memory;

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use tracing::warn;

use core_kernel::{DomainPort, HealthCheckable};

use crate::account::Account;
use crate::error::LedgerError;
use crate::transaction::{NewTransactionRecord, TransactionRecord};

pub use memory::InMemoryLedgerStore;

/// Future returned by the body of a unit of work
pub type TxFuture<'c, T> = Pin<Box<dyn Future<Output = Result<T, LedgerError>> + Send + 'c>>;

/// One open unit of work
///
/// Dropping a transaction without committing it discards its writes.
#[async_trait]
pub trait LedgerTransaction: Send {
    /// Returns the account for `chat_id`, creating a zeroed one if absent
    ///
    /// Concurrent first calls for the same chat must yield a single account.
    /// A supplied title replaces the stored one. The account stays locked
    /// against other units of work until this one ends.
    async fn load_or_create_account(
        &mut self,
        chat_id: &str,
        chat_title: Option<&str>,
    ) -> Result<Account, LedgerError>;

    /// Persists balances, rate, and title of an account loaded in this unit
    async fn save_account(&mut self, account: &Account) -> Result<(), LedgerError>;

    /// Inserts one immutable record and returns it with its assigned id
    async fn append_transaction(
        &mut self,
        record: NewTransactionRecord,
    ) -> Result<TransactionRecord, LedgerError>;
}

/// Durable storage for accounts and their transaction log
#[async_trait]
pub trait LedgerStore: DomainPort + HealthCheckable {
    /// Unit of work type handed out by [`LedgerStore::begin`]
    type Tx: LedgerTransaction + 'static;

    /// Opens a unit of work
    async fn begin(&self) -> Result<Self::Tx, LedgerError>;

    /// Makes every write of the unit visible at once
    async fn commit(&self, tx: Self::Tx) -> Result<(), LedgerError>;

    /// Discards every write of the unit
    async fn rollback(&self, tx: Self::Tx) -> Result<(), LedgerError>;

    /// Reads the committed account for `chat_id`, if any
    async fn find_account(&self, chat_id: &str) -> Result<Option<Account>, LedgerError>;

    /// Most recent `limit` records for the chat, newest first
    ///
    /// Unknown chats yield `AccountNotFound`; known chats without records
    /// yield an empty vec.
    async fn list_transactions(
        &self,
        chat_id: &str,
        limit: u32,
    ) -> Result<Vec<TransactionRecord>, LedgerError>;
}

/// Extension trait running closures inside a unit of work
#[async_trait]
pub trait LedgerStoreExt: LedgerStore {
    /// Runs `f` atomically: commits if it succeeds, rolls back otherwise
    ///
    /// Units of work do not nest.
    async fn with_transaction<T, F>(&self, f: F) -> Result<T, LedgerError>
    where
        T: Send + 'static,
        F: for<'c> FnOnce(&'c mut Self::Tx) -> TxFuture<'c, T> + Send + 'static,
    {
        let mut tx = self.begin().await?;
        let result = f(&mut tx).await;

        match result {
            Ok(value) => {
                self.commit(tx).await?;
                Ok(value)
            }
            Err(error) => {
                if let Err(rollback_error) = self.rollback(tx).await {
                    warn!(error = %rollback_error, "Rollback failed after ledger error");
                }
                Err(error)
            }
        }
    }
}

impl<S: LedgerStore + ?Sized> LedgerStoreExt for S {}
