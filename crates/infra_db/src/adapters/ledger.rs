//! PostgreSQL Ledger Adapter
//!
//! This module provides the database adapter for the ledger store port,
//! implementing `LedgerStore` on top of the `LedgerRepository`.
//!
//! # Overview
//!
//! Each unit of work is one `sqlx` transaction. Accounts are created with a
//! conflict-tolerant insert and then read with `SELECT ... FOR UPDATE`, so
//! concurrent operations on the same chat serialize on the account row while
//! different chats never block each other.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresLedgerStore;
//! use domain_billing::BillingEngine;
//!
//! let engine = BillingEngine::new(PostgresLedgerStore::new(pool));
//! let outcome = engine.credit_pending(command).await?;
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{DomainPort, HealthCheckResult, HealthCheckable};
use domain_billing::{
    Account, LedgerError, LedgerStore, LedgerTransaction, NewTransactionRecord, TransactionRecord,
};

use crate::error::DatabaseError;
use crate::repositories::LedgerRepository;

const ADAPTER_ID: &str = "postgres-ledger-store";

/// PostgreSQL-backed implementation of the LedgerStore trait
///
/// The adapter implements `HealthCheckable` to verify database connectivity.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    repository: LedgerRepository,
}

impl PostgresLedgerStore {
    /// Creates a new adapter over the given pool
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: LedgerRepository::new(pool),
        }
    }
}

/// Open unit of work over a PostgreSQL transaction
pub struct PgLedgerTransaction {
    tx: Transaction<'static, Postgres>,
    /// Account ids locked by this unit, keyed by chat id
    locked: HashMap<String, Uuid>,
}

impl PgLedgerTransaction {
    fn ensure_locked(&self, account: &Account) -> Result<(), LedgerError> {
        match self.locked.get(&account.chat_id) {
            Some(id) if id == account.id.as_uuid() => Ok(()),
            _ => Err(LedgerError::store_unavailable(format!(
                "account for chat '{}' was not loaded in this transaction",
                account.chat_id
            ))),
        }
    }
}

#[async_trait]
impl LedgerTransaction for PgLedgerTransaction {
    #[instrument(skip(self))]
    async fn load_or_create_account(
        &mut self,
        chat_id: &str,
        chat_title: Option<&str>,
    ) -> Result<Account, LedgerError> {
        let fresh = Account::open(chat_id, chat_title.map(str::to_string));
        if LedgerRepository::insert_account_if_absent(&mut self.tx, &fresh).await? {
            debug!(account_id = %fresh.id, "Created ledger account");
        }

        let mut account = LedgerRepository::lock_account(&mut self.tx, chat_id)
            .await?
            .into_account();
        if account.refresh_title(chat_title) {
            LedgerRepository::update_account(&mut self.tx, &account).await?;
        }

        self.locked
            .insert(account.chat_id.clone(), *account.id.as_uuid());
        Ok(account)
    }

    #[instrument(skip(self, account), fields(chat_id = %account.chat_id))]
    async fn save_account(&mut self, account: &Account) -> Result<(), LedgerError> {
        self.ensure_locked(account)?;
        LedgerRepository::update_account(&mut self.tx, account).await?;
        Ok(())
    }

    #[instrument(skip(self, record), fields(account_id = %record.account_id, kind = %record.kind))]
    async fn append_transaction(
        &mut self,
        record: NewTransactionRecord,
    ) -> Result<TransactionRecord, LedgerError> {
        if !self
            .locked
            .values()
            .any(|id| id == record.account_id.as_uuid())
        {
            return Err(LedgerError::store_unavailable(format!(
                "account {} was not loaded in this transaction",
                record.account_id
            )));
        }

        let row = LedgerRepository::insert_transaction(&mut self.tx, &record, Utc::now()).await?;
        Ok(row.into_record()?)
    }
}

impl DomainPort for PostgresLedgerStore {}

#[async_trait]
impl HealthCheckable for PostgresLedgerStore {
    /// Checks database connectivity
    ///
    /// Performs a simple SELECT 1 query to verify the connection pool
    /// is operational and the database is responsive.
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();
        let result = self.repository.ping().await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => HealthCheckResult::healthy(ADAPTER_ID, latency_ms),
            Err(e) => HealthCheckResult::unhealthy(ADAPTER_ID, latency_ms, e.to_string()),
        }
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    type Tx = PgLedgerTransaction;

    async fn begin(&self) -> Result<Self::Tx, LedgerError> {
        let tx = self
            .repository
            .pool()
            .begin()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        Ok(PgLedgerTransaction {
            tx,
            locked: HashMap::new(),
        })
    }

    async fn commit(&self, tx: Self::Tx) -> Result<(), LedgerError> {
        tx.tx
            .commit()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
        Ok(())
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<(), LedgerError> {
        tx.tx
            .rollback()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_account(&self, chat_id: &str) -> Result<Option<Account>, LedgerError> {
        let row = self.repository.find_account_by_chat(chat_id).await?;
        Ok(row.map(|row| row.into_account()))
    }

    #[instrument(skip(self))]
    async fn list_transactions(
        &self,
        chat_id: &str,
        limit: u32,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        let account = self
            .repository
            .find_account_by_chat(chat_id)
            .await?
            .ok_or_else(|| LedgerError::account_not_found(chat_id))?;

        self.repository
            .list_transactions(account.id, i64::from(limit))
            .await?
            .into_iter()
            .map(|row| row.into_record().map_err(LedgerError::from))
            .collect()
    }
}
