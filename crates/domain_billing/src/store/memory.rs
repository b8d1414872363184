//! In-memory ledger store
//!
//! Keeps committed accounts and records behind a `tokio::sync::RwLock` and
//! serializes units of work per account with one async mutex per chat id,
//! the same way a row lock serializes them in PostgreSQL. Units touching
//! different chats never wait on each other.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

use core_kernel::{DomainPort, HealthCheckResult, HealthCheckable};

use crate::account::Account;
use crate::error::LedgerError;
use crate::store::{LedgerStore, LedgerTransaction};
use crate::transaction::{NewTransactionRecord, TransactionRecord};

#[derive(Debug, Default)]
struct MemoryState {
    accounts: HashMap<String, Account>,
    records: Vec<TransactionRecord>,
}

#[derive(Debug, Default)]
struct Shared {
    state: RwLock<MemoryState>,
    row_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    next_record_id: AtomicI64,
    fail_appends: AtomicBool,
}

/// Ledger store kept in process memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    shared: Arc<Shared>,
}

impl InMemoryLedgerStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following append fail as if the store went away
    ///
    /// Lets callers observe rollback behaviour without a real outage.
    pub fn set_append_failure(&self, fail: bool) {
        self.shared.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Number of committed accounts
    pub async fn account_count(&self) -> usize {
        self.shared.state.read().await.accounts.len()
    }

    /// Number of committed records across all accounts
    pub async fn record_count(&self) -> usize {
        self.shared.state.read().await.records.len()
    }

    async fn row_lock(&self, chat_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.shared.row_locks.lock().await;
        locks
            .entry(chat_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Unit of work over an [`InMemoryLedgerStore`]
#[derive(Debug)]
pub struct InMemoryTransaction {
    store: InMemoryLedgerStore,
    guards: Vec<OwnedMutexGuard<()>>,
    locked: HashSet<String>,
    staged_accounts: HashMap<String, Account>,
    staged_records: Vec<TransactionRecord>,
}

impl InMemoryTransaction {
    fn ensure_loaded(&self, chat_id: &str) -> Result<(), LedgerError> {
        if self.locked.contains(chat_id) {
            Ok(())
        } else {
            Err(LedgerError::store_unavailable(format!(
                "account for chat '{}' was not loaded in this transaction",
                chat_id
            )))
        }
    }
}

#[async_trait]
impl LedgerTransaction for InMemoryTransaction {
    async fn load_or_create_account(
        &mut self,
        chat_id: &str,
        chat_title: Option<&str>,
    ) -> Result<Account, LedgerError> {
        if !self.locked.contains(chat_id) {
            let lock = self.store.row_lock(chat_id).await;
            self.guards.push(lock.lock_owned().await);
            self.locked.insert(chat_id.to_string());
        }

        let existing = match self.staged_accounts.get(chat_id) {
            Some(account) => Some(account.clone()),
            None => self.store.shared.state.read().await.accounts.get(chat_id).cloned(),
        };

        let mut account = match existing {
            Some(account) => account,
            None => {
                debug!(chat_id, "Opening new ledger account");
                Account::open(chat_id, None)
            }
        };
        account.refresh_title(chat_title);

        self.staged_accounts.insert(chat_id.to_string(), account.clone());
        Ok(account)
    }

    async fn save_account(&mut self, account: &Account) -> Result<(), LedgerError> {
        self.ensure_loaded(&account.chat_id)?;
        self.staged_accounts
            .insert(account.chat_id.clone(), account.clone());
        Ok(())
    }

    async fn append_transaction(
        &mut self,
        record: NewTransactionRecord,
    ) -> Result<TransactionRecord, LedgerError> {
        if self.store.shared.fail_appends.load(Ordering::SeqCst) {
            return Err(LedgerError::store_unavailable("transaction log is not writable"));
        }
        if !self
            .staged_accounts
            .values()
            .any(|account| account.id == record.account_id)
        {
            return Err(LedgerError::store_unavailable(format!(
                "account {} was not loaded in this transaction",
                record.account_id
            )));
        }

        // Ids come from a sequence, so a rolled back append leaves a gap
        let id = self.store.shared.next_record_id.fetch_add(1, Ordering::SeqCst) + 1;
        let stored = TransactionRecord::from_parts(id, record, Utc::now());
        self.staged_records.push(stored.clone());
        Ok(stored)
    }
}

impl DomainPort for InMemoryLedgerStore {}

#[async_trait]
impl HealthCheckable for InMemoryLedgerStore {
    async fn health_check(&self) -> HealthCheckResult {
        if self.shared.fail_appends.load(Ordering::SeqCst) {
            HealthCheckResult::unhealthy("memory-ledger-store", 0, "appends are failing")
        } else {
            HealthCheckResult::healthy("memory-ledger-store", 0)
        }
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx, LedgerError> {
        Ok(InMemoryTransaction {
            store: self.clone(),
            guards: Vec::new(),
            locked: HashSet::new(),
            staged_accounts: HashMap::new(),
            staged_records: Vec::new(),
        })
    }

    async fn commit(&self, tx: Self::Tx) -> Result<(), LedgerError> {
        let InMemoryTransaction {
            guards,
            staged_accounts,
            staged_records,
            ..
        } = tx;

        {
            let mut state = self.shared.state.write().await;
            state.accounts.extend(staged_accounts);
            state.records.extend(staged_records);
        }

        // Row locks are released only once the writes are visible
        drop(guards);
        Ok(())
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<(), LedgerError> {
        drop(tx);
        Ok(())
    }

    async fn find_account(&self, chat_id: &str) -> Result<Option<Account>, LedgerError> {
        Ok(self.shared.state.read().await.accounts.get(chat_id).cloned())
    }

    async fn list_transactions(
        &self,
        chat_id: &str,
        limit: u32,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        let state = self.shared.state.read().await;
        let account = state
            .accounts
            .get(chat_id)
            .ok_or_else(|| LedgerError::account_not_found(chat_id))?;

        let mut records: Vec<TransactionRecord> = state
            .records
            .iter()
            .filter(|record| record.account_id() == account.id)
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
        records.truncate(limit as usize);

        Ok(records)
    }
}
