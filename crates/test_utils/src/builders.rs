//! Test Data Builders
//!
//! Provides builder patterns for constructing ledger test data with sensible
//! defaults, so tests only spell out the fields they care about.

use chrono::{DateTime, Duration, Utc};

use core_kernel::{AccountId, Amount};
use domain_billing::{Account, Balances, NewTransactionRecord, TransactionRecord, TransactionType};

/// Builder for accounts in a given state
pub struct AccountBuilder {
    chat_id: String,
    chat_title: Option<String>,
    balances: Balances,
    service_rate: Amount,
}

impl AccountBuilder {
    /// Creates a builder for a zeroed account
    pub fn new(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            chat_title: None,
            balances: Balances::ZERO,
            service_rate: Amount::ZERO,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.chat_title = Some(title.into());
        self
    }

    pub fn reserve(mut self, reserve: Amount) -> Self {
        self.balances.reserve = reserve;
        self
    }

    pub fn pending(mut self, pending: Amount) -> Self {
        self.balances.pending = pending;
        self
    }

    pub fn service_rate(mut self, rate: Amount) -> Self {
        self.service_rate = rate;
        self
    }

    pub fn build(self) -> Account {
        let mut account = Account::open(self.chat_id, self.chat_title);
        account.set_balances(self.balances);
        account.set_service_rate(self.service_rate);
        account
    }
}

/// Builder for a chronological log of records belonging to one account
pub struct RecordLogBuilder {
    account_id: AccountId,
    start: DateTime<Utc>,
    records: Vec<TransactionRecord>,
}

impl Default for RecordLogBuilder {
    fn default() -> Self {
        Self::new(AccountId::new_v7())
    }
}

impl RecordLogBuilder {
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            start: Utc::now(),
            records: Vec::new(),
        }
    }

    /// Appends a record one second after the previous one
    pub fn push(mut self, kind: TransactionType, amount: Amount, after: Balances) -> Self {
        let id = self.records.len() as i64 + 1;
        self.records.push(TransactionRecord::from_parts(
            id,
            NewTransactionRecord {
                account_id: self.account_id,
                kind,
                amount,
                reserve_after: after.reserve,
                pending_after: after.pending,
                note: format!("{} {}", kind, amount),
                actor_id: None,
            },
            self.start + Duration::seconds(id),
        ));
        self
    }

    /// Returns the records newest first, the way history queries do
    pub fn newest_first(mut self) -> Vec<TransactionRecord> {
        self.records.reverse();
        self.records
    }

    pub fn build(self) -> Vec<TransactionRecord> {
        self.records
    }
}
