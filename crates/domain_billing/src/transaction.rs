//! Transaction log records
//!
//! Every committed ledger operation appends exactly one record. A record is
//! built once by the store from a [`NewTransactionRecord`] and exposes only
//! read accessors afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{AccountId, Amount};

use crate::account::Balances;

/// Audit category of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Debit (or negative adjustment) against pending
    PendingAdd,
    /// Payment received against pending
    PendingReduce,
    /// Deposit into reserve, or usage withdrawn from reserve
    Deposit,
    /// Service rate changed
    ServiceRateUpdate,
}

impl TransactionType {
    /// Storage code of the type
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::PendingAdd => "PENDING_ADD",
            TransactionType::PendingReduce => "PENDING_REDUCE",
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::ServiceRateUpdate => "SERVICE_RATE_UPDATE",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING_ADD" => Ok(TransactionType::PendingAdd),
            "PENDING_REDUCE" => Ok(TransactionType::PendingReduce),
            "DEPOSIT" => Ok(TransactionType::Deposit),
            "SERVICE_RATE_UPDATE" => Ok(TransactionType::ServiceRateUpdate),
            other => Err(format!("unknown transaction type '{}'", other)),
        }
    }
}

/// Data for a record that has not been stored yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransactionRecord {
    pub account_id: AccountId,
    pub kind: TransactionType,
    /// Principal submitted to the operation
    pub amount: Amount,
    pub reserve_after: Amount,
    pub pending_after: Amount,
    pub note: String,
    pub actor_id: Option<String>,
}

/// A stored, immutable transaction record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    id: i64,
    account_id: AccountId,
    kind: TransactionType,
    amount: Amount,
    reserve_after: Amount,
    pending_after: Amount,
    note: String,
    actor_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Materializes a record once the store has assigned its id and timestamp
    pub fn from_parts(id: i64, record: NewTransactionRecord, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            account_id: record.account_id,
            kind: record.kind,
            amount: record.amount,
            reserve_after: record.reserve_after,
            pending_after: record.pending_after,
            note: record.note,
            actor_id: record.actor_id,
            created_at,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn kind(&self) -> TransactionType {
        self.kind
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn reserve_after(&self) -> Amount {
        self.reserve_after
    }

    pub fn pending_after(&self) -> Amount {
        self.pending_after
    }

    /// Balances captured right after the operation
    pub fn balances_after(&self) -> Balances {
        Balances::new(self.reserve_after, self.pending_after)
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn actor_id(&self) -> Option<&str> {
        self.actor_id.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
