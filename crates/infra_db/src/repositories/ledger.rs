//! Ledger repository implementation
//!
//! This module provides database access for group accounts and their
//! transaction log. Reads go through the pool; writes take a connection that
//! belongs to an open transaction so they commit or roll back together.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use core_kernel::{AccountId, Amount};
use domain_billing::{Account, NewTransactionRecord, TransactionRecord, TransactionType};

use crate::error::DatabaseError;

const ACCOUNT_COLUMNS: &str = "id, chat_id, chat_title, reserve_balance, pending_amount, \
     service_rate, created_at, updated_at";

const TRANSACTION_COLUMNS: &str = "id, account_id, type, amount, reserve_after, \
     pending_amount_after, note, actor_id, created_at";

/// Repository for group accounts and the transaction log
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Round-trips a trivial query
    pub async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }

    /// Retrieves the committed account for a chat, if any
    pub async fn find_account_by_chat(
        &self,
        chat_id: &str,
    ) -> Result<Option<AccountRow>, DatabaseError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {} FROM accounts WHERE chat_id = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Retrieves the latest records of an account, newest first
    pub async fn list_transactions(
        &self,
        account_id: Uuid,
        limit: i64,
    ) -> Result<Vec<TransactionRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            SELECT {}
            FROM transactions
            WHERE account_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(account_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Inserts a zeroed account unless the chat already has one
    ///
    /// Returns true if this call created the row. A concurrent insert for the
    /// same chat waits on the unique constraint and then does nothing.
    pub async fn insert_account_if_absent(
        conn: &mut PgConnection,
        account: &Account,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (
                id, chat_id, chat_title, reserve_balance, pending_amount,
                service_rate, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            ON CONFLICT (chat_id) DO NOTHING
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(&account.chat_id)
        .bind(account.chat_title.as_deref())
        .bind(account.reserve.as_decimal())
        .bind(account.pending.as_decimal())
        .bind(account.service_rate.as_decimal())
        .bind(account.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Reads the account for a chat and holds its row lock until the
    /// surrounding transaction ends
    pub async fn lock_account(
        conn: &mut PgConnection,
        chat_id: &str,
    ) -> Result<AccountRow, DatabaseError> {
        sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {} FROM accounts WHERE chat_id = $1 FOR UPDATE",
            ACCOUNT_COLUMNS
        ))
        .bind(chat_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Account", chat_id))
    }

    /// Writes title, balances, and rate of an existing account
    pub async fn update_account(
        conn: &mut PgConnection,
        account: &Account,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET chat_title = $2,
                reserve_balance = $3,
                pending_amount = $4,
                service_rate = $5,
                updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(account.chat_title.as_deref())
        .bind(account.reserve.as_decimal())
        .bind(account.pending.as_decimal())
        .bind(account.service_rate.as_decimal())
        .bind(account.updated_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Account", account.id));
        }
        Ok(())
    }

    /// Appends one record and returns it as stored
    pub async fn insert_transaction(
        conn: &mut PgConnection,
        record: &NewTransactionRecord,
        created_at: DateTime<Utc>,
    ) -> Result<TransactionRow, DatabaseError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            INSERT INTO transactions (
                account_id, type, amount, reserve_after,
                pending_amount_after, note, actor_id, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(record.account_id.as_uuid())
        .bind(record.kind.as_str())
        .bind(record.amount.as_decimal())
        .bind(record.reserve_after.as_decimal())
        .bind(record.pending_after.as_decimal())
        .bind(&record.note)
        .bind(record.actor_id.as_deref())
        .bind(created_at)
        .fetch_one(&mut *conn)
        .await?;

        Ok(row)
    }
}

/// Database row for an account
#[derive(Debug, Clone, FromRow)]
pub struct AccountRow {
    pub id: Uuid,
    pub chat_id: String,
    pub chat_title: Option<String>,
    pub reserve_balance: Decimal,
    pub pending_amount: Decimal,
    pub service_rate: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccountRow {
    /// Converts the row into the domain account
    pub fn into_account(self) -> Account {
        Account {
            id: AccountId::from_uuid(self.id),
            chat_id: self.chat_id,
            chat_title: self.chat_title,
            reserve: Amount::new(self.reserve_balance),
            pending: Amount::new(self.pending_amount),
            service_rate: Amount::new(self.service_rate),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Database row for a transaction record
#[derive(Debug, Clone, FromRow)]
pub struct TransactionRow {
    pub id: i64,
    pub account_id: Uuid,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub amount: Decimal,
    pub reserve_after: Decimal,
    pub pending_amount_after: Decimal,
    pub note: String,
    pub actor_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TransactionRow {
    /// Converts the row into the domain record
    ///
    /// # Errors
    ///
    /// `SerializationError` if the stored type is not a known category
    pub fn into_record(self) -> Result<TransactionRecord, DatabaseError> {
        let kind: TransactionType = self.kind.parse().map_err(DatabaseError::SerializationError)?;

        Ok(TransactionRecord::from_parts(
            self.id,
            NewTransactionRecord {
                account_id: AccountId::from_uuid(self.account_id),
                kind,
                amount: Amount::new(self.amount),
                reserve_after: Amount::new(self.reserve_after),
                pending_after: Amount::new(self.pending_amount_after),
                note: self.note,
                actor_id: self.actor_id,
            },
            self.created_at,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn transaction_row(kind: &str) -> TransactionRow {
        TransactionRow {
            id: 7,
            account_id: Uuid::now_v7(),
            kind: kind.to_string(),
            amount: dec!(100.000000),
            reserve_after: dec!(0.000000),
            pending_amount_after: dec!(105.000000),
            note: "note".to_string(),
            actor_id: Some("42".to_string()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_transaction_row_into_record() {
        let record = transaction_row("PENDING_ADD").into_record().unwrap();
        assert_eq!(record.id(), 7);
        assert_eq!(record.kind(), TransactionType::PendingAdd);
        assert_eq!(record.pending_after(), Amount::new(dec!(105)));
        assert_eq!(record.actor_id(), Some("42"));
    }

    #[test]
    fn test_unknown_transaction_type_is_rejected() {
        let result = transaction_row("REFUND").into_record();
        assert!(matches!(result, Err(DatabaseError::SerializationError(_))));
    }

    #[test]
    fn test_account_row_into_account() {
        let id = Uuid::now_v7();
        let now = Utc::now();
        let account = AccountRow {
            id,
            chat_id: "-100".to_string(),
            chat_title: None,
            reserve_balance: dec!(12.500000),
            pending_amount: dec!(0.000000),
            service_rate: dec!(0.050000),
            created_at: now,
            updated_at: now,
        }
        .into_account();

        assert_eq!(*account.id.as_uuid(), id);
        assert_eq!(account.reserve.to_display_string(), "12.50");
        assert_eq!(account.service_rate, Amount::new(dec!(0.05)));
    }
}
