//! Database error types
//!
//! This module defines the error types that can occur during database operations,
//! and how they surface to the ledger domain.

use domain_billing::LedgerError;
use thiserror::Error;

/// Errors that can occur during database operations
///
/// This enum captures all possible database-related errors, including
/// connection issues, query failures, and constraint violations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to establish a database connection
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Entity not found in database
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// Unique constraint violation
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation, e.g. a negative balance column
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// A numeric value does not fit its column
    #[error("Value out of range: {0}")]
    ValueOutOfRange(String),

    /// Transaction could not begin, commit, or roll back
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Migration error
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be mapped back to a domain type
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Pool exhaustion - no available connections
    #[error("Connection pool exhausted")]
    PoolExhausted,
}

impl DatabaseError {
    /// Creates a not found error for a specific entity type and identifier
    ///
    /// # Example
    ///
    /// ```rust
    /// use infra_db::DatabaseError;
    ///
    /// let error = DatabaseError::not_found("Account", "-100123");
    /// assert!(error.to_string().contains("Account"));
    /// ```
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        DatabaseError::NotFound(format!("{} with id '{}' not found", entity, id))
    }

    /// Checks if the database rejected a value it will never accept
    ///
    /// Retrying the same operation fails the same way.
    pub fn is_rejected_value(&self) -> bool {
        matches!(
            self,
            DatabaseError::ConstraintViolation(_) | DatabaseError::ValueOutOfRange(_)
        )
    }
}

/// Converts SQLx errors to more specific DatabaseError variants
///
/// The mapping is based on the PostgreSQL error code.
impl From<&sqlx::Error> for DatabaseError {
    fn from(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::PoolTimedOut => DatabaseError::PoolExhausted,
            sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                DatabaseError::ConnectionFailed(error.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                DatabaseError::SerializationError(error.to_string())
            }
            sqlx::Error::Database(db_err) => {
                // https://www.postgresql.org/docs/current/errcodes-appendix.html
                match db_err.code().as_deref() {
                    Some("23505") => DatabaseError::DuplicateEntry(db_err.message().to_string()),
                    Some("23503") => {
                        DatabaseError::ForeignKeyViolation(db_err.message().to_string())
                    }
                    Some("23514") => {
                        DatabaseError::ConstraintViolation(db_err.message().to_string())
                    }
                    Some("22003") => DatabaseError::ValueOutOfRange(db_err.message().to_string()),
                    _ => DatabaseError::QueryFailed(db_err.message().to_string()),
                }
            }
            _ => DatabaseError::QueryFailed(error.to_string()),
        }
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        DatabaseError::from(&error)
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        DatabaseError::MigrationFailed(error.to_string())
    }
}

/// Rejected values surface as invalid amounts; every other failure is a
/// store outage
impl From<DatabaseError> for LedgerError {
    fn from(error: DatabaseError) -> Self {
        if error.is_rejected_value() {
            return LedgerError::InvalidAmount(error.to_string());
        }
        match error {
            DatabaseError::NotFound(message) => LedgerError::AccountNotFound(message),
            other => LedgerError::StoreUnavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let error = DatabaseError::from(sqlx::Error::RowNotFound);
        assert!(matches!(error, DatabaseError::NotFound(_)));
    }

    #[test]
    fn test_pool_timeout_is_transient() {
        let error = DatabaseError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(error, DatabaseError::PoolExhausted));
        assert!(!error.is_rejected_value());

        let ledger: LedgerError = error.into();
        assert!(ledger.is_transient());
    }

    #[test]
    fn test_conversion_into_ledger_error() {
        let ledger: LedgerError = DatabaseError::PoolExhausted.into();
        assert!(ledger.is_transient());

        let ledger: LedgerError = DatabaseError::not_found("Account", "-1").into();
        assert!(matches!(ledger, LedgerError::AccountNotFound(_)));
    }

    #[test]
    fn test_rejected_values_are_not_retryable() {
        for error in [
            DatabaseError::ConstraintViolation("accounts_reserve_balance_check".into()),
            DatabaseError::ValueOutOfRange("numeric field overflow".into()),
        ] {
            let ledger: LedgerError = error.into();
            assert!(matches!(ledger, LedgerError::InvalidAmount(_)));
            assert!(!ledger.is_transient());
        }
    }

    #[test]
    fn test_transaction_failure_stays_transient() {
        let ledger: LedgerError = DatabaseError::TransactionFailed("commit".into()).into();
        assert!(matches!(ledger, LedgerError::StoreUnavailable(_)));
        assert!(ledger.is_transient());
    }
}
