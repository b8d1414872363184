//! Ledger domain errors

use core_kernel::{Amount, AmountError};
use thiserror::Error;

/// Errors that can occur in the ledger domain
///
/// Every failure inside a ledger operation rolls the whole unit of work back,
/// so callers can rely on the account being unchanged when they see one of
/// these.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed, zero, out-of-range, or wrongly signed amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// A deposit was larger than the pending balance it must clear
    #[error(
        "Insufficient pending: deposit needs {} but only {} is pending",
        .required.to_storage_string(),
        .pending.to_storage_string()
    )]
    InsufficientPending {
        pending: Amount,
        required: Amount,
    },

    /// No account exists for the chat (read-only queries only)
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// The backing store could not begin, run, or commit the unit of work
    #[error("Ledger store unavailable: {0}")]
    StoreUnavailable(String),

    /// The transaction log disagrees with the live account
    #[error("Inconsistent history: {0}")]
    InconsistentHistory(String),
}

impl LedgerError {
    /// Creates an invalid amount error
    pub fn invalid_amount(message: impl Into<String>) -> Self {
        LedgerError::InvalidAmount(message.into())
    }

    /// Creates a store unavailable error
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        LedgerError::StoreUnavailable(message.into())
    }

    /// Creates an account not found error for a chat identifier
    pub fn account_not_found(chat_id: &str) -> Self {
        LedgerError::AccountNotFound(format!("no ledger account for chat '{}'", chat_id))
    }

    /// Returns true if retrying the whole operation may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::StoreUnavailable(_))
    }

    /// Returns true if the caller supplied input the ledger rejects
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            LedgerError::InvalidAmount(_) | LedgerError::InsufficientPending { .. }
        )
    }
}

impl From<AmountError> for LedgerError {
    fn from(error: AmountError) -> Self {
        LedgerError::InvalidAmount(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_classification() {
        assert!(LedgerError::store_unavailable("pool timed out").is_transient());
        assert!(!LedgerError::invalid_amount("zero").is_transient());
        assert!(LedgerError::invalid_amount("zero").is_rejection());
        assert!(!LedgerError::account_not_found("-100").is_rejection());
    }

    #[test]
    fn test_insufficient_pending_message() {
        let error = LedgerError::InsufficientPending {
            pending: Amount::new(dec!(50)),
            required: Amount::new(dec!(105)),
        };
        assert_eq!(
            error.to_string(),
            "Insufficient pending: deposit needs 105.000000 but only 50.000000 is pending"
        );
    }

    #[test]
    fn test_insufficient_pending_message_keeps_micro_units() {
        let error = LedgerError::InsufficientPending {
            pending: Amount::new(dec!(104.999)),
            required: Amount::new(dec!(105)),
        };
        assert!(error.to_string().contains("needs 105.000000 but only 104.999000"));
    }

    #[test]
    fn test_amount_error_conversion() {
        let error: LedgerError = AmountError::Overflow.into();
        assert!(matches!(error, LedgerError::InvalidAmount(_)));
    }
}
