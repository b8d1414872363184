//! Core error types used across the ledger crates

use thiserror::Error;

use crate::amount::AmountError;

/// Core error type for the kernel
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Amount error: {0}")]
    Amount(#[from] AmountError),

    #[error("Invalid identifier: {0}")]
    Identifier(#[from] uuid::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        CoreError::Configuration(message.into())
    }
}
