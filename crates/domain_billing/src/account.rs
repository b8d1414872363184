//! Group account entity
//!
//! One account per chat. Balances only change through the operations in
//! [`crate::operations`], which never produce a negative reserve or pending.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{AccountId, Amount};

/// Reserve and pending balances at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balances {
    /// Prepaid funds available to absorb debits
    pub reserve: Amount,
    /// Outstanding amount owed, fees included
    pub pending: Amount,
}

impl Balances {
    /// Zero reserve and zero pending
    pub const ZERO: Balances = Balances {
        reserve: Amount::ZERO,
        pending: Amount::ZERO,
    };

    /// Creates a balance pair
    pub fn new(reserve: Amount, pending: Amount) -> Self {
        Self { reserve, pending }
    }

    /// Returns true if neither balance is negative
    pub fn is_valid(&self) -> bool {
        !self.reserve.is_negative() && !self.pending.is_negative()
    }
}

/// Ledger state of one chat group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Internal identifier
    pub id: AccountId,
    /// External chat identifier, unique per account
    pub chat_id: String,
    /// Latest known chat title
    pub chat_title: Option<String>,
    /// Prepaid balance
    pub reserve: Amount,
    /// Amount owed, fees included
    pub pending: Amount,
    /// Fraction applied to principals to compute the service fee
    pub service_rate: Amount,
    /// When the account was first used
    pub created_at: DateTime<Utc>,
    /// When balances, rate, or title last changed
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Opens a fresh account with zero balances and a zero service rate
    pub fn open(chat_id: impl Into<String>, chat_title: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new_v7(),
            chat_id: chat_id.into(),
            chat_title,
            reserve: Amount::ZERO,
            pending: Amount::ZERO,
            service_rate: Amount::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the current balances
    pub fn balances(&self) -> Balances {
        Balances::new(self.reserve, self.pending)
    }

    /// Replaces both balances
    pub fn set_balances(&mut self, balances: Balances) {
        self.reserve = balances.reserve;
        self.pending = balances.pending;
        self.touch();
    }

    /// Replaces the service rate
    pub fn set_service_rate(&mut self, rate: Amount) {
        self.service_rate = rate;
        self.touch();
    }

    /// Refreshes the title when one is supplied, keeping the old one otherwise
    ///
    /// Returns true if the stored title changed.
    pub fn refresh_title(&mut self, title: Option<&str>) -> bool {
        match title {
            Some(title) if self.chat_title.as_deref() != Some(title) => {
                self.chat_title = Some(title.to_string());
                self.touch();
                true
            }
            _ => false,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_open_account_is_zeroed() {
        let account = Account::open("-1001", Some("Team".to_string()));
        assert_eq!(account.balances(), Balances::ZERO);
        assert!(account.service_rate.is_zero());
        assert_eq!(account.chat_title.as_deref(), Some("Team"));
    }

    #[test]
    fn test_refresh_title() {
        let mut account = Account::open("-1001", Some("Old".to_string()));
        assert!(!account.refresh_title(None));
        assert!(!account.refresh_title(Some("Old")));
        assert!(account.refresh_title(Some("New")));
        assert_eq!(account.chat_title.as_deref(), Some("New"));
    }

    #[test]
    fn test_balances_validity() {
        assert!(Balances::ZERO.is_valid());
        let broken = Balances::new(Amount::new(dec!(-0.000001)), Amount::ZERO);
        assert!(!broken.is_valid());
    }
}
