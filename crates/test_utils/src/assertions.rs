//! Custom Test Assertions
//!
//! Provides assertion helpers for ledger types that give more meaningful
//! failure messages than standard assertions.

use core_kernel::Amount;
use domain_billing::{replay, Account, TransactionRecord};

/// Asserts both balances of an account
pub fn assert_balances(account: &Account, reserve: Amount, pending: Amount) {
    assert!(
        account.reserve == reserve && account.pending == pending,
        "Balance mismatch for chat {}: reserve={} pending={}, expected reserve={} pending={}",
        account.chat_id,
        account.reserve.to_storage_string(),
        account.pending.to_storage_string(),
        reserve.to_storage_string(),
        pending.to_storage_string()
    );
}

/// Asserts that neither balance is negative
pub fn assert_balances_valid(account: &Account) {
    assert!(
        account.balances().is_valid(),
        "Negative balance for chat {}: reserve={} pending={}",
        account.chat_id,
        account.reserve.to_storage_string(),
        account.pending.to_storage_string()
    );
}

/// Asserts that a record's snapshot equals the account it belongs to
pub fn assert_record_matches_account(record: &TransactionRecord, account: &Account) {
    assert_eq!(
        record.account_id(),
        account.id,
        "Record {} belongs to another account",
        record.id()
    );
    assert_eq!(
        record.balances_after(),
        account.balances(),
        "Record {} snapshot differs from account {}",
        record.id(),
        account.chat_id
    );
}

/// Asserts that a slice of history replays cleanly and ends at the account
pub fn assert_history_consistent(records: &[TransactionRecord], account: &Account) {
    let timeline = replay::replay(records)
        .unwrap_or_else(|e| panic!("History of chat {} does not replay: {}", account.chat_id, e));

    if let Some(last) = timeline.last() {
        assert_eq!(
            last.balances,
            account.balances(),
            "History of chat {} ends at {:?}",
            account.chat_id,
            last.balances
        );
    }
}

/// Asserts that records are ordered newest first
pub fn assert_newest_first(records: &[TransactionRecord]) {
    for pair in records.windows(2) {
        assert!(
            (pair[0].created_at(), pair[0].id()) >= (pair[1].created_at(), pair[1].id()),
            "Record {} is listed before newer record {}",
            pair[0].id(),
            pair[1].id()
        );
    }
}
