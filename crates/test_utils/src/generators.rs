//! Property-Based Test Generators
//!
//! Provides proptest strategies for amounts, rates, and sequences of ledger
//! operations, plus a helper that runs a generated step against any engine.

use proptest::prelude::*;

use core_kernel::Amount;
use domain_billing::{BillingEngine, LedgerCommand, LedgerError, LedgerOutcome, LedgerStore};

/// Strategy for positive amounts up to one million, in micro units
pub fn positive_amount_strategy() -> impl Strategy<Value = Amount> {
    (1i64..1_000_000_000_000i64).prop_map(Amount::from_micros)
}

/// Strategy for non-zero amounts of either sign
pub fn signed_amount_strategy() -> impl Strategy<Value = Amount> {
    prop_oneof![
        positive_amount_strategy(),
        positive_amount_strategy().prop_map(|amount| -amount),
    ]
}

/// Strategy for service rates between 0% and 25%
pub fn rate_strategy() -> impl Strategy<Value = Amount> {
    (0i64..=250_000i64).prop_map(Amount::from_micros)
}

/// One generated ledger operation
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerStep {
    Credit(Amount),
    Reduce(Amount),
    Deposit(Amount),
    Withdraw(Amount),
    SetRate(Amount),
}

impl LedgerStep {
    /// Runs this step for `chat_id`
    pub async fn apply<S: LedgerStore>(
        &self,
        engine: &BillingEngine<S>,
        chat_id: &str,
    ) -> Result<LedgerOutcome, LedgerError> {
        match self {
            LedgerStep::Credit(amount) => {
                engine.credit_pending(LedgerCommand::new(chat_id, *amount)).await
            }
            LedgerStep::Reduce(amount) => {
                engine.reduce_pending(LedgerCommand::new(chat_id, *amount)).await
            }
            LedgerStep::Deposit(amount) => {
                engine.deposit_to_reserve(LedgerCommand::new(chat_id, *amount)).await
            }
            LedgerStep::Withdraw(amount) => {
                engine.withdraw_from_reserve(LedgerCommand::new(chat_id, *amount)).await
            }
            LedgerStep::SetRate(rate) => {
                engine.set_service_rate(LedgerCommand::new(chat_id, *rate)).await
            }
        }
    }
}

/// Strategy for a single ledger step
pub fn ledger_step_strategy() -> impl Strategy<Value = LedgerStep> {
    prop_oneof![
        3 => signed_amount_strategy().prop_map(LedgerStep::Credit),
        2 => positive_amount_strategy().prop_map(LedgerStep::Reduce),
        2 => positive_amount_strategy().prop_map(LedgerStep::Deposit),
        2 => positive_amount_strategy().prop_map(LedgerStep::Withdraw),
        1 => rate_strategy().prop_map(LedgerStep::SetRate),
    ]
}

/// Strategy for a sequence of ledger steps
pub fn ledger_sequence_strategy(max_len: usize) -> impl Strategy<Value = Vec<LedgerStep>> {
    prop::collection::vec(ledger_step_strategy(), 1..=max_len.max(1))
}
