//! Transaction log replay
//!
//! Every record stores the balances right after its operation, so the log can
//! be folded back into a balance timeline without recomputing fees. Replay
//! also checks that each step moves the balances the way its type allows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use core_kernel::Amount;

use crate::account::Balances;
use crate::transaction::{TransactionRecord, TransactionType};

/// A record whose snapshot cannot follow from its predecessor
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReplayError {
    #[error("record {record_id} leaves a negative balance")]
    NegativeBalance { record_id: i64 },

    #[error("rate update {record_id} moved balances")]
    BalancesMoved { record_id: i64 },

    #[error("record {record_id} ({kind}) does not account for amount {amount}")]
    UnexplainedMovement {
        record_id: i64,
        kind: TransactionType,
        amount: Amount,
    },
}

/// One point of the replayed timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayedBalances {
    pub record_id: i64,
    pub kind: TransactionType,
    pub amount: Amount,
    /// Balances after the record
    pub balances: Balances,
    /// Movement relative to the previous record, unknown for the first one
    pub delta: Option<Balances>,
    pub created_at: DateTime<Utc>,
}

/// Folds records into a timeline, oldest first
///
/// Records may be passed in any order. Only consecutive records in the slice
/// are compared, so a partial window checks what it can.
pub fn replay(records: &[TransactionRecord]) -> Result<Vec<ReplayedBalances>, ReplayError> {
    let mut ordered: Vec<&TransactionRecord> = records.iter().collect();
    ordered.sort_by(|a, b| {
        a.created_at()
            .cmp(&b.created_at())
            .then_with(|| a.id().cmp(&b.id()))
    });

    let mut timeline: Vec<ReplayedBalances> = Vec::with_capacity(ordered.len());
    let mut previous: Option<Balances> = None;

    for record in ordered {
        let after = record.balances_after();
        if !after.is_valid() {
            return Err(ReplayError::NegativeBalance {
                record_id: record.id(),
            });
        }

        let delta = previous.map(|before| {
            Balances::new(after.reserve - before.reserve, after.pending - before.pending)
        });
        if let Some(delta) = delta {
            check_step(record, delta)?;
        }

        timeline.push(ReplayedBalances {
            record_id: record.id(),
            kind: record.kind(),
            amount: record.amount(),
            balances: after,
            delta,
            created_at: record.created_at(),
        });
        previous = Some(after);
    }

    Ok(timeline)
}

fn check_step(record: &TransactionRecord, delta: Balances) -> Result<(), ReplayError> {
    let amount = record.amount();
    let unexplained = || ReplayError::UnexplainedMovement {
        record_id: record.id(),
        kind: record.kind(),
        amount,
    };
    // Net change of what the chat owes: pending up, reserve down
    let owed = delta.pending - delta.reserve;

    match record.kind() {
        TransactionType::ServiceRateUpdate => {
            if delta != Balances::ZERO {
                return Err(ReplayError::BalancesMoved {
                    record_id: record.id(),
                });
            }
        }
        TransactionType::PendingAdd => {
            // The fee only ever adds to the magnitude of the principal
            let explained = if amount.is_negative() {
                owed <= amount
            } else {
                owed >= amount
            };
            if !explained {
                return Err(unexplained());
            }
        }
        TransactionType::PendingReduce => {
            if delta.pending.is_positive() || delta.reserve.is_negative() || -owed != amount {
                return Err(unexplained());
            }
        }
        TransactionType::Deposit => {
            // Shared by top-ups and usage charges
            let top_up = delta.reserve == amount && !delta.pending.is_positive() && -delta.pending >= amount;
            let usage = owed == amount && !delta.reserve.is_positive() && !delta.pending.is_negative();
            if !(top_up || usage) {
                return Err(unexplained());
            }
        }
    }

    Ok(())
}
