//! Balance transitions for the ledger operations
//!
//! Each function takes the balances before the operation and returns the
//! balances after it together with the fee breakdown. None of them touch
//! storage; [`crate::engine::BillingEngine`] runs them inside a unit of work.
//!
//! # Policy
//!
//! - A debit is absorbed by reserve first; only the excess becomes pending.
//! - A credit pays down pending first; only the remainder flows into reserve.
//! - Neither balance ever goes negative, and nothing is clamped after the fact.

use rust_decimal_macros::dec;
use std::fmt;

use core_kernel::Amount;

use crate::account::Balances;
use crate::error::LedgerError;
use crate::transaction::TransactionType;

/// Largest absolute principal the engine accepts
pub const MAX_MAGNITUDE: Amount = Amount::new(dec!(1000000000000000000));

/// Highest service rate the engine accepts (10000%)
pub const MAX_RATE: Amount = Amount::new(dec!(100));

/// Exclusive bound on fees, totals, and balances
///
/// Anything below it keeps all six fractional digits inside `Decimal`'s 28
/// significant digits and fits `NUMERIC(30, 6)`.
pub const MAX_BALANCE: Amount = Amount::new(dec!(1000000000000000000000));

/// Balance-moving ledger operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerOperation {
    CreditPending,
    ReducePending,
    DepositToReserve,
    WithdrawFromReserve,
}

impl LedgerOperation {
    /// Audit category written for this operation
    pub fn record_type(&self) -> TransactionType {
        match self {
            LedgerOperation::CreditPending => TransactionType::PendingAdd,
            LedgerOperation::ReducePending => TransactionType::PendingReduce,
            // Withdrawals share the deposit category
            LedgerOperation::DepositToReserve | LedgerOperation::WithdrawFromReserve => {
                TransactionType::Deposit
            }
        }
    }

    /// Only pending credits accept negative adjustments
    pub fn allows_negative(&self) -> bool {
        matches!(self, LedgerOperation::CreditPending)
    }

    pub fn name(&self) -> &'static str {
        match self {
            LedgerOperation::CreditPending => "credit_pending",
            LedgerOperation::ReducePending => "reduce_pending",
            LedgerOperation::DepositToReserve => "deposit_to_reserve",
            LedgerOperation::WithdrawFromReserve => "withdraw_from_reserve",
        }
    }

    /// Computes the transition for this operation
    pub fn apply(
        &self,
        before: Balances,
        rate: Amount,
        amount: Amount,
    ) -> Result<Transition, LedgerError> {
        let transition = match self {
            LedgerOperation::CreditPending => credit_pending(before, rate, amount)?,
            LedgerOperation::ReducePending => reduce_pending(before, amount)?,
            LedgerOperation::DepositToReserve => deposit_to_reserve(before, rate, amount)?,
            LedgerOperation::WithdrawFromReserve => withdraw_from_reserve(before, amount)?,
        };
        transition.ensure_in_range()
    }
}

impl fmt::Display for LedgerOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one balance computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Balances after the operation
    pub balances: Balances,
    /// Fee charged on the principal
    pub service_fee: Amount,
    /// Principal plus fee
    pub total: Amount,
    /// Principal that still has to be recharged because reserve fell short
    pub recharge_principal: Amount,
    /// Human-readable breakdown
    pub note: String,
}

impl Transition {
    /// Rejects a transition whose figures would lose precision when stored
    pub fn ensure_in_range(self) -> Result<Self, LedgerError> {
        let figures = [
            ("service fee", self.service_fee),
            ("total", self.total),
            ("recharge principal", self.recharge_principal),
            ("reserve", self.balances.reserve),
            ("pending", self.balances.pending),
        ];
        for (label, value) in figures {
            if value.abs() >= MAX_BALANCE || value.normalize() != value {
                return Err(LedgerError::invalid_amount(format!(
                    "{} {} exceeds the supported range",
                    label,
                    value.to_storage_string()
                )));
            }
        }
        Ok(self)
    }
}

/// Checks a submitted principal and brings it to storage scale
///
/// Zero is always rejected; negative values only where the operation allows
/// them.
pub fn validate_principal(operation: LedgerOperation, amount: Amount) -> Result<Amount, LedgerError> {
    let amount = amount.normalize();
    if amount.is_zero() {
        return Err(LedgerError::invalid_amount("amount must not be zero"));
    }
    if amount.is_negative() && !operation.allows_negative() {
        return Err(LedgerError::invalid_amount(format!(
            "{} does not accept negative amounts",
            operation
        )));
    }
    if amount.abs() > MAX_MAGNITUDE {
        return Err(LedgerError::invalid_amount(format!(
            "amount {} exceeds the supported range",
            amount.to_storage_string()
        )));
    }
    Ok(amount)
}

/// Checks a new service rate and brings it to storage scale
pub fn validate_rate(rate: Amount) -> Result<Amount, LedgerError> {
    let rate = rate.normalize();
    if rate.is_negative() {
        return Err(LedgerError::invalid_amount("service rate must not be negative"));
    }
    if rate > MAX_RATE {
        return Err(LedgerError::invalid_amount(format!(
            "service rate {} exceeds {}",
            rate.to_percent_string(),
            MAX_RATE.to_percent_string()
        )));
    }
    Ok(rate)
}

/// Fee on a principal, rounded to storage scale
pub fn service_fee(amount: Amount, rate: Amount) -> Result<Amount, LedgerError> {
    let fee = amount.checked_mul(rate)?.normalize();
    if fee.is_zero() {
        return Ok(Amount::ZERO);
    }
    Ok(fee)
}

/// Chat owes more (or, for a negative amount, less)
pub fn credit_pending(before: Balances, rate: Amount, amount: Amount) -> Result<Transition, LedgerError> {
    let fee = service_fee(amount, rate)?;
    let total = amount.checked_add(fee)?;
    let head = format!(
        "{} + fee {} ({}) = {}",
        amount,
        fee,
        rate.to_percent_string(),
        total
    );

    if !total.is_negative() {
        let reserve_used = before.reserve.min(total);
        let pending_increase = total - reserve_used;
        let recharge_principal = (amount - reserve_used).max(Amount::ZERO);

        Ok(Transition {
            balances: Balances::new(
                before.reserve - reserve_used,
                before.pending.checked_add(pending_increase)?,
            ),
            service_fee: fee,
            total,
            recharge_principal,
            note: format!(
                "{}; reserve used {}; pending +{}",
                head, reserve_used, pending_increase
            ),
        })
    } else {
        let credit = -total;
        let pending_reduction = before.pending.min(credit);
        let reserve_increase = credit - pending_reduction;

        Ok(Transition {
            balances: Balances::new(
                before.reserve.checked_add(reserve_increase)?,
                before.pending - pending_reduction,
            ),
            service_fee: fee,
            total,
            recharge_principal: Amount::ZERO,
            note: format!(
                "{}; pending -{}; reserve +{}",
                head, pending_reduction, reserve_increase
            ),
        })
    }
}

/// Payment received against pending; any excess becomes reserve
pub fn reduce_pending(before: Balances, payment: Amount) -> Result<Transition, LedgerError> {
    let applied = before.pending.min(payment);
    let overpay = payment - applied;
    let reserve = if overpay.is_positive() {
        before.reserve.checked_add(overpay)?
    } else {
        before.reserve
    };

    Ok(Transition {
        balances: Balances::new(reserve, before.pending - applied),
        service_fee: Amount::ZERO,
        total: payment,
        recharge_principal: Amount::ZERO,
        note: format!(
            "payment {}; applied to pending {}; overpay to reserve {}",
            payment, applied, overpay
        ),
    })
}

/// Top-up that must first clear pending (principal plus fee)
pub fn deposit_to_reserve(before: Balances, rate: Amount, amount: Amount) -> Result<Transition, LedgerError> {
    let fee = service_fee(amount, rate)?;
    let total = amount.checked_add(fee)?;

    if before.pending < total {
        return Err(LedgerError::InsufficientPending {
            pending: before.pending,
            required: total,
        });
    }

    Ok(Transition {
        balances: Balances::new(before.reserve.checked_add(amount)?, before.pending - total),
        service_fee: fee,
        total,
        recharge_principal: Amount::ZERO,
        note: format!(
            "deposit {} + fee {} ({}) = {} cleared from pending; reserve +{}",
            amount,
            fee,
            rate.to_percent_string(),
            total,
            amount
        ),
    })
}

/// Usage charged to reserve; a shortfall becomes pending without a fee
pub fn withdraw_from_reserve(before: Balances, usage: Amount) -> Result<Transition, LedgerError> {
    let remaining = before.reserve - usage;

    if !remaining.is_negative() {
        return Ok(Transition {
            balances: Balances::new(remaining, before.pending),
            service_fee: Amount::ZERO,
            total: usage,
            recharge_principal: Amount::ZERO,
            note: format!("usage {} from reserve; reserve left {}", usage, remaining),
        });
    }

    let shortfall = -remaining;
    Ok(Transition {
        balances: Balances::new(Amount::ZERO, before.pending.checked_add(shortfall)?),
        service_fee: Amount::ZERO,
        total: usage,
        recharge_principal: shortfall,
        note: format!(
            "usage {}; reserve {} exhausted; pending +{}",
            usage, before.reserve, shortfall
        ),
    })
}

/// Note written when the service rate changes
pub fn rate_change_note(before: Amount, after: Amount) -> String {
    format!(
        "service rate {} -> {}",
        before.to_percent_string(),
        after.to_percent_string()
    )
}
