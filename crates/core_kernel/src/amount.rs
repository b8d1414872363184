//! Exact decimal amounts for ledger balances
//!
//! This module provides a type-safe representation of ledger values using
//! rust_decimal for precise calculations without floating-point errors.
//! Balances are persisted with a fixed scale of six fractional digits and
//! shown to users with two.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;
use thiserror::Error;

/// Number of fractional digits kept in storage
pub const STORAGE_SCALE: u32 = 6;

/// Number of fractional digits shown to users
pub const DISPLAY_SCALE: u32 = 2;

/// Errors that can occur while building or combining amounts
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Overflow during calculation")]
    Overflow,
}

/// An exact decimal amount
///
/// Arithmetic is exact: `0.1 + 0.2` is exactly `0.3`. Values entering the
/// ledger are brought to [`STORAGE_SCALE`] with [`Amount::normalize`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    /// The zero amount
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    /// Creates an amount from a decimal without changing its scale
    pub const fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Creates an amount from an integer number of millionths
    pub fn from_micros(micros: i64) -> Self {
        Self(Decimal::new(micros, STORAGE_SCALE))
    }

    /// Returns the underlying decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Rounds to the storage scale, midpoint away from zero
    pub fn normalize(&self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(STORAGE_SCALE, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Returns true if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the amount is strictly positive
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Returns true if the amount is strictly negative
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Returns the absolute value
    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    /// Checked addition
    pub fn checked_add(&self, other: Amount) -> Result<Amount, AmountError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(AmountError::Overflow)
    }

    /// Checked multiplication, used when applying a rate to a principal
    pub fn checked_mul(&self, factor: Amount) -> Result<Amount, AmountError> {
        self.0
            .checked_mul(factor.0)
            .map(Self)
            .ok_or(AmountError::Overflow)
    }

    /// Formats with exactly `dp` fractional digits
    pub fn to_fixed(&self, dp: u32) -> String {
        let rounded = self
            .0
            .round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
        format!("{:.dp$}", rounded, dp = dp as usize)
    }

    /// Formats for storage, e.g. `"105.000000"`
    pub fn to_storage_string(&self) -> String {
        self.to_fixed(STORAGE_SCALE)
    }

    /// Formats for users, e.g. `"105.00"`
    pub fn to_display_string(&self) -> String {
        self.to_fixed(DISPLAY_SCALE)
    }

    /// Formats a rate as a percentage for users, e.g. `0.05` as `"5.00%"`
    pub fn to_percent_string(&self) -> String {
        format!("{}%", Amount(self.0 * dec!(100)).to_display_string())
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(AmountError::InvalidAmount("empty amount".to_string()));
        }

        Decimal::from_str_exact(trimmed)
            .map(Self)
            .map_err(|_| AmountError::InvalidAmount(format!("'{}' is not a decimal number", trimmed)))
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Decimal {
        amount.0
    }
}

impl Add for Amount {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Amount {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self(self.0 - other.0)
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul for Amount {
    type Output = Self;

    fn mul(self, other: Self) -> Self {
        Self(self.0 * other.0)
    }
}

impl Neg for Amount {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}
