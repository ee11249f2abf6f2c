//! Integer coin amounts.
//!
//! Balances, stakes, and payouts are whole coins. Percentages (platform cut,
//! referral reward) are expressed as [`Decimal`] rates and always floor.

use std::fmt;
use std::iter::Sum;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::{Result, StakematchError};

/// A non-negative whole number of coins.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Coins(pub u64);

impl Coins {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn new(amount: u64) -> Self {
        Self(amount)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// # Errors
    /// Returns [`StakematchError::BalanceOverflow`] on `u64` overflow.
    pub fn checked_add(self, other: Self) -> Result<Self> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(StakematchError::BalanceOverflow)
    }

    /// # Errors
    /// Returns [`StakematchError::BalanceUnderflow`] if `other > self`.
    pub fn checked_sub(self, other: Self) -> Result<Self> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or(StakematchError::BalanceUnderflow)
    }

    /// # Errors
    /// Returns [`StakematchError::BalanceOverflow`] on `u64` overflow.
    pub fn checked_mul(self, factor: u64) -> Result<Self> {
        self.0
            .checked_mul(factor)
            .map(Self)
            .ok_or(StakematchError::BalanceOverflow)
    }

    /// `floor(self * rate)`.
    ///
    /// # Errors
    /// Returns [`StakematchError::InvalidInput`] for a negative rate and
    /// [`StakematchError::BalanceOverflow`] if the product does not fit.
    pub fn floor_rate(self, rate: Decimal) -> Result<Self> {
        if rate.is_sign_negative() {
            return Err(StakematchError::InvalidInput {
                reason: format!("rate {rate} is negative"),
            });
        }
        Decimal::from(self.0)
            .checked_mul(rate)
            .map(|product| product.floor())
            .and_then(|floored| floored.to_u64())
            .map(Self)
            .ok_or(StakematchError::BalanceOverflow)
    }

    /// Signed view used by ledger arithmetic.
    #[must_use]
    pub fn signed(self) -> i128 {
        i128::from(self.0)
    }
}

impl From<u64> for Coins {
    fn from(amount: u64) -> Self {
        Self(amount)
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} coins", self.0)
    }
}

impl Sum for Coins {
    /// Saturating sum; callers needing overflow detection use `checked_add`.
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Self(iter.fold(0u64, |acc, c| acc.saturating_add(c.0)))
    }
}
