//! Supply conservation invariant checker.
//!
//! Invariant enforced after every money-moving commit:
//! ```text
//! Σ(account balances) + platform balance + Σ(escrow held) == Σ(deposits) - Σ(withdrawals)
//! ```
//!
//! Escrow, settlement, refunds, and referral rewards only move coins between
//! these buckets. Admin adjustments are the sole external flow and are the
//! only thing that changes the right-hand side.

use serde::{Deserialize, Serialize};
use stakematch_types::{Coins, Direction, EntryKind, LedgerEntry, Owner, Result, StakematchError};

/// Tracks external deposits and withdrawals since genesis.
#[derive(Debug, Clone, Default)]
pub struct SupplyConservation {
    deposits: u128,
    withdrawals: u128,
}

impl SupplyConservation {
    /// Create a new supply conservation tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_deposit(&mut self, amount: Coins) {
        self.deposits += u128::from(amount.get());
    }

    pub fn record_withdrawal(&mut self, amount: Coins) {
        self.withdrawals += u128::from(amount.get());
    }

    /// Record `entry` if it is an external flow (an approved admin
    /// adjustment on a user account). Everything else is internal.
    pub fn observe(&mut self, entry: &LedgerEntry) {
        if entry.kind != EntryKind::AdminAdjustment
            || !matches!(entry.owner, Owner::Account(_))
            || entry.signed_effect() == 0
        {
            return;
        }
        match entry.direction {
            Direction::Credit => self.record_deposit(entry.amount),
            Direction::Debit => self.record_withdrawal(entry.amount),
        }
    }

    #[must_use]
    pub fn total_deposits(&self) -> u128 {
        self.deposits
    }

    #[must_use]
    pub fn total_withdrawals(&self) -> u128 {
        self.withdrawals
    }

    /// Expected total supply: deposits - withdrawals.
    #[must_use]
    pub fn expected_supply(&self) -> i128 {
        i128::try_from(self.deposits).unwrap_or(i128::MAX)
            - i128::try_from(self.withdrawals).unwrap_or(i128::MAX)
    }
}

/// Point-in-time view of every bucket coins can sit in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplySnapshot {
    pub account_balances: u128,
    pub platform_balance: u128,
    pub escrow_held: u128,
    pub deposits: u128,
    pub withdrawals: u128,
}

impl SupplySnapshot {
    /// Coins currently held anywhere in the system.
    #[must_use]
    pub fn actual_supply(&self) -> u128 {
        self.account_balances + self.platform_balance + self.escrow_held
    }

    /// # Errors
    /// Returns [`StakematchError::SupplyInvariantViolation`] if actual ≠ expected.
    pub fn verify(&self) -> Result<()> {
        let actual = i128::try_from(self.actual_supply()).unwrap_or(i128::MAX);
        let expected = i128::try_from(self.deposits).unwrap_or(i128::MAX)
            - i128::try_from(self.withdrawals).unwrap_or(i128::MAX);
        if actual != expected {
            return Err(StakematchError::SupplyInvariantViolation {
                reason: format!(
                    "actual supply {actual} != expected {expected} \
                     (accounts={}, platform={}, escrow={}, deposits={}, withdrawals={})",
                    self.account_balances,
                    self.platform_balance,
                    self.escrow_held,
                    self.deposits,
                    self.withdrawals,
                ),
            });
        }
        Ok(())
    }
}
