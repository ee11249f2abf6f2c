//! User accounts and the request actor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Coins, Result, StakematchError, UserId};

/// A user's coin account.
///
/// `balance` only ever changes together with a ledger entry describing the
/// change; the store rejects commits where the two disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: UserId,
    pub balance: Coins,
    /// Direct referrer. Set at registration, immutable afterwards.
    pub referred_by: Option<UserId>,
    /// Marked for review by an admin dispute action.
    pub flagged: bool,
    /// Banned accounts cannot stake coins.
    pub banned: bool,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// A fresh zero-balance account.
    #[must_use]
    pub fn new(id: UserId, referred_by: Option<UserId>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            balance: Coins::ZERO,
            referred_by,
            flagged: false,
            banned: false,
            created_at: now,
        }
    }

    /// Reject banned accounts.
    ///
    /// # Errors
    /// Returns [`StakematchError::AccountSuspended`] if the account is banned.
    pub fn ensure_can_stake(&self) -> Result<()> {
        if self.banned {
            return Err(StakematchError::AccountSuspended(self.id));
        }
        Ok(())
    }
}

/// The already-verified caller of an engine operation, as supplied by the
/// identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub is_admin: bool,
}

impl Actor {
    #[must_use]
    pub fn user(user_id: UserId) -> Self {
        Self {
            user_id,
            is_admin: false,
        }
    }

    #[must_use]
    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            is_admin: true,
        }
    }

    /// Returns the admin's user ID, or `Forbidden` for regular users.
    ///
    /// # Errors
    /// Returns [`StakematchError::Forbidden`] if the actor is not an admin.
    pub fn require_admin(&self, operation: &str) -> Result<UserId> {
        if self.is_admin {
            Ok(self.user_id)
        } else {
            Err(StakematchError::Forbidden {
                reason: format!("{operation} requires an admin"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_is_empty() {
        let account = Account::new(UserId::new(), None, Utc::now());
        assert!(account.balance.is_zero());
        assert!(!account.flagged);
        assert!(account.ensure_can_stake().is_ok());
    }

    #[test]
    fn banned_account_cannot_stake() {
        let mut account = Account::new(UserId::new(), None, Utc::now());
        account.banned = true;
        let err = account.ensure_can_stake().unwrap_err();
        assert!(matches!(err, StakematchError::AccountSuspended(_)));
    }

    #[test]
    fn only_admins_pass_admin_check() {
        let id = UserId::new();
        assert_eq!(Actor::admin(id).require_admin("override").unwrap(), id);
        let err = Actor::user(id).require_admin("override").unwrap_err();
        assert!(err.to_string().contains("override requires an admin"));
    }
}
