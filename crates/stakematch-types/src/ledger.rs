//! Ledger entries: the immutable record of every balance change.
//!
//! Invariant: for every owner, the signed sum of its entries equals its
//! current balance. Entries are appended in the same commit as the balance
//! change they describe and are never modified or deleted.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Coins, EntryId, MatchId, UserId};

/// Whose balance an entry affects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Owner {
    Account(UserId),
    /// The operator's fee account.
    Platform,
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account(id) => write!(f, "account:{id}"),
            Self::Platform => write!(f, "platform"),
        }
    }
}

/// What caused the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryKind {
    /// Stake moved from a player into a match pot.
    EscrowDebit,
    /// Stake released from an open match that never started.
    EscrowCredit,
    /// Stake returned after cancellation or abandonment.
    Refund,
    /// Pot minus platform cut paid to the winner.
    Winnings,
    /// Platform cut retained by the operator.
    PlatformFee,
    /// One-hop reward to the winner's referrer, funded from the platform cut.
    ReferralReward,
    /// Admin deposit or withdrawal; the only external money flow.
    AdminAdjustment,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::EscrowDebit => "escrow-debit",
            Self::EscrowCredit => "escrow-credit",
            Self::Refund => "refund",
            Self::Winnings => "winnings",
            Self::PlatformFee => "platform-fee",
            Self::ReferralReward => "referral-reward",
            Self::AdminAdjustment => "admin-adjustment",
        };
        f.write_str(s)
    }
}

/// Sign of the entry's effect on the owner balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Credit,
    Debit,
}

/// Review status. Entries written by the engine are always `Approved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending,
    Approved,
    Rejected,
}

/// One immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    /// Store-assigned, strictly increasing commit order. Zero until committed.
    pub sequence: u64,
    pub owner: Owner,
    pub kind: EntryKind,
    pub direction: Direction,
    /// Always positive.
    pub amount: Coins,
    pub status: EntryStatus,
    pub related_match: Option<MatchId>,
    pub memo: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// An approved entry, not yet sequenced.
    #[must_use]
    pub fn approved(
        owner: Owner,
        kind: EntryKind,
        direction: Direction,
        amount: Coins,
        related_match: Option<MatchId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EntryId::new(),
            sequence: 0,
            owner,
            kind,
            direction,
            amount,
            status: EntryStatus::Approved,
            related_match,
            memo: None,
            created_at,
        }
    }

    #[must_use]
    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    /// Effect on the owner's balance. Non-approved entries have none.
    #[must_use]
    pub fn signed_effect(&self) -> i128 {
        if self.status != EntryStatus::Approved {
            return 0;
        }
        match self.direction {
            Direction::Credit => self.amount.signed(),
            Direction::Debit => -self.amount.signed(),
        }
    }
}

/// Read-side filter for ledger listings. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerFilter {
    pub owner: Option<Owner>,
    pub related_match: Option<MatchId>,
    pub kind: Option<EntryKind>,
}

impl LedgerFilter {
    #[must_use]
    pub fn for_owner(owner: Owner) -> Self {
        Self {
            owner: Some(owner),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn for_match(match_id: MatchId) -> Self {
        Self {
            related_match: Some(match_id),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        self.owner.is_none_or(|o| o == entry.owner)
            && self
                .related_match
                .is_none_or(|m| entry.related_match == Some(m))
            && self.kind.is_none_or(|k| k == entry.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_effect_follows_direction() {
        let now = Utc::now();
        let owner = Owner::Account(UserId::new());
        let credit = LedgerEntry::approved(
            owner,
            EntryKind::Winnings,
            Direction::Credit,
            Coins(90),
            None,
            now,
        );
        let debit = LedgerEntry::approved(
            owner,
            EntryKind::EscrowDebit,
            Direction::Debit,
            Coins(50),
            None,
            now,
        );
        assert_eq!(credit.signed_effect(), 90);
        assert_eq!(debit.signed_effect(), -50);
    }

    #[test]
    fn pending_entries_have_no_effect() {
        let mut entry = LedgerEntry::approved(
            Owner::Platform,
            EntryKind::AdminAdjustment,
            Direction::Credit,
            Coins(10),
            None,
            Utc::now(),
        );
        entry.status = EntryStatus::Pending;
        assert_eq!(entry.signed_effect(), 0);
    }

    #[test]
    fn filter_matches_fields() {
        let match_id = MatchId::new();
        let entry = LedgerEntry::approved(
            Owner::Platform,
            EntryKind::PlatformFee,
            Direction::Credit,
            Coins(10),
            Some(match_id),
            Utc::now(),
        );
        assert!(LedgerFilter::default().matches(&entry));
        assert!(LedgerFilter::for_match(match_id).matches(&entry));
        assert!(LedgerFilter::for_owner(Owner::Platform).matches(&entry));
        assert!(!LedgerFilter::for_match(MatchId::new()).matches(&entry));
        assert!(!LedgerFilter::for_owner(Owner::Account(UserId::new())).matches(&entry));
    }

    #[test]
    fn kind_display_is_kebab() {
        assert_eq!(EntryKind::PlatformFee.to_string(), "platform-fee");
        let json = serde_json::to_string(&EntryKind::ReferralReward).unwrap();
        assert_eq!(json, "\"referral-reward\"");
    }
}
