//! The storage seam.
//!
//! A [`Store`] hands out versioned snapshots of individual records and
//! accepts a [`ChangeSet`] that it must apply atomically, and only if every
//! version the unit of work observed is still current. That conditional
//! commit is the compare-and-swap every operation serialises on: two units of
//! work touching the same match or account cannot both commit.

use std::fmt;

use chrono::{DateTime, Utc};
use stakematch_types::{
    Account, AdminAction, AdminActionDraft, CancelRequest, CancelRequestId, Coins, DisputeEntry,
    DisputeFilter, DisputeId, LedgerEntry, LedgerFilter, Match, MatchId, Result, UserId,
};

use crate::supply_conservation::SupplySnapshot;

/// A record together with its store version. Version 0 means "absent".
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub version: u64,
    pub record: T,
}

/// Identity of a versioned record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum RecordKey {
    Account(UserId),
    Match(MatchId),
    CancelRequest(CancelRequestId),
    Dispute(DisputeId),
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account(id) => write!(f, "account:{id}"),
            Self::Match(id) => write!(f, "{id}"),
            Self::CancelRequest(id) => write!(f, "{id}"),
            Self::Dispute(id) => write!(f, "{id}"),
        }
    }
}

/// Everything one unit of work wants to write, plus the versions it read.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// Version each record must still have at commit (0 = must not exist).
    pub expectations: Vec<(RecordKey, u64)>,
    pub accounts: Vec<Account>,
    pub matches: Vec<Match>,
    pub cancel_requests: Vec<CancelRequest>,
    pub disputes: Vec<DisputeEntry>,
    /// Appended; sequenced by the store.
    pub entries: Vec<LedgerEntry>,
    /// Appended; sequenced and hash-chained by the store.
    pub admin_actions: Vec<AdminActionDraft>,
}

impl ChangeSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
            && self.matches.is_empty()
            && self.cancel_requests.is_empty()
            && self.disputes.is_empty()
            && self.entries.is_empty()
            && self.admin_actions.is_empty()
    }

    /// Whether applying this change set moves coins.
    #[must_use]
    pub fn moves_money(&self) -> bool {
        !self.entries.is_empty()
    }
}

/// What a successful commit produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReceipt {
    /// Sequence numbers assigned to the appended ledger entries.
    pub entry_sequences: Vec<u64>,
    /// Sequence numbers assigned to the appended admin actions.
    pub admin_action_sequences: Vec<u64>,
}

/// Durable storage for the ledger, matches, and review records.
///
/// Reads never lock records; consistency comes from [`Store::commit`]
/// rejecting any change set built on stale versions.
pub trait Store: Send + Sync {
    fn account(&self, id: UserId) -> Result<Option<Versioned<Account>>>;

    fn game(&self, id: MatchId) -> Result<Option<Versioned<Match>>>;

    fn cancel_request(&self, id: CancelRequestId) -> Result<Option<Versioned<CancelRequest>>>;

    fn dispute(&self, id: DisputeId) -> Result<Option<Versioned<DisputeEntry>>>;

    /// Matches in `WAITING`/`IN-PROGRESS` whose last change is before `cutoff`.
    fn idle_matches(&self, cutoff: DateTime<Utc>) -> Result<Vec<MatchId>>;

    /// Disputes matching `filter`, oldest first.
    fn disputes(&self, filter: &DisputeFilter) -> Result<Vec<DisputeEntry>>;

    /// Number of dispute entries on record for `user`.
    fn dispute_count_for(&self, user: UserId) -> Result<usize>;

    /// Ledger entries matching `filter`, in commit order.
    fn ledger_entries(&self, filter: &LedgerFilter) -> Result<Vec<LedgerEntry>>;

    /// The full admin audit trail, in sequence order.
    fn admin_actions(&self) -> Result<Vec<AdminAction>>;

    fn accounts(&self) -> Result<Vec<Account>>;

    fn platform_balance(&self) -> Result<Coins>;

    /// A consistent view of every supply component.
    fn supply_snapshot(&self) -> Result<SupplySnapshot>;

    /// Apply `changes` atomically, or nothing at all.
    ///
    /// # Errors
    /// - `ConcurrencyConflict` if any expectation is stale
    /// - `LedgerInvariantViolation` if balance deltas and entries disagree
    /// - `Storage` if the backend fails
    fn commit(&self, changes: ChangeSet) -> Result<CommitReceipt>;
}
