//! Fault injection for tests. **Never use in production.**
//!
//! [`FaultyStore`] wraps another store and fails upcoming commits on demand,
//! to exercise retry and best-effort paths without real contention.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use stakematch_types::{
    Account, AdminAction, CancelRequest, CancelRequestId, Coins, DisputeEntry, DisputeFilter,
    DisputeId, LedgerEntry, LedgerFilter, Match, MatchId, Result, StakematchError, UserId,
};

use crate::store::{ChangeSet, CommitReceipt, Store, Versioned};
use crate::supply_conservation::SupplySnapshot;

/// The failure injected into one commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Pretend another writer won the race.
    Conflict,
    /// Pretend the backend is down.
    Storage,
}

/// A store whose next commits fail as scripted.
#[derive(Debug)]
pub struct FaultyStore<S> {
    inner: S,
    faults: Mutex<VecDeque<Fault>>,
    commits_attempted: AtomicU64,
}

impl<S: Store> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            faults: Mutex::new(VecDeque::new()),
            commits_attempted: AtomicU64::new(0),
        }
    }

    /// Fail the next `count` commits with `fault`.
    pub fn fail_next(&self, count: usize, fault: Fault) {
        let mut faults = self.faults.lock().expect("fault queue poisoned");
        faults.extend(std::iter::repeat_n(fault, count));
    }

    pub fn commits_attempted(&self) -> u64 {
        self.commits_attempted.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: Store> Store for FaultyStore<S> {
    fn account(&self, id: UserId) -> Result<Option<Versioned<Account>>> {
        self.inner.account(id)
    }

    fn game(&self, id: MatchId) -> Result<Option<Versioned<Match>>> {
        self.inner.game(id)
    }

    fn cancel_request(&self, id: CancelRequestId) -> Result<Option<Versioned<CancelRequest>>> {
        self.inner.cancel_request(id)
    }

    fn dispute(&self, id: DisputeId) -> Result<Option<Versioned<DisputeEntry>>> {
        self.inner.dispute(id)
    }

    fn idle_matches(&self, cutoff: DateTime<Utc>) -> Result<Vec<MatchId>> {
        self.inner.idle_matches(cutoff)
    }

    fn disputes(&self, filter: &DisputeFilter) -> Result<Vec<DisputeEntry>> {
        self.inner.disputes(filter)
    }

    fn dispute_count_for(&self, user: UserId) -> Result<usize> {
        self.inner.dispute_count_for(user)
    }

    fn ledger_entries(&self, filter: &LedgerFilter) -> Result<Vec<LedgerEntry>> {
        self.inner.ledger_entries(filter)
    }

    fn admin_actions(&self) -> Result<Vec<AdminAction>> {
        self.inner.admin_actions()
    }

    fn accounts(&self) -> Result<Vec<Account>> {
        self.inner.accounts()
    }

    fn platform_balance(&self) -> Result<Coins> {
        self.inner.platform_balance()
    }

    fn supply_snapshot(&self) -> Result<SupplySnapshot> {
        self.inner.supply_snapshot()
    }

    fn commit(&self, changes: ChangeSet) -> Result<CommitReceipt> {
        self.commits_attempted.fetch_add(1, Ordering::SeqCst);
        let fault = self.faults.lock().expect("fault queue poisoned").pop_front();
        match fault {
            Some(Fault::Conflict) => Err(StakematchError::ConcurrencyConflict {
                record: "injected".into(),
            }),
            Some(Fault::Storage) => Err(StakematchError::Storage("injected failure".into())),
            None => self.inner.commit(changes),
        }
    }
}
