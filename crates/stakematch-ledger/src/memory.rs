//! In-process [`Store`] implementation.
//!
//! All state sits behind one `RwLock`. Reads take the read lock and clone;
//! [`MemoryStore::commit`] takes the write lock, validates the whole change
//! set, and only then applies it, so a rejected commit leaves no trace.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use stakematch_types::{
    Account, AdminAction, CancelRequest, CancelRequestId, Coins, DisputeEntry, DisputeFilter,
    DisputeId, GENESIS_HASH, LedgerEntry, LedgerFilter, Match, MatchId, MatchStatus, Owner,
    Result, StakematchError, UserId,
};

use crate::store::{ChangeSet, CommitReceipt, RecordKey, Store, Versioned};
use crate::supply_conservation::{SupplyConservation, SupplySnapshot};

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<UserId, Versioned<Account>>,
    matches: HashMap<MatchId, Versioned<Match>>,
    cancel_requests: HashMap<CancelRequestId, Versioned<CancelRequest>>,
    disputes: HashMap<DisputeId, Versioned<DisputeEntry>>,
    /// Dispute IDs in creation order.
    dispute_order: Vec<DisputeId>,
    entries: Vec<LedgerEntry>,
    admin_actions: Vec<AdminAction>,
    platform_balance: Coins,
    supply: SupplyConservation,
}

impl State {
    fn version_of(&self, key: RecordKey) -> u64 {
        match key {
            RecordKey::Account(id) => self.accounts.get(&id).map_or(0, |v| v.version),
            RecordKey::Match(id) => self.matches.get(&id).map_or(0, |v| v.version),
            RecordKey::CancelRequest(id) => self.cancel_requests.get(&id).map_or(0, |v| v.version),
            RecordKey::Dispute(id) => self.disputes.get(&id).map_or(0, |v| v.version),
        }
    }

    /// Reject the change set without mutating anything. Returns the platform
    /// balance the change set leaves behind.
    fn validate(&self, changes: &ChangeSet) -> Result<Coins> {
        for (key, expected) in &changes.expectations {
            let current = self.version_of(*key);
            if current != *expected {
                tracing::debug!(
                    record = %key,
                    expected = *expected,
                    current,
                    "stale version at commit"
                );
                return Err(StakematchError::ConcurrencyConflict {
                    record: key.to_string(),
                });
            }
        }

        let written = changes
            .accounts
            .iter()
            .map(|a| RecordKey::Account(a.id))
            .chain(changes.matches.iter().map(|m| RecordKey::Match(m.id)))
            .chain(
                changes
                    .cancel_requests
                    .iter()
                    .map(|r| RecordKey::CancelRequest(r.id)),
            )
            .chain(changes.disputes.iter().map(|d| RecordKey::Dispute(d.id)));
        for key in written {
            if !changes.expectations.iter().any(|(k, _)| *k == key) {
                return Err(StakematchError::Internal(format!(
                    "write to {key} without a version expectation"
                )));
            }
        }

        let platform = self.validate_ledger(changes)?;

        for game in &changes.matches {
            if let Some(existing) = self.matches.get(&game.id) {
                let stored = &existing.record;
                if stored.pot != game.pot
                    || stored.platform_cut != game.platform_cut
                    || stored.entry_fee != game.entry_fee
                {
                    return Err(StakematchError::LedgerInvariantViolation {
                        reason: format!("stake amounts of {} changed after creation", game.id),
                    });
                }
            } else if game.pot != game.entry_fee.checked_mul(2)? {
                return Err(StakematchError::LedgerInvariantViolation {
                    reason: format!("pot of {} is not twice the entry fee", game.id),
                });
            }
        }
        Ok(platform)
    }

    /// Every balance delta must be explained by exactly the appended entries.
    fn validate_ledger(&self, changes: &ChangeSet) -> Result<Coins> {
        let mut deltas: HashMap<Owner, i128> = HashMap::new();
        for entry in &changes.entries {
            if entry.amount.is_zero() {
                return Err(StakematchError::LedgerInvariantViolation {
                    reason: format!("zero-amount {} entry for {}", entry.kind, entry.owner),
                });
            }
            *deltas.entry(entry.owner).or_default() += entry.signed_effect();
        }

        for account in &changes.accounts {
            let (old_balance, old_referrer) = match self.accounts.get(&account.id) {
                Some(existing) => (existing.record.balance, Some(existing.record.referred_by)),
                None => (Coins::ZERO, None),
            };
            if let Some(referrer) = old_referrer {
                if referrer != account.referred_by {
                    return Err(StakematchError::LedgerInvariantViolation {
                        reason: format!("referrer of {} changed", account.id),
                    });
                }
            }
            let actual = account.balance.signed() - old_balance.signed();
            let posted = deltas
                .remove(&Owner::Account(account.id))
                .unwrap_or_default();
            if actual != posted {
                return Err(StakematchError::LedgerInvariantViolation {
                    reason: format!(
                        "balance of {} moved by {actual} but entries post {posted}",
                        account.id
                    ),
                });
            }
        }

        let platform_delta = deltas.remove(&Owner::Platform).unwrap_or_default();
        let platform = self.platform_balance.signed() + platform_delta;
        if platform < 0 {
            return Err(StakematchError::LedgerInvariantViolation {
                reason: format!(
                    "platform balance {} cannot absorb {platform_delta}",
                    self.platform_balance
                ),
            });
        }
        let platform = u64::try_from(platform).map_err(|_| StakematchError::BalanceOverflow)?;

        if let Some((owner, posted)) = deltas.into_iter().find(|(_, d)| *d != 0) {
            return Err(StakematchError::LedgerInvariantViolation {
                reason: format!("entries post {posted} to {owner} without a balance change"),
            });
        }
        Ok(Coins(platform))
    }

    /// Infallible: everything that can reject the change set ran in `validate`.
    fn apply(&mut self, changes: ChangeSet, platform: Coins) -> CommitReceipt {
        fn bump<K: std::hash::Hash + Eq, T>(map: &mut HashMap<K, Versioned<T>>, key: K, record: T) {
            let version = map.get(&key).map_or(0, |v| v.version) + 1;
            map.insert(key, Versioned { version, record });
        }

        let mut receipt = CommitReceipt::default();

        for account in changes.accounts {
            bump(&mut self.accounts, account.id, account);
        }
        for game in changes.matches {
            bump(&mut self.matches, game.id, game);
        }
        for request in changes.cancel_requests {
            bump(&mut self.cancel_requests, request.id, request);
        }
        for dispute in changes.disputes {
            if !self.disputes.contains_key(&dispute.id) {
                self.dispute_order.push(dispute.id);
            }
            bump(&mut self.disputes, dispute.id, dispute);
        }

        for mut entry in changes.entries {
            entry.sequence = self.entries.len() as u64 + 1;
            self.supply.observe(&entry);
            receipt.entry_sequences.push(entry.sequence);
            self.entries.push(entry);
        }
        self.platform_balance = platform;

        for draft in changes.admin_actions {
            let prev_hash = self.admin_actions.last().map_or(GENESIS_HASH, |a| a.hash);
            let sequence = self.admin_actions.len() as u64 + 1;
            let action = AdminAction::seal(draft, sequence, prev_hash);
            receipt.admin_action_sequences.push(sequence);
            self.admin_actions.push(action);
        }
        receipt
    }
}

/// A [`Store`] held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| StakematchError::Storage("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| StakematchError::Storage("memory store lock poisoned".into()))
    }

    /// Number of ledger entries committed so far.
    pub fn entry_count(&self) -> Result<usize> {
        Ok(self.read()?.entries.len())
    }
}

impl Store for MemoryStore {
    fn account(&self, id: UserId) -> Result<Option<Versioned<Account>>> {
        Ok(self.read()?.accounts.get(&id).cloned())
    }

    fn game(&self, id: MatchId) -> Result<Option<Versioned<Match>>> {
        Ok(self.read()?.matches.get(&id).cloned())
    }

    fn cancel_request(&self, id: CancelRequestId) -> Result<Option<Versioned<CancelRequest>>> {
        Ok(self.read()?.cancel_requests.get(&id).cloned())
    }

    fn dispute(&self, id: DisputeId) -> Result<Option<Versioned<DisputeEntry>>> {
        Ok(self.read()?.disputes.get(&id).cloned())
    }

    fn idle_matches(&self, cutoff: DateTime<Utc>) -> Result<Vec<MatchId>> {
        let state = self.read()?;
        let mut idle: Vec<(DateTime<Utc>, MatchId)> = state
            .matches
            .values()
            .map(|v| &v.record)
            .filter(|m| matches!(m.status, MatchStatus::Waiting | MatchStatus::InProgress))
            .filter(|m| m.updated_at < cutoff)
            .map(|m| (m.updated_at, m.id))
            .collect();
        idle.sort();
        Ok(idle.into_iter().map(|(_, id)| id).collect())
    }

    fn disputes(&self, filter: &DisputeFilter) -> Result<Vec<DisputeEntry>> {
        let state = self.read()?;
        Ok(state
            .dispute_order
            .iter()
            .filter_map(|id| state.disputes.get(id))
            .map(|v| &v.record)
            .filter(|d| filter.matches(d))
            .cloned()
            .collect())
    }

    fn dispute_count_for(&self, user: UserId) -> Result<usize> {
        Ok(self
            .read()?
            .disputes
            .values()
            .filter(|v| v.record.user_id == user)
            .count())
    }

    fn ledger_entries(&self, filter: &LedgerFilter) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .read()?
            .entries
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }

    fn admin_actions(&self) -> Result<Vec<AdminAction>> {
        Ok(self.read()?.admin_actions.clone())
    }

    fn accounts(&self) -> Result<Vec<Account>> {
        let mut accounts: Vec<Account> = self
            .read()?
            .accounts
            .values()
            .map(|v| v.record.clone())
            .collect();
        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }

    fn platform_balance(&self) -> Result<Coins> {
        Ok(self.read()?.platform_balance)
    }

    fn supply_snapshot(&self) -> Result<SupplySnapshot> {
        let state = self.read()?;
        Ok(SupplySnapshot {
            account_balances: state
                .accounts
                .values()
                .map(|v| u128::from(v.record.balance.get()))
                .sum(),
            platform_balance: u128::from(state.platform_balance.get()),
            escrow_held: state
                .matches
                .values()
                .map(|v| u128::from(v.record.escrow_held().get()))
                .sum(),
            deposits: state.supply.total_deposits(),
            withdrawals: state.supply.total_withdrawals(),
        })
    }

    fn commit(&self, changes: ChangeSet) -> Result<CommitReceipt> {
        let mut state = self.write()?;
        let platform = state.validate(&changes)?;
        let entries = changes.entries.len();
        let receipt = state.apply(changes, platform);
        tracing::trace!(entries, "change set committed");
        Ok(receipt)
    }
}
