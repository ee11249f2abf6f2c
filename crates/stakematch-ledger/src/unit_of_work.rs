//! One request's transaction against a [`Store`].
//!
//! A unit of work reads records lazily, remembers the version of everything
//! it read, and stages writes in memory. Nothing is visible to other units of
//! work until [`UnitOfWork::commit`] succeeds; dropping a unit of work
//! discards it without effect.
//!
//! Balance changes go exclusively through [`UnitOfWork::credit`] and
//! [`UnitOfWork::debit`], which mutate the staged balance and append the
//! matching ledger entry in one step. Debits check the balance first.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use stakematch_types::{
    Account, AdminActionDraft, CancelRequest, CancelRequestId, Coins, Direction, DisputeEntry,
    DisputeId, EntryKind, LedgerEntry, Match, MatchId, Notification, Owner, Result,
    StakematchError, UserId,
};

use crate::store::{ChangeSet, CommitReceipt, RecordKey, Store, Versioned};

#[derive(Debug)]
struct Slot<T> {
    record: T,
    dirty: bool,
}

/// The outcome of a successful commit.
#[derive(Debug, Clone, Default)]
pub struct Committed {
    pub receipt: CommitReceipt,
    /// Notifications staged during the unit of work, to be delivered now
    /// that the effects they describe are durable.
    pub notifications: Vec<Notification>,
    /// Whether the commit moved coins.
    pub moved_money: bool,
}

/// A staged, optimistic transaction.
pub struct UnitOfWork<'s> {
    store: &'s dyn Store,
    now: DateTime<Utc>,
    expectations: BTreeMap<RecordKey, u64>,
    accounts: BTreeMap<UserId, Slot<Account>>,
    matches: BTreeMap<MatchId, Slot<Match>>,
    cancel_requests: BTreeMap<CancelRequestId, Slot<CancelRequest>>,
    disputes: BTreeMap<DisputeId, Slot<DisputeEntry>>,
    entries: Vec<LedgerEntry>,
    admin_actions: Vec<AdminActionDraft>,
    outbox: Vec<Notification>,
}

impl<'s> UnitOfWork<'s> {
    /// Begin a unit of work. `now` stamps every record it writes.
    #[must_use]
    pub fn begin(store: &'s dyn Store, now: DateTime<Utc>) -> Self {
        Self {
            store,
            now,
            expectations: BTreeMap::new(),
            accounts: BTreeMap::new(),
            matches: BTreeMap::new(),
            cancel_requests: BTreeMap::new(),
            disputes: BTreeMap::new(),
            entries: Vec::new(),
            admin_actions: Vec::new(),
            outbox: Vec::new(),
        }
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Read-only access to the backing store for queries that do not take
    /// part in the version check (e.g. dispute history counts).
    #[must_use]
    pub fn store(&self) -> &'s dyn Store {
        self.store
    }

    fn expect(&mut self, key: RecordKey, version: u64) {
        self.expectations.entry(key).or_insert(version);
    }

    // ---------------------------------------------------------------------
    // Accounts
    // ---------------------------------------------------------------------

    /// Load an account, or `None` if it does not exist. Absence is also
    /// checked at commit, so a concurrent registration is detected.
    pub fn find_account(&mut self, id: UserId) -> Result<Option<Account>> {
        if let Some(slot) = self.accounts.get(&id) {
            return Ok(Some(slot.record.clone()));
        }
        match self.store.account(id)? {
            Some(Versioned { version, record }) => {
                self.expect(RecordKey::Account(id), version);
                self.accounts.insert(
                    id,
                    Slot {
                        record: record.clone(),
                        dirty: false,
                    },
                );
                Ok(Some(record))
            }
            None => {
                self.expect(RecordKey::Account(id), 0);
                Ok(None)
            }
        }
    }

    /// # Errors
    /// Returns `AccountNotFound` if the account does not exist.
    pub fn account(&mut self, id: UserId) -> Result<Account> {
        self.find_account(id)?
            .ok_or(StakematchError::AccountNotFound(id))
    }

    /// Stage a new account.
    ///
    /// # Errors
    /// Returns `AccountExists` if the account is already known.
    pub fn insert_account(&mut self, account: Account) -> Result<()> {
        if self.find_account(account.id)?.is_some() {
            return Err(StakematchError::AccountExists(account.id));
        }
        self.accounts.insert(
            account.id,
            Slot {
                record: account,
                dirty: true,
            },
        );
        Ok(())
    }

    /// Stage non-balance changes (flags) to an account loaded earlier.
    /// The balance must not differ from the staged one.
    ///
    /// # Errors
    /// - `Internal` if the account was never loaded
    /// - `LedgerInvariantViolation` if the balance was edited directly
    pub fn put_account(&mut self, account: Account) -> Result<()> {
        let slot = self.accounts.get_mut(&account.id).ok_or_else(|| {
            StakematchError::Internal(format!("account {} staged without being loaded", account.id))
        })?;
        if slot.record.balance != account.balance {
            return Err(StakematchError::LedgerInvariantViolation {
                reason: format!("balance of {} edited without a ledger entry", account.id),
            });
        }
        slot.record = account;
        slot.dirty = true;
        Ok(())
    }

    fn account_slot(&mut self, id: UserId) -> Result<&mut Slot<Account>> {
        self.account(id)?;
        self.accounts
            .get_mut(&id)
            .ok_or(StakematchError::AccountNotFound(id))
    }

    /// Current staged balance of an account.
    pub fn balance(&mut self, id: UserId) -> Result<Coins> {
        Ok(self.account(id)?.balance)
    }

    // ---------------------------------------------------------------------
    // Balance mutation protocol
    // ---------------------------------------------------------------------

    /// Credit `amount` to `owner` and append the entry describing it.
    /// A zero amount is a no-op: entries are always positive.
    pub fn credit(
        &mut self,
        owner: Owner,
        kind: EntryKind,
        amount: Coins,
        related_match: Option<MatchId>,
    ) -> Result<()> {
        self.post(owner, kind, Direction::Credit, amount, related_match, None)
    }

    /// Debit `amount` from `owner` and append the entry describing it.
    ///
    /// # Errors
    /// Returns `InsufficientBalance` if the account holds less than `amount`;
    /// nothing is staged in that case.
    pub fn debit(
        &mut self,
        owner: Owner,
        kind: EntryKind,
        amount: Coins,
        related_match: Option<MatchId>,
    ) -> Result<()> {
        self.post(owner, kind, Direction::Debit, amount, related_match, None)
    }

    /// Like [`credit`](Self::credit)/[`debit`](Self::debit) with a memo.
    pub fn post(
        &mut self,
        owner: Owner,
        kind: EntryKind,
        direction: Direction,
        amount: Coins,
        related_match: Option<MatchId>,
        memo: Option<String>,
    ) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        if let Owner::Account(id) = owner {
            let slot = self.account_slot(id)?;
            let updated = match direction {
                Direction::Credit => slot.record.balance.checked_add(amount)?,
                Direction::Debit => {
                    if slot.record.balance < amount {
                        return Err(StakematchError::InsufficientBalance {
                            needed: amount,
                            available: slot.record.balance,
                        });
                    }
                    slot.record.balance.checked_sub(amount)?
                }
            };
            slot.record.balance = updated;
            slot.dirty = true;
        }
        let entry = LedgerEntry::approved(owner, kind, direction, amount, related_match, self.now);
        self.entries.push(match memo {
            Some(memo) => entry.with_memo(memo),
            None => entry,
        });
        Ok(())
    }

    /// Entries staged so far, in posting order.
    #[must_use]
    pub fn staged_entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    // ---------------------------------------------------------------------
    // Matches
    // ---------------------------------------------------------------------

    /// Load a match (staged copy if this unit of work already touched it).
    ///
    /// # Errors
    /// Returns `MatchNotFound` if it does not exist.
    pub fn load_match(&mut self, id: MatchId) -> Result<Match> {
        if let Some(slot) = self.matches.get(&id) {
            return Ok(slot.record.clone());
        }
        let Versioned { version, record } = self
            .store
            .game(id)?
            .ok_or(StakematchError::MatchNotFound(id))?;
        self.expect(RecordKey::Match(id), version);
        self.matches.insert(
            id,
            Slot {
                record: record.clone(),
                dirty: false,
            },
        );
        Ok(record)
    }

    pub fn insert_match(&mut self, game: Match) {
        self.expect(RecordKey::Match(game.id), 0);
        self.matches.insert(
            game.id,
            Slot {
                record: game,
                dirty: true,
            },
        );
    }

    /// Stage changes to a match loaded earlier in this unit of work.
    ///
    /// # Errors
    /// Returns `Internal` if the match was never loaded.
    pub fn put_match(&mut self, game: Match) -> Result<()> {
        let slot = self.matches.get_mut(&game.id).ok_or_else(|| {
            StakematchError::Internal(format!("{} staged without being loaded", game.id))
        })?;
        slot.record = game;
        slot.dirty = true;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Cancel requests
    // ---------------------------------------------------------------------

    /// # Errors
    /// Returns `CancelRequestNotFound` if it does not exist.
    pub fn load_cancel_request(&mut self, id: CancelRequestId) -> Result<CancelRequest> {
        if let Some(slot) = self.cancel_requests.get(&id) {
            return Ok(slot.record.clone());
        }
        let Versioned { version, record } = self
            .store
            .cancel_request(id)?
            .ok_or(StakematchError::CancelRequestNotFound(id))?;
        self.expect(RecordKey::CancelRequest(id), version);
        self.cancel_requests.insert(
            id,
            Slot {
                record: record.clone(),
                dirty: false,
            },
        );
        Ok(record)
    }

    pub fn insert_cancel_request(&mut self, request: CancelRequest) {
        self.expect(RecordKey::CancelRequest(request.id), 0);
        self.cancel_requests.insert(
            request.id,
            Slot {
                record: request,
                dirty: true,
            },
        );
    }

    /// # Errors
    /// Returns `Internal` if the request was never loaded.
    pub fn put_cancel_request(&mut self, request: CancelRequest) -> Result<()> {
        let slot = self.cancel_requests.get_mut(&request.id).ok_or_else(|| {
            StakematchError::Internal(format!("{} staged without being loaded", request.id))
        })?;
        slot.record = request;
        slot.dirty = true;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Disputes
    // ---------------------------------------------------------------------

    /// # Errors
    /// Returns `DisputeNotFound` if it does not exist.
    pub fn load_dispute(&mut self, id: DisputeId) -> Result<DisputeEntry> {
        if let Some(slot) = self.disputes.get(&id) {
            return Ok(slot.record.clone());
        }
        let Versioned { version, record } = self
            .store
            .dispute(id)?
            .ok_or(StakematchError::DisputeNotFound(id))?;
        self.expect(RecordKey::Dispute(id), version);
        self.disputes.insert(
            id,
            Slot {
                record: record.clone(),
                dirty: false,
            },
        );
        Ok(record)
    }

    pub fn insert_dispute(&mut self, dispute: DisputeEntry) {
        self.expect(RecordKey::Dispute(dispute.id), 0);
        self.disputes.insert(
            dispute.id,
            Slot {
                record: dispute,
                dirty: true,
            },
        );
    }

    /// # Errors
    /// Returns `Internal` if the dispute was never loaded.
    pub fn put_dispute(&mut self, dispute: DisputeEntry) -> Result<()> {
        let slot = self.disputes.get_mut(&dispute.id).ok_or_else(|| {
            StakematchError::Internal(format!("{} staged without being loaded", dispute.id))
        })?;
        slot.record = dispute;
        slot.dirty = true;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Audit and notifications
    // ---------------------------------------------------------------------

    pub fn record_admin_action(&mut self, draft: AdminActionDraft) {
        self.admin_actions.push(draft);
    }

    /// Stage a notification for delivery after a successful commit.
    pub fn notify(&mut self, notification: Notification) {
        self.outbox.push(notification);
    }

    // ---------------------------------------------------------------------
    // Commit
    // ---------------------------------------------------------------------

    /// Build the change set without committing it.
    #[must_use]
    pub fn into_change_set(self) -> (ChangeSet, Vec<Notification>) {
        fn dirty<K, T>(slots: BTreeMap<K, Slot<T>>) -> Vec<T> {
            slots
                .into_values()
                .filter(|slot| slot.dirty)
                .map(|slot| slot.record)
                .collect()
        }

        let changes = ChangeSet {
            expectations: self.expectations.into_iter().collect(),
            accounts: dirty(self.accounts),
            matches: dirty(self.matches),
            cancel_requests: dirty(self.cancel_requests),
            disputes: dirty(self.disputes),
            entries: self.entries,
            admin_actions: self.admin_actions,
        };
        (changes, self.outbox)
    }

    /// Commit every staged write atomically.
    ///
    /// # Errors
    /// Propagates the store's commit error; on error nothing was applied.
    pub fn commit(self) -> Result<Committed> {
        let store = self.store;
        let (changes, notifications) = self.into_change_set();
        if changes.is_empty() {
            return Ok(Committed {
                notifications,
                ..Committed::default()
            });
        }
        let moved_money = changes.moves_money();
        let receipt = store.commit(changes)?;
        Ok(Committed {
            receipt,
            notifications,
            moved_money,
        })
    }
}
