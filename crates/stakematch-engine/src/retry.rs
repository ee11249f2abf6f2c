//! Bounded optimistic retry and post-commit follow-up.
//!
//! Each attempt opens a fresh [`UnitOfWork`], so a retry re-reads current
//! state and re-runs every guard: the loser of a race either succeeds on
//! fresh data or fails with the state error the winner caused.

use stakematch_ledger::{Committed, UnitOfWork};
use stakematch_types::{Result, StakematchError};

use crate::engine::Engine;

impl Engine {
    /// Run `body` in a unit of work and commit it, retrying lost races up to
    /// `max_commit_attempts` times. Notifications are delivered after the
    /// commit that produced them.
    ///
    /// # Errors
    /// - any error `body` returns, unchanged and without retry
    /// - `ConcurrentModification` once retries are exhausted
    pub(crate) fn transact<T>(
        &self,
        operation: &'static str,
        mut body: impl FnMut(&mut UnitOfWork<'_>) -> Result<T>,
    ) -> Result<T> {
        let attempts = self.config.max_commit_attempts;
        for attempt in 1..=attempts {
            let mut uow = UnitOfWork::begin(self.store.as_ref(), self.clock.now());
            let value = body(&mut uow)?;
            match uow.commit() {
                Ok(committed) => {
                    self.after_commit(operation, committed);
                    return Ok(value);
                }
                Err(StakematchError::ConcurrencyConflict { record }) => {
                    tracing::debug!(operation, attempt, %record, "lost optimistic race, retrying");
                }
                Err(err) => {
                    if err.is_fatal() {
                        tracing::error!(operation, error = %err, "commit rejected by invariant check");
                    }
                    return Err(err);
                }
            }
        }
        tracing::warn!(operation, attempts, "giving up after repeated conflicts");
        Err(StakematchError::ConcurrentModification { attempts })
    }

    /// Run a follow-up write (audit or dispute record) whose failure must not
    /// undo the committed operation it describes.
    pub(crate) fn best_effort(
        &self,
        operation: &'static str,
        body: impl FnMut(&mut UnitOfWork<'_>) -> Result<()>,
    ) {
        if let Err(err) = self.transact(operation, body) {
            tracing::warn!(operation, error = %err, "best-effort record not written");
        }
    }

    fn after_commit(&self, operation: &'static str, committed: Committed) {
        for notification in &committed.notifications {
            if let Err(err) = self.notifier.deliver(notification) {
                tracing::warn!(
                    operation,
                    user = %notification.user_id,
                    event = %notification.event,
                    error = %err,
                    "notification not delivered"
                );
            }
        }
        if committed.moved_money && self.config.verify_supply_after_commit {
            match self.store.supply_snapshot().and_then(|s| s.verify()) {
                Ok(()) => {}
                Err(err) => {
                    tracing::error!(operation, error = %err, "supply conservation violated");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use stakematch_ledger::MemoryStore;
    use stakematch_ledger::fault::{Fault, FaultyStore};
    use stakematch_types::{Account, EngineConfig, UserId};

    use super::*;

    fn engine_over(store: Arc<FaultyStore<MemoryStore>>, attempts: u32) -> Engine {
        let config = EngineConfig {
            max_commit_attempts: attempts,
            ..EngineConfig::default()
        };
        Engine::new(store, config).unwrap()
    }

    #[test]
    fn conflicts_are_retried_transparently() {
        let store = Arc::new(FaultyStore::new(MemoryStore::new()));
        store.fail_next(2, Fault::Conflict);
        let engine = engine_over(Arc::clone(&store), 5);
        let user = UserId::new();
        engine
            .transact("register", |uow| {
                uow.insert_account(Account::new(user, None, Utc::now()))
            })
            .unwrap();
        assert_eq!(store.commits_attempted(), 3);
        assert!(engine.get_account(user).is_ok());
    }

    #[test]
    fn exhausted_retries_surface_as_state_conflict() {
        let store = Arc::new(FaultyStore::new(MemoryStore::new()));
        store.fail_next(3, Fault::Conflict);
        let engine = engine_over(Arc::clone(&store), 3);
        let err = engine
            .transact("register", |uow| {
                uow.insert_account(Account::new(UserId::new(), None, Utc::now()))
            })
            .unwrap_err();
        assert!(matches!(err, StakematchError::ConcurrentModification { attempts: 3 }));
        assert_eq!(err.kind(), stakematch_types::ErrorKind::StateConflict);
    }

    #[test]
    fn storage_errors_are_not_retried() {
        let store = Arc::new(FaultyStore::new(MemoryStore::new()));
        store.fail_next(1, Fault::Storage);
        let engine = engine_over(Arc::clone(&store), 5);
        let err = engine
            .transact("register", |uow| {
                uow.insert_account(Account::new(UserId::new(), None, Utc::now()))
            })
            .unwrap_err();
        assert!(matches!(err, StakematchError::Storage(_)));
        assert_eq!(store.commits_attempted(), 1);
    }

    #[test]
    fn best_effort_swallows_failure() {
        let store = Arc::new(FaultyStore::new(MemoryStore::new()));
        store.fail_next(1, Fault::Storage);
        let engine = engine_over(Arc::clone(&store), 5);
        engine.best_effort("audit", |uow| {
            uow.insert_account(Account::new(UserId::new(), None, Utc::now()))
        });
        assert_eq!(store.commits_attempted(), 1);
    }
}
