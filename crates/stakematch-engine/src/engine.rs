//! The [`Engine`] facade.
//!
//! Every logical operation is a method on `Engine`. Money-moving operations
//! live in the service modules ([`crate::escrow`], [`crate::adjudication`],
//! [`crate::cancellation`], [`crate::admin`], [`crate::reaper`]); this module
//! holds construction and the read-only queries.

use std::sync::Arc;

use stakematch_ledger::{Store, SupplySnapshot};
use stakematch_settlement::LedgerReport;
use stakematch_types::{
    Account, AdminAction, CancelRequest, CancelRequestId, Clock, DisputeEntry, DisputeFilter,
    EngineConfig, EvidenceRef, LedgerEntry, LedgerFilter, Match, MatchId, Result,
    StakematchError, SystemClock, UserId, verify_chain,
};

use crate::collaborators::{EvidenceStore, MemoryEvidenceStore, NotificationSink, TracingSink};

/// The match escrow and settlement engine.
pub struct Engine {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: EngineConfig,
    pub(crate) notifier: Arc<dyn NotificationSink>,
    pub(crate) evidence: Arc<dyn EvidenceStore>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// An engine over `store` with the system clock, tracing notifications
    /// and in-memory evidence storage.
    ///
    /// # Errors
    /// Returns `Configuration` if `config` does not validate.
    pub fn new(store: Arc<dyn Store>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            clock: Arc::new(SystemClock),
            config,
            notifier: Arc::new(TracingSink),
            evidence: Arc::new(MemoryEvidenceStore::new()),
        })
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn with_evidence_store(mut self, evidence: Arc<dyn EvidenceStore>) -> Self {
        self.evidence = evidence;
        self
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    // =================================================================
    // Read-only queries
    // =================================================================

    /// # Errors
    /// Returns `MatchNotFound` for an unknown ID.
    pub fn get_match(&self, match_id: MatchId) -> Result<Match> {
        self.store
            .game(match_id)?
            .map(|v| v.record)
            .ok_or(StakematchError::MatchNotFound(match_id))
    }

    /// # Errors
    /// Returns `AccountNotFound` for an unknown ID.
    pub fn get_account(&self, user_id: UserId) -> Result<Account> {
        self.store
            .account(user_id)?
            .map(|v| v.record)
            .ok_or(StakematchError::AccountNotFound(user_id))
    }

    /// # Errors
    /// Returns `CancelRequestNotFound` for an unknown ID.
    pub fn get_cancel_request(&self, request_id: CancelRequestId) -> Result<CancelRequest> {
        self.store
            .cancel_request(request_id)?
            .map(|v| v.record)
            .ok_or(StakematchError::CancelRequestNotFound(request_id))
    }

    pub fn list_disputes(&self, filter: &DisputeFilter) -> Result<Vec<DisputeEntry>> {
        self.store.disputes(filter)
    }

    pub fn list_ledger_entries(&self, filter: &LedgerFilter) -> Result<Vec<LedgerEntry>> {
        self.store.ledger_entries(filter)
    }

    pub fn list_admin_actions(&self) -> Result<Vec<AdminAction>> {
        self.store.admin_actions()
    }

    /// Check supply conservation right now.
    ///
    /// # Errors
    /// Returns `SupplyInvariantViolation` if coins were created or destroyed.
    pub fn verify_supply(&self) -> Result<SupplySnapshot> {
        let snapshot = self.store.supply_snapshot()?;
        snapshot.verify()?;
        Ok(snapshot)
    }

    /// Replay every ledger entry against current balances.
    pub fn verify_ledger(&self) -> Result<LedgerReport> {
        stakematch_settlement::verify_ledger(self.store.as_ref())
    }

    /// Recompute the admin audit hash chain; returns the number of records.
    ///
    /// # Errors
    /// Returns `AuditChainBroken` at the first record that does not verify.
    pub fn verify_audit_chain(&self) -> Result<usize> {
        let actions = self.store.admin_actions()?;
        verify_chain(&actions)?;
        Ok(actions.len())
    }

    /// Hand raw evidence bytes to the evidence store.
    pub fn store_evidence(&self, bytes: &[u8]) -> Result<EvidenceRef> {
        self.evidence.put(bytes)
    }
}
