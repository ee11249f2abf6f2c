//! Error types for the StakeMatch engine.
//!
//! All errors use the `SM_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Validation errors
//! - 2xx: Balance errors
//! - 3xx: Match state errors
//! - 4xx: Cancel request / dispute errors
//! - 5xx: Settlement errors
//! - 6xx: Concurrency errors
//! - 7xx: Not-found errors
//! - 8xx: Authorization and invariant errors
//! - 9xx: General / internal errors
//!
//! [`StakematchError::kind`] folds every variant into the coarse
//! [`ErrorKind`] taxonomy that callers branch on.

use thiserror::Error;

use crate::{
    CancelRequestId, CancelRequestStatus, Coins, DisputeId, DisputeStatus, MatchId, MatchStatus,
    UserId,
};

/// Central error enum for all StakeMatch operations.
#[derive(Debug, Error)]
pub enum StakematchError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// Entry fee below the configured minimum.
    #[error("SM_ERR_100: Invalid entry fee {fee}: minimum is {min}")]
    InvalidEntryFee { fee: Coins, min: Coins },

    /// Entry fee above the configured maximum.
    #[error("SM_ERR_101: Entry fee {fee} exceeds maximum {max}")]
    EntryFeeTooLarge { fee: Coins, max: Coins },

    /// Room code empty, too long, or containing control characters.
    #[error("SM_ERR_102: Invalid room code: {reason}")]
    InvalidRoomCode { reason: String },

    /// A `win` claim was submitted without screenshot evidence.
    #[error("SM_ERR_103: A win claim requires screenshot evidence")]
    EvidenceRequired,

    /// The proposed winner is not one of the match's two players.
    #[error("SM_ERR_104: User {user} is not a player in {match_id}")]
    InvalidWinner { match_id: MatchId, user: UserId },

    /// A player tried to join their own match.
    #[error("SM_ERR_105: Cannot join your own match")]
    SelfJoin,

    /// An account named itself as its referrer.
    #[error("SM_ERR_106: An account cannot refer itself")]
    SelfReferral,

    /// Generic malformed input.
    #[error("SM_ERR_107: Invalid input: {reason}")]
    InvalidInput { reason: String },

    // =================================================================
    // Balance Errors (2xx)
    // =================================================================
    /// Not enough balance to escrow a stake or apply a debit.
    #[error("SM_ERR_200: Insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Coins, available: Coins },

    /// A credit would overflow the balance representation.
    #[error("SM_ERR_201: Balance overflow")]
    BalanceOverflow,

    /// A debit would produce a negative balance.
    #[error("SM_ERR_202: Balance underflow")]
    BalanceUnderflow,

    // =================================================================
    // Match State Errors (3xx)
    // =================================================================
    /// The match is full or no longer open for joining.
    #[error("SM_ERR_300: Match {0} is already full or no longer open")]
    MatchNotJoinable(MatchId),

    /// Results can only be submitted while the match is in progress.
    #[error("SM_ERR_301: Match {0} is not in progress")]
    MatchNotActive(MatchId),

    /// The player already submitted a result for this match.
    #[error("SM_ERR_302: User {user} already submitted a result for {match_id}")]
    DuplicateSubmission { match_id: MatchId, user: UserId },

    /// The user is not one of the match's players.
    #[error("SM_ERR_303: User {user} is not a participant in {match_id}")]
    NotParticipant { match_id: MatchId, user: UserId },

    /// The match already reached a terminal state.
    #[error("SM_ERR_304: Match {match_id} is already {status}")]
    MatchAlreadyTerminal {
        match_id: MatchId,
        status: MatchStatus,
    },

    /// The match cannot be settled in its current state.
    #[error("SM_ERR_305: Match {match_id} cannot be settled while {status}")]
    MatchNotSettleable {
        match_id: MatchId,
        status: MatchStatus,
    },

    /// Only the creator may withdraw a match nobody has joined yet.
    #[error("SM_ERR_306: Match {0} cannot be withdrawn")]
    MatchNotWithdrawable(MatchId),

    /// The state machine forbids this transition.
    #[error("SM_ERR_307: Illegal transition for {match_id}: {from} -> {to}")]
    IllegalTransition {
        match_id: MatchId,
        from: MatchStatus,
        to: MatchStatus,
    },

    /// An account with this user ID already exists.
    #[error("SM_ERR_308: Account already exists: {0}")]
    AccountExists(UserId),

    // =================================================================
    // Cancel Request / Dispute Errors (4xx)
    // =================================================================
    /// A pending cancel request already exists for this match.
    #[error("SM_ERR_400: A cancel request is already pending for {0}")]
    DuplicatePendingRequest(MatchId),

    /// The cancel request was already reviewed.
    #[error("SM_ERR_401: Cancel request {request_id} is already {status}")]
    CancelRequestNotPending {
        request_id: CancelRequestId,
        status: CancelRequestStatus,
    },

    /// The dispute cannot move to the requested status.
    #[error("SM_ERR_402: Dispute {dispute_id} cannot go from {from} via {action}")]
    InvalidDisputeTransition {
        dispute_id: DisputeId,
        from: DisputeStatus,
        action: String,
    },

    // =================================================================
    // Settlement Errors (5xx)
    // =================================================================
    /// The match has already been paid out (idempotency guard).
    #[error("SM_ERR_500: Match already settled: {0}")]
    AlreadySettled(MatchId),

    // =================================================================
    // Concurrency Errors (6xx)
    // =================================================================
    /// An optimistic version check failed at commit; safe to retry.
    #[error("SM_ERR_600: Concurrent update detected on {record}")]
    ConcurrencyConflict { record: String },

    /// Optimistic retries were exhausted.
    #[error("SM_ERR_601: Gave up after {attempts} attempts due to concurrent updates")]
    ConcurrentModification { attempts: u32 },

    // =================================================================
    // Not-Found Errors (7xx)
    // =================================================================
    #[error("SM_ERR_700: Account not found: {0}")]
    AccountNotFound(UserId),

    #[error("SM_ERR_701: Match not found: {0}")]
    MatchNotFound(MatchId),

    #[error("SM_ERR_702: Cancel request not found: {0}")]
    CancelRequestNotFound(CancelRequestId),

    #[error("SM_ERR_703: Dispute not found: {0}")]
    DisputeNotFound(DisputeId),

    // =================================================================
    // Authorization / Invariant Errors (8xx)
    // =================================================================
    /// The actor lacks the privilege for this operation.
    #[error("SM_ERR_800: Forbidden: {reason}")]
    Forbidden { reason: String },

    /// Banned accounts cannot stake coins.
    #[error("SM_ERR_801: Account suspended: {0}")]
    AccountSuspended(UserId),

    /// Supply conservation invariant violated. Critical safety alert.
    #[error("SM_ERR_850: Supply invariant violation: {reason}")]
    SupplyInvariantViolation { reason: String },

    /// Balance deltas and ledger entries disagree. Critical safety alert.
    #[error("SM_ERR_851: Ledger invariant violation: {reason}")]
    LedgerInvariantViolation { reason: String },

    /// The admin audit hash chain does not verify.
    #[error("SM_ERR_852: Audit chain broken at sequence {sequence}")]
    AuditChainBroken { sequence: u64 },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("SM_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("SM_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, missing fields, etc.).
    #[error("SM_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// The storage backend failed.
    #[error("SM_ERR_903: Storage error: {0}")]
    Storage(String),

    /// An external collaborator (evidence store, notification sink) failed.
    #[error("SM_ERR_904: Collaborator error: {0}")]
    Collaborator(String),
}

/// Coarse error taxonomy exposed across the engine boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or missing input. Not retryable.
    Validation,
    /// Illegal for the current record state. Re-fetch and retry.
    StateConflict,
    /// Not enough coins. Not retryable without new funds.
    InsufficientFunds,
    /// The referenced record does not exist.
    NotFound,
    /// Lost an optimistic race. Retried internally.
    ConcurrencyRetry,
    /// The actor may not perform this operation.
    Forbidden,
    /// A financial invariant broke. Fatal, must alert.
    Invariant,
    /// Storage or collaborator failure. Generic retryable failure.
    Internal,
}

impl StakematchError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidEntryFee { .. }
            | Self::EntryFeeTooLarge { .. }
            | Self::InvalidRoomCode { .. }
            | Self::EvidenceRequired
            | Self::InvalidWinner { .. }
            | Self::SelfJoin
            | Self::SelfReferral
            | Self::InvalidInput { .. }
            | Self::Configuration(_) => ErrorKind::Validation,

            Self::InsufficientBalance { .. } => ErrorKind::InsufficientFunds,

            Self::MatchNotJoinable(_)
            | Self::MatchNotActive(_)
            | Self::DuplicateSubmission { .. }
            | Self::NotParticipant { .. }
            | Self::MatchAlreadyTerminal { .. }
            | Self::MatchNotSettleable { .. }
            | Self::MatchNotWithdrawable(_)
            | Self::IllegalTransition { .. }
            | Self::AccountExists(_)
            | Self::DuplicatePendingRequest(_)
            | Self::CancelRequestNotPending { .. }
            | Self::InvalidDisputeTransition { .. }
            | Self::AlreadySettled(_)
            | Self::ConcurrentModification { .. } => ErrorKind::StateConflict,

            Self::ConcurrencyConflict { .. } => ErrorKind::ConcurrencyRetry,

            Self::AccountNotFound(_)
            | Self::MatchNotFound(_)
            | Self::CancelRequestNotFound(_)
            | Self::DisputeNotFound(_) => ErrorKind::NotFound,

            Self::Forbidden { .. } | Self::AccountSuspended(_) => ErrorKind::Forbidden,

            Self::BalanceOverflow
            | Self::BalanceUnderflow
            | Self::SupplyInvariantViolation { .. }
            | Self::LedgerInvariantViolation { .. }
            | Self::AuditChainBroken { .. } => ErrorKind::Invariant,

            Self::Internal(_)
            | Self::Serialization(_)
            | Self::Storage(_)
            | Self::Collaborator(_) => ErrorKind::Internal,
        }
    }

    /// Whether a caller may retry the same request unchanged.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::ConcurrencyRetry | ErrorKind::Internal)
    }

    /// Whether this error must page an operator.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Invariant
    }

    /// Message safe to show to an end user.
    ///
    /// Validation, state, and funds errors are actionable and shown verbatim
    /// (minus the code); everything else collapses to a generic message.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Validation
            | ErrorKind::StateConflict
            | ErrorKind::InsufficientFunds
            | ErrorKind::NotFound
            | ErrorKind::Forbidden => {
                let full = self.to_string();
                match full.split_once(": ") {
                    Some((_, message)) => message.to_string(),
                    None => full,
                }
            }
            ErrorKind::ConcurrencyRetry | ErrorKind::Internal => {
                "The service is temporarily unavailable, please retry".to_string()
            }
            ErrorKind::Invariant => "Internal error; the operation was not applied".to_string(),
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, StakematchError>;

impl From<serde_json::Error> for StakematchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = StakematchError::MatchNotFound(MatchId::new());
        let msg = format!("{err}");
        assert!(msg.starts_with("SM_ERR_701"), "Got: {msg}");
    }

    #[test]
    fn insufficient_balance_display() {
        let err = StakematchError::InsufficientBalance {
            needed: Coins(100),
            available: Coins(50),
        };
        let msg = format!("{err}");
        assert!(msg.contains("SM_ERR_200"));
        assert!(msg.contains("100"));
        assert!(msg.contains("50"));
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    }

    #[test]
    fn taxonomy_mapping() {
        let id = MatchId::new();
        assert_eq!(
            StakematchError::MatchNotJoinable(id).kind(),
            ErrorKind::StateConflict
        );
        assert_eq!(StakematchError::AlreadySettled(id).kind(), ErrorKind::StateConflict);
        assert_eq!(StakematchError::EvidenceRequired.kind(), ErrorKind::Validation);
        assert_eq!(
            StakematchError::ConcurrencyConflict { record: "m".into() }.kind(),
            ErrorKind::ConcurrencyRetry
        );
        assert_eq!(
            StakematchError::ConcurrentModification { attempts: 5 }.kind(),
            ErrorKind::StateConflict
        );
        assert!(
            StakematchError::SupplyInvariantViolation { reason: "x".into() }.is_fatal()
        );
    }

    #[test]
    fn public_messages() {
        let err = StakematchError::MatchNotJoinable(MatchId::from_bytes([0u8; 16]));
        let msg = err.public_message();
        assert!(!msg.contains("SM_ERR_"));
        assert!(msg.contains("already full"));

        let err = StakematchError::Storage("disk on fire".into());
        assert!(err.is_retryable());
        assert!(!err.public_message().contains("disk"));
    }

    #[test]
    fn all_errors_have_sm_err_prefix() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(StakematchError::EvidenceRequired),
            Box::new(StakematchError::SelfJoin),
            Box::new(StakematchError::BalanceOverflow),
            Box::new(StakematchError::Internal("test".into())),
            Box::new(StakematchError::MatchAlreadyTerminal {
                match_id: MatchId::new(),
                status: MatchStatus::Cancelled,
            }),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with("SM_ERR_"),
                "Error missing SM_ERR_ prefix: {msg}"
            );
        }
    }
}
