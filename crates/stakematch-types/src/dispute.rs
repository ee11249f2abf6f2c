//! Dispute entries: the append-only trail of suspicious or conflicting
//! events, kept for human review and cross-match pattern detection.
//!
//! ```text
//!   OPEN ──investigate──▶ INVESTIGATING
//!    │                        │
//!    ├──resolve/take_action───┼──▶ RESOLVED
//!    └──dismiss───────────────┴──▶ DISMISSED
//! ```
//!
//! Entries are never deleted and their evidence is never rewritten; only the
//! status, the `action_taken` annotation, and review notes change.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{DisputeId, MatchId, UserId, constants};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeType {
    /// Both players reported inconsistent results.
    Conflict,
    /// A player asked for the match to be cancelled.
    CancelRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    #[must_use]
    pub fn base_risk_score(self) -> u8 {
        match self {
            Self::Low => 25,
            Self::Medium => 50,
            Self::High => 75,
            Self::Critical => 90,
        }
    }
}

/// Risk score for a new entry given how many entries the user already has.
#[must_use]
pub fn risk_score(severity: Severity, prior_entries: usize) -> u8 {
    let escalation = u32::try_from(prior_entries)
        .unwrap_or(u32::MAX)
        .saturating_mul(constants::RISK_ESCALATION_PER_PRIOR_DISPUTE);
    let score = u32::from(severity.base_risk_score()).saturating_add(escalation);
    u8::try_from(score.min(constants::MAX_RISK_SCORE)).unwrap_or(u8::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisputeStatus {
    Open,
    Investigating,
    Resolved,
    Dismissed,
}

impl DisputeStatus {
    #[must_use]
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Resolved | Self::Dismissed)
    }

    /// The status reached by applying `action`, if legal.
    #[must_use]
    pub fn apply(self, action: &DisputeAction) -> Option<Self> {
        match (self, action) {
            (Self::Open, DisputeAction::Investigate) => Some(Self::Investigating),
            (Self::Open | Self::Investigating, DisputeAction::Resolve | DisputeAction::TakeAction(_)) => {
                Some(Self::Resolved)
            }
            (Self::Open | Self::Investigating, DisputeAction::Dismiss) => Some(Self::Dismissed),
            _ => None,
        }
    }
}

impl fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Investigating => write!(f, "INVESTIGATING"),
            Self::Resolved => write!(f, "RESOLVED"),
            Self::Dismissed => write!(f, "DISMISSED"),
        }
    }
}

/// Account-level sanction an admin can take while resolving a dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sanction {
    Flag,
    Ban,
}

/// Admin action on a dispute entry. None of these move match funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", content = "sanction", rename_all = "snake_case")]
pub enum DisputeAction {
    Resolve,
    Dismiss,
    Investigate,
    TakeAction(Sanction),
}

impl fmt::Display for DisputeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolve => write!(f, "resolve"),
            Self::Dismiss => write!(f, "dismiss"),
            Self::Investigate => write!(f, "investigate"),
            Self::TakeAction(Sanction::Flag) => write!(f, "take_action(flag)"),
            Self::TakeAction(Sanction::Ban) => write!(f, "take_action(ban)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisputeEntry {
    pub id: DisputeId,
    pub user_id: UserId,
    pub dispute_type: DisputeType,
    pub match_id: Option<MatchId>,
    pub severity: Severity,
    pub risk_score: u8,
    /// Captured at creation, never rewritten.
    pub evidence: Value,
    pub status: DisputeStatus,
    pub action_taken: Option<String>,
    pub notes: Vec<String>,
    pub reviewed_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DisputeEntry {
    #[must_use]
    pub fn open(
        user_id: UserId,
        dispute_type: DisputeType,
        match_id: Option<MatchId>,
        severity: Severity,
        risk_score: u8,
        evidence: Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: DisputeId::new(),
            user_id,
            dispute_type,
            match_id,
            severity,
            risk_score,
            evidence,
            status: DisputeStatus::Open,
            action_taken: None,
            notes: Vec::new(),
            reviewed_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Read-side filter for dispute listings. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeFilter {
    pub user_id: Option<UserId>,
    pub match_id: Option<MatchId>,
    pub status: Option<DisputeStatus>,
    pub dispute_type: Option<DisputeType>,
}

impl DisputeFilter {
    #[must_use]
    pub fn matches(&self, entry: &DisputeEntry) -> bool {
        self.user_id.is_none_or(|u| u == entry.user_id)
            && self
                .match_id
                .is_none_or(|m| entry.match_id == Some(m))
            && self.status.is_none_or(|s| s == entry.status)
            && self.dispute_type.is_none_or(|t| t == entry.dispute_type)
    }
}
