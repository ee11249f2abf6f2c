//! Player-initiated cancel requests.
//!
//! A cancel request never moves money by itself; an admin approval routes the
//! match through the refund primitive. At most one request per match may be
//! pending; the match record carries the pending request's ID and the store's
//! version check enforces uniqueness.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CancelRequestId, EvidenceRef, MatchId, Severity, UserId};

/// Why a player wants the match cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    OpponentNoShow,
    TechnicalIssue,
    NetworkIssue,
    WrongRoomCode,
    GameCrashed,
    UnfairPlay,
    MutualAgreement,
    Other,
}

impl CancelReason {
    /// Severity of the dispute entry recorded alongside the request.
    #[must_use]
    pub fn severity(self) -> Severity {
        match self {
            Self::UnfairPlay => Severity::High,
            Self::OpponentNoShow => Severity::Medium,
            Self::TechnicalIssue
            | Self::NetworkIssue
            | Self::WrongRoomCode
            | Self::GameCrashed
            | Self::MutualAgreement
            | Self::Other => Severity::Low,
        }
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OpponentNoShow => "opponent_no_show",
            Self::TechnicalIssue => "technical_issue",
            Self::NetworkIssue => "network_issue",
            Self::WrongRoomCode => "wrong_room_code",
            Self::GameCrashed => "game_crashed",
            Self::UnfairPlay => "unfair_play",
            Self::MutualAgreement => "mutual_agreement",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for CancelRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Approved => write!(f, "APPROVED"),
            Self::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// Admin verdict on a cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelDecision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelRequest {
    pub id: CancelRequestId,
    pub match_id: MatchId,
    pub requested_by: UserId,
    pub reason: CancelReason,
    pub details: Option<String>,
    pub evidence: Option<EvidenceRef>,
    pub status: CancelRequestStatus,
    pub reviewed_by: Option<UserId>,
    pub review_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl CancelRequest {
    #[must_use]
    pub fn pending(
        match_id: MatchId,
        requested_by: UserId,
        reason: CancelReason,
        details: Option<String>,
        evidence: Option<EvidenceRef>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CancelRequestId::new(),
            match_id,
            requested_by,
            reason,
            details,
            evidence,
            status: CancelRequestStatus::Pending,
            reviewed_by: None,
            review_note: None,
            created_at: now,
            reviewed_at: None,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == CancelRequestStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfair_play_is_high_severity() {
        assert_eq!(CancelReason::UnfairPlay.severity(), Severity::High);
        assert_eq!(CancelReason::TechnicalIssue.severity(), Severity::Low);
        assert_eq!(CancelReason::NetworkIssue.severity(), Severity::Low);
        assert_eq!(CancelReason::OpponentNoShow.severity(), Severity::Medium);
    }

    #[test]
    fn reason_serde_is_snake_case() {
        let json = serde_json::to_string(&CancelReason::UnfairPlay).unwrap();
        assert_eq!(json, "\"unfair_play\"");
        assert_eq!(CancelReason::UnfairPlay.to_string(), "unfair_play");
    }

    #[test]
    fn new_request_is_pending() {
        let req = CancelRequest::pending(
            MatchId::new(),
            UserId::new(),
            CancelReason::GameCrashed,
            None,
            None,
            Utc::now(),
        );
        assert!(req.is_pending());
        assert!(req.reviewed_by.is_none());
    }
}
