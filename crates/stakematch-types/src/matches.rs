//! # Match: the escrowed two-player contest
//!
//! ## State Machine
//!
//! ```text
//!   ┌─────────┐  join   ┌─────────────┐ agreement ┌───────────┐
//!   │ WAITING ├────────▶│ IN-PROGRESS ├──────────▶│ COMPLETED │
//!   └────┬────┘         └──┬───────┬──┘           └───────────┘
//!        │ cancel/idle     │       │ conflict           ▲
//!        │                 │       ▼                    │ admin
//!        │                 │  ┌──────────┐──────────────┘
//!        │                 │  │ CONFLICT │
//!        │                 │  └────┬─────┘
//!        ▼                 ▼       ▼ admin draw/cancel
//!   ┌─────────────────────────────────────┐
//!   │        CANCELLED / ABANDONED        │
//!   └─────────────────────────────────────┘
//! ```
//!
//! `COMPLETED`, `CANCELLED`, and `ABANDONED` are terminal.
//!
//! `pot` and `platform_cut` are computed once when the match is opened and
//! never recomputed; the winner is paid `pot - platform_cut` exactly once.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{CancelRequestId, Coins, EvidenceRef, MatchId, Result, StakematchError, UserId};

/// Lifecycle state of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchStatus {
    /// Creator's stake escrowed, waiting for an opponent.
    Waiting,
    /// Both stakes escrowed; results being collected.
    #[serde(alias = "active")]
    InProgress,
    /// Self-reported results disagree; awaiting an admin.
    Conflict,
    /// Winner paid. Terminal.
    Completed,
    /// Stakes refunded by request, override, or withdrawal. Terminal.
    Cancelled,
    /// Stakes refunded by the idle reaper. Terminal.
    Abandoned,
}

impl MatchStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Abandoned)
    }

    /// Whether player stakes are currently held against this match.
    #[must_use]
    pub fn holds_escrow(self) -> bool {
        !self.is_terminal()
    }

    /// Can a match move from `self` to `target`?
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (
                Self::Waiting,
                Self::InProgress | Self::Cancelled | Self::Abandoned
            ) | (
                Self::InProgress,
                Self::Completed | Self::Conflict | Self::Cancelled | Self::Abandoned
            ) | (Self::Conflict, Self::Completed | Self::Cancelled)
        )
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "WAITING"),
            Self::InProgress => write!(f, "IN-PROGRESS"),
            Self::Conflict => write!(f, "CONFLICT"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Abandoned => write!(f, "ABANDONED"),
        }
    }
}

/// A player's claimed outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameResult {
    Win,
    Loss,
}

impl GameResult {
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Win => Self::Loss,
            Self::Loss => Self::Win,
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Win => write!(f, "win"),
            Self::Loss => write!(f, "loss"),
        }
    }
}

/// Who produced a result field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    Player,
    Admin,
}

/// A result as recorded on the match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub result: GameResult,
    pub evidence: Option<EvidenceRef>,
    pub source: ResultSource,
    pub submitted_at: DateTime<Utc>,
}

impl Submission {
    #[must_use]
    pub fn player(result: GameResult, evidence: Option<EvidenceRef>, at: DateTime<Utc>) -> Self {
        Self {
            result,
            evidence,
            source: ResultSource::Player,
            submitted_at: at,
        }
    }
}

/// Which seat a user occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerSlot {
    One,
    Two,
}

impl PlayerSlot {
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }
}

/// An escrowed two-player match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub player1: UserId,
    pub player2: Option<UserId>,
    pub entry_fee: Coins,
    /// `2 * entry_fee`, fixed at creation.
    pub pot: Coins,
    /// `floor(pot * platform_fee_rate)`, fixed at creation.
    pub platform_cut: Coins,
    pub room_code: String,
    pub player1_result: Option<Submission>,
    pub player2_result: Option<Submission>,
    pub winner: Option<UserId>,
    pub status: MatchStatus,
    /// The single pending cancel request, if any.
    pub pending_cancel: Option<CancelRequestId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub abandon_reason: Option<String>,
    /// Idle time recorded by the reaper when it abandoned the match.
    pub idle_minutes: Option<i64>,
    pub override_reason: Option<String>,
    pub overridden_by: Option<UserId>,
}

impl Match {
    /// Open a match in `WAITING` with the creator's stake.
    ///
    /// # Errors
    /// Returns `BalanceOverflow` if the pot does not fit in `u64`.
    pub fn open(
        player1: UserId,
        entry_fee: Coins,
        room_code: impl Into<String>,
        platform_fee_rate: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let pot = entry_fee.checked_mul(2)?;
        let platform_cut = pot.floor_rate(platform_fee_rate)?;
        Ok(Self {
            id: MatchId::new(),
            player1,
            player2: None,
            entry_fee,
            pot,
            platform_cut,
            room_code: room_code.into(),
            player1_result: None,
            player2_result: None,
            winner: None,
            status: MatchStatus::Waiting,
            pending_cancel: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            abandon_reason: None,
            idle_minutes: None,
            override_reason: None,
            overridden_by: None,
        })
    }

    /// What the winner receives.
    ///
    /// # Errors
    /// Returns `BalanceUnderflow` if the cut exceeds the pot (corrupt record).
    pub fn winnings(&self) -> Result<Coins> {
        self.pot.checked_sub(self.platform_cut)
    }

    #[must_use]
    pub fn slot_of(&self, user: UserId) -> Option<PlayerSlot> {
        if user == self.player1 {
            Some(PlayerSlot::One)
        } else if self.player2 == Some(user) {
            Some(PlayerSlot::Two)
        } else {
            None
        }
    }

    #[must_use]
    pub fn is_participant(&self, user: UserId) -> bool {
        self.slot_of(user).is_some()
    }

    /// The player in `slot`, if seated.
    #[must_use]
    pub fn player(&self, slot: PlayerSlot) -> Option<UserId> {
        match slot {
            PlayerSlot::One => Some(self.player1),
            PlayerSlot::Two => self.player2,
        }
    }

    /// Seated players, player one first.
    pub fn players(&self) -> impl Iterator<Item = UserId> + '_ {
        std::iter::once(self.player1).chain(self.player2)
    }

    #[must_use]
    pub fn result(&self, slot: PlayerSlot) -> Option<&Submission> {
        match slot {
            PlayerSlot::One => self.player1_result.as_ref(),
            PlayerSlot::Two => self.player2_result.as_ref(),
        }
    }

    pub fn set_result(&mut self, slot: PlayerSlot, submission: Submission) {
        match slot {
            PlayerSlot::One => self.player1_result = Some(submission),
            PlayerSlot::Two => self.player2_result = Some(submission),
        }
    }

    /// Coins currently held in escrow for this match.
    #[must_use]
    pub fn escrow_held(&self) -> Coins {
        if !self.status.holds_escrow() {
            return Coins::ZERO;
        }
        let seated = if self.player2.is_some() { 2 } else { 1 };
        Coins(self.entry_fee.0.saturating_mul(seated))
    }

    /// Time since the last state change.
    #[must_use]
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        now - self.updated_at
    }

    /// Move to `target`, enforcing the state machine.
    ///
    /// # Errors
    /// - `MatchAlreadyTerminal` if the match is already terminal
    /// - `IllegalTransition` for any other forbidden edge
    pub fn transition(&mut self, target: MatchStatus, now: DateTime<Utc>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(StakematchError::MatchAlreadyTerminal {
                match_id: self.id,
                status: self.status,
            });
        }
        if !self.status.can_transition_to(target) {
            return Err(StakematchError::IllegalTransition {
                match_id: self.id,
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        self.updated_at = now;
        if target.is_terminal() {
            self.completed_at = Some(now);
        }
        Ok(())
    }
}

/// A fixture match for unit tests. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl Match {
    /// An in-progress match between two fresh users.
    pub fn dummy_in_progress(entry_fee: u64) -> Self {
        let mut m = Self::open(
            UserId::new(),
            Coins(entry_fee),
            "ROOM1",
            Decimal::new(10, 2),
            Utc::now(),
        )
        .expect("fixture pot fits");
        m.player2 = Some(UserId::new());
        m.status = MatchStatus::InProgress;
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_computes_pot_and_cut() {
        let m = Match::open(
            UserId::new(),
            Coins(50),
            "ABC123",
            Decimal::new(10, 2),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(m.pot, Coins(100));
        assert_eq!(m.platform_cut, Coins(10));
        assert_eq!(m.winnings().unwrap(), Coins(90));
        assert_eq!(m.status, MatchStatus::Waiting);
        assert_eq!(m.escrow_held(), Coins(50));
    }

    #[test]
    fn odd_pot_floors_cut() {
        let m = Match::open(
            UserId::new(),
            Coins(7),
            "R",
            Decimal::new(10, 2),
            Utc::now(),
        )
        .unwrap();
        // floor(14 * 0.10) = 1
        assert_eq!(m.platform_cut, Coins(1));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for terminal in [
            MatchStatus::Completed,
            MatchStatus::Cancelled,
            MatchStatus::Abandoned,
        ] {
            for target in [
                MatchStatus::Waiting,
                MatchStatus::InProgress,
                MatchStatus::Conflict,
                MatchStatus::Completed,
                MatchStatus::Cancelled,
                MatchStatus::Abandoned,
            ] {
                assert!(!terminal.can_transition_to(target));
            }
        }
    }

    #[test]
    fn conflict_only_resolves_to_completed_or_cancelled() {
        assert!(MatchStatus::Conflict.can_transition_to(MatchStatus::Completed));
        assert!(MatchStatus::Conflict.can_transition_to(MatchStatus::Cancelled));
        assert!(!MatchStatus::Conflict.can_transition_to(MatchStatus::Abandoned));
        assert!(!MatchStatus::Conflict.can_transition_to(MatchStatus::InProgress));
    }

    #[test]
    fn transition_out_of_terminal_fails() {
        let mut m = Match::dummy_in_progress(10);
        let now = Utc::now();
        m.transition(MatchStatus::Completed, now).unwrap();
        assert_eq!(m.completed_at, Some(now));
        let err = m.transition(MatchStatus::Cancelled, now).unwrap_err();
        assert!(matches!(err, StakematchError::MatchAlreadyTerminal { .. }));
    }

    #[test]
    fn waiting_cannot_complete() {
        let mut m = Match::open(
            UserId::new(),
            Coins(10),
            "R",
            Decimal::new(10, 2),
            Utc::now(),
        )
        .unwrap();
        let err = m.transition(MatchStatus::Completed, Utc::now()).unwrap_err();
        assert!(matches!(err, StakematchError::IllegalTransition { .. }));
    }

    #[test]
    fn slots_and_players() {
        let m = Match::dummy_in_progress(10);
        let p2 = m.player2.unwrap();
        assert_eq!(m.slot_of(m.player1), Some(PlayerSlot::One));
        assert_eq!(m.slot_of(p2), Some(PlayerSlot::Two));
        assert_eq!(m.slot_of(UserId::new()), None);
        assert_eq!(m.players().count(), 2);
        assert_eq!(m.escrow_held(), Coins(20));
    }

    #[test]
    fn legacy_active_status_deserializes() {
        let status: MatchStatus = serde_json::from_str("\"active\"").unwrap();
        assert_eq!(status, MatchStatus::InProgress);
        let json = serde_json::to_string(&MatchStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
    }
}
