//! The single refund primitive.
//!
//! Every path that unwinds a match (creator withdrawal, approved cancel
//! request, admin draw, idle reaper) ends here. It returns each seated
//! player's entry fee and moves the match to a terminal state; a match that
//! is already terminal is rejected, so a stake is never returned twice.

use std::fmt;

use serde::{Deserialize, Serialize};
use stakematch_ledger::UnitOfWork;
use stakematch_types::{
    CancelRequestId, Coins, EntryKind, MatchId, MatchStatus, Notification, NotificationEvent,
    Owner, Result, StakematchError, UserId,
};

/// Why a match is being unwound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum RefundCause {
    /// The creator withdrew an open match before anyone joined.
    CreatorWithdrew,
    /// An admin approved a player's cancel request.
    CancelApproved { request_id: CancelRequestId },
    /// An admin overrode the match as a draw.
    AdminDraw,
    /// The idle reaper found the match untouched for too long.
    IdleTimeout { idle_minutes: i64 },
}

impl RefundCause {
    /// Terminal status the match ends in.
    #[must_use]
    pub fn terminal_status(self) -> MatchStatus {
        match self {
            Self::IdleTimeout { .. } => MatchStatus::Abandoned,
            _ => MatchStatus::Cancelled,
        }
    }

    /// Ledger entry kind for the returned stakes.
    #[must_use]
    pub fn entry_kind(self) -> EntryKind {
        match self {
            Self::CreatorWithdrew => EntryKind::EscrowCredit,
            _ => EntryKind::Refund,
        }
    }
}

impl fmt::Display for RefundCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreatorWithdrew => write!(f, "withdrawn by creator"),
            Self::CancelApproved { request_id } => write!(f, "{request_id} approved"),
            Self::AdminDraw => write!(f, "admin draw"),
            Self::IdleTimeout { idle_minutes } => write!(f, "idle for {idle_minutes} minutes"),
        }
    }
}

/// What a refund returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundOutcome {
    pub match_id: MatchId,
    pub status: MatchStatus,
    pub cause: RefundCause,
    pub refunded: Vec<(UserId, Coins)>,
}

impl RefundOutcome {
    #[must_use]
    pub fn total(&self) -> Coins {
        self.refunded.iter().map(|(_, amount)| *amount).sum()
    }
}

/// Return every seated player's stake for `match_id` inside `uow`.
///
/// # Errors
/// - `AlreadySettled` if the match was paid out
/// - `MatchAlreadyTerminal` if it was already cancelled or abandoned
/// - `IllegalTransition` if `cause` cannot end the match from its current
///   state (an idle timeout on a conflict)
pub fn refund(uow: &mut UnitOfWork<'_>, match_id: MatchId, cause: RefundCause) -> Result<RefundOutcome> {
    let mut game = uow.load_match(match_id)?;
    match game.status {
        MatchStatus::Completed => return Err(StakematchError::AlreadySettled(match_id)),
        MatchStatus::Cancelled | MatchStatus::Abandoned => {
            return Err(StakematchError::MatchAlreadyTerminal {
                match_id,
                status: game.status,
            });
        }
        MatchStatus::Waiting | MatchStatus::InProgress | MatchStatus::Conflict => {}
    }

    let status = cause.terminal_status();
    let players: Vec<UserId> = game.players().collect();
    game.transition(status, uow.now())?;
    match cause {
        RefundCause::IdleTimeout { idle_minutes } => {
            game.idle_minutes = Some(idle_minutes);
            game.abandon_reason = Some(cause.to_string());
        }
        RefundCause::CreatorWithdrew => {
            game.abandon_reason = Some(cause.to_string());
        }
        RefundCause::CancelApproved { .. } | RefundCause::AdminDraw => {}
    }
    uow.put_match(game.clone())?;

    let mut refunded = Vec::with_capacity(players.len());
    for player in players {
        uow.credit(
            Owner::Account(player),
            cause.entry_kind(),
            game.entry_fee,
            Some(match_id),
        )?;
        uow.notify(Notification::new(
            player,
            NotificationEvent::StakeRefunded,
            Some(game.entry_fee),
            match_id,
        ));
        refunded.push((player, game.entry_fee));
    }

    tracing::debug!(%match_id, %status, %cause, players = refunded.len(), "refund staged");
    Ok(RefundOutcome {
        match_id,
        status,
        cause,
        refunded,
    })
}
