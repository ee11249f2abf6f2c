//! Winner payout.
//!
//! 1. Guard: the match must be `IN-PROGRESS` or `CONFLICT` with both seats
//!    filled; a completed match is `AlreadySettled`
//! 2. Look up the winner's direct referrer
//! 3. Build the [`SettlementPlan`]
//! 4. Apply the plan to the caller's unit of work
//!
//! Exactly-once payout rests on step 1 plus the match version check at
//! commit: of two units of work settling the same match, only one commits,
//! and the retry of the other then fails the guard.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stakematch_ledger::UnitOfWork;
use stakematch_types::{
    Coins, Match, MatchId, MatchStatus, Result, ResultSource, StakematchError, UserId,
};

use crate::plan::SettlementPlan;

/// What a settlement paid out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementOutcome {
    pub match_id: MatchId,
    pub winner: UserId,
    pub winnings: Coins,
    pub platform_fee: Coins,
    pub referral: Option<(UserId, Coins)>,
    pub source: ResultSource,
}

/// Reject matches that cannot be settled right now.
///
/// # Errors
/// - `AlreadySettled` for a completed match
/// - `MatchAlreadyTerminal` for a cancelled or abandoned match
/// - `MatchNotSettleable` for a match still waiting for an opponent
pub fn ensure_settleable(game: &Match) -> Result<()> {
    match game.status {
        MatchStatus::Completed => Err(StakematchError::AlreadySettled(game.id)),
        MatchStatus::Cancelled | MatchStatus::Abandoned => {
            Err(StakematchError::MatchAlreadyTerminal {
                match_id: game.id,
                status: game.status,
            })
        }
        MatchStatus::InProgress | MatchStatus::Conflict if game.player2.is_some() => Ok(()),
        _ => Err(StakematchError::MatchNotSettleable {
            match_id: game.id,
            status: game.status,
        }),
    }
}

/// Pay `winner` for `match_id` inside `uow`.
///
/// Nothing is durable until the caller commits `uow`.
///
/// # Errors
/// See [`ensure_settleable`] and [`SettlementPlan::build`].
pub fn settle(
    uow: &mut UnitOfWork<'_>,
    match_id: MatchId,
    winner: UserId,
    source: ResultSource,
    referral_rate: Decimal,
) -> Result<SettlementOutcome> {
    let game = uow.load_match(match_id)?;
    ensure_settleable(&game)?;
    if !game.is_participant(winner) {
        return Err(StakematchError::InvalidWinner {
            match_id,
            user: winner,
        });
    }

    let referrer = match uow.account(winner)?.referred_by {
        Some(referrer) if uow.find_account(referrer)?.is_some() => Some(referrer),
        Some(referrer) => {
            tracing::warn!(%match_id, %winner, %referrer, "referrer account missing; skipping reward");
            None
        }
        None => None,
    };

    let plan = SettlementPlan::build(&game, winner, referrer, referral_rate, source)?;
    plan.apply(uow)?;

    tracing::debug!(
        %match_id,
        %winner,
        winnings = plan.winnings().get(),
        platform_fee = plan.platform_fee().get(),
        steps = plan.effects.len(),
        "settlement staged"
    );

    Ok(SettlementOutcome {
        match_id,
        winner,
        winnings: plan.winnings(),
        platform_fee: plan.platform_fee(),
        referral: plan.referral(),
        source,
    })
}
