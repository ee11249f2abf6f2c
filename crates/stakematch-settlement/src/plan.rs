//! The settlement cascade as an explicit, ordered list of effects.
//!
//! A [`SettlementPlan`] is computed up front from the match record, the
//! winner and the winner's referrer, then applied step by step inside one
//! [`UnitOfWork`]. If any step fails the unit of work is dropped and none of
//! the effects land.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stakematch_ledger::UnitOfWork;
use stakematch_types::{
    Coins, EntryKind, GameResult, Match, MatchId, MatchStatus, Notification, NotificationEvent,
    Owner, PlayerSlot, Result, ResultSource, StakematchError, Submission, UserId,
};

/// One step of a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    /// Credit `pot - platform_cut` to the winner.
    CreditWinnings { winner: UserId, amount: Coins },
    /// Record the platform cut against the platform account.
    RetainPlatformFee { amount: Coins },
    /// Move the referral reward from the platform account to the referrer.
    PayReferral { referrer: UserId, amount: Coins },
    /// Write the final result fields and mark the match completed.
    CompleteMatch { winner: UserId, source: ResultSource },
}

/// The full set of effects one settlement will apply, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementPlan {
    pub match_id: MatchId,
    pub effects: Vec<Effect>,
}

impl SettlementPlan {
    /// Compute the plan for `winner` taking `game`.
    ///
    /// The referral reward is `floor(pot * referral_rate)`, capped at the
    /// platform cut that funds it. A missing referrer or a zero reward
    /// produces no referral step.
    ///
    /// # Errors
    /// - `InvalidWinner` if `winner` is not one of the two players
    /// - `BalanceUnderflow` if the stored cut exceeds the pot
    pub fn build(
        game: &Match,
        winner: UserId,
        referrer: Option<UserId>,
        referral_rate: Decimal,
        source: ResultSource,
    ) -> Result<Self> {
        if game.player2.is_none() || !game.is_participant(winner) {
            return Err(StakematchError::InvalidWinner {
                match_id: game.id,
                user: winner,
            });
        }

        let mut effects = vec![
            Effect::CreditWinnings {
                winner,
                amount: game.winnings()?,
            },
            Effect::RetainPlatformFee {
                amount: game.platform_cut,
            },
        ];
        if let Some(referrer) = referrer.filter(|r| *r != winner) {
            let amount = game.pot.floor_rate(referral_rate)?.min(game.platform_cut);
            if !amount.is_zero() {
                effects.push(Effect::PayReferral { referrer, amount });
            }
        }
        effects.push(Effect::CompleteMatch { winner, source });

        Ok(Self {
            match_id: game.id,
            effects,
        })
    }

    #[must_use]
    pub fn winnings(&self) -> Coins {
        self.effects
            .iter()
            .find_map(|e| match e {
                Effect::CreditWinnings { amount, .. } => Some(*amount),
                _ => None,
            })
            .unwrap_or(Coins::ZERO)
    }

    #[must_use]
    pub fn platform_fee(&self) -> Coins {
        self.effects
            .iter()
            .find_map(|e| match e {
                Effect::RetainPlatformFee { amount } => Some(*amount),
                _ => None,
            })
            .unwrap_or(Coins::ZERO)
    }

    #[must_use]
    pub fn referral(&self) -> Option<(UserId, Coins)> {
        self.effects.iter().find_map(|e| match e {
            Effect::PayReferral { referrer, amount } => Some((*referrer, *amount)),
            _ => None,
        })
    }

    /// Apply every effect to `uow`, in order.
    ///
    /// # Errors
    /// Propagates the first failing step. The unit of work must then be
    /// discarded.
    pub fn apply(&self, uow: &mut UnitOfWork<'_>) -> Result<()> {
        let related = Some(self.match_id);
        for effect in &self.effects {
            match *effect {
                Effect::CreditWinnings { winner, amount } => {
                    uow.credit(Owner::Account(winner), EntryKind::Winnings, amount, related)?;
                    uow.notify(Notification::new(
                        winner,
                        NotificationEvent::WinningsCredited,
                        Some(amount),
                        self.match_id,
                    ));
                }
                Effect::RetainPlatformFee { amount } => {
                    uow.credit(Owner::Platform, EntryKind::PlatformFee, amount, related)?;
                }
                Effect::PayReferral { referrer, amount } => {
                    uow.debit(Owner::Platform, EntryKind::ReferralReward, amount, related)?;
                    uow.credit(
                        Owner::Account(referrer),
                        EntryKind::ReferralReward,
                        amount,
                        related,
                    )?;
                    uow.notify(Notification::new(
                        referrer,
                        NotificationEvent::ReferralRewardCredited,
                        Some(amount),
                        self.match_id,
                    ));
                }
                Effect::CompleteMatch { winner, source } => {
                    let mut game = uow.load_match(self.match_id)?;
                    record_final_results(&mut game, winner, source, uow.now())?;
                    game.winner = Some(winner);
                    game.transition(MatchStatus::Completed, uow.now())?;
                    uow.put_match(game)?;
                }
            }
        }
        Ok(())
    }
}

/// Make both result fields agree with the final outcome.
///
/// Player submissions that already match are kept as they are. Anything else
/// (a missing submission, a conflicting claim, or an admin verdict) is
/// replaced by an admin-sourced result.
fn record_final_results(
    game: &mut Match,
    winner: UserId,
    source: ResultSource,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<()> {
    let winner_slot = game
        .slot_of(winner)
        .ok_or(StakematchError::InvalidWinner {
            match_id: game.id,
            user: winner,
        })?;
    for slot in [PlayerSlot::One, PlayerSlot::Two] {
        let expected = if slot == winner_slot {
            GameResult::Win
        } else {
            GameResult::Loss
        };
        let keep = source == ResultSource::Player
            && game.result(slot).is_some_and(|s| s.result == expected);
        if !keep {
            let evidence = game.result(slot).and_then(|s| s.evidence.clone());
            game.set_result(
                slot,
                Submission {
                    result: expected,
                    evidence,
                    source: ResultSource::Admin,
                    submitted_at: now,
                },
            );
        }
    }
    Ok(())
}
