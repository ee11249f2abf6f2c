//! Result adjudication.
//!
//! Each player reports `win` or `loss` once. The second report decides the
//! match: one win and one loss settle it, anything else parks it in
//! `CONFLICT` for an admin. Both reports write the same match record, so two
//! near-simultaneous submissions serialise on its version and the "both
//! submitted" branch runs exactly once.

use serde::{Deserialize, Serialize};
use serde_json::json;
use stakematch_settlement::{SettlementOutcome, settle};
use stakematch_types::{
    DisputeEntry, DisputeType, EvidenceRef, GameResult, Match, MatchId, MatchStatus,
    Notification, NotificationEvent, PlayerSlot, Result, ResultSource, Severity,
    StakematchError, Submission, UserId, risk_score,
};

use crate::engine::Engine;

/// What a result submission led to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    /// Stored; the opponent has not reported yet.
    Recorded,
    /// Both reports agreed and the winner was paid.
    Settled(SettlementOutcome),
    /// The reports disagree; the match awaits an admin.
    Conflict,
}

impl Engine {
    /// Record `player`'s claimed result for `match_id`.
    ///
    /// # Errors
    /// - `EvidenceRequired` for a `win` claim without evidence
    /// - `NotParticipant` if `player` is not seated in the match
    /// - `MatchNotActive` unless the match is `IN-PROGRESS`
    /// - `DuplicateSubmission` if `player` already reported
    pub fn submit_result(
        &self,
        match_id: MatchId,
        player: UserId,
        result: GameResult,
        evidence: Option<EvidenceRef>,
    ) -> Result<SubmissionOutcome> {
        let evidence = evidence.filter(|e| !e.is_blank());
        if result == GameResult::Win && evidence.is_none() {
            return Err(StakematchError::EvidenceRequired);
        }

        let (outcome, game) = self.transact("submit_result", |uow| {
            let mut game = uow.load_match(match_id)?;
            let slot = game.slot_of(player).ok_or(StakematchError::NotParticipant {
                match_id,
                user: player,
            })?;
            if game.status != MatchStatus::InProgress {
                return Err(StakematchError::MatchNotActive(match_id));
            }
            if game.result(slot).is_some() {
                return Err(StakematchError::DuplicateSubmission {
                    match_id,
                    user: player,
                });
            }

            game.set_result(slot, Submission::player(result, evidence.clone(), uow.now()));
            let Some(other) = game.result(slot.other()).map(|s| s.result) else {
                uow.put_match(game.clone())?;
                return Ok((SubmissionOutcome::Recorded, game));
            };

            if other == result.opposite() {
                let winner_slot = if result == GameResult::Win { slot } else { slot.other() };
                let winner = game
                    .player(winner_slot)
                    .ok_or(StakematchError::MatchNotActive(match_id))?;
                uow.put_match(game.clone())?;
                let settled = settle(
                    uow,
                    match_id,
                    winner,
                    ResultSource::Player,
                    self.config.referral_reward_rate,
                )?;
                let game = uow.load_match(match_id)?;
                Ok((SubmissionOutcome::Settled(settled), game))
            } else {
                game.transition(MatchStatus::Conflict, uow.now())?;
                for p in game.players() {
                    uow.notify(Notification::new(p, NotificationEvent::MatchConflict, None, match_id));
                }
                uow.put_match(game.clone())?;
                Ok((SubmissionOutcome::Conflict, game))
            }
        })?;

        match &outcome {
            SubmissionOutcome::Recorded => {
                tracing::info!(%match_id, user = %player, %result, "result recorded");
            }
            SubmissionOutcome::Settled(settled) => {
                tracing::info!(
                    %match_id,
                    winner = %settled.winner,
                    amount = settled.winnings.get(),
                    platform_fee = settled.platform_fee.get(),
                    referral = settled.referral.map(|(_, a)| a.get()),
                    "match settled by agreement"
                );
            }
            SubmissionOutcome::Conflict => {
                tracing::warn!(%match_id, claimed = %result, "conflicting results; awaiting admin");
                self.record_conflict_disputes(&game);
            }
        }
        Ok(outcome)
    }

    /// One dispute entry per player, capturing both claims.
    fn record_conflict_disputes(&self, game: &Match) {
        let (Some(one), Some(two)) = (
            game.result(PlayerSlot::One).cloned(),
            game.result(PlayerSlot::Two).cloned(),
        ) else {
            return;
        };
        let severity = if one.result == GameResult::Win {
            Severity::High
        } else {
            Severity::Medium
        };
        self.best_effort("record_conflict_disputes", |uow| {
            for slot in [PlayerSlot::One, PlayerSlot::Two] {
                let Some(user) = game.player(slot) else {
                    continue;
                };
                let (mine, theirs) = match slot {
                    PlayerSlot::One => (&one, &two),
                    PlayerSlot::Two => (&two, &one),
                };
                let prior = uow.store().dispute_count_for(user)?;
                uow.insert_dispute(DisputeEntry::open(
                    user,
                    DisputeType::Conflict,
                    Some(game.id),
                    severity,
                    risk_score(severity, prior),
                    json!({
                        "claimed": mine.result,
                        "opponent_claimed": theirs.result,
                        "evidence": mine.evidence,
                        "opponent_evidence": theirs.evidence,
                    }),
                    uow.now(),
                ));
            }
            Ok(())
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use stakematch_ledger::MemoryStore;
    use stakematch_types::{Actor, Coins, DisputeFilter, EngineConfig};

    use super::*;

    struct Setup {
        engine: Engine,
        game: MatchId,
        p1: UserId,
        p2: UserId,
    }

    fn in_progress(entry_fee: u64) -> Setup {
        let engine = Engine::new(Arc::new(MemoryStore::new()), EngineConfig::default()).unwrap();
        let admin = Actor::admin(UserId::new());
        let p1 = UserId::new();
        let p2 = UserId::new();
        for p in [p1, p2] {
            engine.register_account(p, None).unwrap();
            engine
                .adjust_balance(&admin, p, i64::try_from(entry_fee).unwrap(), "deposit")
                .unwrap();
        }
        let game = engine.create_match(p1, Coins(entry_fee), "R").unwrap().id;
        engine.join_match(game, p2).unwrap();
        Setup {
            engine,
            game,
            p1,
            p2,
        }
    }

    fn shot() -> Option<EvidenceRef> {
        Some(EvidenceRef::new("evidence://sha256/abc"))
    }

    #[test]
    fn win_requires_evidence() {
        let s = in_progress(50);
        let err = s
            .engine
            .submit_result(s.game, s.p1, GameResult::Win, Some(EvidenceRef::new("  ")))
            .unwrap_err();
        assert!(matches!(err, StakematchError::EvidenceRequired));
        let outcome = s
            .engine
            .submit_result(s.game, s.p2, GameResult::Loss, None)
            .unwrap();
        assert_eq!(outcome, SubmissionOutcome::Recorded);
    }

    #[test]
    fn agreement_settles() {
        let s = in_progress(50);
        s.engine
            .submit_result(s.game, s.p1, GameResult::Win, shot())
            .unwrap();
        let outcome = s
            .engine
            .submit_result(s.game, s.p2, GameResult::Loss, None)
            .unwrap();
        let SubmissionOutcome::Settled(settled) = outcome else {
            panic!("expected settlement");
        };
        assert_eq!(settled.winner, s.p1);
        assert_eq!(s.engine.get_account(s.p1).unwrap().balance, Coins(90));
        let game = s.engine.get_match(s.game).unwrap();
        assert_eq!(game.status, MatchStatus::Completed);
        assert_eq!(game.player2_result.unwrap().source, ResultSource::Player);
    }

    #[test]
    fn loss_loss_is_conflict_with_medium_disputes() {
        let s = in_progress(50);
        s.engine
            .submit_result(s.game, s.p1, GameResult::Loss, None)
            .unwrap();
        let outcome = s
            .engine
            .submit_result(s.game, s.p2, GameResult::Loss, None)
            .unwrap();
        assert_eq!(outcome, SubmissionOutcome::Conflict);
        assert_eq!(s.engine.get_match(s.game).unwrap().status, MatchStatus::Conflict);
        let disputes = s.engine.list_disputes(&DisputeFilter::default()).unwrap();
        assert_eq!(disputes.len(), 2);
        assert!(disputes.iter().all(|d| d.severity == Severity::Medium));
        assert_eq!(s.engine.get_account(s.p1).unwrap().balance, Coins::ZERO);
    }

    #[test]
    fn duplicate_and_outsider_submissions_rejected() {
        let s = in_progress(10);
        s.engine
            .submit_result(s.game, s.p1, GameResult::Loss, None)
            .unwrap();
        assert!(matches!(
            s.engine
                .submit_result(s.game, s.p1, GameResult::Loss, None)
                .unwrap_err(),
            StakematchError::DuplicateSubmission { .. }
        ));
        assert!(matches!(
            s.engine
                .submit_result(s.game, UserId::new(), GameResult::Loss, None)
                .unwrap_err(),
            StakematchError::NotParticipant { .. }
        ));
    }

    #[test]
    fn waiting_match_not_active() {
        let s = in_progress(10);
        let admin = Actor::admin(UserId::new());
        s.engine.adjust_balance(&admin, s.p1, 10, "deposit").unwrap();
        let open = s.engine.create_match(s.p1, Coins(10), "R2").unwrap();
        assert!(matches!(
            s.engine
                .submit_result(open.id, s.p1, GameResult::Loss, None)
                .unwrap_err(),
            StakematchError::MatchNotActive(_)
        ));
    }
}
