//! Admin operations: match override, dispute review and manual balance
//! adjustment.
//!
//! Every operation here requires an admin [`Actor`] and leaves a sealed
//! [`AdminAction`](stakematch_types::AdminAction) in the audit chain once the
//! primary write has committed.

use serde::{Deserialize, Serialize};
use serde_json::json;
use stakematch_settlement::{RefundCause, RefundOutcome, SettlementOutcome, refund, settle};
use stakematch_types::{
    Account, Actor, AdminActionDraft, AdminActionKind, Coins, Direction, DisputeAction,
    DisputeEntry, DisputeId, EntryKind, MatchId, MatchStatus, Notification, NotificationEvent,
    Owner, Result, ResultSource, Sanction, StakematchError, TargetType, UserId,
};

use crate::engine::Engine;

/// What an admin decided a match's outcome is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "winner", rename_all = "snake_case")]
pub enum OverrideVerdict {
    Winner(UserId),
    /// Both stakes go back; nobody wins.
    Draw,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OverrideOutcome {
    Settled(SettlementOutcome),
    Refunded(RefundOutcome),
}

impl Engine {
    /// Decide a match by fiat, typically one parked in `CONFLICT`.
    ///
    /// The submitted results and their evidence stay on the match; the admin
    /// verdict is recorded alongside them.
    ///
    /// # Errors
    /// - `Forbidden` unless `actor` is an admin
    /// - `InvalidInput` for a blank reason
    /// - `AlreadySettled` / `MatchAlreadyTerminal` for finished matches
    /// - `InvalidWinner` if the named winner is not a player
    pub fn override_match(
        &self,
        actor: &Actor,
        match_id: MatchId,
        verdict: OverrideVerdict,
        reason: impl Into<String>,
    ) -> Result<OverrideOutcome> {
        let admin = actor.require_admin("overriding a match")?;
        let reason = reason.into().trim().to_string();
        if reason.is_empty() {
            return Err(StakematchError::InvalidInput {
                reason: "override reason is required".into(),
            });
        }

        let outcome = self.transact("override_match", |uow| {
            let game = uow.load_match(match_id)?;
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

            let outcome = match verdict {
                OverrideVerdict::Winner(winner) => OverrideOutcome::Settled(settle(
                    uow,
                    match_id,
                    winner,
                    ResultSource::Admin,
                    self.config.referral_reward_rate,
                )?),
                OverrideVerdict::Draw => {
                    OverrideOutcome::Refunded(refund(uow, match_id, RefundCause::AdminDraw)?)
                }
            };

            let mut game = uow.load_match(match_id)?;
            game.override_reason = Some(reason.clone());
            game.overridden_by = Some(admin);
            uow.put_match(game.clone())?;
            for player in game.players() {
                uow.notify(Notification::new(
                    player,
                    NotificationEvent::MatchOverridden,
                    None,
                    match_id,
                ));
            }
            Ok(outcome)
        })?;

        let (action, details) = match &outcome {
            OverrideOutcome::Settled(settled) => {
                tracing::info!(
                    %match_id,
                    admin = %admin,
                    winner = %settled.winner,
                    amount = settled.winnings.get(),
                    "match overridden with winner"
                );
                (
                    AdminActionKind::OverrideWinner,
                    json!({ "reason": reason, "settlement": settled }),
                )
            }
            OverrideOutcome::Refunded(refunded) => {
                tracing::info!(
                    %match_id,
                    admin = %admin,
                    refunded = refunded.total().get(),
                    "match overridden as draw"
                );
                (
                    AdminActionKind::OverrideDraw,
                    json!({ "reason": reason, "refund": refunded }),
                )
            }
        };
        self.audit(admin, action, TargetType::Match, match_id.to_string(), &details);
        Ok(outcome)
    }

    /// Move a dispute entry along its review workflow. Sanctions flag or ban
    /// the disputed account; no action here touches match funds.
    ///
    /// # Errors
    /// - `Forbidden` unless `actor` is an admin
    /// - `DisputeNotFound` for an unknown ID
    /// - `InvalidDisputeTransition` once the dispute is closed
    pub fn resolve_dispute(
        &self,
        actor: &Actor,
        dispute_id: DisputeId,
        action: DisputeAction,
        notes: Option<String>,
    ) -> Result<DisputeEntry> {
        let admin = actor.require_admin("resolving a dispute")?;
        let notes = notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());

        let dispute = self.transact("resolve_dispute", |uow| {
            let mut dispute = uow.load_dispute(dispute_id)?;
            let next = dispute.status.apply(&action).ok_or_else(|| {
                StakematchError::InvalidDisputeTransition {
                    dispute_id,
                    from: dispute.status,
                    action: action.to_string(),
                }
            })?;

            if let DisputeAction::TakeAction(sanction) = action {
                let mut account = uow.account(dispute.user_id)?;
                account.flagged = true;
                if sanction == Sanction::Ban {
                    account.banned = true;
                }
                uow.put_account(account)?;
                dispute.action_taken = Some(action.to_string());
            }

            dispute.status = next;
            if let Some(note) = &notes {
                dispute.notes.push(note.clone());
            }
            dispute.reviewed_by = Some(admin);
            dispute.updated_at = uow.now();
            uow.put_dispute(dispute.clone())?;
            Ok(dispute)
        })?;

        tracing::info!(
            %dispute_id,
            admin = %admin,
            user = %dispute.user_id,
            %action,
            status = %dispute.status,
            "dispute reviewed"
        );
        self.audit(
            admin,
            AdminActionKind::ResolveDispute,
            TargetType::Dispute,
            dispute_id.to_string(),
            &json!({
                "action": action,
                "status": dispute.status,
                "user_id": dispute.user_id,
                "notes": notes,
            }),
        );
        Ok(dispute)
    }

    /// Credit (`delta > 0`) or debit (`delta < 0`) a user's balance outside any
    /// match: deposits, withdrawals and corrections all come through here.
    ///
    /// # Errors
    /// - `Forbidden` unless `actor` is an admin
    /// - `InvalidInput` for a zero delta or blank reason
    /// - `InsufficientBalance` if a debit exceeds the balance
    pub fn adjust_balance(
        &self,
        actor: &Actor,
        user: UserId,
        delta: i64,
        reason: impl Into<String>,
    ) -> Result<Account> {
        let admin = actor.require_admin("adjusting a balance")?;
        let reason = reason.into().trim().to_string();
        if delta == 0 {
            return Err(StakematchError::InvalidInput {
                reason: "adjustment must be non-zero".into(),
            });
        }
        if reason.is_empty() {
            return Err(StakematchError::InvalidInput {
                reason: "adjustment reason is required".into(),
            });
        }
        let amount = Coins(delta.unsigned_abs());
        let direction = if delta > 0 {
            Direction::Credit
        } else {
            Direction::Debit
        };

        let account = self.transact("adjust_balance", |uow| {
            uow.post(
                Owner::Account(user),
                EntryKind::AdminAdjustment,
                direction,
                amount,
                None,
                Some(reason.clone()),
            )?;
            uow.notify(Notification::new(
                user,
                NotificationEvent::BalanceAdjusted,
                Some(amount),
                &reason,
            ));
            uow.account(user)
        })?;

        tracing::info!(
            user = %user,
            admin = %admin,
            delta,
            balance = account.balance.get(),
            "balance adjusted"
        );
        self.audit(
            admin,
            AdminActionKind::AdjustBalance,
            TargetType::Account,
            user.to_string(),
            &json!({ "delta": delta, "reason": reason, "balance": account.balance }),
        );
        Ok(account)
    }

    fn audit(
        &self,
        admin: UserId,
        action: AdminActionKind,
        target_type: TargetType,
        target_id: String,
        details: &serde_json::Value,
    ) {
        self.best_effort("audit_admin_action", |uow| {
            uow.record_admin_action(AdminActionDraft {
                admin_id: admin,
                action,
                target_type,
                target_id: target_id.clone(),
                details: details.clone(),
                timestamp: uow.now(),
            });
            Ok(())
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use stakematch_ledger::MemoryStore;
    use stakematch_types::{
        DisputeFilter, DisputeStatus, EngineConfig, EvidenceRef, GameResult, LedgerFilter,
    };

    use super::*;

    struct Setup {
        engine: Engine,
        admin: Actor,
        game: MatchId,
        p1: UserId,
        p2: UserId,
    }

    fn conflicted() -> Setup {
        let engine = Engine::new(Arc::new(MemoryStore::new()), EngineConfig::default()).unwrap();
        let admin = Actor::admin(UserId::new());
        let p1 = UserId::new();
        let p2 = UserId::new();
        for p in [p1, p2] {
            engine.register_account(p, None).unwrap();
            engine.adjust_balance(&admin, p, 100, "deposit").unwrap();
        }
        let game = engine.create_match(p1, Coins(100), "R").unwrap().id;
        engine.join_match(game, p2).unwrap();
        for p in [p1, p2] {
            engine
                .submit_result(game, p, GameResult::Win, Some(EvidenceRef::new("shot")))
                .unwrap();
        }
        Setup {
            engine,
            admin,
            game,
            p1,
            p2,
        }
    }

    #[test]
    fn override_winner_pays_and_keeps_evidence() {
        let s = conflicted();
        let outcome = s
            .engine
            .override_match(&s.admin, s.game, OverrideVerdict::Winner(s.p2), "video review")
            .unwrap();
        let OverrideOutcome::Settled(settled) = outcome else {
            panic!("expected settlement");
        };
        assert_eq!(settled.winnings, Coins(180));
        assert_eq!(settled.source, ResultSource::Admin);
        assert_eq!(s.engine.get_account(s.p2).unwrap().balance, Coins(180));
        assert_eq!(s.engine.get_account(s.p1).unwrap().balance, Coins::ZERO);

        let game = s.engine.get_match(s.game).unwrap();
        assert_eq!(game.status, MatchStatus::Completed);
        assert_eq!(game.winner, Some(s.p2));
        assert_eq!(game.override_reason.as_deref(), Some("video review"));
        assert_eq!(game.overridden_by, Some(s.admin.user_id));
        assert!(game.player1_result.unwrap().evidence.is_some());

        let actions = s.engine.list_admin_actions().unwrap();
        assert_eq!(actions.last().unwrap().action, AdminActionKind::OverrideWinner);
        assert_eq!(s.engine.verify_audit_chain().unwrap(), actions.len());
        assert_eq!(s.engine.list_disputes(&DisputeFilter::default()).unwrap().len(), 2);
    }

    #[test]
    fn override_draw_refunds_both() {
        let s = conflicted();
        let outcome = s
            .engine
            .override_match(&s.admin, s.game, OverrideVerdict::Draw, "no proof either way")
            .unwrap();
        assert!(matches!(outcome, OverrideOutcome::Refunded(_)));
        for p in [s.p1, s.p2] {
            assert_eq!(s.engine.get_account(p).unwrap().balance, Coins(100));
        }
        assert_eq!(s.engine.get_match(s.game).unwrap().status, MatchStatus::Cancelled);
        s.engine.verify_supply().unwrap();
    }

    #[test]
    fn override_is_exactly_once() {
        let s = conflicted();
        s.engine
            .override_match(&s.admin, s.game, OverrideVerdict::Winner(s.p1), "r")
            .unwrap();
        let err = s
            .engine
            .override_match(&s.admin, s.game, OverrideVerdict::Winner(s.p2), "r")
            .unwrap_err();
        assert!(matches!(err, StakematchError::AlreadySettled(_)));
        let payouts = s
            .engine
            .list_ledger_entries(&LedgerFilter {
                kind: Some(EntryKind::Winnings),
                ..LedgerFilter::default()
            })
            .unwrap();
        assert_eq!(payouts.len(), 1);
    }

    #[test]
    fn override_rejects_bad_input() {
        let s = conflicted();
        assert!(matches!(
            s.engine
                .override_match(&Actor::user(s.p1), s.game, OverrideVerdict::Winner(s.p1), "mine")
                .unwrap_err(),
            StakematchError::Forbidden { .. }
        ));
        assert!(matches!(
            s.engine
                .override_match(&s.admin, s.game, OverrideVerdict::Draw, "  ")
                .unwrap_err(),
            StakematchError::InvalidInput { .. }
        ));
        assert!(matches!(
            s.engine
                .override_match(&s.admin, s.game, OverrideVerdict::Winner(UserId::new()), "r")
                .unwrap_err(),
            StakematchError::InvalidWinner { .. }
        ));
        assert_eq!(s.engine.get_match(s.game).unwrap().status, MatchStatus::Conflict);
    }

    #[test]
    fn dispute_ban_suspends_account() {
        let s = conflicted();
        let dispute = s
            .engine
            .list_disputes(&DisputeFilter {
                user_id: Some(s.p1),
                ..DisputeFilter::default()
            })
            .unwrap()
            .remove(0);
        let reviewed = s
            .engine
            .resolve_dispute(
                &s.admin,
                dispute.id,
                DisputeAction::TakeAction(Sanction::Ban),
                Some("fake screenshot".into()),
            )
            .unwrap();
        assert_eq!(reviewed.status, DisputeStatus::Resolved);
        assert_eq!(reviewed.notes, vec!["fake screenshot".to_string()]);
        let account = s.engine.get_account(s.p1).unwrap();
        assert!(account.banned && account.flagged);

        let err = s
            .engine
            .resolve_dispute(&s.admin, dispute.id, DisputeAction::Dismiss, None)
            .unwrap_err();
        assert!(matches!(err, StakematchError::InvalidDisputeTransition { .. }));
    }

    #[test]
    fn dispute_investigate_then_dismiss() {
        let s = conflicted();
        let dispute = s
            .engine
            .list_disputes(&DisputeFilter {
                user_id: Some(s.p2),
                ..DisputeFilter::default()
            })
            .unwrap()
            .remove(0);
        let step = s
            .engine
            .resolve_dispute(&s.admin, dispute.id, DisputeAction::Investigate, None)
            .unwrap();
        assert_eq!(step.status, DisputeStatus::Investigating);
        let done = s
            .engine
            .resolve_dispute(&s.admin, dispute.id, DisputeAction::Dismiss, None)
            .unwrap();
        assert_eq!(done.status, DisputeStatus::Dismissed);
        assert!(!s.engine.get_account(s.p2).unwrap().flagged);
    }

    #[test]
    fn adjust_balance_rules() {
        let s = conflicted();
        assert!(matches!(
            s.engine.adjust_balance(&s.admin, s.p1, 0, "noop").unwrap_err(),
            StakematchError::InvalidInput { .. }
        ));
        assert!(matches!(
            s.engine.adjust_balance(&s.admin, s.p1, -1, "withdraw").unwrap_err(),
            StakematchError::InsufficientBalance { .. }
        ));
        let account = s.engine.adjust_balance(&s.admin, s.p1, 25, "promo").unwrap();
        assert_eq!(account.balance, Coins(25));
        let account = s.engine.adjust_balance(&s.admin, s.p1, -10, "withdraw").unwrap();
        assert_eq!(account.balance, Coins(15));
        let entries = s
            .engine
            .list_ledger_entries(&LedgerFilter::for_owner(Owner::Account(s.p1)))
            .unwrap();
        assert_eq!(entries.last().unwrap().memo.as_deref(), Some("withdraw"));
        s.engine.verify_supply().unwrap();
        s.engine.verify_ledger().unwrap();
    }
}
