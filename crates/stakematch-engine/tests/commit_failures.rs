//! Money-moving operations against a backend that fails the commit.
//!
//! A failed commit must leave balances, match state, cancel requests and the
//! ledger exactly as they were; the next attempt then pays out once.

use std::sync::Arc;

use stakematch_engine::{
    Engine, MemoryStore, OverrideOutcome, OverrideVerdict, RecordingSink, SubmissionOutcome,
};
use stakematch_ledger::fault::{Fault, FaultyStore};
use stakematch_types::*;

struct Harness {
    engine: Engine,
    store: Arc<FaultyStore<MemoryStore>>,
    sink: Arc<RecordingSink>,
    admin: Actor,
}

/// Everything a half-applied commit could disturb.
#[derive(Debug, PartialEq)]
struct Books {
    balances: Vec<Coins>,
    platform: Coins,
    game: Match,
    entries: usize,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(FaultyStore::new(MemoryStore::new()));
        let sink = Arc::new(RecordingSink::new());
        let engine = Engine::new(store.clone(), EngineConfig::default())
            .unwrap()
            .with_notifier(sink.clone());
        Self {
            engine,
            store,
            sink,
            admin: Actor::admin(UserId::new()),
        }
    }

    fn player(&self, deposit: i64) -> UserId {
        let user = UserId::new();
        self.engine.register_account(user, None).unwrap();
        self.engine
            .adjust_balance(&self.admin, user, deposit, "deposit")
            .unwrap();
        user
    }

    fn started(&self, fee: u64) -> (UserId, UserId, MatchId) {
        let p1 = self.player(i64::try_from(fee).unwrap());
        let p2 = self.player(i64::try_from(fee).unwrap());
        let game = self.engine.create_match(p1, Coins(fee), "ROOM").unwrap().id;
        self.engine.join_match(game, p2).unwrap();
        (p1, p2, game)
    }

    fn books(&self, players: &[UserId], game: MatchId) -> Books {
        Books {
            balances: players
                .iter()
                .map(|p| self.engine.get_account(*p).unwrap().balance)
                .collect(),
            platform: self.engine.store().platform_balance().unwrap(),
            game: self.engine.get_match(game).unwrap(),
            entries: self.entries(None).len(),
        }
    }

    fn entries(&self, kind: Option<EntryKind>) -> Vec<LedgerEntry> {
        self.engine
            .list_ledger_entries(&LedgerFilter {
                kind,
                ..LedgerFilter::default()
            })
            .unwrap()
    }

    fn fail_next_commit(&self) {
        self.store.fail_next(1, Fault::Storage);
    }
}

#[test]
fn failed_settlement_leaves_no_partial_state() {
    let h = Harness::new();
    let (p1, p2, game) = h.started(50);
    h.engine
        .submit_result(game, p1, GameResult::Win, None)
        .unwrap();
    let before = h.books(&[p1, p2], game);
    let delivered = h.sink.delivered().len();

    h.fail_next_commit();
    let err = h
        .engine
        .submit_result(game, p2, GameResult::Loss, None)
        .unwrap_err();
    assert!(matches!(err, StakematchError::Storage(_)), "{err}");
    assert_eq!(h.books(&[p1, p2], game), before);
    assert_eq!(before.game.status, MatchStatus::InProgress);
    assert_eq!(h.sink.delivered().len(), delivered);

    let outcome = h
        .engine
        .submit_result(game, p2, GameResult::Loss, None)
        .unwrap();
    assert!(matches!(outcome, SubmissionOutcome::Settled(_)));
    assert_eq!(h.entries(Some(EntryKind::Winnings)).len(), 1);
    assert_eq!(h.entries(Some(EntryKind::PlatformFee)).len(), 1);
    assert_eq!(h.engine.get_account(p1).unwrap().balance, Coins(90));
    h.engine.verify_supply().unwrap();
    h.engine.verify_ledger().unwrap();
}

#[test]
fn failed_cancel_approval_keeps_request_pending_and_stakes_escrowed() {
    let h = Harness::new();
    let (p1, p2, game) = h.started(80);
    let request = h
        .engine
        .request_cancellation(game, p2, CancelReason::OpponentNoShow, None, None)
        .unwrap();
    let before = h.books(&[p1, p2], game);
    assert_eq!(before.game.pending_cancel, Some(request.id));

    h.fail_next_commit();
    let err = h
        .engine
        .resolve_cancel_request(&h.admin, request.id, CancelDecision::Approve, None)
        .unwrap_err();
    assert!(matches!(err, StakematchError::Storage(_)), "{err}");
    assert_eq!(h.books(&[p1, p2], game), before);
    let stored = h.engine.get_cancel_request(request.id).unwrap();
    assert_eq!(stored.status, CancelRequestStatus::Pending);
    assert_eq!(stored.reviewed_by, None);

    let resolution = h
        .engine
        .resolve_cancel_request(&h.admin, request.id, CancelDecision::Approve, None)
        .unwrap();
    assert_eq!(resolution.refund.unwrap().total(), Coins(160));
    assert_eq!(h.entries(Some(EntryKind::Refund)).len(), 2);
    assert_eq!(
        h.engine.get_cancel_request(request.id).unwrap().status,
        CancelRequestStatus::Approved
    );
    assert_eq!(h.engine.get_match(game).unwrap().status, MatchStatus::Cancelled);
    h.engine.verify_supply().unwrap();
    h.engine.verify_ledger().unwrap();
}

#[test]
fn failed_override_moves_no_money() {
    let h = Harness::new();
    let (p1, p2, game) = h.started(200);
    let before = h.books(&[p1, p2], game);
    let audited = h.engine.list_admin_actions().unwrap().len();

    h.fail_next_commit();
    let err = h
        .engine
        .override_match(&h.admin, game, OverrideVerdict::Winner(p2), "ruling")
        .unwrap_err();
    assert!(matches!(err, StakematchError::Storage(_)), "{err}");
    assert_eq!(h.books(&[p1, p2], game), before);
    assert_eq!(h.engine.list_admin_actions().unwrap().len(), audited);

    let outcome = h
        .engine
        .override_match(&h.admin, game, OverrideVerdict::Winner(p2), "ruling")
        .unwrap();
    let OverrideOutcome::Settled(settled) = outcome else {
        panic!("winner verdict must settle");
    };
    assert_eq!(settled.winnings, Coins(360));
    assert_eq!(h.entries(Some(EntryKind::Winnings)).len(), 1);
    assert_eq!(h.engine.list_admin_actions().unwrap().len(), audited + 1);
    h.engine.verify_supply().unwrap();
    h.engine.verify_ledger().unwrap();
    h.engine.verify_audit_chain().unwrap();
}
