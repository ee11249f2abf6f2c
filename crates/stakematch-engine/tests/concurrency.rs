//! Races between real threads on one shared engine.
//!
//! Every racer waits on a [`Barrier`] so the conflicting operations start
//! together; the store's version checks must let exactly one of them through.

use std::sync::{Arc, Barrier};
use std::thread;

use stakematch_engine::{Engine, MemoryStore, OverrideVerdict, SubmissionOutcome};
use stakematch_types::*;

const ROUNDS: usize = 25;

fn engine() -> Arc<Engine> {
    let config = EngineConfig {
        max_commit_attempts: 16,
        ..EngineConfig::default()
    };
    Arc::new(Engine::new(Arc::new(MemoryStore::new()), config).unwrap())
}

fn player(engine: &Engine, admin: &Actor, deposit: i64) -> UserId {
    let user = UserId::new();
    engine.register_account(user, None).unwrap();
    engine.adjust_balance(admin, user, deposit, "deposit").unwrap();
    user
}

/// Run `f(i)` on `n` threads released together; collect results in order.
fn race<T, F>(n: usize, f: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(usize) -> T + Send + Sync + 'static,
{
    let barrier = Arc::new(Barrier::new(n));
    let f = Arc::new(f);
    let handles: Vec<_> = (0..n)
        .map(|i| {
            let barrier = Arc::clone(&barrier);
            let f = Arc::clone(&f);
            thread::spawn(move || {
                barrier.wait();
                f(i)
            })
        })
        .collect();
    handles
        .into_iter()
        .map(|h| h.join().expect("racer panicked"))
        .collect()
}

#[test]
fn concurrent_joins_admit_exactly_one() {
    let engine = engine();
    let admin = Actor::admin(UserId::new());
    for _ in 0..ROUNDS {
        let creator = player(&engine, &admin, 10);
        let joiners: Vec<UserId> = (0..4).map(|_| player(&engine, &admin, 10)).collect();
        let game = engine.create_match(creator, Coins(10), "R").unwrap().id;

        let racers = joiners.clone();
        let shared = Arc::clone(&engine);
        let results = race(racers.len(), move |i| shared.join_match(game, racers[i]));

        let winners: Vec<UserId> = results
            .iter()
            .zip(&joiners)
            .filter(|(r, _)| r.is_ok())
            .map(|(_, u)| *u)
            .collect();
        assert_eq!(winners.len(), 1, "exactly one join must succeed");
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert_eq!(err.kind(), ErrorKind::StateConflict, "{err}");
        }

        let joined = engine.get_match(game).unwrap();
        assert_eq!(joined.player2, Some(winners[0]));
        for joiner in &joiners {
            let expected = if *joiner == winners[0] { 0 } else { 10 };
            assert_eq!(engine.get_account(*joiner).unwrap().balance, Coins(expected));
        }
    }
    engine.verify_supply().unwrap();
    engine.verify_ledger().unwrap();
}

#[test]
fn concurrent_overrides_settle_once() {
    let engine = engine();
    let admin = Actor::admin(UserId::new());
    for _ in 0..ROUNDS {
        let p1 = player(&engine, &admin, 50);
        let p2 = player(&engine, &admin, 50);
        let game = engine.create_match(p1, Coins(50), "R").unwrap().id;
        engine.join_match(game, p2).unwrap();

        let shared = Arc::clone(&engine);
        let results = race(4, move |i| {
            let winner = if i % 2 == 0 { p1 } else { p2 };
            shared.override_match(&admin, game, OverrideVerdict::Winner(winner), "race")
        });

        let ok = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(ok, 1);
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(matches!(err, StakematchError::AlreadySettled(_)), "{err}");
        }
        let total = engine.get_account(p1).unwrap().balance.get()
            + engine.get_account(p2).unwrap().balance.get();
        assert_eq!(total, 90);
    }
    engine.verify_supply().unwrap();
}

#[test]
fn simultaneous_agreeing_submissions_settle_once() {
    let engine = engine();
    let admin = Actor::admin(UserId::new());
    for _ in 0..ROUNDS {
        let p1 = player(&engine, &admin, 20);
        let p2 = player(&engine, &admin, 20);
        let game = engine.create_match(p1, Coins(20), "R").unwrap().id;
        engine.join_match(game, p2).unwrap();

        let shared = Arc::clone(&engine);
        let results = race(2, move |i| {
            if i == 0 {
                shared.submit_result(game, p1, GameResult::Win, Some(EvidenceRef::new("s")))
            } else {
                shared.submit_result(game, p2, GameResult::Loss, None)
            }
        });

        let outcomes: Vec<SubmissionOutcome> = results
            .into_iter()
            .map(std::result::Result::unwrap)
            .collect();
        let settled = outcomes
            .iter()
            .filter(|o| matches!(o, SubmissionOutcome::Settled(_)))
            .count();
        assert_eq!(settled, 1);
        assert!(outcomes.contains(&SubmissionOutcome::Recorded));
        assert_eq!(engine.get_account(p1).unwrap().balance, Coins(36));
    }
    let payouts = engine
        .list_ledger_entries(&LedgerFilter {
            kind: Some(EntryKind::Winnings),
            ..LedgerFilter::default()
        })
        .unwrap();
    assert_eq!(payouts.len(), ROUNDS);
    engine.verify_supply().unwrap();
}

#[test]
fn draw_and_winner_overrides_race_cleanly() {
    let engine = engine();
    let admin = Actor::admin(UserId::new());
    for _ in 0..ROUNDS {
        let p1 = player(&engine, &admin, 30);
        let p2 = player(&engine, &admin, 30);
        let game = engine.create_match(p1, Coins(30), "R").unwrap().id;
        engine.join_match(game, p2).unwrap();

        let shared = Arc::clone(&engine);
        let verdicts = race(2, move |i| {
            if i == 0 {
                shared
                    .override_match(&admin, game, OverrideVerdict::Draw, "draw")
                    .map(|_| ())
            } else {
                shared
                    .override_match(&admin, game, OverrideVerdict::Winner(p1), "p1")
                    .map(|_| ())
            }
        });
        assert_eq!(verdicts.iter().filter(|r| r.is_ok()).count(), 1);

        let p1_balance = engine.get_account(p1).unwrap().balance;
        let p2_balance = engine.get_account(p2).unwrap().balance;
        let status = engine.get_match(game).unwrap().status;
        match status {
            MatchStatus::Cancelled => {
                assert_eq!((p1_balance, p2_balance), (Coins(30), Coins(30)));
            }
            MatchStatus::Completed => {
                assert_eq!((p1_balance, p2_balance), (Coins(54), Coins::ZERO));
            }
            other => panic!("unexpected status {other}"),
        }
    }
    engine.verify_supply().unwrap();
    engine.verify_ledger().unwrap();
}
