//! Offline ledger audit.
//!
//! Replays the full entry log against current balances:
//! - every account balance equals the signed sum of its entries
//! - the platform balance equals the signed sum of platform entries
//! - supply is conserved (see [`stakematch_ledger::SupplySnapshot`])
//!
//! Commits already enforce these per change set; this check catches drift in
//! a store that was written some other way.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use stakematch_ledger::Store;
use stakematch_types::{Coins, LedgerFilter, Owner, Result, StakematchError};

/// Summary of a clean audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerReport {
    pub accounts_checked: usize,
    pub entries_checked: usize,
    pub platform_balance: Coins,
    pub escrow_held: u128,
}

/// # Errors
/// - `LedgerInvariantViolation` naming the first owner whose entries and
///   balance disagree
/// - `SupplyInvariantViolation` if coins were created or destroyed
pub fn verify_ledger(store: &dyn Store) -> Result<LedgerReport> {
    let entries = store.ledger_entries(&LedgerFilter::default())?;
    let mut sums: HashMap<Owner, i128> = HashMap::new();
    for entry in &entries {
        *sums.entry(entry.owner).or_default() += entry.signed_effect();
    }

    let accounts = store.accounts()?;
    for account in &accounts {
        let posted = sums.remove(&Owner::Account(account.id)).unwrap_or_default();
        if posted != account.balance.signed() {
            return Err(mismatch(Owner::Account(account.id), account.balance, posted));
        }
    }

    let platform_balance = store.platform_balance()?;
    let posted = sums.remove(&Owner::Platform).unwrap_or_default();
    if posted != platform_balance.signed() {
        return Err(mismatch(Owner::Platform, platform_balance, posted));
    }

    if let Some((owner, posted)) = sums.into_iter().find(|(_, posted)| *posted != 0) {
        return Err(StakematchError::LedgerInvariantViolation {
            reason: format!("entries post {posted} to {owner}, which has no account"),
        });
    }

    let snapshot = store.supply_snapshot()?;
    snapshot.verify()?;

    Ok(LedgerReport {
        accounts_checked: accounts.len(),
        entries_checked: entries.len(),
        platform_balance,
        escrow_held: snapshot.escrow_held,
    })
}

fn mismatch(owner: Owner, balance: Coins, posted: i128) -> StakematchError {
    tracing::error!(%owner, balance = balance.get(), posted, "ledger does not explain balance");
    StakematchError::LedgerInvariantViolation {
        reason: format!("{owner} holds {balance} but its entries sum to {posted}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rand::Rng;
    use rust_decimal::Decimal;
    use stakematch_ledger::{MemoryStore, UnitOfWork};
    use stakematch_types::{Account, EntryKind, Match, MatchStatus, ResultSource, UserId};

    use crate::{RefundCause, refund, settle};

    #[test]
    fn empty_store_is_clean() {
        let report = verify_ledger(&MemoryStore::new()).unwrap();
        assert_eq!(report.entries_checked, 0);
        assert_eq!(report.platform_balance, Coins::ZERO);
    }

    #[test]
    fn random_settlements_and_refunds_stay_balanced() {
        let store = MemoryStore::new();
        let mut rng = rand::thread_rng();
        let now = Utc::now();
        let users: Vec<UserId> = (0..6).map(|_| UserId::new()).collect();

        let mut uow = UnitOfWork::begin(&store, now);
        for (i, user) in users.iter().enumerate() {
            let referrer = (i > 0).then(|| users[i - 1]);
            uow.insert_account(Account::new(*user, referrer, now)).unwrap();
            uow.credit(Owner::Account(*user), EntryKind::AdminAdjustment, Coins(10_000), None)
                .unwrap();
        }
        uow.commit().unwrap();

        for _ in 0..40 {
            let a = users[rng.gen_range(0..users.len())];
            let b = users[rng.gen_range(0..users.len())];
            if a == b {
                continue;
            }
            let fee = Coins(rng.gen_range(1..=200));
            let mut uow = UnitOfWork::begin(&store, now);
            let mut game = Match::open(a, fee, "R", Decimal::new(10, 2), now).unwrap();
            game.player2 = Some(b);
            game.status = MatchStatus::InProgress;
            let id = game.id;
            for p in [a, b] {
                uow.debit(Owner::Account(p), EntryKind::EscrowDebit, fee, Some(id))
                    .unwrap();
            }
            uow.insert_match(game);
            uow.commit().unwrap();

            let mut uow = UnitOfWork::begin(&store, now);
            if rng.gen_bool(0.7) {
                let winner = if rng.gen_bool(0.5) { a } else { b };
                settle(&mut uow, id, winner, ResultSource::Player, Decimal::new(1, 2)).unwrap();
            } else {
                refund(&mut uow, id, RefundCause::AdminDraw).unwrap();
            }
            uow.commit().unwrap();
        }

        let report = verify_ledger(&store).unwrap();
        assert_eq!(report.accounts_checked, users.len());
        assert_eq!(report.escrow_held, 0);
        let total: u128 = store
            .accounts()
            .unwrap()
            .iter()
            .map(|a| u128::from(a.balance.get()))
            .sum::<u128>()
            + u128::from(report.platform_balance.get());
        assert_eq!(total, 60_000);
    }
}
