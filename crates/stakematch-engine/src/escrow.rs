//! Escrow service: accounts, match creation, joining, and withdrawal of an
//! open challenge.
//!
//! Each operation debits or credits the stake and writes the match record in
//! the same unit of work. Two joins racing for one match both stage the
//! `WAITING → IN-PROGRESS` write against the same match version; only one
//! commits, and the retry of the other sees an `IN-PROGRESS` match and fails
//! with `MatchNotJoinable`.

use stakematch_ledger::UnitOfWork;
use stakematch_settlement::{RefundCause, RefundOutcome, refund};
use stakematch_types::{
    Account, Coins, EntryKind, Match, MatchId, MatchStatus, Notification, NotificationEvent,
    Owner, Result, StakematchError, UserId,
};

use crate::engine::Engine;

impl Engine {
    /// Open a zero-balance account.
    ///
    /// # Errors
    /// - `SelfReferral` if `referred_by == user_id`
    /// - `AccountNotFound` if the referrer does not exist
    /// - `AccountExists` if `user_id` is already registered
    pub fn register_account(&self, user_id: UserId, referred_by: Option<UserId>) -> Result<Account> {
        if referred_by == Some(user_id) {
            return Err(StakematchError::SelfReferral);
        }
        let account = self.transact("register_account", |uow| {
            if let Some(referrer) = referred_by {
                uow.account(referrer)?;
            }
            let account = Account::new(user_id, referred_by, uow.now());
            uow.insert_account(account.clone())?;
            Ok(account)
        })?;
        tracing::info!(user = %user_id, referred_by = ?referred_by, "account registered");
        Ok(account)
    }

    /// Escrow `entry_fee` from `player` into a new `WAITING` match.
    ///
    /// # Errors
    /// - `InvalidEntryFee` / `EntryFeeTooLarge` outside the configured bounds
    /// - `InvalidRoomCode` for an empty, overlong, or control-character code
    /// - `AccountSuspended` for a banned player
    /// - `InsufficientBalance` if the player cannot cover the stake
    pub fn create_match(&self, player: UserId, entry_fee: Coins, room_code: &str) -> Result<Match> {
        self.validate_entry_fee(entry_fee)?;
        let room_code = self.validate_room_code(room_code)?;

        let game = self.transact("create_match", |uow| {
            uow.account(player)?.ensure_can_stake()?;
            let game = Match::open(
                player,
                entry_fee,
                room_code.clone(),
                self.config.platform_fee_rate,
                uow.now(),
            )?;
            uow.debit(
                Owner::Account(player),
                EntryKind::EscrowDebit,
                entry_fee,
                Some(game.id),
            )?;
            uow.insert_match(game.clone());
            Ok(game)
        })?;

        tracing::info!(
            match_id = %game.id,
            user = %player,
            amount = entry_fee.get(),
            pot = game.pot.get(),
            platform_cut = game.platform_cut.get(),
            "match created"
        );
        Ok(game)
    }

    /// Escrow the opponent's stake and start the match.
    ///
    /// # Errors
    /// - `MatchNotJoinable` unless the match is `WAITING` with an empty seat
    /// - `SelfJoin` if `player` created the match
    /// - `AccountSuspended` / `InsufficientBalance` as for creation
    pub fn join_match(&self, match_id: MatchId, player: UserId) -> Result<Match> {
        let game = self.transact("join_match", |uow| join(uow, match_id, player))?;
        tracing::info!(
            %match_id,
            user = %player,
            amount = game.entry_fee.get(),
            "match joined"
        );
        Ok(game)
    }

    /// Withdraw an open challenge nobody has joined; the creator's stake is
    /// released through the refund primitive.
    ///
    /// # Errors
    /// - `NotParticipant` unless `player` created the match
    /// - `MatchNotWithdrawable` once an opponent has joined
    /// - `AlreadySettled` / `MatchAlreadyTerminal` for finished matches
    pub fn withdraw_open_match(&self, match_id: MatchId, player: UserId) -> Result<RefundOutcome> {
        let outcome = self.transact("withdraw_open_match", |uow| {
            let game = uow.load_match(match_id)?;
            if game.player1 != player {
                return Err(StakematchError::NotParticipant {
                    match_id,
                    user: player,
                });
            }
            if !game.status.is_terminal()
                && (game.status != MatchStatus::Waiting || game.player2.is_some())
            {
                return Err(StakematchError::MatchNotWithdrawable(match_id));
            }
            refund(uow, match_id, RefundCause::CreatorWithdrew)
        })?;
        tracing::info!(%match_id, user = %player, amount = outcome.total().get(), "open match withdrawn");
        Ok(outcome)
    }

    fn validate_entry_fee(&self, entry_fee: Coins) -> Result<()> {
        let min = self.config.min_entry_fee.max(Coins(1));
        if entry_fee < min {
            return Err(StakematchError::InvalidEntryFee { fee: entry_fee, min });
        }
        if let Some(max) = self.config.max_entry_fee {
            if entry_fee > max {
                return Err(StakematchError::EntryFeeTooLarge { fee: entry_fee, max });
            }
        }
        Ok(())
    }

    fn validate_room_code(&self, room_code: &str) -> Result<String> {
        let code = room_code.trim();
        if code.is_empty() {
            return Err(StakematchError::InvalidRoomCode {
                reason: "room code is empty".into(),
            });
        }
        if code.chars().count() > self.config.max_room_code_len {
            return Err(StakematchError::InvalidRoomCode {
                reason: format!("longer than {} characters", self.config.max_room_code_len),
            });
        }
        if code.chars().any(char::is_control) {
            return Err(StakematchError::InvalidRoomCode {
                reason: "contains control characters".into(),
            });
        }
        Ok(code.to_string())
    }
}

fn join(uow: &mut UnitOfWork<'_>, match_id: MatchId, player: UserId) -> Result<Match> {
    let mut game = uow.load_match(match_id)?;
    if game.status != MatchStatus::Waiting || game.player2.is_some() {
        return Err(StakematchError::MatchNotJoinable(match_id));
    }
    if game.player1 == player {
        return Err(StakematchError::SelfJoin);
    }
    uow.account(player)?.ensure_can_stake()?;
    uow.debit(
        Owner::Account(player),
        EntryKind::EscrowDebit,
        game.entry_fee,
        Some(match_id),
    )?;
    game.player2 = Some(player);
    game.transition(MatchStatus::InProgress, uow.now())?;
    uow.put_match(game.clone())?;
    uow.notify(Notification::new(
        game.player1,
        NotificationEvent::MatchJoined,
        None,
        match_id,
    ));
    Ok(game)
}
