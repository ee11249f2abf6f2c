//! # stakematch-settlement
//!
//! **Money-moving primitives**: every coin that leaves escrow goes through
//! [`settle`] or [`refund`], whatever triggered it (player agreement, admin
//! override, approved cancel request, idle reaper).
//!
//! ## Architecture
//!
//! Both primitives stage their effects into a caller-owned
//! [`stakematch_ledger::UnitOfWork`] and return an outcome describing what
//! will happen once the caller commits:
//!
//! 1. Guard the match state (completed → `AlreadySettled`, cancelled or
//!    abandoned → `MatchAlreadyTerminal`)
//! 2. Build the effects: a [`SettlementPlan`] for payouts, one credit per
//!    seated player for refunds
//! 3. Post ledger entries and the terminal match state together
//!
//! [`verify_ledger`] replays the entry log against balances for audits.

pub mod plan;
pub mod refund;
pub mod settle;
pub mod verify;

pub use plan::{Effect, SettlementPlan};
pub use refund::{RefundCause, RefundOutcome, refund};
pub use settle::{SettlementOutcome, ensure_settleable, settle};
pub use verify::{LedgerReport, verify_ledger};
