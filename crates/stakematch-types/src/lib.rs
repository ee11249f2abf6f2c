//! # stakematch-types
//!
//! Shared types, errors, and configuration for the **StakeMatch** escrow and
//! settlement engine.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`UserId`], [`MatchId`], [`EntryId`], [`CancelRequestId`], [`DisputeId`], [`AdminActionId`], [`EvidenceRef`]
//! - **Amounts**: [`Coins`] with checked arithmetic and rate-based fee math
//! - **Accounts**: [`Account`], [`Actor`]
//! - **Match model**: [`Match`], [`MatchStatus`], [`GameResult`], [`Submission`], [`PlayerSlot`]
//! - **Ledger model**: [`LedgerEntry`], [`Owner`], [`EntryKind`], [`Direction`], [`EntryStatus`]
//! - **Review model**: [`CancelRequest`], [`DisputeEntry`], [`AdminAction`]
//! - **Notifications**: [`Notification`], [`NotificationEvent`]
//! - **Time**: [`Clock`], [`SystemClock`]
//! - **Configuration**: [`EngineConfig`], [`LoggingConfig`]
//! - **Errors**: [`StakematchError`] with `SM_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod account;
pub mod audit;
pub mod cancel;
pub mod clock;
pub mod coins;
pub mod config;
pub mod constants;
pub mod dispute;
pub mod error;
pub mod ids;
pub mod ledger;
pub mod matches;
pub mod notification;

// Re-export all primary types at crate root for ergonomic imports:
//   use stakematch_types::{Match, MatchStatus, LedgerEntry, Coins, ...};

pub use account::*;
pub use audit::*;
pub use cancel::*;
pub use clock::*;
pub use coins::*;
pub use config::*;
pub use dispute::*;
pub use error::*;
pub use ids::*;
pub use ledger::*;
pub use matches::*;
pub use notification::*;

// Constants are accessed via `stakematch_types::constants::FOO`
// (not re-exported to avoid name collisions).
