//! # stakematch-engine
//!
//! The **StakeMatch** service layer: every externally visible operation of the
//! two-player match escrow engine, as methods on [`Engine`].
//!
//! - **Escrow**: [`Engine::register_account`], [`Engine::create_match`],
//!   [`Engine::join_match`], [`Engine::withdraw_open_match`]
//! - **Adjudication**: [`Engine::submit_result`]
//! - **Cancellation**: [`Engine::request_cancellation`],
//!   [`Engine::resolve_cancel_request`]
//! - **Admin**: [`Engine::override_match`], [`Engine::resolve_dispute`],
//!   [`Engine::adjust_balance`]
//! - **Idle reaper**: [`Engine::reap_idle_matches`], [`spawn_idle_reaper`]
//! - **Queries and audits**: [`Engine::get_match`], [`Engine::verify_supply`],
//!   [`Engine::verify_ledger`], [`Engine::verify_audit_chain`], ...
//!
//! ## Request Flow
//!
//! ```text
//! Engine.op()
//!   └─ transact(op)                      up to max_commit_attempts
//!        ├─ UnitOfWork::begin(store, now)
//!        ├─ guards + settle()/refund()   staged only
//!        └─ commit
//!             ├─ ConcurrencyConflict → retry on fresh state
//!             └─ ok → deliver notifications, check supply
//!   └─ best_effort(audit / dispute record)
//! ```
//!
//! Money moves only inside the primary commit. Audit and dispute records
//! follow in their own commit and are logged, never propagated, on failure.

pub mod adjudication;
pub mod admin;
pub mod cancellation;
pub mod collaborators;
pub mod engine;
pub mod escrow;
pub mod reaper;
mod retry;
pub mod telemetry;

pub use adjudication::SubmissionOutcome;
pub use admin::{OverrideOutcome, OverrideVerdict};
pub use cancellation::CancelResolution;
pub use collaborators::{
    EvidenceStore, MemoryEvidenceStore, NotificationSink, RecordingSink, TracingSink,
};
pub use engine::Engine;
pub use reaper::{ReapReport, ReaperHandle, spawn_idle_reaper};

pub use stakematch_ledger::{MemoryStore, Store, SupplySnapshot};
pub use stakematch_settlement::{LedgerReport, RefundCause, RefundOutcome, SettlementOutcome};
