//! System-wide constants for the StakeMatch engine.

/// Default platform cut, in percent of the pot.
pub const DEFAULT_PLATFORM_FEE_PERCENT: i64 = 10;

/// Default referral reward, in percent of the pot.
pub const DEFAULT_REFERRAL_REWARD_PERCENT: i64 = 1;

/// Minimum entry fee in coins.
pub const DEFAULT_MIN_ENTRY_FEE: u64 = 1;

/// Matches idle longer than this are abandoned by the reaper.
pub const DEFAULT_IDLE_THRESHOLD_MINUTES: i64 = 90;

/// Upper bound on the idle threshold: one hundred years.
pub const MAX_IDLE_THRESHOLD_MINUTES: i64 = 60 * 24 * 365 * 100;

/// How often the reaper task sweeps.
pub const DEFAULT_REAPER_INTERVAL_SECS: u64 = 60;

/// Attempts an operation makes before a lost optimistic race is reported.
pub const DEFAULT_MAX_COMMIT_ATTEMPTS: u32 = 5;

/// Maximum room code length in characters.
pub const DEFAULT_MAX_ROOM_CODE_LEN: usize = 32;

/// Risk score added per prior dispute entry for the same user.
pub const RISK_ESCALATION_PER_PRIOR_DISPUTE: u32 = 5;

/// Ceiling for dispute risk scores.
pub const MAX_RISK_SCORE: u32 = 100;

/// Default tracing filter directive.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "StakeMatch";
