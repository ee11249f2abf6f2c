//! Engine configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Coins, Result, StakematchError, constants};

/// Tunables for the escrow and settlement engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fraction of the pot retained by the platform (e.g. 0.10).
    pub platform_fee_rate: Decimal,
    /// Fraction of the pot paid to the winner's referrer (e.g. 0.01).
    pub referral_reward_rate: Decimal,
    pub min_entry_fee: Coins,
    pub max_entry_fee: Option<Coins>,
    /// Idle threshold for the reaper.
    pub idle_threshold_minutes: i64,
    pub reaper_interval_secs: u64,
    /// Bound on optimistic retries before reporting a state conflict.
    pub max_commit_attempts: u32,
    /// Re-check supply conservation after each money-moving commit.
    pub verify_supply_after_commit: bool,
    pub max_room_code_len: usize,
    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            platform_fee_rate: Decimal::new(constants::DEFAULT_PLATFORM_FEE_PERCENT, 2),
            referral_reward_rate: Decimal::new(constants::DEFAULT_REFERRAL_REWARD_PERCENT, 2),
            min_entry_fee: Coins(constants::DEFAULT_MIN_ENTRY_FEE),
            max_entry_fee: None,
            idle_threshold_minutes: constants::DEFAULT_IDLE_THRESHOLD_MINUTES,
            reaper_interval_secs: constants::DEFAULT_REAPER_INTERVAL_SECS,
            max_commit_attempts: constants::DEFAULT_MAX_COMMIT_ATTEMPTS,
            verify_supply_after_commit: true,
            max_room_code_len: constants::DEFAULT_MAX_ROOM_CODE_LEN,
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config document. Missing fields take defaults.
    ///
    /// # Errors
    /// Returns `Configuration` for malformed JSON or invalid values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| StakematchError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// Returns `Configuration` describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        let unit = Decimal::ONE;
        if self.platform_fee_rate.is_sign_negative() || self.platform_fee_rate >= unit {
            return Err(StakematchError::Configuration(format!(
                "platform_fee_rate {} must be in [0, 1)",
                self.platform_fee_rate
            )));
        }
        if self.referral_reward_rate.is_sign_negative() {
            return Err(StakematchError::Configuration(format!(
                "referral_reward_rate {} must not be negative",
                self.referral_reward_rate
            )));
        }
        if self.referral_reward_rate > self.platform_fee_rate {
            return Err(StakematchError::Configuration(format!(
                "referral_reward_rate {} exceeds platform_fee_rate {}",
                self.referral_reward_rate, self.platform_fee_rate
            )));
        }
        if self.min_entry_fee.is_zero() {
            return Err(StakematchError::Configuration(
                "min_entry_fee must be at least 1".into(),
            ));
        }
        if let Some(max) = self.max_entry_fee {
            if max < self.min_entry_fee {
                return Err(StakematchError::Configuration(format!(
                    "max_entry_fee {max} is below min_entry_fee {}",
                    self.min_entry_fee
                )));
            }
        }
        if self.idle_threshold_minutes <= 0
            || self.idle_threshold_minutes > constants::MAX_IDLE_THRESHOLD_MINUTES
        {
            return Err(StakematchError::Configuration(format!(
                "idle_threshold_minutes {} must be in [1, {}]",
                self.idle_threshold_minutes,
                constants::MAX_IDLE_THRESHOLD_MINUTES
            )));
        }
        if self.reaper_interval_secs == 0 {
            return Err(StakematchError::Configuration(
                "reaper_interval_secs must be positive".into(),
            ));
        }
        if self.max_commit_attempts == 0 {
            return Err(StakematchError::Configuration(
                "max_commit_attempts must be at least 1".into(),
            ));
        }
        if self.max_room_code_len == 0 {
            return Err(StakematchError::Configuration(
                "max_room_code_len must be positive".into(),
            ));
        }
        Ok(())
    }

    /// # Errors
    /// Returns `Configuration` if the threshold does not fit a `chrono::Duration`.
    pub fn idle_threshold(&self) -> Result<chrono::Duration> {
        chrono::Duration::try_minutes(self.idle_threshold_minutes).ok_or_else(|| {
            StakematchError::Configuration(format!(
                "idle_threshold_minutes {} is out of range",
                self.idle_threshold_minutes
            ))
        })
    }
}

/// `tracing-subscriber` settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence when set.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: constants::DEFAULT_LOG_FILTER.to_string(),
            json: false,
        }
    }
}
