//! Fire-and-forget notifications emitted after a committed state change.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Coins, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    MatchJoined,
    WinningsCredited,
    ReferralRewardCredited,
    MatchConflict,
    StakeRefunded,
    CancelRequestResolved,
    MatchOverridden,
    BalanceAdjusted,
}

impl fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MatchJoined => "match_joined",
            Self::WinningsCredited => "winnings_credited",
            Self::ReferralRewardCredited => "referral_reward_credited",
            Self::MatchConflict => "match_conflict",
            Self::StakeRefunded => "stake_refunded",
            Self::CancelRequestResolved => "cancel_request_resolved",
            Self::MatchOverridden => "match_overridden",
            Self::BalanceAdjusted => "balance_adjusted",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: UserId,
    pub event: NotificationEvent,
    pub amount: Option<Coins>,
    /// ID of the match, request, or dispute the event concerns.
    pub reference_id: String,
}

impl Notification {
    #[must_use]
    pub fn new(
        user_id: UserId,
        event: NotificationEvent,
        amount: Option<Coins>,
        reference_id: impl fmt::Display,
    ) -> Self {
        Self {
            user_id,
            event,
            amount,
            reference_id: reference_id.to_string(),
        }
    }
}
