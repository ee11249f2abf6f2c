//! Admin action audit records.
//!
//! Every privileged operation appends an [`AdminAction`]. Records are never
//! mutated after creation; each one carries a SHA-256 hash chained to its
//! predecessor so any later edit or deletion is detectable with
//! [`verify_chain`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::{AdminActionId, Result, StakematchError, UserId};

/// Hash that precedes the first record in the chain.
pub const GENESIS_HASH: [u8; 32] = [0u8; 32];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminActionKind {
    OverrideWinner,
    OverrideDraw,
    ApproveCancelRequest,
    RejectCancelRequest,
    ResolveDispute,
    AdjustBalance,
}

impl fmt::Display for AdminActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OverrideWinner => "override_winner",
            Self::OverrideDraw => "override_draw",
            Self::ApproveCancelRequest => "approve_cancel_request",
            Self::RejectCancelRequest => "reject_cancel_request",
            Self::ResolveDispute => "resolve_dispute",
            Self::AdjustBalance => "adjust_balance",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Match,
    CancelRequest,
    Dispute,
    Account,
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Match => "match",
            Self::CancelRequest => "cancel_request",
            Self::Dispute => "dispute",
            Self::Account => "account",
        };
        f.write_str(s)
    }
}

/// An audit record before the store sequences and hashes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminActionDraft {
    pub admin_id: UserId,
    pub action: AdminActionKind,
    pub target_type: TargetType,
    pub target_id: String,
    pub details: Value,
    pub timestamp: DateTime<Utc>,
}

/// A sealed, hash-chained audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminAction {
    pub id: AdminActionId,
    pub sequence: u64,
    pub admin_id: UserId,
    pub action: AdminActionKind,
    pub target_type: TargetType,
    pub target_id: String,
    pub details: Value,
    pub timestamp: DateTime<Utc>,
    pub prev_hash: [u8; 32],
    pub hash: [u8; 32],
}

impl AdminAction {
    /// Seal a draft at `sequence`, chaining it to `prev_hash`.
    #[must_use]
    pub fn seal(draft: AdminActionDraft, sequence: u64, prev_hash: [u8; 32]) -> Self {
        let mut action = Self {
            id: AdminActionId::new(),
            sequence,
            admin_id: draft.admin_id,
            action: draft.action,
            target_type: draft.target_type,
            target_id: draft.target_id,
            details: draft.details,
            timestamp: draft.timestamp,
            prev_hash,
            hash: [0u8; 32],
        };
        action.hash = action.compute_hash();
        action
    }

    /// Format: `"stakematch:admin_action:v1:" || seq || prev_hash || admin || action || target_type || target_id || details || ts_ms`
    #[must_use]
    pub fn compute_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"stakematch:admin_action:v1:");
        hasher.update(self.sequence.to_le_bytes());
        hasher.update(self.prev_hash);
        hasher.update(self.admin_id.as_bytes());
        hasher.update(self.action.to_string().as_bytes());
        hasher.update(self.target_type.to_string().as_bytes());
        hasher.update(self.target_id.as_bytes());
        hasher.update(self.details.to_string().as_bytes());
        hasher.update(self.timestamp.timestamp_millis().to_le_bytes());
        hasher.finalize().into()
    }

    #[must_use]
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

/// Verify a full audit trail, ordered by sequence from 1.
///
/// # Errors
/// Returns [`StakematchError::AuditChainBroken`] at the first record whose
/// sequence, back-link, or content hash does not verify.
pub fn verify_chain(actions: &[AdminAction]) -> Result<()> {
    let mut prev = GENESIS_HASH;
    for (expected_seq, action) in (1u64..).zip(actions) {
        if action.sequence != expected_seq
            || action.prev_hash != prev
            || action.compute_hash() != action.hash
        {
            return Err(StakematchError::AuditChainBroken {
                sequence: action.sequence,
            });
        }
        prev = action.hash;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(action: AdminActionKind) -> AdminActionDraft {
        AdminActionDraft {
            admin_id: UserId::new(),
            action,
            target_type: TargetType::Match,
            target_id: "match:1".into(),
            details: serde_json::json!({ "reason": "screenshot shows p2 won" }),
            timestamp: Utc::now(),
        }
    }

    fn chain(n: u64) -> Vec<AdminAction> {
        let mut prev = GENESIS_HASH;
        (1..=n)
            .map(|seq| {
                let a = AdminAction::seal(draft(AdminActionKind::OverrideWinner), seq, prev);
                prev = a.hash;
                a
            })
            .collect()
    }

    #[test]
    fn sealed_chain_verifies() {
        let actions = chain(3);
        assert!(verify_chain(&actions).is_ok());
        assert_eq!(actions[1].prev_hash, actions[0].hash);
        assert_eq!(actions[0].hash_hex().len(), 64);
    }

    #[test]
    fn tampered_details_break_chain() {
        let mut actions = chain(3);
        actions[1].details = serde_json::json!({ "reason": "edited later" });
        let err = verify_chain(&actions).unwrap_err();
        assert!(matches!(err, StakematchError::AuditChainBroken { sequence: 2 }));
    }

    #[test]
    fn deleted_record_breaks_chain() {
        let mut actions = chain(3);
        actions.remove(1);
        assert!(verify_chain(&actions).is_err());
    }
}
