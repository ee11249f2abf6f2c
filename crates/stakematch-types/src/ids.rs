//! Globally unique identifiers used throughout StakeMatch.
//!
//! All entity IDs use UUIDv7 for time-ordered lexicographic sorting.
//! [`UserId`] is issued by the identity collaborator; the engine only ever
//! receives it already verified.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a UUIDv7-backed identifier newtype with a display prefix.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            #[must_use]
            pub fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(Uuid::from_bytes(bytes))
            }

            #[must_use]
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a user account.
    UserId,
    ""
);

uuid_id!(
    /// Unique identifier for a two-player match.
    MatchId,
    "match:"
);

uuid_id!(
    /// Unique identifier for a ledger entry (transaction).
    EntryId,
    "entry:"
);

uuid_id!(
    /// Unique identifier for a player cancel request.
    CancelRequestId,
    "cancel:"
);

uuid_id!(
    /// Unique identifier for a dispute entry.
    DisputeId,
    "dispute:"
);

uuid_id!(
    /// Unique identifier for an admin action audit record.
    AdminActionId,
    "admin-action:"
);

// ---------------------------------------------------------------------------
// EvidenceRef
// ---------------------------------------------------------------------------

/// Opaque reference returned by the evidence store (e.g. a screenshot URL).
///
/// The engine stores only the reference, never the bytes behind it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvidenceRef(pub String);

impl EvidenceRef {
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A reference with no content is treated as missing evidence.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for EvidenceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
