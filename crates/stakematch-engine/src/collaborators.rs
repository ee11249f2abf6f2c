//! External collaborators: notification delivery and evidence storage.
//!
//! Both sit outside the money path. Notification failures are logged and
//! dropped; evidence storage only ever hands back a reference, and the engine
//! never looks at the bytes behind it.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use sha2::{Digest, Sha256};
use stakematch_types::{EvidenceRef, Notification, Result, StakematchError};

/// Fire-and-forget consumer of post-commit notifications.
pub trait NotificationSink: Send + Sync {
    /// # Errors
    /// A delivery failure. The engine logs it and moves on.
    fn deliver(&self, notification: &Notification) -> Result<()>;
}

/// Emits every notification as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn deliver(&self, notification: &Notification) -> Result<()> {
        tracing::info!(
            user = %notification.user_id,
            event = %notification.event,
            amount = notification.amount.map(|a| a.get()),
            reference = %notification.reference_id,
            "notification"
        );
        Ok(())
    }
}

/// Keeps every delivered notification in memory. Can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<Notification>>,
    failing: Mutex<bool>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent deliveries fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut flag) = self.failing.lock() {
            *flag = failing;
        }
    }

    /// Everything delivered so far, in delivery order.
    #[must_use]
    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }
}

impl NotificationSink for RecordingSink {
    fn deliver(&self, notification: &Notification) -> Result<()> {
        let failing = self
            .failing
            .lock()
            .map(|f| *f)
            .map_err(|_| StakematchError::Collaborator("recording sink poisoned".into()))?;
        if failing {
            return Err(StakematchError::Collaborator(
                "notification sink unavailable".into(),
            ));
        }
        self.delivered
            .lock()
            .map_err(|_| StakematchError::Collaborator("recording sink poisoned".into()))?
            .push(notification.clone());
        Ok(())
    }
}

/// Durable storage for result screenshots and cancel-request evidence.
pub trait EvidenceStore: Send + Sync {
    /// Store `bytes` and return a stable reference to them.
    ///
    /// # Errors
    /// `InvalidInput` for empty uploads; `Collaborator` if the backend fails.
    fn put(&self, bytes: &[u8]) -> Result<EvidenceRef>;
}

/// Content-addressed in-memory evidence store.
///
/// References have the form `evidence://sha256/<hex digest>`, so storing the
/// same bytes twice yields the same reference.
#[derive(Debug, Default)]
pub struct MemoryEvidenceStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryEvidenceStore {
    pub const SCHEME: &'static str = "evidence://sha256/";

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the bytes behind `reference`, if stored here.
    #[must_use]
    pub fn get(&self, reference: &EvidenceRef) -> Option<Vec<u8>> {
        self.blobs.read().ok()?.get(reference.as_str()).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or_default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EvidenceStore for MemoryEvidenceStore {
    fn put(&self, bytes: &[u8]) -> Result<EvidenceRef> {
        if bytes.is_empty() {
            return Err(StakematchError::InvalidInput {
                reason: "evidence upload is empty".into(),
            });
        }
        let digest = Sha256::digest(bytes);
        let reference = format!("{}{}", Self::SCHEME, hex::encode(digest));
        self.blobs
            .write()
            .map_err(|_| StakematchError::Collaborator("evidence store poisoned".into()))?
            .entry(reference.clone())
            .or_insert_with(|| bytes.to_vec());
        Ok(EvidenceRef::new(reference))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stakematch_types::{Coins, NotificationEvent, UserId};

    #[test]
    fn evidence_is_content_addressed() {
        let store = MemoryEvidenceStore::new();
        let a = store.put(b"screenshot-1").unwrap();
        let b = store.put(b"screenshot-1").unwrap();
        let c = store.put(b"screenshot-2").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.as_str().starts_with(MemoryEvidenceStore::SCHEME));
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&a).unwrap(), b"screenshot-1");
    }

    #[test]
    fn empty_evidence_rejected() {
        let err = MemoryEvidenceStore::new().put(&[]).unwrap_err();
        assert!(matches!(err, StakematchError::InvalidInput { .. }));
    }

    #[test]
    fn recording_sink_can_fail() {
        let sink = RecordingSink::new();
        let n = Notification::new(
            UserId::new(),
            NotificationEvent::WinningsCredited,
            Some(Coins(90)),
            "match:1",
        );
        sink.deliver(&n).unwrap();
        sink.set_failing(true);
        assert!(sink.deliver(&n).is_err());
        assert_eq!(sink.delivered().len(), 1);
    }
}
