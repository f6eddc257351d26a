//! In-memory implementation of the StateStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use weft_agent_core::{Did, PendingRecord, Watermark, WatermarkKey};

use crate::error::{Result, StateError};
use crate::traits::StateStore;

/// In-memory state store.
///
/// All state is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStateStore {
    inner: RwLock<MemoryStateInner>,
}

#[derive(Default)]
struct MemoryStateInner {
    /// One cursor per key.
    watermarks: BTreeMap<WatermarkKey, Watermark>,

    /// Pending records per key, in enqueue order.
    pending: BTreeMap<WatermarkKey, Vec<PendingRecord>>,

    /// Attempt counters for pending records.
    attempts: HashMap<PendingRecord, u32>,

    /// Registered identities (ordered).
    identities: BTreeSet<Did>,
}

impl MemoryStateStore {
    /// Create a new empty in-memory state store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStateInner::default()),
        }
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(err: std::sync::PoisonError<T>) -> StateError {
    StateError::Lock(err.to_string())
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get_watermark(&self, key: &WatermarkKey) -> Result<Option<Watermark>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.watermarks.get(key).cloned())
    }

    async fn set_watermark(&self, key: &WatermarkKey, watermark: &Watermark) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        inner.watermarks.insert(key.clone(), watermark.clone());
        Ok(())
    }

    async fn add_pending(&self, record: &PendingRecord) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        let queue = inner.pending.entry(record.key()).or_default();
        if !queue.contains(record) {
            queue.push(record.clone());
        }
        Ok(())
    }

    async fn remove_pending(&self, record: &PendingRecord) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        if let Some(queue) = inner.pending.get_mut(&record.key()) {
            queue.retain(|r| r != record);
        }
        inner.attempts.remove(record);
        Ok(())
    }

    async fn list_pending(&self, key: &WatermarkKey) -> Result<Vec<PendingRecord>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.pending.get(key).cloned().unwrap_or_default())
    }

    async fn note_pending_attempt(&self, record: &PendingRecord) -> Result<u32> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        let enqueued = inner
            .pending
            .get(&record.key())
            .map(|queue| queue.contains(record))
            .unwrap_or(false);
        if !enqueued {
            return Ok(0);
        }
        let counter = inner.attempts.entry(record.clone()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn register_identity(&self, did: &Did) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        inner.identities.insert(did.clone());
        Ok(())
    }

    async fn deregister_identity(&self, did: &Did) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        inner.identities.remove(did);
        Ok(())
    }

    async fn list_identities(&self) -> Result<Vec<Did>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.identities.iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_agent_core::{EndpointUrl, RecordId, SyncDirection};

    fn key() -> WatermarkKey {
        WatermarkKey::new(
            Did::parse("did:web:alice.example").unwrap(),
            EndpointUrl::parse("https://dwn.example/node").unwrap(),
            SyncDirection::Pull,
        )
    }

    #[tokio::test]
    async fn test_watermark_roundtrip() {
        let store = MemoryStateStore::new();
        let key = key();

        assert_eq!(store.get_watermark(&key).await.unwrap(), None);
        store
            .set_watermark(&key, &Watermark::new("evt-000001"))
            .await
            .unwrap();
        assert_eq!(
            store.get_watermark(&key).await.unwrap(),
            Some(Watermark::new("evt-000001"))
        );
    }

    #[tokio::test]
    async fn test_pending_preserves_enqueue_order() {
        let store = MemoryStateStore::new();
        let key = key();
        let first = PendingRecord::new(&key, RecordId::from_bytes([0xbb; 32]));
        let second = PendingRecord::new(&key, RecordId::from_bytes([0xaa; 32]));

        store.add_pending(&first).await.unwrap();
        store.add_pending(&second).await.unwrap();
        store.add_pending(&first).await.unwrap();

        let listed = store.list_pending(&key).await.unwrap();
        assert_eq!(listed, vec![first, second]);
    }

    #[tokio::test]
    async fn test_attempts_reset_after_removal() {
        let store = MemoryStateStore::new();
        let key = key();
        let record = PendingRecord::new(&key, RecordId::from_bytes([0xcc; 32]));

        store.add_pending(&record).await.unwrap();
        assert_eq!(store.note_pending_attempt(&record).await.unwrap(), 1);
        store.remove_pending(&record).await.unwrap();

        store.add_pending(&record).await.unwrap();
        assert_eq!(store.note_pending_attempt(&record).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_registry_ordered_and_idempotent() {
        let store = MemoryStateStore::new();
        let alice = Did::parse("did:web:alice.example").unwrap();
        let bob = Did::parse("did:web:bob.example").unwrap();

        store.register_identity(&bob).await.unwrap();
        store.register_identity(&alice).await.unwrap();
        store.register_identity(&bob).await.unwrap();

        assert_eq!(
            store.list_identities().await.unwrap(),
            vec![alice, bob.clone()]
        );

        store.deregister_identity(&bob).await.unwrap();
        store.deregister_identity(&bob).await.unwrap();
        assert_eq!(store.list_identities().await.unwrap().len(), 1);
    }
}
