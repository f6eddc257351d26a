//! StateStore trait: the abstract interface for sync state persistence.
//!
//! This trait keeps the sync engine storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use std::sync::Arc;

use weft_agent_core::{Did, PendingRecord, Watermark, WatermarkKey};

use crate::error::Result;

/// The StateStore trait: async interface for sync state persistence.
///
/// # Design Notes
///
/// - **Commit point**: `set_watermark` must be durable before it returns;
///   the engine uses it to commit a fully replicated batch.
/// - **Pending gate**: the engine never calls `set_watermark` for a key
///   while pending records for that key exist. Implementations do not
///   enforce this; the engine's ordering does.
/// - **Idempotent registration**: `register_identity` and
///   `deregister_identity` are no-ops when already in the target state.
#[async_trait]
pub trait StateStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Watermark Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the watermark for a key, if one has been committed.
    async fn get_watermark(&self, key: &WatermarkKey) -> Result<Option<Watermark>>;

    /// Overwrite the watermark for a key. Durable before returning.
    async fn set_watermark(&self, key: &WatermarkKey, watermark: &Watermark) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Pending Record Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Enqueue a pending record (idempotent).
    async fn add_pending(&self, record: &PendingRecord) -> Result<()>;

    /// Remove a pending record once its replication succeeded.
    async fn remove_pending(&self, record: &PendingRecord) -> Result<()>;

    /// List pending records for a key in enqueue order.
    async fn list_pending(&self, key: &WatermarkKey) -> Result<Vec<PendingRecord>>;

    /// Increment and return the attempt counter for a pending record.
    ///
    /// Returns 0 if the record is not enqueued.
    async fn note_pending_attempt(&self, record: &PendingRecord) -> Result<u32>;

    // ─────────────────────────────────────────────────────────────────────────
    // Identity Registry
    // ─────────────────────────────────────────────────────────────────────────

    /// Register an identity for sync (idempotent).
    async fn register_identity(&self, did: &Did) -> Result<()>;

    /// Deregister an identity (idempotent).
    async fn deregister_identity(&self, did: &Did) -> Result<()>;

    /// List registered identities, ordered by DID.
    async fn list_identities(&self) -> Result<Vec<Did>>;
}

#[async_trait]
impl<S: StateStore + ?Sized> StateStore for Arc<S> {
    async fn get_watermark(&self, key: &WatermarkKey) -> Result<Option<Watermark>> {
        (**self).get_watermark(key).await
    }

    async fn set_watermark(&self, key: &WatermarkKey, watermark: &Watermark) -> Result<()> {
        (**self).set_watermark(key, watermark).await
    }

    async fn add_pending(&self, record: &PendingRecord) -> Result<()> {
        (**self).add_pending(record).await
    }

    async fn remove_pending(&self, record: &PendingRecord) -> Result<()> {
        (**self).remove_pending(record).await
    }

    async fn list_pending(&self, key: &WatermarkKey) -> Result<Vec<PendingRecord>> {
        (**self).list_pending(key).await
    }

    async fn note_pending_attempt(&self, record: &PendingRecord) -> Result<u32> {
        (**self).note_pending_attempt(record).await
    }

    async fn register_identity(&self, did: &Did) -> Result<()> {
        (**self).register_identity(did).await
    }

    async fn deregister_identity(&self, did: &Did) -> Result<()> {
        (**self).deregister_identity(did).await
    }

    async fn list_identities(&self) -> Result<Vec<Did>> {
        (**self).list_identities().await
    }
}
