//! The sync engine: per-pair pass orchestration.
//!
//! A pass drains one (identity, endpoint, direction) key: leftover
//! oversized records first, then batches of new entries from the source,
//! each batch fully replicated to the destination before its continuation
//! cursor is durably committed. Passes across pairs run concurrently up to
//! a configured bound; passes for the same key are serialized.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use weft_agent_core::{
    validate_inline_body, validate_message, Did, EndpointUrl, PendingRecord, RecordFilter,
    RecordId, RecordMessage, SyncDirection, Watermark, WatermarkKey,
};
use weft_agent_state::StateStore;

use crate::directory::EndpointDirectory;
use crate::error::{Result, SyncError};
use crate::store::{QueryReply, RecordEntry, RecordStore, WriteOutcome};
use crate::transport::Transport;

/// Configuration for sync behavior.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How many (identity, endpoint) passes may run at once.
    pub max_concurrent_passes: usize,
    /// Maximum entries requested per source query.
    pub batch_limit: u32,
    /// Timeout applied to each remote call.
    pub request_timeout: Duration,
    /// Retry ceiling for leftover pending records; `None` retries forever.
    pub max_pending_attempts: Option<u32>,
}

impl SyncConfig {
    /// Set the concurrent pass bound.
    pub fn with_max_concurrent_passes(mut self, limit: usize) -> Self {
        self.max_concurrent_passes = limit;
        self
    }

    /// Set the per-query batch limit.
    pub fn with_batch_limit(mut self, limit: u32) -> Self {
        self.batch_limit = limit;
        self
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the pending-record retry ceiling.
    pub fn with_max_pending_attempts(mut self, ceiling: Option<u32>) -> Self {
        self.max_pending_attempts = ceiling;
        self
    }

    /// Check the configuration for values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_passes == 0 {
            return Err(SyncError::Configuration(
                "max_concurrent_passes must be at least 1".into(),
            ));
        }
        if self.batch_limit == 0 {
            return Err(SyncError::Configuration(
                "batch_limit must be at least 1".into(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(SyncError::Configuration(
                "request_timeout must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrent_passes: 4,
            batch_limit: 100,
            request_timeout: Duration::from_secs(30),
            max_pending_attempts: Some(3),
        }
    }
}

/// Result of one (identity, endpoint, direction) pass.
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    /// Records newly written to the destination.
    pub replicated: u64,
    /// Records already present at the destination.
    pub skipped: u64,
    /// Records that could not be replicated this pass.
    pub failed: u64,
    /// Source query batches processed.
    pub batches: u64,
    /// Error that aborted the pass, if any.
    pub error: Option<String>,
}

impl PassReport {
    /// Whether the pass completed with nothing left behind.
    pub fn is_clean(&self) -> bool {
        self.error.is_none() && self.failed == 0
    }
}

/// A pass report tagged with its key.
#[derive(Debug, Clone)]
pub struct PassOutcome {
    /// The (identity, endpoint, direction) key the pass ran for.
    pub key: WatermarkKey,
    /// What happened.
    pub report: PassReport,
}

/// Aggregated result of one `pull()` or `push()` invocation.
///
/// Transient; returned for observability, never persisted.
#[derive(Debug, Clone, Default)]
pub struct SyncSummary {
    /// One outcome per (identity, endpoint) pair.
    pub passes: Vec<PassOutcome>,
    /// Identities whose endpoint resolution failed, with the reason.
    pub resolver_failures: Vec<(Did, String)>,
}

impl SyncSummary {
    /// Total records newly replicated across all pairs.
    pub fn total_replicated(&self) -> u64 {
        self.passes.iter().map(|p| p.report.replicated).sum()
    }

    /// Total records skipped as already present.
    pub fn total_skipped(&self) -> u64 {
        self.passes.iter().map(|p| p.report.skipped).sum()
    }

    /// Total per-record failures across all pairs.
    pub fn total_failed(&self) -> u64 {
        self.passes.iter().map(|p| p.report.failed).sum()
    }

    /// Number of passes that aborted or left failures behind.
    pub fn failed_passes(&self) -> usize {
        self.passes.iter().filter(|p| !p.report.is_clean()).count()
    }

    /// Whether every pass completed cleanly.
    pub fn is_clean(&self) -> bool {
        self.failed_passes() == 0 && self.resolver_failures.is_empty()
    }
}

/// The sync engine.
///
/// Owns its collaborators: the local record store facade, the durable sync
/// state store, the endpoint directory, and the transport to remote
/// endpoints. All are injected at construction; a misconfigured engine
/// fails at [`SyncEngine::new`], never mid-pass.
pub struct SyncEngine<R, S, D, T> {
    config: SyncConfig,
    local: R,
    state: S,
    directory: D,
    transport: T,
    /// Single-flight guards: passes for the same key must not interleave.
    pass_guards: Mutex<HashMap<WatermarkKey, Arc<Mutex<()>>>>,
    cancelled: AtomicBool,
}

impl<R, S, D, T> SyncEngine<R, S, D, T>
where
    R: RecordStore,
    S: StateStore,
    D: EndpointDirectory,
    T: Transport,
{
    /// Create a new sync engine.
    pub fn new(config: SyncConfig, local: R, state: S, directory: D, transport: T) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            local,
            state,
            directory,
            transport,
            pass_guards: Mutex::new(HashMap::new()),
            cancelled: AtomicBool::new(false),
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Get the local record store facade.
    pub fn local(&self) -> &R {
        &self.local
    }

    /// Get the sync state store.
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Cancel any ongoing sync invocation.
    ///
    /// Uncommitted batches simply remain pending and are retried on the
    /// next invocation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Reset the cancelled flag.
    pub fn reset_cancel(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────────────────

    /// Register an identity for sync. Idempotent; effective next pass.
    pub async fn register_identity(&self, did: &Did) -> Result<()> {
        self.state.register_identity(did).await?;
        Ok(())
    }

    /// Deregister an identity. Idempotent; effective next pass.
    pub async fn deregister_identity(&self, did: &Did) -> Result<()> {
        self.state.deregister_identity(did).await?;
        Ok(())
    }

    /// List registered identities in DID order.
    pub async fn registered_identities(&self) -> Result<Vec<Did>> {
        Ok(self.state.list_identities().await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sync Entry Points
    // ─────────────────────────────────────────────────────────────────────────

    /// Run one pull pass over every registered identity and endpoint.
    ///
    /// Fails soft: per-pair errors are collected into the summary. The
    /// call itself errors only when the engine can make no progress at all
    /// (cancelled, or the state store is unusable).
    pub async fn pull(&self) -> Result<SyncSummary> {
        self.sync_all(SyncDirection::Pull).await
    }

    /// Run one push pass over every registered identity and endpoint.
    pub async fn push(&self) -> Result<SyncSummary> {
        self.sync_all(SyncDirection::Push).await
    }

    async fn sync_all(&self, direction: SyncDirection) -> Result<SyncSummary> {
        self.check_cancelled()?;

        // With nothing registered there is nothing to resolve or query.
        let identities = self.state.list_identities().await?;
        let mut summary = SyncSummary::default();
        if identities.is_empty() {
            return Ok(summary);
        }

        let mut keys = Vec::new();
        for did in identities {
            match self.directory.resolve_endpoints(&did).await {
                Ok(endpoints) => {
                    for endpoint in endpoints {
                        keys.push(WatermarkKey::new(did.clone(), endpoint, direction));
                    }
                }
                Err(err) => {
                    warn!(did = %did, error = %err, "endpoint resolution failed");
                    summary.resolver_failures.push((did.clone(), err.to_string()));
                }
            }
        }

        summary.passes = stream::iter(keys)
            .map(|key| self.run_pass(key))
            .buffer_unordered(self.config.max_concurrent_passes)
            .collect()
            .await;

        Ok(summary)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Pass Execution
    // ─────────────────────────────────────────────────────────────────────────

    async fn pass_guard(&self, key: &WatermarkKey) -> Arc<Mutex<()>> {
        let mut guards = self.pass_guards.lock().await;
        guards.entry(key.clone()).or_default().clone()
    }

    async fn run_pass(&self, key: WatermarkKey) -> PassOutcome {
        let guard = self.pass_guard(&key).await;
        let _serialized = guard.lock().await;

        debug!(key = %key, "sync pass starting");
        let mut report = PassReport::default();
        if let Err(err) = self.drive_pass(&key, &mut report).await {
            warn!(key = %key, error = %err, "sync pass aborted");
            report.error = Some(err.to_string());
        } else {
            debug!(
                key = %key,
                replicated = report.replicated,
                skipped = report.skipped,
                "sync pass finished"
            );
        }
        PassOutcome { key, report }
    }

    /// Drain one key: leftovers, then batches until the source is dry.
    async fn drive_pass(&self, key: &WatermarkKey, report: &mut PassReport) -> Result<()> {
        self.resolve_leftovers(key, report).await?;

        let mut cursor = self.state.get_watermark(key).await?;
        loop {
            self.check_cancelled()?;
            let reply = self.query_source(key, cursor.as_ref()).await?;

            let mut rejection: Option<SyncError> = None;
            for entry in &reply.entries {
                self.check_cancelled()?;
                match self.replicate_entry(key, entry, report).await {
                    Ok(()) => {}
                    Err(err @ SyncError::Rejected { .. }) => {
                        // Non-retryable for this record. Finish the batch,
                        // but the watermark stays put until the store
                        // accepts (or an operator intervenes).
                        report.failed += 1;
                        warn!(key = %key, error = %err, "destination rejected record");
                        if rejection.is_none() {
                            rejection = Some(err);
                        }
                    }
                    Err(err) => return Err(err),
                }
            }
            if let Some(err) = rejection {
                return Err(err);
            }

            report.batches += 1;
            if let Some(next) = reply.cursor {
                // Batch fully replicated: commit its continuation cursor.
                self.state.set_watermark(key, &next).await?;
                cursor = Some(next);
            } else if reply.has_more {
                return Err(SyncError::Malformed(
                    "source reported more entries without a continuation cursor".into(),
                ));
            }

            if !reply.has_more {
                break;
            }
        }
        Ok(())
    }

    /// Retry pending records left behind by an interrupted earlier pass.
    ///
    /// These represent records the source reported but the destination has
    /// not durably received; they must land before the watermark may move.
    async fn resolve_leftovers(&self, key: &WatermarkKey, report: &mut PassReport) -> Result<()> {
        for pending in self.state.list_pending(key).await? {
            self.check_cancelled()?;

            let attempts = self.state.note_pending_attempt(&pending).await?;
            if let Some(ceiling) = self.config.max_pending_attempts {
                if attempts > ceiling {
                    warn!(
                        key = %key,
                        record = %pending.record_id,
                        attempts,
                        "dropping pending record past retry ceiling"
                    );
                    self.state.remove_pending(&pending).await?;
                    report.failed += 1;
                    continue;
                }
            }

            let (message, data) = self.read_record(key, &pending.record_id).await?;
            match self.write_destination(key, &message, &data).await? {
                WriteOutcome::Accepted => report.replicated += 1,
                WriteOutcome::AlreadyExists => report.skipped += 1,
                WriteOutcome::Rejected { reason } => {
                    report.failed += 1;
                    return Err(SyncError::Rejected {
                        record_id: pending.record_id,
                        reason,
                    });
                }
            }
            self.state.remove_pending(&pending).await?;
        }
        Ok(())
    }

    /// Replicate one query entry to the destination.
    async fn replicate_entry(
        &self,
        key: &WatermarkKey,
        entry: &RecordEntry,
        report: &mut PassReport,
    ) -> Result<()> {
        validate_message(&entry.message)?;
        let record_id = entry.message.compute_id();

        let outcome = match &entry.data {
            Some(data) => {
                validate_inline_body(&entry.message, data)?;
                self.write_destination(key, &entry.message, data).await?
            }
            None => {
                // The source declined to inline the body. Make the gap
                // durable before fetching, so a crash here re-discovers
                // the record instead of dropping it.
                let pending = PendingRecord::new(key, record_id);
                self.state.add_pending(&pending).await?;

                let (message, data) = self.read_record(key, &record_id).await?;
                let outcome = self.write_destination(key, &message, &data).await?;
                if !matches!(outcome, WriteOutcome::Rejected { .. }) {
                    self.state.remove_pending(&pending).await?;
                }
                outcome
            }
        };

        match outcome {
            WriteOutcome::Accepted => {
                report.replicated += 1;
                Ok(())
            }
            WriteOutcome::AlreadyExists => {
                report.skipped += 1;
                Ok(())
            }
            WriteOutcome::Rejected { reason } => Err(SyncError::Rejected { record_id, reason }),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Source/Destination Dispatch
    // ─────────────────────────────────────────────────────────────────────────

    async fn query_source(
        &self,
        key: &WatermarkKey,
        cursor: Option<&Watermark>,
    ) -> Result<QueryReply> {
        let filter = RecordFilter::default();
        match key.direction {
            SyncDirection::Pull => {
                self.with_timeout(
                    &key.endpoint,
                    self.transport.query(
                        &key.endpoint,
                        &key.did,
                        &filter,
                        cursor,
                        self.config.batch_limit,
                    ),
                )
                .await
            }
            SyncDirection::Push => {
                self.local
                    .query(&key.did, &filter, cursor, self.config.batch_limit)
                    .await
            }
        }
    }

    /// Fetch a record's message and full body from the pass's source.
    async fn read_record(
        &self,
        key: &WatermarkKey,
        record_id: &RecordId,
    ) -> Result<(RecordMessage, Bytes)> {
        let fetched = match key.direction {
            SyncDirection::Pull => {
                self.with_timeout(
                    &key.endpoint,
                    self.transport.read(&key.endpoint, &key.did, record_id),
                )
                .await?
            }
            SyncDirection::Push => self.local.read(&key.did, record_id).await?,
        };

        let (message, data) = fetched.ok_or_else(|| {
            SyncError::Malformed(format!(
                "source reported record {record_id} but the read returned nothing"
            ))
        })?;
        validate_message(&message)?;
        validate_inline_body(&message, &data)?;
        if message.compute_id() != *record_id {
            return Err(SyncError::Malformed(format!(
                "read for record {record_id} returned a different record"
            )));
        }
        Ok((message, data))
    }

    async fn write_destination(
        &self,
        key: &WatermarkKey,
        message: &RecordMessage,
        data: &[u8],
    ) -> Result<WriteOutcome> {
        match key.direction {
            SyncDirection::Pull => self.local.write(&key.did, message, data).await,
            SyncDirection::Push => {
                self.with_timeout(
                    &key.endpoint,
                    self.transport.write(&key.endpoint, &key.did, message, data),
                )
                .await
            }
        }
    }

    async fn with_timeout<V>(
        &self,
        endpoint: &EndpointUrl,
        fut: impl Future<Output = Result<V>>,
    ) -> Result<V> {
        match tokio::time::timeout(self.config.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout {
                endpoint: endpoint.to_string(),
                timeout: self.config.request_timeout,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::StaticDirectory;
    use crate::store::MemoryRecordStore;
    use crate::transport::memory::MemoryNetwork;
    use weft_agent_core::MessageBuilder;
    use weft_agent_state::MemoryStateStore;

    type MemoryEngine = SyncEngine<
        Arc<MemoryRecordStore>,
        Arc<MemoryStateStore>,
        Arc<StaticDirectory>,
        crate::transport::memory::MemoryTransport,
    >;

    struct Harness {
        engine: MemoryEngine,
        local: Arc<MemoryRecordStore>,
        state: Arc<MemoryStateStore>,
        directory: Arc<StaticDirectory>,
        network: Arc<MemoryNetwork>,
    }

    fn harness(config: SyncConfig) -> Harness {
        let local = Arc::new(MemoryRecordStore::new());
        let state = Arc::new(MemoryStateStore::new());
        let directory = Arc::new(StaticDirectory::new());
        let network = MemoryNetwork::new();
        let engine = SyncEngine::new(
            config,
            Arc::clone(&local),
            Arc::clone(&state),
            Arc::clone(&directory),
            network.transport(),
        )
        .unwrap();
        Harness {
            engine,
            local,
            state,
            directory,
            network,
        }
    }

    fn alice() -> Did {
        Did::parse("did:web:alice.example").unwrap()
    }

    fn endpoint() -> EndpointUrl {
        EndpointUrl::parse("https://dwn.example/node").unwrap()
    }

    fn make_record(did: &Did, payload: &[u8], ts: i64) -> (RecordMessage, Vec<u8>) {
        let message = MessageBuilder::new(did.clone())
            .data_format("text/plain")
            .timestamp(ts)
            .body(payload);
        (message, payload.to_vec())
    }

    #[test]
    fn test_rejects_invalid_config() {
        let local = MemoryRecordStore::new();
        let state = MemoryStateStore::new();
        let directory = StaticDirectory::new();
        let network = MemoryNetwork::new();

        let config = SyncConfig::default().with_max_concurrent_passes(0);
        let err = SyncEngine::new(config, local, state, directory, network.transport())
            .err()
            .unwrap();
        assert!(matches!(err, SyncError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_pull_converges_one_record() {
        let h = harness(SyncConfig::default());
        let remote = h.network.add_node(endpoint());
        h.directory.set_endpoints(alice(), vec![endpoint()]);
        h.engine.register_identity(&alice()).await.unwrap();

        let (message, data) = make_record(&alice(), b"hello, world", 1);
        remote.write(&alice(), &message, &data).await.unwrap();

        let summary = h.engine.pull().await.unwrap();
        assert!(summary.is_clean());
        assert_eq!(summary.total_replicated(), 1);
        assert_eq!(h.local.record_count(&alice()), 1);

        // Watermark committed for the pull key.
        let key = WatermarkKey::new(alice(), endpoint(), SyncDirection::Pull);
        assert!(h.state.get_watermark(&key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_pull_replay_is_idempotent() {
        let h = harness(SyncConfig::default());
        let remote = h.network.add_node(endpoint());
        h.directory.set_endpoints(alice(), vec![endpoint()]);
        h.engine.register_identity(&alice()).await.unwrap();

        let (message, data) = make_record(&alice(), b"once only", 1);
        remote.write(&alice(), &message, &data).await.unwrap();

        h.engine.pull().await.unwrap();
        let key = WatermarkKey::new(alice(), endpoint(), SyncDirection::Pull);
        let watermark = h.state.get_watermark(&key).await.unwrap();

        let replay = h.engine.pull().await.unwrap();
        assert!(replay.is_clean());
        assert_eq!(replay.total_replicated(), 0);
        assert_eq!(h.local.record_count(&alice()), 1);
        // No regression.
        assert_eq!(h.state.get_watermark(&key).await.unwrap(), watermark);
    }

    #[tokio::test]
    async fn test_push_mirrors_pull() {
        let h = harness(SyncConfig::default());
        let remote = h.network.add_node(endpoint());
        h.directory.set_endpoints(alice(), vec![endpoint()]);
        h.engine.register_identity(&alice()).await.unwrap();

        let (message, data) = make_record(&alice(), b"local first", 1);
        h.local.write(&alice(), &message, &data).await.unwrap();

        let summary = h.engine.push().await.unwrap();
        assert!(summary.is_clean());
        assert_eq!(summary.total_replicated(), 1);
        assert_eq!(remote.record_count(&alice()), 1);
    }

    #[tokio::test]
    async fn test_deregistered_identity_not_synced() {
        let h = harness(SyncConfig::default());
        let remote = h.network.add_node(endpoint());
        h.directory.set_endpoints(alice(), vec![endpoint()]);
        h.engine.register_identity(&alice()).await.unwrap();
        h.engine.deregister_identity(&alice()).await.unwrap();

        let (message, data) = make_record(&alice(), b"unseen", 1);
        remote.write(&alice(), &message, &data).await.unwrap();

        let summary = h.engine.pull().await.unwrap();
        assert!(summary.passes.is_empty());
        assert_eq!(h.local.record_count(&alice()), 0);
    }

    #[tokio::test]
    async fn test_empty_endpoint_list_is_not_an_error() {
        let h = harness(SyncConfig::default());
        h.engine.register_identity(&alice()).await.unwrap();

        let summary = h.engine.pull().await.unwrap();
        assert!(summary.is_clean());
        assert!(summary.passes.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_keeps_watermark() {
        let h = harness(SyncConfig::default());
        let remote = h.network.add_node(endpoint());
        h.directory.set_endpoints(alice(), vec![endpoint()]);
        h.engine.register_identity(&alice()).await.unwrap();

        let (message, data) = make_record(&alice(), b"eventually", 1);
        remote.write(&alice(), &message, &data).await.unwrap();

        h.network.set_unreachable(&endpoint(), true);
        let summary = h.engine.pull().await.unwrap();
        assert_eq!(summary.failed_passes(), 1);
        let key = WatermarkKey::new(alice(), endpoint(), SyncDirection::Pull);
        assert!(h.state.get_watermark(&key).await.unwrap().is_none());

        // Self-heals on the next invocation.
        h.network.set_unreachable(&endpoint(), false);
        let summary = h.engine.pull().await.unwrap();
        assert!(summary.is_clean());
        assert_eq!(h.local.record_count(&alice()), 1);
    }

    #[tokio::test]
    async fn test_oversized_record_resolved_via_read() {
        let h = harness(SyncConfig::default());
        let remote = h.network.add_node(endpoint());
        h.directory.set_endpoints(alice(), vec![endpoint()]);
        h.engine.register_identity(&alice()).await.unwrap();

        // Larger than the remote store's inlining threshold.
        let body = vec![0x61; 70_000];
        let (message, data) = make_record(&alice(), &body, 1);
        remote.write(&alice(), &message, &data).await.unwrap();

        let summary = h.engine.pull().await.unwrap();
        assert!(summary.is_clean());
        assert_eq!(summary.total_replicated(), 1);

        // Full body landed locally, byte-for-byte.
        let (_, local_data) = h
            .local
            .read(&alice(), &message.compute_id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(local_data.as_ref(), body.as_slice());

        // Resolution left no pending records behind.
        let key = WatermarkKey::new(alice(), endpoint(), SyncDirection::Pull);
        assert!(h.state.list_pending(&key).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_leftover_pending_resolved_before_new_entries() {
        let h = harness(SyncConfig::default());
        let remote = h.network.add_node(endpoint());
        h.directory.set_endpoints(alice(), vec![endpoint()]);
        h.engine.register_identity(&alice()).await.unwrap();

        // Simulate a crash mid-resolution: the record exists remotely and
        // a pending entry survives, but nothing landed locally.
        let (message, data) = make_record(&alice(), b"interrupted", 1);
        remote.write(&alice(), &message, &data).await.unwrap();
        let key = WatermarkKey::new(alice(), endpoint(), SyncDirection::Pull);
        let pending = PendingRecord::new(&key, message.compute_id());
        h.state.add_pending(&pending).await.unwrap();

        let summary = h.engine.pull().await.unwrap();
        assert!(summary.is_clean());
        assert_eq!(h.local.record_count(&alice()), 1);
        assert!(h.state.list_pending(&key).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pending_dropped_past_retry_ceiling() {
        let h = harness(SyncConfig::default().with_max_pending_attempts(Some(1)));
        h.network.add_node(endpoint());
        h.directory.set_endpoints(alice(), vec![endpoint()]);
        h.engine.register_identity(&alice()).await.unwrap();

        // Pending entry for a record the remote no longer serves.
        let key = WatermarkKey::new(alice(), endpoint(), SyncDirection::Pull);
        let pending = PendingRecord::new(&key, RecordId::from_bytes([0x5e; 32]));
        h.state.add_pending(&pending).await.unwrap();

        // Attempt 1: read fails, pass aborts, pending survives.
        let summary = h.engine.pull().await.unwrap();
        assert_eq!(summary.failed_passes(), 1);
        assert_eq!(h.state.list_pending(&key).await.unwrap().len(), 1);

        // Attempt 2 exceeds the ceiling: dropped with a failure count.
        let summary = h.engine.pull().await.unwrap();
        assert_eq!(summary.total_failed(), 1);
        assert!(h.state.list_pending(&key).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_write_withholds_watermark() {
        let h = harness(SyncConfig::default());
        let remote = h.network.add_node(endpoint());
        h.directory.set_endpoints(alice(), vec![endpoint()]);
        h.engine.register_identity(&alice()).await.unwrap();

        let message = MessageBuilder::new(alice())
            .schema("https://schema.example/banned")
            .timestamp(1)
            .body(b"refused");
        remote.write(&alice(), &message, b"refused").await.unwrap();
        h.local
            .set_rejected_schema(Some("https://schema.example/banned".into()));

        let summary = h.engine.pull().await.unwrap();
        assert_eq!(summary.total_failed(), 1);
        assert_eq!(summary.failed_passes(), 1);

        let key = WatermarkKey::new(alice(), endpoint(), SyncDirection::Pull);
        assert!(h.state.get_watermark(&key).await.unwrap().is_none());

        // Once the store accepts the schema, the same pass converges.
        h.local.set_rejected_schema(None);
        let summary = h.engine.pull().await.unwrap();
        assert!(summary.is_clean());
        assert_eq!(h.local.record_count(&alice()), 1);
        assert!(h.state.get_watermark(&key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_pagination_drains_source_in_one_call() {
        let h = harness(SyncConfig::default().with_batch_limit(2));
        let remote = h.network.add_node(endpoint());
        h.directory.set_endpoints(alice(), vec![endpoint()]);
        h.engine.register_identity(&alice()).await.unwrap();

        for i in 0..5 {
            let (message, data) = make_record(&alice(), format!("record {i}").as_bytes(), i);
            remote.write(&alice(), &message, &data).await.unwrap();
        }

        let summary = h.engine.pull().await.unwrap();
        assert!(summary.is_clean());
        assert_eq!(summary.total_replicated(), 5);
        assert_eq!(summary.passes[0].report.batches, 3);
        assert_eq!(h.local.record_count(&alice()), 5);
    }

    #[tokio::test]
    async fn test_cancel_leaves_state_retryable() {
        let h = harness(SyncConfig::default());
        let remote = h.network.add_node(endpoint());
        h.directory.set_endpoints(alice(), vec![endpoint()]);
        h.engine.register_identity(&alice()).await.unwrap();

        let (message, data) = make_record(&alice(), b"later", 1);
        remote.write(&alice(), &message, &data).await.unwrap();

        h.engine.cancel();
        assert!(matches!(h.engine.pull().await, Err(SyncError::Cancelled)));

        h.engine.reset_cancel();
        let summary = h.engine.pull().await.unwrap();
        assert!(summary.is_clean());
        assert_eq!(h.local.record_count(&alice()), 1);
    }
}
