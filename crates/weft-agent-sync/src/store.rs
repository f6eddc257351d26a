//! Record store facade: the consumed contract for a replica's store.
//!
//! The engine talks to the local replica through this trait; the remote
//! replica is reached through [`Transport`](crate::transport::Transport),
//! whose operations mirror these shapes. An in-memory implementation is
//! provided for tests and embedding.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use weft_agent_core::{
    validate_inline_body, validate_message, Did, RecordFilter, RecordId, RecordMessage, Watermark,
};

use crate::error::{Result, SyncError};

/// Default size above which the in-memory store stops inlining bodies.
pub const DEFAULT_INLINE_THRESHOLD: usize = 65_536;

/// One entry in a query reply.
///
/// The `data` field is present only when the source chose to inline the
/// body; its absence is the one and only oversize signal the engine may
/// rely on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordEntry {
    /// The record's message.
    pub message: RecordMessage,
    /// The record body, when inlined.
    pub data: Option<Bytes>,
}

impl RecordEntry {
    /// Compute the entry's record ID from its message.
    pub fn record_id(&self) -> RecordId {
        self.message.compute_id()
    }
}

/// Reply to a store query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryReply {
    /// Entries newer than the supplied cursor, in source sequence order.
    pub entries: Vec<RecordEntry>,
    /// Continuation cursor covering everything returned so far.
    pub cursor: Option<Watermark>,
    /// Whether entries beyond this batch exist.
    pub has_more: bool,
}

/// Result of writing a record to a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOutcome {
    /// Record was accepted and stored.
    Accepted,
    /// Record already exists (idempotent - not an error).
    AlreadyExists,
    /// The store refused the record (authorization/schema).
    Rejected {
        /// The store's stated reason.
        reason: String,
    },
}

/// The record store facade: async interface to one replica.
///
/// # Design Notes
///
/// - **Idempotent writes**: writing a record that already exists returns
///   `AlreadyExists`, never an error. This is what makes sync passes safe
///   to retry after partial failure.
/// - **Inlining**: `query` may omit a record's body when it exceeds the
///   store's inlining threshold; `read` always returns the full body.
/// - **Partitioning**: every operation is scoped to one identity; records
///   never leak across identities.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Query records newer than the cursor, in source sequence order.
    async fn query(
        &self,
        did: &Did,
        filter: &RecordFilter,
        cursor: Option<&Watermark>,
        limit: u32,
    ) -> Result<QueryReply>;

    /// Read a single record with its full body.
    async fn read(&self, did: &Did, record_id: &RecordId)
        -> Result<Option<(RecordMessage, Bytes)>>;

    /// Write a record. Idempotent on the record's content address.
    async fn write(&self, did: &Did, message: &RecordMessage, data: &[u8])
        -> Result<WriteOutcome>;

    /// List all record IDs held for an identity, in storage order.
    async fn list_record_ids(&self, did: &Did) -> Result<Vec<RecordId>>;
}

#[async_trait]
impl<R: RecordStore + ?Sized> RecordStore for Arc<R> {
    async fn query(
        &self,
        did: &Did,
        filter: &RecordFilter,
        cursor: Option<&Watermark>,
        limit: u32,
    ) -> Result<QueryReply> {
        (**self).query(did, filter, cursor, limit).await
    }

    async fn read(
        &self,
        did: &Did,
        record_id: &RecordId,
    ) -> Result<Option<(RecordMessage, Bytes)>> {
        (**self).read(did, record_id).await
    }

    async fn write(
        &self,
        did: &Did,
        message: &RecordMessage,
        data: &[u8],
    ) -> Result<WriteOutcome> {
        (**self).write(did, message, data).await
    }

    async fn list_record_ids(&self, did: &Did) -> Result<Vec<RecordId>> {
        (**self).list_record_ids(did).await
    }
}

/// In-memory record store.
///
/// Per-identity partitions with a monotonically increasing event sequence;
/// the query cursor is the sequence of the last returned entry. Bodies
/// larger than the inlining threshold are omitted from query replies and
/// must be fetched with an explicit read.
pub struct MemoryRecordStore {
    inner: RwLock<MemoryStoreInner>,
    inline_threshold: usize,
}

#[derive(Default)]
struct MemoryStoreInner {
    partitions: HashMap<Did, Partition>,
    /// Schema URI the store's policy refuses, if any.
    rejected_schema: Option<String>,
}

#[derive(Default)]
struct Partition {
    records: HashMap<RecordId, StoredRecord>,
    /// (sequence, record id) in insertion order.
    log: Vec<(u64, RecordId)>,
    next_seq: u64,
}

struct StoredRecord {
    message: RecordMessage,
    data: Bytes,
}

impl MemoryRecordStore {
    /// Create a store with the default inlining threshold.
    pub fn new() -> Self {
        Self::with_inline_threshold(DEFAULT_INLINE_THRESHOLD)
    }

    /// Create a store with an explicit inlining threshold.
    pub fn with_inline_threshold(inline_threshold: usize) -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
            inline_threshold,
        }
    }

    /// Configure a schema URI the store refuses on write.
    ///
    /// Stands in for the authorization/schema rules a full store enforces.
    pub fn set_rejected_schema(&self, schema: Option<String>) {
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.rejected_schema = schema;
    }

    /// Number of records held for an identity.
    pub fn record_count(&self, did: &Did) -> usize {
        let inner = self.inner.read().expect("store lock poisoned");
        inner
            .partitions
            .get(did)
            .map(|p| p.records.len())
            .unwrap_or(0)
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(err: std::sync::PoisonError<T>) -> SyncError {
    SyncError::Store(format!("store lock poisoned: {err}"))
}

/// Parse a cursor this store minted (the last returned sequence).
fn parse_cursor(cursor: &Watermark) -> Result<u64> {
    cursor
        .as_str()
        .parse::<u64>()
        .map_err(|_| SyncError::Malformed(format!("unknown cursor: {cursor}")))
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn query(
        &self,
        did: &Did,
        filter: &RecordFilter,
        cursor: Option<&Watermark>,
        limit: u32,
    ) -> Result<QueryReply> {
        let after = match cursor {
            Some(c) => parse_cursor(c)?,
            None => 0,
        };

        let inner = self.inner.read().map_err(poisoned)?;
        let Some(partition) = inner.partitions.get(did) else {
            return Ok(QueryReply {
                entries: Vec::new(),
                cursor: cursor.cloned(),
                has_more: false,
            });
        };

        let mut entries = Vec::new();
        let mut last_seq = after;
        let mut has_more = false;

        for (seq, id) in partition.log.iter().filter(|(seq, _)| *seq > after) {
            let stored = partition
                .records
                .get(id)
                .ok_or_else(|| SyncError::Store(format!("log entry without record: {id}")))?;
            if !filter.matches(id, &stored.message) {
                continue;
            }
            if entries.len() as u32 >= limit {
                has_more = true;
                break;
            }
            let data = if stored.data.len() <= self.inline_threshold {
                Some(stored.data.clone())
            } else {
                None
            };
            entries.push(RecordEntry {
                message: stored.message.clone(),
                data,
            });
            last_seq = *seq;
        }

        let cursor = if last_seq > 0 {
            Some(Watermark::new(last_seq.to_string()))
        } else {
            cursor.cloned()
        };

        Ok(QueryReply {
            entries,
            cursor,
            has_more,
        })
    }

    async fn read(
        &self,
        did: &Did,
        record_id: &RecordId,
    ) -> Result<Option<(RecordMessage, Bytes)>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.partitions.get(did).and_then(|partition| {
            partition
                .records
                .get(record_id)
                .map(|stored| (stored.message.clone(), stored.data.clone()))
        }))
    }

    async fn write(
        &self,
        did: &Did,
        message: &RecordMessage,
        data: &[u8],
    ) -> Result<WriteOutcome> {
        if let Err(err) = validate_message(message) {
            return Ok(WriteOutcome::Rejected {
                reason: err.to_string(),
            });
        }
        if let Err(err) = validate_inline_body(message, data) {
            return Ok(WriteOutcome::Rejected {
                reason: err.to_string(),
            });
        }

        let mut inner = self.inner.write().map_err(poisoned)?;
        if let (Some(refused), Some(schema)) = (&inner.rejected_schema, &message.schema) {
            if refused == schema {
                return Ok(WriteOutcome::Rejected {
                    reason: format!("schema not allowed: {schema}"),
                });
            }
        }

        let record_id = message.compute_id();
        let partition = inner.partitions.entry(did.clone()).or_default();

        if partition.records.contains_key(&record_id) {
            return Ok(WriteOutcome::AlreadyExists);
        }

        partition.next_seq += 1;
        let seq = partition.next_seq;
        partition.records.insert(
            record_id,
            StoredRecord {
                message: message.clone(),
                data: Bytes::copy_from_slice(data),
            },
        );
        partition.log.push((seq, record_id));

        Ok(WriteOutcome::Accepted)
    }

    async fn list_record_ids(&self, did: &Did) -> Result<Vec<RecordId>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner
            .partitions
            .get(did)
            .map(|p| p.log.iter().map(|(_, id)| *id).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_agent_core::MessageBuilder;

    fn alice() -> Did {
        Did::parse("did:web:alice.example").unwrap()
    }

    fn make_record(payload: &[u8], ts: i64) -> (RecordMessage, Vec<u8>) {
        let message = MessageBuilder::new(alice())
            .data_format("text/plain")
            .timestamp(ts)
            .body(payload);
        (message, payload.to_vec())
    }

    #[tokio::test]
    async fn test_write_is_idempotent() {
        let store = MemoryRecordStore::new();
        let (message, data) = make_record(b"hello", 1);

        let first = store.write(&alice(), &message, &data).await.unwrap();
        assert_eq!(first, WriteOutcome::Accepted);

        let second = store.write(&alice(), &message, &data).await.unwrap();
        assert_eq!(second, WriteOutcome::AlreadyExists);

        assert_eq!(store.record_count(&alice()), 1);
    }

    #[tokio::test]
    async fn test_write_rejects_body_mismatch() {
        let store = MemoryRecordStore::new();
        let (message, _) = make_record(b"hello", 1);

        let outcome = store.write(&alice(), &message, b"tampered").await.unwrap();
        assert!(matches!(outcome, WriteOutcome::Rejected { .. }));
        assert_eq!(store.record_count(&alice()), 0);
    }

    #[tokio::test]
    async fn test_query_pages_with_cursor() {
        let store = MemoryRecordStore::new();
        for i in 0..5 {
            let (message, data) = make_record(format!("record {i}").as_bytes(), i);
            store.write(&alice(), &message, &data).await.unwrap();
        }

        let first = store
            .query(&alice(), &RecordFilter::default(), None, 2)
            .await
            .unwrap();
        assert_eq!(first.entries.len(), 2);
        assert!(first.has_more);

        let second = store
            .query(&alice(), &RecordFilter::default(), first.cursor.as_ref(), 2)
            .await
            .unwrap();
        assert_eq!(second.entries.len(), 2);
        assert!(second.has_more);

        let third = store
            .query(&alice(), &RecordFilter::default(), second.cursor.as_ref(), 2)
            .await
            .unwrap();
        assert_eq!(third.entries.len(), 1);
        assert!(!third.has_more);

        // Replaying the final cursor returns nothing new.
        let replay = store
            .query(&alice(), &RecordFilter::default(), third.cursor.as_ref(), 2)
            .await
            .unwrap();
        assert!(replay.entries.is_empty());
        assert_eq!(replay.cursor, third.cursor);
    }

    #[tokio::test]
    async fn test_oversized_body_not_inlined() {
        let store = MemoryRecordStore::with_inline_threshold(16);
        let (small_msg, small) = make_record(b"small", 1);
        let (large_msg, large) = make_record(&vec![0x61; 70_000], 2);

        store.write(&alice(), &small_msg, &small).await.unwrap();
        store.write(&alice(), &large_msg, &large).await.unwrap();

        let reply = store
            .query(&alice(), &RecordFilter::default(), None, 10)
            .await
            .unwrap();
        assert_eq!(reply.entries.len(), 2);
        assert!(reply.entries[0].data.is_some());
        assert!(reply.entries[1].data.is_none());

        // Explicit read returns the full body byte-for-byte.
        let (_, data) = store
            .read(&alice(), &large_msg.compute_id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(data.as_ref(), large.as_slice());
    }

    #[tokio::test]
    async fn test_query_filter_by_record_id() {
        let store = MemoryRecordStore::new();
        let (m1, d1) = make_record(b"one", 1);
        let (m2, d2) = make_record(b"two", 2);
        store.write(&alice(), &m1, &d1).await.unwrap();
        store.write(&alice(), &m2, &d2).await.unwrap();

        let filter = RecordFilter::by_record_id(m2.compute_id());
        let reply = store.query(&alice(), &filter, None, 10).await.unwrap();
        assert_eq!(reply.entries.len(), 1);
        assert_eq!(reply.entries[0].record_id(), m2.compute_id());
    }

    #[tokio::test]
    async fn test_identities_are_partitioned() {
        let store = MemoryRecordStore::new();
        let bob = Did::parse("did:web:bob.example").unwrap();
        let (message, data) = make_record(b"alice's record", 1);

        store.write(&alice(), &message, &data).await.unwrap();

        assert_eq!(store.record_count(&alice()), 1);
        assert_eq!(store.record_count(&bob), 0);
        assert!(store.list_record_ids(&bob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_schema_rejection() {
        let store = MemoryRecordStore::new();
        store.set_rejected_schema(Some("https://schema.example/banned".into()));

        let message = MessageBuilder::new(alice())
            .schema("https://schema.example/banned")
            .timestamp(1)
            .body(b"nope");
        let outcome = store.write(&alice(), &message, b"nope").await.unwrap();
        assert!(matches!(outcome, WriteOutcome::Rejected { .. }));
    }
}
