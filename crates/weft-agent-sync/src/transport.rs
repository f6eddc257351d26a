//! Transport abstraction for reaching remote store endpoints.
//!
//! The transport carries the three store operations - query, read, write -
//! to a named endpoint and returns its reply or a transport error.
//! Implementations may use HTTP, WebSockets, or any other carrier.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use weft_agent_core::{Did, EndpointUrl, RecordFilter, RecordId, RecordMessage, Watermark};

use crate::error::Result;
use crate::store::{QueryReply, WriteOutcome};

/// Transport trait for store requests against remote endpoints.
///
/// Implementations must be thread-safe (Send + Sync). Any of the three
/// operations may fail with a transport error; the engine does not retry
/// inline - a failed call ends that pair's pass for this cycle.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Query records newer than the cursor at an endpoint.
    async fn query(
        &self,
        endpoint: &EndpointUrl,
        did: &Did,
        filter: &RecordFilter,
        cursor: Option<&Watermark>,
        limit: u32,
    ) -> Result<QueryReply>;

    /// Read a single record with its full body from an endpoint.
    async fn read(
        &self,
        endpoint: &EndpointUrl,
        did: &Did,
        record_id: &RecordId,
    ) -> Result<Option<(RecordMessage, Bytes)>>;

    /// Write a record to an endpoint. Idempotent on the record's
    /// content address.
    async fn write(
        &self,
        endpoint: &EndpointUrl,
        did: &Did,
        message: &RecordMessage,
        data: &[u8],
    ) -> Result<WriteOutcome>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn query(
        &self,
        endpoint: &EndpointUrl,
        did: &Did,
        filter: &RecordFilter,
        cursor: Option<&Watermark>,
        limit: u32,
    ) -> Result<QueryReply> {
        (**self).query(endpoint, did, filter, cursor, limit).await
    }

    async fn read(
        &self,
        endpoint: &EndpointUrl,
        did: &Did,
        record_id: &RecordId,
    ) -> Result<Option<(RecordMessage, Bytes)>> {
        (**self).read(endpoint, did, record_id).await
    }

    async fn write(
        &self,
        endpoint: &EndpointUrl,
        did: &Did,
        message: &RecordMessage,
        data: &[u8],
    ) -> Result<WriteOutcome> {
        (**self).write(endpoint, did, message, data).await
    }
}

/// A simple in-memory transport for testing.
///
/// Hosts a record store per endpoint and routes requests to it, with
/// scriptable faults for exercising failure paths.
pub mod memory {
    use super::*;
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::{Mutex, RwLock};

    use crate::error::SyncError;
    use crate::store::{MemoryRecordStore, RecordStore};

    /// Shared state for the in-memory endpoint network.
    pub struct MemoryNetwork {
        /// One store per endpoint.
        nodes: RwLock<HashMap<EndpointUrl, Arc<MemoryRecordStore>>>,
        /// Endpoints currently refusing all requests.
        unreachable: RwLock<HashSet<EndpointUrl>>,
        /// Scripted write faults per endpoint; each write pops one flag.
        write_faults: Mutex<HashMap<EndpointUrl, VecDeque<bool>>>,
    }

    impl MemoryNetwork {
        /// Create an empty network.
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                nodes: RwLock::new(HashMap::new()),
                unreachable: RwLock::new(HashSet::new()),
                write_faults: Mutex::new(HashMap::new()),
            })
        }

        /// Register a store at an endpoint, returning a handle to it.
        pub fn add_node(&self, endpoint: EndpointUrl) -> Arc<MemoryRecordStore> {
            let store = Arc::new(MemoryRecordStore::new());
            self.nodes
                .write()
                .expect("network lock poisoned")
                .insert(endpoint, Arc::clone(&store));
            store
        }

        /// Get the store registered at an endpoint.
        pub fn node(&self, endpoint: &EndpointUrl) -> Option<Arc<MemoryRecordStore>> {
            self.nodes
                .read()
                .expect("network lock poisoned")
                .get(endpoint)
                .cloned()
        }

        /// Mark an endpoint unreachable (or reachable again).
        pub fn set_unreachable(&self, endpoint: &EndpointUrl, unreachable: bool) {
            let mut set = self.unreachable.write().expect("network lock poisoned");
            if unreachable {
                set.insert(endpoint.clone());
            } else {
                set.remove(endpoint);
            }
        }

        /// Script the outcome of the next writes to an endpoint.
        ///
        /// Each write pops one flag; `true` injects a transport failure,
        /// `false` lets the write through. An empty script means all
        /// writes succeed.
        pub fn script_write_faults(&self, endpoint: &EndpointUrl, faults: &[bool]) {
            let mut scripts = self.write_faults.lock().expect("network lock poisoned");
            scripts.insert(endpoint.clone(), faults.iter().copied().collect());
        }

        /// Build a transport routed through this network.
        pub fn transport(self: &Arc<Self>) -> MemoryTransport {
            MemoryTransport {
                network: Arc::clone(self),
            }
        }

        fn check_reachable(&self, endpoint: &EndpointUrl) -> Result<Arc<MemoryRecordStore>> {
            if self
                .unreachable
                .read()
                .expect("network lock poisoned")
                .contains(endpoint)
            {
                return Err(SyncError::transport(endpoint, "endpoint unreachable"));
            }
            self.node(endpoint)
                .ok_or_else(|| SyncError::transport(endpoint, "no such endpoint"))
        }

        fn pop_write_fault(&self, endpoint: &EndpointUrl) -> bool {
            let mut scripts = self.write_faults.lock().expect("network lock poisoned");
            scripts
                .get_mut(endpoint)
                .and_then(|queue| queue.pop_front())
                .unwrap_or(false)
        }
    }

    /// In-memory transport implementation.
    pub struct MemoryTransport {
        network: Arc<MemoryNetwork>,
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn query(
            &self,
            endpoint: &EndpointUrl,
            did: &Did,
            filter: &RecordFilter,
            cursor: Option<&Watermark>,
            limit: u32,
        ) -> Result<QueryReply> {
            let store = self.network.check_reachable(endpoint)?;
            store.query(did, filter, cursor, limit).await
        }

        async fn read(
            &self,
            endpoint: &EndpointUrl,
            did: &Did,
            record_id: &RecordId,
        ) -> Result<Option<(RecordMessage, Bytes)>> {
            let store = self.network.check_reachable(endpoint)?;
            store.read(did, record_id).await
        }

        async fn write(
            &self,
            endpoint: &EndpointUrl,
            did: &Did,
            message: &RecordMessage,
            data: &[u8],
        ) -> Result<WriteOutcome> {
            let store = self.network.check_reachable(endpoint)?;
            if self.network.pop_write_fault(endpoint) {
                return Err(SyncError::transport(endpoint, "injected write fault"));
            }
            store.write(did, message, data).await
        }
    }
}
