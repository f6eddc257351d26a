//! # Weft Agent Sync
//!
//! The sync engine: converges an identity's local record store with its
//! remote store endpoints, without a central coordinator.
//!
//! ## Overview
//!
//! For every registered identity and every endpoint its directory entry
//! resolves to, a pass enumerates entries newer than the stored watermark,
//! resolves any bodies the source declined to inline, replicates each
//! record to the destination, and commits the watermark only after a batch
//! has fully landed. Destination writes are idempotent on the record's
//! content address, so replaying a partially completed pass converges
//! instead of duplicating.
//!
//! ## Key Properties
//!
//! - **Fail-soft**: a failure on one (identity, endpoint) pair never stops
//!   the others; it is reported in the pass summary and retried on the
//!   next invocation.
//! - **At-least-once, idempotent effect**: the watermark never advances
//!   past unreplicated work, and duplicates are absorbed by the
//!   destination.
//! - **Crash-safe oversized resolution**: records whose bodies were not
//!   inlined are durably queued before the explicit read, so an
//!   interrupted resolution is re-discovered, never dropped.
//! - **Bounded concurrency**: pairs sync in parallel up to a configured
//!   limit; passes for the same (identity, endpoint, direction) key are
//!   serialized.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use weft_agent_sync::{SyncConfig, SyncEngine};
//! use weft_agent_sync::store::MemoryRecordStore;
//! use weft_agent_sync::directory::StaticDirectory;
//! use weft_agent_sync::transport::memory::MemoryNetwork;
//! use weft_agent_state::MemoryStateStore;
//!
//! async fn example() {
//!     let network = MemoryNetwork::new();
//!     let engine = SyncEngine::new(
//!         SyncConfig::default(),
//!         MemoryRecordStore::new(),
//!         MemoryStateStore::new(),
//!         StaticDirectory::new(),
//!         network.transport(),
//!     )
//!     .unwrap();
//!
//!     // engine.register_identity(&did).await.unwrap();
//!     let summary = engine.pull().await.unwrap();
//!     println!("replicated {} records", summary.total_replicated());
//! }
//! ```

pub mod convergence;
pub mod directory;
pub mod engine;
pub mod error;
pub mod store;
pub mod transport;

pub use convergence::{diff_record_sets, record_set_hash, verify_convergence, ConvergenceResult};
pub use directory::{EndpointDirectory, StaticDirectory};
pub use engine::{PassOutcome, PassReport, SyncConfig, SyncEngine, SyncSummary};
pub use error::{Result, SyncError};
pub use store::{MemoryRecordStore, QueryReply, RecordEntry, RecordStore, WriteOutcome};
pub use transport::{memory::MemoryNetwork, memory::MemoryTransport, Transport};
