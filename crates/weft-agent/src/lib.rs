//! # Weft Agent
//!
//! The unified API for the Weft agent: keeping a user's decentralized data
//! store replicas converged across every identity the agent manages.
//!
//! ## Overview
//!
//! A Weft agent holds a local record store replica and syncs it against
//! the remote store endpoints declared by each registered identity:
//!
//! - **Pull**: fetch records that appeared at remote endpoints and land
//!   them locally.
//! - **Push**: send records written locally out to the remote endpoints.
//! - **Registration**: identities are synced only after explicit,
//!   idempotent registration, and stop syncing on deregistration.
//!
//! Progress is tracked per (identity, endpoint, direction) as an opaque
//! watermark, committed only after a batch has fully replicated, so a
//! crashed or cancelled sync resumes where it left off and duplicates are
//! absorbed by the stores' content-addressed writes.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use weft_agent::{Agent, SyncConfig};
//! use weft_agent::sync::store::MemoryRecordStore;
//! use weft_agent::sync::directory::StaticDirectory;
//! use weft_agent::sync::transport::memory::MemoryNetwork;
//! use weft_agent::state::SqliteStateStore;
//!
//! async fn example() {
//!     let network = MemoryNetwork::new();
//!     let agent = Agent::new(
//!         SyncConfig::default(),
//!         MemoryRecordStore::new(),
//!         SqliteStateStore::open("sync-state.db").unwrap(),
//!         StaticDirectory::new(),
//!         network.transport(),
//!     )
//!     .unwrap();
//!
//!     // agent.register_identity(&did).await.unwrap();
//!     let summary = agent.pull().await.unwrap();
//!     println!("pulled {} records", summary.total_replicated());
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `weft_agent::core` - Core primitives (Did, RecordMessage, etc.)
//! - `weft_agent::state` - Sync state persistence
//! - `weft_agent::sync` - The sync engine and consumed contracts

pub mod agent;
pub mod error;

// Re-export component crates
pub use weft_agent_core as core;
pub use weft_agent_state as state;
pub use weft_agent_sync as sync;

// Re-export main types for convenience
pub use agent::Agent;
pub use error::{AgentError, Result};

// Re-export commonly used types
pub use weft_agent_core::{
    Did, EndpointUrl, PendingRecord, RecordFilter, RecordId, RecordMessage, SyncDirection,
    Watermark, WatermarkKey,
};
pub use weft_agent_state::{MemoryStateStore, SqliteStateStore, StateStore};
pub use weft_agent_sync::{
    EndpointDirectory, PassReport, RecordStore, SyncConfig, SyncEngine, SyncSummary, Transport,
};
