//! # Weft Agent State
//!
//! Durable sync state for the Weft agent. Persists, per
//! (identity, endpoint, direction) key:
//!
//! - the **watermark** marking the last committed point in the source
//!   store's event history, and
//! - the **pending records** discovered with oversized bodies that have
//!   not yet been replicated to the destination.
//!
//! It also holds the registry of identities eligible for sync. Only the
//! identifier is stored; everything else about an identity lives with its
//! owner.
//!
//! ## Key Types
//!
//! - [`StateStore`] - The async trait for all state operations
//! - [`SqliteStateStore`] - SQLite-based persistent state
//! - [`MemoryStateStore`] - In-memory state for tests
//!
//! ## Design Notes
//!
//! - **Watermark writes are the commit point** of a sync pass: `set_watermark`
//!   is durable before it returns.
//! - **Pending records gate the watermark**: the engine never advances a
//!   key's watermark while pending records for that key remain.
//! - **Registration is idempotent**: registering a registered identity (or
//!   deregistering an absent one) is a no-op.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StateError};
pub use memory::MemoryStateStore;
pub use sqlite::SqliteStateStore;
pub use traits::StateStore;
