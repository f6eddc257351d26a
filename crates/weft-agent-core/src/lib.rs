//! # Weft Agent Core
//!
//! Pure primitives for the Weft agent: identities, record messages, and
//! content addressing.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over the data the sync engine moves between replicas.
//!
//! ## Key Types
//!
//! - [`Did`] - An identity the agent syncs on behalf of
//! - [`RecordMessage`] - The store message describing one record
//! - [`RecordId`] - Content-addressed identifier (Blake3 hash)
//! - [`Watermark`] - Opaque progress cursor for one sync key
//! - [`PendingRecord`] - Durable marker for an unresolved oversized record
//!
//! ## Content Addressing
//!
//! Record messages are encoded as deterministic CBOR and identified by the
//! Blake3 hash of that encoding. See the [`canonical`] module.

pub mod canonical;
pub mod cursor;
pub mod error;
pub mod hash;
pub mod identity;
pub mod record;
pub mod validation;

pub use canonical::canonical_message_bytes;
pub use cursor::{PendingRecord, SyncDirection, Watermark, WatermarkKey};
pub use error::CoreError;
pub use hash::ContentHash;
pub use identity::{Did, EndpointUrl};
pub use record::{MessageBuilder, RecordFilter, RecordId, RecordMessage};
pub use validation::{validate_inline_body, validate_message};
