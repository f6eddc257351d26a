//! Sync progress cursors.
//!
//! Progress is tracked per (identity, endpoint, direction) as an opaque
//! watermark handed back by the source store's query reply. The engine
//! never parses or orders watermarks; it stores the most recent one and
//! replays it on the next query.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identity::{Did, EndpointUrl};
use crate::record::RecordId;

/// Which way records flow in a sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SyncDirection {
    /// Remote store is the source, local store the destination.
    Pull,
    /// Local store is the source, remote store the destination.
    Push,
}

impl SyncDirection {
    /// Stable integer code for persistence.
    pub fn to_u8(self) -> u8 {
        match self {
            SyncDirection::Pull => 0,
            SyncDirection::Push => 1,
        }
    }

    /// Try to parse from a persisted integer code.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(SyncDirection::Pull),
            1 => Some(SyncDirection::Push),
            _ => None,
        }
    }
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncDirection::Pull => write!(f, "pull"),
            SyncDirection::Push => write!(f, "push"),
        }
    }
}

/// An opaque cursor into a source store's event history.
///
/// Compared only for equality; ordering lives entirely in the source store
/// that minted it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Watermark(String);

impl Watermark {
    /// Wrap a cursor token handed back by a source store.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Get the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one progress cursor: (identity, endpoint, direction).
///
/// Exactly one watermark exists per key at any time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WatermarkKey {
    /// The identity being synced.
    pub did: Did,
    /// The remote endpoint on the other side of the pass.
    pub endpoint: EndpointUrl,
    /// Which way records flow.
    pub direction: SyncDirection,
}

impl WatermarkKey {
    /// Build a key.
    pub fn new(did: Did, endpoint: EndpointUrl, direction: SyncDirection) -> Self {
        Self {
            did,
            endpoint,
            direction,
        }
    }
}

impl fmt::Display for WatermarkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.did, self.endpoint, self.direction)
    }
}

/// A record discovered during a query pass whose body was not inlined.
///
/// Created when a query entry arrives without an inline body; deleted once
/// the explicit read plus destination write succeeds. While one exists for
/// a key, the watermark for that key must not advance, so an interrupted
/// resolution is re-discovered instead of silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PendingRecord {
    /// The record awaiting resolution.
    pub record_id: RecordId,
    /// The identity it belongs to.
    pub did: Did,
    /// The endpoint involved in the pass that discovered it.
    pub endpoint: EndpointUrl,
    /// The direction of that pass.
    pub direction: SyncDirection,
}

impl PendingRecord {
    /// Build a pending record for an entry discovered under the given key.
    pub fn new(key: &WatermarkKey, record_id: RecordId) -> Self {
        Self {
            record_id,
            did: key.did.clone(),
            endpoint: key.endpoint.clone(),
            direction: key.direction,
        }
    }

    /// The watermark key this pending record belongs to.
    pub fn key(&self) -> WatermarkKey {
        WatermarkKey::new(self.did.clone(), self.endpoint.clone(), self.direction)
    }
}
