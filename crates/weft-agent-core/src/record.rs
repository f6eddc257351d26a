//! Record messages: the unit of replication.
//!
//! A record message describes one record held by an identity's store: who
//! authored it, what format the body is in, and the hash and size of the
//! body. Signing happens upstream; by the time a message reaches the sync
//! engine its attestation is an opaque blob carried along verbatim.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::canonical::canonical_message_bytes;
use crate::hash::ContentHash;
use crate::identity::Did;

/// The current record message schema version.
pub const MESSAGE_VERSION: u8 = 0;

/// A 32-byte record identifier, computed as Blake3(canonical_bytes(message)).
///
/// This is the content-address of a record. Two messages with the same
/// content have the same RecordId, which is what makes destination writes
/// idempotent.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub [u8; 32]);

impl RecordId {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for RecordId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for RecordId {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = slice.try_into()?;
        Ok(Self(arr))
    }
}

/// A store message describing one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMessage {
    /// Schema version (currently 0).
    pub version: u8,

    /// The identity that authored the record.
    pub author: Did,

    /// MIME-style format of the record body.
    pub data_format: String,

    /// Optional application schema URI.
    pub schema: Option<String>,

    /// Blake3 hash of the record body.
    pub data_hash: ContentHash,

    /// Size of the record body in bytes.
    pub data_size: u64,

    /// Author-claimed timestamp (Unix milliseconds). Untrusted.
    pub timestamp: i64,

    /// Opaque attestation produced upstream. Carried verbatim.
    pub attestation: Bytes,
}

impl RecordMessage {
    /// Compute the record ID (Blake3 hash of canonical bytes).
    ///
    /// Stores recompute this on write; an ID embedded in a wire payload is
    /// never trusted.
    pub fn compute_id(&self) -> RecordId {
        let bytes = canonical_message_bytes(self);
        RecordId(ContentHash::hash(&bytes).0)
    }
}

/// Builder for record messages.
pub struct MessageBuilder {
    author: Did,
    data_format: String,
    schema: Option<String>,
    timestamp: i64,
    attestation: Bytes,
}

impl MessageBuilder {
    /// Start building a message for the given author.
    pub fn new(author: Did) -> Self {
        Self {
            author,
            data_format: "application/octet-stream".to_string(),
            schema: None,
            timestamp: 0,
            attestation: Bytes::new(),
        }
    }

    /// Set the data format.
    pub fn data_format(mut self, format: impl Into<String>) -> Self {
        self.data_format = format.into();
        self
    }

    /// Set the application schema.
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Set the authored timestamp.
    pub fn timestamp(mut self, ts: i64) -> Self {
        self.timestamp = ts;
        self
    }

    /// Set the opaque attestation bytes.
    pub fn attestation(mut self, att: impl Into<Bytes>) -> Self {
        self.attestation = att.into();
        self
    }

    /// Finish the message over the given body, deriving hash and size.
    pub fn body(self, data: &[u8]) -> RecordMessage {
        RecordMessage {
            version: MESSAGE_VERSION,
            author: self.author,
            data_format: self.data_format,
            schema: self.schema,
            data_hash: ContentHash::hash(data),
            data_size: data.len() as u64,
            timestamp: self.timestamp,
            attestation: self.attestation,
        }
    }
}

/// Query-side record filter.
///
/// The default filter matches every record; the engine always queries with
/// the default and leaves narrowing to callers of the store contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    /// Match a single record by ID.
    pub record_id: Option<RecordId>,
    /// Match records with this data format.
    pub data_format: Option<String>,
}

impl RecordFilter {
    /// Filter for a single record ID.
    pub fn by_record_id(record_id: RecordId) -> Self {
        Self {
            record_id: Some(record_id),
            ..Self::default()
        }
    }

    /// Check whether a message passes this filter.
    pub fn matches(&self, id: &RecordId, message: &RecordMessage) -> bool {
        if let Some(want) = &self.record_id {
            if want != id {
                return false;
            }
        }
        if let Some(format) = &self.data_format {
            if format != &message.data_format {
                return false;
            }
        }
        true
    }
}
