//! Error types for the sync module.

use std::time::Duration;

use thiserror::Error;

use weft_agent_core::{CoreError, RecordId};

/// Errors that can occur during sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid engine configuration. Fatal; never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Network-level failure reaching an endpoint.
    #[error("transport error ({endpoint}): {reason}")]
    Transport {
        /// The endpoint that could not be reached.
        endpoint: String,
        /// What went wrong.
        reason: String,
    },

    /// A remote call did not complete within the configured timeout.
    #[error("request to {endpoint} timed out after {timeout:?}")]
    Timeout {
        /// The endpoint that timed out.
        endpoint: String,
        /// The configured per-request timeout.
        timeout: Duration,
    },

    /// The destination store refused a write (authorization/schema).
    ///
    /// Distinct from "already exists", which is success.
    #[error("destination rejected record {record_id}: {reason}")]
    Rejected {
        /// The refused record.
        record_id: RecordId,
        /// The store's stated reason.
        reason: String,
    },

    /// Local record store facade failure.
    #[error("record store error: {0}")]
    Store(String),

    /// Sync state persistence failure.
    #[error("state error: {0}")]
    State(#[from] weft_agent_state::StateError),

    /// A reply was structurally invalid. Treated like a transport failure.
    #[error("malformed reply: {0}")]
    Malformed(String),

    /// Sync was cancelled.
    #[error("sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// Build a transport error for an endpoint.
    pub fn transport(endpoint: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        SyncError::Transport {
            endpoint: endpoint.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        SyncError::Malformed(err.to_string())
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
