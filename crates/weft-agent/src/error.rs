//! Error types for the Agent.

use thiserror::Error;
use weft_agent_state::StateError;
use weft_agent_sync::SyncError;

/// Errors that can occur during Agent operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The agent was constructed with unusable configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Sync error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// State persistence error.
    #[error("state error: {0}")]
    State(#[from] StateError),
}

/// Result type for Agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
