//! The Agent: construction-time wiring of the sync engine.
//!
//! Every collaborator - the local record store facade, the durable sync
//! state store, the endpoint directory, and the transport - is a required
//! constructor argument. There is no late binding to discover missing
//! context mid-call; a misconfigured agent fails at [`Agent::new`].

use weft_agent_core::Did;
use weft_agent_state::StateStore;
use weft_agent_sync::{
    EndpointDirectory, RecordStore, SyncConfig, SyncEngine, SyncError, SyncSummary, Transport,
};

use crate::error::{AgentError, Result};

/// The main Agent struct.
///
/// Provides a unified API for:
/// - Registering and deregistering identities for sync
/// - Pulling remote records into the local replica
/// - Pushing local records out to remote endpoints
/// - Cancelling an in-flight sync invocation
pub struct Agent<R, S, D, T> {
    engine: SyncEngine<R, S, D, T>,
}

impl<R, S, D, T> Agent<R, S, D, T>
where
    R: RecordStore,
    S: StateStore,
    D: EndpointDirectory,
    T: Transport,
{
    /// Create a new agent from its collaborators.
    ///
    /// Fails fast with [`AgentError::Configuration`] if the configuration
    /// is unusable; no pass side effects happen before this check.
    pub fn new(
        config: SyncConfig,
        local: R,
        state: S,
        directory: D,
        transport: T,
    ) -> Result<Self> {
        let engine = SyncEngine::new(config, local, state, directory, transport).map_err(
            |err| match err {
                SyncError::Configuration(msg) => AgentError::Configuration(msg),
                other => AgentError::Sync(other),
            },
        )?;
        Ok(Self { engine })
    }

    /// Get the underlying sync engine.
    pub fn engine(&self) -> &SyncEngine<R, S, D, T> {
        &self.engine
    }

    /// Get the local record store facade.
    pub fn local(&self) -> &R {
        self.engine.local()
    }

    /// Get the sync state store.
    pub fn state(&self) -> &S {
        self.engine.state()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────────────────

    /// Register an identity for sync. Idempotent; effective next pass.
    pub async fn register_identity(&self, did: &Did) -> Result<()> {
        Ok(self.engine.register_identity(did).await?)
    }

    /// Deregister an identity. Idempotent; effective next pass.
    pub async fn deregister_identity(&self, did: &Did) -> Result<()> {
        Ok(self.engine.deregister_identity(did).await?)
    }

    /// List registered identities in DID order.
    pub async fn registered_identities(&self) -> Result<Vec<Did>> {
        Ok(self.engine.registered_identities().await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sync
    // ─────────────────────────────────────────────────────────────────────────

    /// Pull records from every registered identity's remote endpoints into
    /// the local replica.
    pub async fn pull(&self) -> Result<SyncSummary> {
        Ok(self.engine.pull().await?)
    }

    /// Push locally held records out to every registered identity's
    /// remote endpoints.
    pub async fn push(&self) -> Result<SyncSummary> {
        Ok(self.engine.push().await?)
    }

    /// Cancel any in-flight sync invocation.
    pub fn cancel(&self) {
        self.engine.cancel();
    }

    /// Reset the cancelled flag so new invocations may run.
    pub fn reset_cancel(&self) {
        self.engine.reset_cancel();
    }
}
