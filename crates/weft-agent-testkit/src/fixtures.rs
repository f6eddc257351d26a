//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: an agent assembled over
//! in-memory stores and an in-memory endpoint network.

use std::sync::Arc;

use weft_agent::Agent;
use weft_agent_core::{Did, EndpointUrl, MessageBuilder, RecordMessage};
use weft_agent_state::MemoryStateStore;
use weft_agent_sync::directory::StaticDirectory;
use weft_agent_sync::store::{MemoryRecordStore, RecordStore};
use weft_agent_sync::transport::memory::{MemoryNetwork, MemoryTransport};
use weft_agent_sync::SyncConfig;

/// The agent type every fixture assembles.
pub type MemoryAgent = Agent<
    Arc<MemoryRecordStore>,
    Arc<MemoryStateStore>,
    Arc<StaticDirectory>,
    MemoryTransport,
>;

/// A test fixture with an agent wired over in-memory collaborators.
pub struct TestFixture {
    /// The assembled agent.
    pub agent: MemoryAgent,
    /// The agent's local record store.
    pub local: Arc<MemoryRecordStore>,
    /// The agent's sync state store.
    pub state: Arc<MemoryStateStore>,
    /// The endpoint directory the agent resolves against.
    pub directory: Arc<StaticDirectory>,
    /// The endpoint network remote stores live on.
    pub network: Arc<MemoryNetwork>,
}

impl TestFixture {
    /// Create a fixture with the default sync configuration.
    pub fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    /// Create a fixture with an explicit sync configuration.
    pub fn with_config(config: SyncConfig) -> Self {
        let local = Arc::new(MemoryRecordStore::new());
        let state = Arc::new(MemoryStateStore::new());
        let directory = Arc::new(StaticDirectory::new());
        let network = MemoryNetwork::new();

        let agent = Agent::new(
            config,
            Arc::clone(&local),
            Arc::clone(&state),
            Arc::clone(&directory),
            network.transport(),
        )
        .expect("default fixture configuration is valid");

        Self {
            agent,
            local,
            state,
            directory,
            network,
        }
    }

    /// A deterministic DID for a short name.
    pub fn did(name: &str) -> Did {
        Did::parse(format!("did:web:{name}.example")).expect("fixture DID is well-formed")
    }

    /// A deterministic endpoint URL for a short name.
    pub fn endpoint(name: &str) -> EndpointUrl {
        EndpointUrl::parse(format!("https://{name}.example/node"))
            .expect("fixture endpoint is well-formed")
    }

    /// Register a remote store at an endpoint, returning a handle to it.
    pub fn add_remote(&self, endpoint: EndpointUrl) -> Arc<MemoryRecordStore> {
        self.network.add_node(endpoint)
    }

    /// Register an identity with the agent and point it at endpoints.
    pub async fn register(&self, did: &Did, endpoints: Vec<EndpointUrl>) {
        self.directory.set_endpoints(did.clone(), endpoints);
        self.agent
            .register_identity(did)
            .await
            .expect("memory state store accepts registration");
    }

    /// Author a record message over the given body.
    pub fn make_record(did: &Did, payload: &[u8], ts: i64) -> (RecordMessage, Vec<u8>) {
        let message = MessageBuilder::new(did.clone())
            .data_format("text/plain")
            .timestamp(ts)
            .body(payload);
        (message, payload.to_vec())
    }

    /// A payload guaranteed to exceed the default inlining threshold.
    pub fn oversized_payload() -> Vec<u8> {
        vec![0x61; 70_000]
    }

    /// A random payload of the given length.
    pub fn random_payload(len: usize) -> Vec<u8> {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        (0..len).map(|_| rng.gen()).collect()
    }

    /// Write a record into a store, returning its message.
    pub async fn seed(
        &self,
        store: &Arc<MemoryRecordStore>,
        did: &Did,
        payload: &[u8],
    ) -> RecordMessage {
        let (message, data) = Self::make_record(did, payload, payload.len() as i64);
        store
            .write(did, &message, &data)
            .await
            .expect("memory store accepts seed record");
        message
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixture_pull_roundtrip() {
        let fixture = TestFixture::new();
        let alice = TestFixture::did("alice");
        let endpoint = TestFixture::endpoint("dwn");

        let remote = fixture.add_remote(endpoint.clone());
        fixture.register(&alice, vec![endpoint]).await;
        let message = fixture.seed(&remote, &alice, b"hello").await;

        let summary = fixture.agent.pull().await.unwrap();
        assert!(summary.is_clean());
        assert_eq!(
            fixture.local.list_record_ids(&alice).await.unwrap(),
            vec![message.compute_id()]
        );
    }

    #[tokio::test]
    async fn test_distinct_names_make_distinct_identities() {
        assert_ne!(TestFixture::did("alice"), TestFixture::did("bob"));
        assert_ne!(TestFixture::endpoint("a"), TestFixture::endpoint("b"));
    }

    #[tokio::test]
    async fn test_oversized_payload_exceeds_default_threshold() {
        use weft_agent_sync::store::DEFAULT_INLINE_THRESHOLD;
        assert!(TestFixture::oversized_payload().len() > DEFAULT_INLINE_THRESHOLD);
    }
}
