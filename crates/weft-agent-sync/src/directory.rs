//! Endpoint directory: the consumed contract for service resolution.
//!
//! Given an identity, the directory yields the store endpoints declared in
//! that identity's service entries. Resolution internals (DID documents,
//! caching, refresh) live with the resolver; the engine only consumes the
//! resulting URL list. An empty list means "nothing to sync for this
//! identity on this pass" - not an error.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use weft_agent_core::{Did, EndpointUrl};

use crate::error::{Result, SyncError};

/// Resolves an identity's store endpoints.
#[async_trait]
pub trait EndpointDirectory: Send + Sync {
    /// Resolve the endpoints to sync against for an identity.
    async fn resolve_endpoints(&self, did: &Did) -> Result<Vec<EndpointUrl>>;
}

#[async_trait]
impl<D: EndpointDirectory + ?Sized> EndpointDirectory for Arc<D> {
    async fn resolve_endpoints(&self, did: &Did) -> Result<Vec<EndpointUrl>> {
        (**self).resolve_endpoints(did).await
    }
}

/// A directory backed by an explicit map.
///
/// Used in tests and in deployments where endpoints are configured rather
/// than resolved.
#[derive(Default)]
pub struct StaticDirectory {
    entries: RwLock<HashMap<Did, Vec<EndpointUrl>>>,
}

impl StaticDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the endpoints for an identity, replacing any existing entry.
    pub fn set_endpoints(&self, did: Did, endpoints: Vec<EndpointUrl>) {
        let mut entries = self.entries.write().expect("directory lock poisoned");
        entries.insert(did, endpoints);
    }

    /// Remove an identity's entry.
    pub fn remove(&self, did: &Did) {
        let mut entries = self.entries.write().expect("directory lock poisoned");
        entries.remove(did);
    }
}

#[async_trait]
impl EndpointDirectory for StaticDirectory {
    async fn resolve_endpoints(&self, did: &Did) -> Result<Vec<EndpointUrl>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| SyncError::Store(format!("directory lock poisoned: {e}")))?;
        Ok(entries.get(did).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_identity_resolves_empty() {
        let directory = StaticDirectory::new();
        let did = Did::parse("did:web:alice.example").unwrap();
        assert!(directory.resolve_endpoints(&did).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_and_replace_endpoints() {
        let directory = StaticDirectory::new();
        let did = Did::parse("did:web:alice.example").unwrap();
        let a = EndpointUrl::parse("https://a.example").unwrap();
        let b = EndpointUrl::parse("https://b.example").unwrap();

        directory.set_endpoints(did.clone(), vec![a.clone(), b.clone()]);
        assert_eq!(
            directory.resolve_endpoints(&did).await.unwrap(),
            vec![a, b.clone()]
        );

        directory.set_endpoints(did.clone(), vec![b.clone()]);
        assert_eq!(directory.resolve_endpoints(&did).await.unwrap(), vec![b]);

        directory.remove(&did);
        assert!(directory.resolve_endpoints(&did).await.unwrap().is_empty());
    }
}
