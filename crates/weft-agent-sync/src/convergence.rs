//! Convergence verification for synced replicas.
//!
//! After syncing, two replicas can verify they hold the same record set
//! for an identity by comparing deterministic set hashes, or diff the sets
//! directly when both are reachable.

use blake3::Hasher;

use weft_agent_core::{ContentHash, Did, RecordId};

use crate::error::Result;
use crate::store::RecordStore;

/// Compute a deterministic hash of a replica's record set for an identity.
///
/// Record IDs are sorted before hashing, so two replicas that hold the
/// same records produce the same hash regardless of arrival order.
pub async fn record_set_hash<R: RecordStore>(
    store: &R,
    did: &Did,
) -> Result<Option<ContentHash>> {
    let mut ids = store.list_record_ids(did).await?;
    if ids.is_empty() {
        return Ok(None);
    }
    ids.sort();

    let mut hasher = Hasher::new();
    hasher.update(b"weft-recordset-v0:");
    hasher.update(did.as_str().as_bytes());
    for id in &ids {
        hasher.update(&id.0);
    }

    Ok(Some(ContentHash(*hasher.finalize().as_bytes())))
}

/// Diff two record-ID sets.
pub fn diff_record_sets(local: &[RecordId], remote: &[RecordId]) -> ConvergenceResult {
    let local_set: std::collections::BTreeSet<_> = local.iter().copied().collect();
    let remote_set: std::collections::BTreeSet<_> = remote.iter().copied().collect();

    let missing_local: Vec<RecordId> = remote_set.difference(&local_set).copied().collect();
    let missing_remote: Vec<RecordId> = local_set.difference(&remote_set).copied().collect();

    if missing_local.is_empty() && missing_remote.is_empty() {
        ConvergenceResult::Converged
    } else {
        ConvergenceResult::Diverged {
            missing_local,
            missing_remote,
        }
    }
}

/// Verify two reachable replicas hold the same record set for an identity.
pub async fn verify_convergence<A: RecordStore, B: RecordStore>(
    local: &A,
    remote: &B,
    did: &Did,
) -> Result<ConvergenceResult> {
    let local_ids = local.list_record_ids(did).await?;
    let remote_ids = remote.list_record_ids(did).await?;
    Ok(diff_record_sets(&local_ids, &remote_ids))
}

/// Result of convergence verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvergenceResult {
    /// Both replicas hold identical record sets.
    Converged,
    /// The replicas differ.
    Diverged {
        /// Records the remote holds that the local replica lacks.
        missing_local: Vec<RecordId>,
        /// Records the local replica holds that the remote lacks.
        missing_remote: Vec<RecordId>,
    },
}

impl ConvergenceResult {
    /// Check if the replicas have converged.
    pub fn is_converged(&self) -> bool {
        matches!(self, ConvergenceResult::Converged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRecordStore;
    use weft_agent_core::MessageBuilder;

    fn alice() -> Did {
        Did::parse("did:web:alice.example").unwrap()
    }

    async fn seed(store: &MemoryRecordStore, payloads: &[&[u8]]) {
        for (i, payload) in payloads.iter().enumerate() {
            let message = MessageBuilder::new(alice())
                .timestamp(i as i64)
                .body(payload);
            store.write(&alice(), &message, payload).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_hash_ignores_arrival_order() {
        let a = MemoryRecordStore::new();
        let b = MemoryRecordStore::new();
        seed(&a, &[b"one", b"two"]).await;
        seed(&b, &[b"two", b"one"]).await;

        let ha = record_set_hash(&a, &alice()).await.unwrap();
        let hb = record_set_hash(&b, &alice()).await.unwrap();
        assert!(ha.is_some());
        assert_eq!(ha, hb);
    }

    #[tokio::test]
    async fn test_empty_set_has_no_hash() {
        let store = MemoryRecordStore::new();
        assert_eq!(record_set_hash(&store, &alice()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_diff_reports_both_sides() {
        let a = MemoryRecordStore::new();
        let b = MemoryRecordStore::new();
        seed(&a, &[b"shared", b"only local"]).await;
        seed(&b, &[b"shared", b"only remote"]).await;

        let result = verify_convergence(&a, &b, &alice()).await.unwrap();
        match result {
            ConvergenceResult::Diverged {
                missing_local,
                missing_remote,
            } => {
                assert_eq!(missing_local.len(), 1);
                assert_eq!(missing_remote.len(), 1);
            }
            other => panic!("expected divergence, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_identical_sets_converge() {
        let a = MemoryRecordStore::new();
        let b = MemoryRecordStore::new();
        seed(&a, &[b"same"]).await;
        seed(&b, &[b"same"]).await;

        let result = verify_convergence(&a, &b, &alice()).await.unwrap();
        assert!(result.is_converged());
    }
}
