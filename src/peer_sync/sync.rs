//! `/sync/index`, pull/push, checksum integrity, conflict resolution
//! (spec.md §4.7, §8 "Checksum integrity"). Enrichment grounded on
//! `groblegark-coop/crates/mux/src/upstream/client.rs`'s outbound-`reqwest`
//! idiom for talking to another broker-shaped HTTP surface.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::driver::StorageState;
use crate::errors::BrokerError;
use crate::state_store::{SavedSessionMeta, SessionStateStore};

use super::node::{NodeId, PeerNode};

/// One row of a `/sync/index` advertisement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    pub version: u32,
    pub checksum: String,
    pub last_modified: chrono::DateTime<chrono::Utc>,
}

/// Wire shape for `GET /sync/sessions/:id` / `POST /sync/sessions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncArchive {
    pub meta: SavedSessionMeta,
    pub storage_state: StorageState,
}

impl SyncArchive {
    fn canonical_bytes(&self) -> Vec<u8> {
        self.storage_state.canonical_bytes()
    }

    /// spec.md §8: `SHA-256(canonicalBytes) == advertisedChecksum`, else
    /// `Integrity`.
    pub fn verify_checksum(&self) -> Result<(), BrokerError> {
        let computed = hex::encode(Sha256::digest(self.canonical_bytes()));
        if computed == self.meta.checksum {
            Ok(())
        } else {
            Err(BrokerError::Integrity(format!(
                "checksum mismatch for '{}': expected {}, computed {computed}",
                self.meta.name, self.meta.checksum
            )))
        }
    }
}

pub struct PeerSyncService {
    pub node_id: NodeId,
    store: Arc<SessionStateStore>,
    peers: RwLock<HashMap<NodeId, PeerNode>>,
    http: reqwest::Client,
}

impl PeerSyncService {
    #[must_use]
    pub fn new(node_id: NodeId, store: Arc<SessionStateStore>) -> Self {
        Self { node_id, store, peers: RwLock::new(HashMap::new()), http: reqwest::Client::new() }
    }

    pub async fn register_peer(&self, peer: PeerNode) {
        self.peers.write().await.insert(peer.id, peer);
    }

    pub async fn deregister_peer(&self, id: NodeId) {
        self.peers.write().await.remove(&id);
    }

    pub async fn peers(&self) -> Vec<PeerNode> {
        self.peers.read().await.values().cloned().collect()
    }

    /// Builds this node's `/sync/index` advertisement from the local store.
    pub async fn local_index(&self) -> Result<Vec<IndexEntry>, BrokerError> {
        let sessions = self.store.list().await?;
        Ok(sessions
            .into_iter()
            .map(|m| IndexEntry {
                name: m.name,
                version: m.version,
                checksum: m.checksum,
                last_modified: m.created_at,
            })
            .collect())
    }

    /// Fetches `index` from a registered peer.
    pub async fn pull_index(&self, peer: &PeerNode) -> Result<Vec<IndexEntry>, BrokerError> {
        let url = format!("{}/sync/index", peer.url.trim_end_matches('/'));
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| BrokerError::Driver(format!("peer unreachable: {e}")))?;
        resp.json().await.map_err(|e| BrokerError::Driver(format!("bad peer index response: {e}")))
    }

    /// Downloads a session archive from a peer, verifies its checksum, and
    /// persists it locally. Fails with `Integrity` and writes nothing on a
    /// mismatch (spec.md seed scenario #5).
    pub async fn pull_session(&self, peer: &PeerNode, name: &str) -> Result<SavedSessionMeta, BrokerError> {
        let url = format!("{}/sync/sessions/{name}", peer.url.trim_end_matches('/'));
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| BrokerError::Driver(format!("peer unreachable: {e}")))?;
        let archive: SyncArchive =
            resp.json().await.map_err(|e| BrokerError::Integrity(format!("malformed archive: {e}")))?;
        archive.verify_checksum()?;

        self.resolve_and_store(archive).await
    }

    /// Builds the archive a peer downloads via `GET /sync/sessions/:name`.
    pub async fn export_archive(&self, name: &str) -> Result<SyncArchive, BrokerError> {
        let (meta, storage_state) = self.store.load(name).await?;
        let storage_state = storage_state
            .ok_or_else(|| BrokerError::Integrity(format!("'{name}' has no storage-state.json to export")))?;
        Ok(SyncArchive { meta, storage_state })
    }

    /// Accepts an uploaded archive (the `POST /sync/sessions` handler body),
    /// applying the same checksum + conflict-resolution rules as a pull.
    pub async fn accept_upload(&self, archive: SyncArchive) -> Result<SavedSessionMeta, BrokerError> {
        archive.verify_checksum()?;
        self.resolve_and_store(archive).await
    }

    /// Conflict resolution on upload of an existing name: keep greater
    /// `version`; tie -> greater `lastModified`; remaining tie ->
    /// receiver-local wins (spec.md §4.7).
    async fn resolve_and_store(&self, archive: SyncArchive) -> Result<SavedSessionMeta, BrokerError> {
        if let Ok((existing, _)) = self.store.load(&archive.meta.name).await {
            let incoming_wins = match archive.meta.version.cmp(&existing.version) {
                std::cmp::Ordering::Greater => true,
                std::cmp::Ordering::Less => false,
                std::cmp::Ordering::Equal => archive.meta.created_at > existing.created_at,
            };
            if !incoming_wins {
                tracing::info!(name = %archive.meta.name, "peer-sync conflict resolved in favor of local copy");
                return Ok(existing);
            }
        }

        self.store
            .save(
                &archive.meta.name,
                archive.meta.url,
                archive.meta.title,
                archive.meta.description,
                archive.meta.edge_profile,
                archive.meta.workspace,
                &archive.storage_state,
                Some(self.node_id.to_string()),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn checksum_mismatch_rejects_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SessionStateStore::new(dir.path()));
        let node_id = NodeId(uuid::Uuid::new_v4());
        let service = PeerSyncService::new(node_id, store.clone());

        let meta = SavedSessionMeta {
            name: "demo".into(),
            description: None,
            created_at: chrono::Utc::now(),
            url: "https://example.com".into(),
            title: "Example".into(),
            edge_profile: None,
            workspace: None,
            version: 1,
            checksum: "not-a-real-checksum".into(),
            origin_node: None,
        };
        let archive = SyncArchive { meta, storage_state: StorageState::default() };

        let result = service.accept_upload(archive).await;
        assert!(matches!(result, Err(BrokerError::Integrity(_))));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn greater_version_wins_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SessionStateStore::new(dir.path()));
        let node_id = NodeId(uuid::Uuid::new_v4());
        let service = PeerSyncService::new(node_id, store.clone());

        let state = StorageState::default();
        store
            .save("demo", "https://example.com".into(), "Example".into(), None, None, None, &state, None)
            .await
            .unwrap();
        let existing = store.load("demo").await.unwrap().0;

        // Lower version: local wins, store unchanged.
        let stale = SyncArchive {
            meta: SavedSessionMeta { version: 0, checksum: checksum_of(&state), ..existing.clone() },
            storage_state: state.clone(),
        };
        let result = service.accept_upload(stale).await.unwrap();
        assert_eq!(result.version, existing.version);
    }

    fn checksum_of(state: &StorageState) -> String {
        hex::encode(Sha256::digest(state.canonical_bytes()))
    }
}
