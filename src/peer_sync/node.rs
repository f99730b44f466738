//! Broker self-identity and manually-registered peer records (spec.md §3
//! "PeerNode"). `NodeId` resolves SPEC_FULL.md's Open Question #3: the id is
//! generated once and persisted at `<data-dir>/node-id` so it survives
//! restarts, since the distilled spec says only "id stable across reboots"
//! without saying how.

use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Loads `<data-dir>/node-id`, generating and persisting a fresh id if
    /// absent (first boot).
    pub async fn load_or_create(data_dir: &Path) -> anyhow::Result<Self> {
        let path = data_dir.join("node-id");
        if let Ok(contents) = tokio::fs::read_to_string(&path).await {
            if let Ok(id) = Uuid::parse_str(contents.trim()) {
                return Ok(Self(id));
            }
        }
        tokio::fs::create_dir_all(data_dir).await?;
        let id = Uuid::new_v4();
        tokio::fs::write(&path, id.to_string()).await?;
        Ok(Self(id))
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerAuthMethod {
    Bearer,
    SharedSecret,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerStatus {
    Healthy,
    Unreachable,
    Unknown,
}

/// A manually-registered peer broker (spec.md §3 "PeerNode", §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerNode {
    pub id: NodeId,
    pub url: String,
    pub auth_method: PeerAuthMethod,
    pub auth_token: Option<String>,
    pub last_seen: Option<chrono::DateTime<chrono::Utc>>,
    pub status: PeerStatus,
}

impl PeerNode {
    #[must_use]
    pub fn new(id: NodeId, url: String, auth_method: PeerAuthMethod, auth_token: Option<String>) -> Self {
        Self { id, url, auth_method, auth_token, last_seen: None, status: PeerStatus::Unknown }
    }
}
