//! Content-addressed `SavedSession` persistence (spec.md §3 "SavedSession",
//! §4.7 "Save/Restore/List/Delete"). Grounded on
//! `content_saver/compression.rs`'s atomic `NamedTempFile` write pattern and
//! `mcp/manager/manifest_manager.rs`'s load/save-by-directory idiom.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::driver::StorageState;
use crate::errors::BrokerError;

use super::sanitize::sanitize_profile_name;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedSessionMeta {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub url: String,
    pub title: String,
    /// From configuration at save time (spec.md §4.7).
    #[serde(default)]
    pub edge_profile: Option<String>,
    /// Workspace hint, see spec.md §9 Open Question #1 — `SavedSession` is
    /// the one canonical entity; `edge_profile`/`workspace` are just fields.
    #[serde(default)]
    pub workspace: Option<String>,
    pub version: u32,
    pub checksum: String,
    #[serde(default)]
    pub origin_node: Option<String>,
}

pub struct SessionStateStore {
    root: PathBuf,
}

impl SessionStateStore {
    #[must_use]
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self { root: data_dir.as_ref().join("session-states") }
    }

    fn dir_for(&self, name: &str) -> PathBuf {
        self.root.join(sanitize_profile_name(name))
    }

    /// Saves `meta`/`storage_state` atomically (temp file + rename for each
    /// of `profile.json` and `storage-state.json`), bumping `version` if a
    /// save for this name already exists.
    pub async fn save(
        &self,
        name: &str,
        url: String,
        title: String,
        description: Option<String>,
        edge_profile: Option<String>,
        workspace: Option<String>,
        storage_state: &StorageState,
        origin_node: Option<String>,
    ) -> Result<SavedSessionMeta, BrokerError> {
        let dir = self.dir_for(name);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| BrokerError::Internal(format!("creating profile dir: {e}")))?;

        let previous_version = self.load_meta(name).await.ok().map(|m| m.version).unwrap_or(0);
        let checksum = hex::encode(Sha256::digest(storage_state.canonical_bytes()));

        let meta = SavedSessionMeta {
            name: name.to_string(),
            description,
            created_at: chrono::Utc::now(),
            url,
            title,
            edge_profile,
            workspace,
            version: previous_version + 1,
            checksum,
            origin_node,
        };

        write_json_atomic(&dir.join("profile.json"), &meta)
            .await
            .map_err(|e| BrokerError::Internal(format!("writing profile.json: {e}")))?;
        write_json_atomic(&dir.join("storage-state.json"), storage_state)
            .await
            .map_err(|e| BrokerError::Internal(format!("writing storage-state.json: {e}")))?;

        Ok(meta)
    }

    async fn load_meta(&self, name: &str) -> Result<SavedSessionMeta, BrokerError> {
        let path = self.dir_for(name).join("profile.json");
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|_| BrokerError::Unknown(format!("no saved session named '{name}'")))?;
        serde_json::from_slice(&bytes).map_err(|e| BrokerError::Integrity(format!("corrupt profile.json: {e}")))
    }

    /// Reads `profile.json` + `storage-state.json`. A missing
    /// `storage-state.json` is not an error here — callers use that to
    /// drive the "degraded restore: URL only" path (spec.md §4.7).
    pub async fn load(&self, name: &str) -> Result<(SavedSessionMeta, Option<StorageState>), BrokerError> {
        let meta = self.load_meta(name).await?;
        let storage_path = self.dir_for(name).join("storage-state.json");
        let storage_state = match tokio::fs::read(&storage_path).await {
            Ok(bytes) => Some(
                serde_json::from_slice(&bytes)
                    .map_err(|e| BrokerError::Integrity(format!("corrupt storage-state.json: {e}")))?,
            ),
            Err(_) => None,
        };
        Ok((meta, storage_state))
    }

    /// Enumerates saved sessions, skipping any directory whose
    /// `profile.json` is missing or unparsable rather than failing the
    /// whole listing.
    pub async fn list(&self) -> Result<Vec<SavedSessionMeta>, BrokerError> {
        let mut out = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(_) => return Ok(out),
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path().join("profile.json");
            let Ok(bytes) = tokio::fs::read(&path).await else { continue };
            let Ok(meta) = serde_json::from_slice::<SavedSessionMeta>(&bytes) else { continue };
            out.push(meta);
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    pub async fn delete(&self, name: &str) -> Result<(), BrokerError> {
        let dir = self.dir_for(name);
        tokio::fs::remove_dir_all(&dir)
            .await
            .map_err(|_| BrokerError::Unknown(format!("no saved session named '{name}'")))
    }
}

async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let parent = path.parent().ok_or_else(|| anyhow::anyhow!("no parent dir for {}", path.display()))?;
    let json = serde_json::to_vec_pretty(value)?;
    let path_owned = path.to_path_buf();
    let parent_owned = parent.to_path_buf();
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let mut tmp = NamedTempFile::new_in(&parent_owned)?;
        use std::io::Write;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path_owned)?;
        Ok(())
    })
    .await??;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_list_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStateStore::new(dir.path());

        let mut state = StorageState::default();
        state.cookies.push(crate::driver::Cookie::new("sid", "abc123", "example.com"));

        let meta = store
            .save("Demo Profile", "https://example.com".into(), "Example".into(), None, None, None, &state, None)
            .await
            .unwrap();
        assert_eq!(meta.name, "Demo Profile");
        assert_eq!(meta.version, 1);

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);

        let (loaded_meta, loaded_state) = store.load("Demo Profile").await.unwrap();
        assert_eq!(loaded_meta.checksum, meta.checksum);
        assert_eq!(loaded_state.unwrap().cookies[0].value, "abc123");

        // Re-saving bumps the version.
        let meta2 = store
            .save("Demo Profile", "https://example.com".into(), "Example".into(), None, None, None, &state, None)
            .await
            .unwrap();
        assert_eq!(meta2.version, 2);

        store.delete("Demo Profile").await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_storage_state_yields_degraded_restore() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStateStore::new(dir.path());
        let state = StorageState::default();
        store
            .save("solo", "https://example.com".into(), "Example".into(), None, None, None, &state, None)
            .await
            .unwrap();
        tokio::fs::remove_file(dir.path().join("session-states").join("solo").join("storage-state.json"))
            .await
            .unwrap();
        let (_, storage) = store.load("solo").await.unwrap();
        assert!(storage.is_none());
    }
}
