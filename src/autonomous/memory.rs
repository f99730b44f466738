//! Crawl-state memory (spec.md §4.6 "Memory"): local-file backend by
//! default, with an external-service contract defined but optional to
//! implement. Grounded on `state_store/saved_session.rs`'s atomic
//! `NamedTempFile`-write-then-rename idiom, generalized from "one saved
//! session" to "one JSON file per `stateHash`". The `maxStates` trim scans
//! the (small, bounded) directory and deletes the oldest entries by
//! `discovered_at` rather than keeping an in-memory `lru::LruCache` — the
//! source of truth is the directory, not a process-local cache, so there is
//! nothing for an LRU structure to usefully track between calls.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

use super::types::CrawlState;
use crate::errors::BrokerError;

/// Pluggable crawl-memory backend (spec.md §4.6: "local files (default) or
/// an external memory service"). All methods key on `stateHash`; writes
/// must be idempotent for a given hash.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    async fn has_state(&self, state_hash: &str) -> Result<bool, BrokerError>;
    async fn get_state(&self, state_hash: &str) -> Result<Option<CrawlState>, BrokerError>;
    async fn store_state(&self, state: &CrawlState) -> Result<(), BrokerError>;
    async fn get_all_states(&self) -> Result<Vec<CrawlState>, BrokerError>;
    async fn store_screenshot(&self, state_hash: &str, bytes: &[u8]) -> Result<PathBuf, BrokerError>;

    /// Directory screenshots are written under, if this backend keeps them
    /// on the local filesystem (the reporter copies from here into the
    /// report directory). `None` for backends with no local path.
    fn screenshot_dir(&self) -> Option<PathBuf> {
        None
    }
}

/// Local-file memory backend: a directory per broker installation holding
/// `{stateHash}.json`, with screenshots co-located under a `screenshots/`
/// sibling (spec.md §4.6).
pub struct LocalMemoryStore {
    root: PathBuf,
    max_states: Arc<Mutex<usize>>,
}

impl LocalMemoryStore {
    #[must_use]
    pub fn new(data_dir: impl AsRef<Path>, max_states: usize) -> Self {
        Self { root: data_dir.as_ref().join("crawl-memory"), max_states: Arc::new(Mutex::new(max_states)) }
    }

    pub async fn set_max_states(&self, max_states: usize) {
        *self.max_states.lock().await = max_states;
    }

    fn state_path(&self, state_hash: &str) -> PathBuf {
        self.root.join(format!("{state_hash}.json"))
    }

    fn screenshot_path(&self, state_hash: &str) -> PathBuf {
        self.root.join("screenshots").join(format!("{state_hash}.png"))
    }

    /// Enforces `maxStates` by deleting the oldest states (by
    /// `discovered_at`) beyond the cap, along with their screenshots.
    async fn trim(&self) -> Result<(), BrokerError> {
        let max_states = *self.max_states.lock().await;
        let mut states = self.get_all_states().await?;
        if states.len() <= max_states {
            return Ok(());
        }
        states.sort_by_key(|s| s.discovered_at);
        let overflow = states.len() - max_states;
        for state in states.into_iter().take(overflow) {
            let _ = tokio::fs::remove_file(self.state_path(&state.state_hash)).await;
            let _ = tokio::fs::remove_file(self.screenshot_path(&state.state_hash)).await;
        }
        Ok(())
    }
}

#[async_trait]
impl MemoryBackend for LocalMemoryStore {
    async fn has_state(&self, state_hash: &str) -> Result<bool, BrokerError> {
        Ok(tokio::fs::try_exists(self.state_path(state_hash)).await.unwrap_or(false))
    }

    async fn get_state(&self, state_hash: &str) -> Result<Option<CrawlState>, BrokerError> {
        match tokio::fs::read(self.state_path(state_hash)).await {
            Ok(bytes) => Ok(Some(
                serde_json::from_slice(&bytes)
                    .map_err(|e| BrokerError::Integrity(format!("corrupt crawl-state {state_hash}: {e}")))?,
            )),
            Err(_) => Ok(None),
        }
    }

    async fn store_state(&self, state: &CrawlState) -> Result<(), BrokerError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| BrokerError::Internal(format!("creating crawl-memory dir: {e}")))?;
        write_json_atomic(&self.state_path(&state.state_hash), state)
            .await
            .map_err(|e| BrokerError::Internal(format!("writing crawl state: {e}")))?;
        self.trim().await
    }

    async fn get_all_states(&self) -> Result<Vec<CrawlState>, BrokerError> {
        let mut out = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(_) => return Ok(out),
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(bytes) = tokio::fs::read(&path).await else { continue };
            let Ok(state) = serde_json::from_slice::<CrawlState>(&bytes) else { continue };
            out.push(state);
        }
        out.sort_by_key(|s| s.discovered_at);
        Ok(out)
    }

    async fn store_screenshot(&self, state_hash: &str, bytes: &[u8]) -> Result<PathBuf, BrokerError> {
        let path = self.screenshot_path(state_hash);
        let parent = path.parent().expect("screenshot path has a parent");
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| BrokerError::Internal(format!("creating screenshots dir: {e}")))?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| BrokerError::Internal(format!("writing screenshot: {e}")))?;
        Ok(path)
    }

    fn screenshot_dir(&self) -> Option<PathBuf> {
        Some(self.root.join("screenshots"))
    }
}

async fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
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

/// External memory service contract (spec.md §4.6: "contract given,
/// implementation optional"). A thin `reqwest` client against a
/// broker-operator-provided HTTP service exposing the same four
/// operations; left unimplemented beyond the wire shape since no reference
/// external service is specified.
pub struct ExternalMemoryStore {
    base_url: String,
    http: reqwest::Client,
}

impl ExternalMemoryStore {
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self { base_url, http: reqwest::Client::new() }
    }
}

#[async_trait]
impl MemoryBackend for ExternalMemoryStore {
    async fn has_state(&self, state_hash: &str) -> Result<bool, BrokerError> {
        let url = format!("{}/states/{state_hash}", self.base_url.trim_end_matches('/'));
        let resp = self.http.head(&url).send().await.map_err(|e| BrokerError::Driver(e.to_string()))?;
        Ok(resp.status().is_success())
    }

    async fn get_state(&self, state_hash: &str) -> Result<Option<CrawlState>, BrokerError> {
        let url = format!("{}/states/{state_hash}", self.base_url.trim_end_matches('/'));
        let resp = self.http.get(&url).send().await.map_err(|e| BrokerError::Driver(e.to_string()))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        resp.json().await.map(Some).map_err(|e| BrokerError::Driver(e.to_string()))
    }

    async fn store_state(&self, state: &CrawlState) -> Result<(), BrokerError> {
        let url = format!("{}/states/{}", self.base_url.trim_end_matches('/'), state.state_hash);
        self.http.put(&url).json(state).send().await.map_err(|e| BrokerError::Driver(e.to_string()))?;
        Ok(())
    }

    async fn get_all_states(&self) -> Result<Vec<CrawlState>, BrokerError> {
        let url = format!("{}/states", self.base_url.trim_end_matches('/'));
        let resp = self.http.get(&url).send().await.map_err(|e| BrokerError::Driver(e.to_string()))?;
        resp.json().await.map_err(|e| BrokerError::Driver(e.to_string()))
    }

    async fn store_screenshot(&self, state_hash: &str, bytes: &[u8]) -> Result<PathBuf, BrokerError> {
        let url = format!("{}/states/{state_hash}/screenshot", self.base_url.trim_end_matches('/'));
        self.http
            .put(&url)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| BrokerError::Driver(e.to_string()))?;
        Ok(PathBuf::from(format!("external://{state_hash}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_state(hash: &str, at: chrono::DateTime<Utc>) -> CrawlState {
        CrawlState {
            state_hash: hash.to_string(),
            url: "https://example.com".into(),
            title: "Example".into(),
            depth: 0,
            snapshot_text: "x".into(),
            discovered_at: at,
            screenshot: None,
        }
    }

    #[tokio::test]
    async fn store_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMemoryStore::new(dir.path(), 10);
        let state = sample_state("abc123", Utc::now());
        store.store_state(&state).await.unwrap();
        assert!(store.has_state("abc123").await.unwrap());
        let loaded = store.get_state("abc123").await.unwrap().unwrap();
        assert_eq!(loaded.url, state.url);
    }

    #[tokio::test]
    async fn trim_evicts_oldest_beyond_max_states() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMemoryStore::new(dir.path(), 2);
        let base = Utc::now();
        store.store_state(&sample_state("first", base)).await.unwrap();
        store.store_state(&sample_state("second", base + chrono::Duration::seconds(1))).await.unwrap();
        store.store_state(&sample_state("third", base + chrono::Duration::seconds(2))).await.unwrap();

        let remaining = store.get_all_states().await.unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(!store.has_state("first").await.unwrap());
        assert!(store.has_state("third").await.unwrap());
    }
}
