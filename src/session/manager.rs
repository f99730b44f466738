//! Session registry: acquire-by-id (creating on first use), enforce
//! `maxConcurrentSessions`, and sweep idle sessions. Grounded on
//! `mcp/manager/session_manager.rs`'s `HashMap`-under-`tokio::sync::Mutex`
//! registry plus its `start_cleanup_task` background-sweep pattern.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::driver::{ContextOptions, DriverContext};
use crate::errors::BrokerError;

use super::Session;

pub struct SessionManager {
    sessions: Mutex<HashMap<Uuid, Arc<Session>>>,
    max_concurrent_sessions: usize,
    session_timeout: chrono::Duration,
    default_context_options: ContextOptions,
}

impl SessionManager {
    #[must_use]
    pub fn new(max_concurrent_sessions: usize, session_timeout_ms: u64, default_context_options: ContextOptions) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_concurrent_sessions,
            session_timeout: chrono::Duration::milliseconds(session_timeout_ms as i64),
            default_context_options,
        }
    }

    /// Creates a new session with a fresh browser context, subject to
    /// `maxConcurrentSessions`.
    pub async fn create(&self) -> Result<Arc<Session>, BrokerError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.len() >= self.max_concurrent_sessions {
            return Err(BrokerError::Exhausted);
        }
        let context = DriverContext::launch(self.default_context_options.clone())
            .await
            .map_err(|e| BrokerError::Driver(e.to_string()))?;
        let session = Arc::new(Session::new(context));
        sessions.insert(session.id, session.clone());
        Ok(session)
    }

    /// Resolves a session by id, creating a fresh one if unknown — the
    /// primary `/rpc` transport's "silent create on stale id" semantics
    /// (spec.md §9 Open Question #2). The legacy `/events` transport must
    /// NOT call this; it looks up with `get` and 404s on a miss instead.
    pub async fn resolve_or_create(&self, id: Option<Uuid>) -> Result<Arc<Session>, BrokerError> {
        if let Some(id) = id {
            if let Some(session) = self.sessions.lock().await.get(&id).cloned() {
                session.touch();
                return Ok(session);
            }
        }
        self.create().await
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<Session>> {
        let session = self.sessions.lock().await.get(&id).cloned();
        if let Some(s) = &session {
            s.touch();
        }
        session
    }

    pub async fn close(&self, id: Uuid) -> Option<Arc<Session>> {
        self.sessions.lock().await.remove(&id)
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Removes and tears down sessions idle longer than `session_timeout`.
    async fn sweep_idle(&self) {
        let expired: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.lock().await;
            let timeout = self.session_timeout;
            let expired_ids: Vec<Uuid> = sessions
                .iter()
                .filter(|(_, s)| s.idle_for() > timeout)
                .map(|(id, _)| *id)
                .collect();
            expired_ids.into_iter().filter_map(|id| sessions.remove(&id)).collect()
        };
        for session in expired {
            tracing::info!(session_id = %session.id, "tearing down idle session");
            // Dropping the Arc closes the DriverContext (browser process +
            // handler task) via its Drop impl once all references are gone.
        }
    }

    /// Spawns the idle-session sweeper. Call once after wrapping in `Arc`.
    pub fn start_idle_sweeper(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));
            loop {
                interval.tick().await;
                self.sweep_idle().await;
            }
        });
    }
}
