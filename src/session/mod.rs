//! Per-client session owning one browser context and N tabs (spec.md §3
//! "Session"/"Tab", §4.3). Grounded on `browser_pool/mod.rs`'s
//! pool-with-background-sweeper idiom and `mcp/manager/session_manager.rs`'s
//! `HashMap`-keyed registry guarded by a `tokio::sync::Mutex`.

mod manager;
mod tab;

pub use manager::SessionManager;
pub use tab::Tab;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::driver::{ConsoleEntry, DriverContext, NetworkEntry};
use crate::errors::BrokerError;
use crate::utils::constants::RING_BUFFER_CAPACITY;

/// A client's logical conversation: one browser context, its tabs, and the
/// bookkeeping the tool dispatcher needs (current-tab cursor, console/network
/// ring buffers). Tool execution within a session is serialized by
/// `dispatch_lock` (spec.md §5 "a tab cannot be driven by two callers at once").
pub struct Session {
    pub id: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
    last_activity: std::sync::Mutex<chrono::DateTime<chrono::Utc>>,
    pub context: DriverContext,
    tabs: Mutex<Vec<Tab>>,
    current_tab: AtomicUsize,
    pub console_buffer: Mutex<VecDeque<ConsoleEntry>>,
    pub network_buffer: Mutex<VecDeque<NetworkEntry>>,
    /// Serializes tool execution within this session (spec.md §5).
    pub dispatch_lock: Mutex<()>,
}

impl Session {
    #[must_use]
    pub fn new(context: DriverContext) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            last_activity: std::sync::Mutex::new(now),
            context,
            tabs: Mutex::new(Vec::new()),
            current_tab: AtomicUsize::new(0),
            console_buffer: Mutex::new(VecDeque::with_capacity(RING_BUFFER_CAPACITY)),
            network_buffer: Mutex::new(VecDeque::with_capacity(RING_BUFFER_CAPACITY)),
            dispatch_lock: Mutex::new(()),
        }
    }

    pub fn touch(&self) {
        *self.last_activity.lock().expect("last_activity mutex poisoned") = chrono::Utc::now();
    }

    #[must_use]
    pub fn last_activity(&self) -> chrono::DateTime<chrono::Utc> {
        *self.last_activity.lock().expect("last_activity mutex poisoned")
    }

    pub fn idle_for(&self) -> chrono::Duration {
        chrono::Utc::now().signed_duration_since(self.last_activity())
    }

    pub async fn open_tab(&self, url: &str) -> anyhow::Result<usize> {
        let page = self.context.new_page(url).await?;
        let mut tabs = self.tabs.lock().await;
        tabs.push(Tab::new(page));
        let index = tabs.len() - 1;
        drop(tabs);
        self.current_tab.store(index, Ordering::SeqCst);
        Ok(index)
    }

    /// Lazily opens a blank tab if none exists yet, then returns its index.
    pub async fn ensure_tab(&self) -> anyhow::Result<usize> {
        if self.tabs.lock().await.is_empty() {
            self.open_tab("about:blank").await
        } else {
            Ok(self.current_tab.load(Ordering::SeqCst))
        }
    }

    pub async fn tab_count(&self) -> usize {
        self.tabs.lock().await.len()
    }

    #[must_use]
    pub fn current_tab_index(&self) -> usize {
        self.current_tab.load(Ordering::SeqCst)
    }

    pub fn select_tab(&self, index: usize) {
        self.current_tab.store(index, Ordering::SeqCst);
    }

    /// Locked view of all tabs; callers index with `current_tab_index()`
    /// (or `NoTab` if out of range/empty) to reach the active one.
    pub async fn tabs(&self) -> tokio::sync::MutexGuard<'_, Vec<Tab>> {
        self.tabs.lock().await
    }

    pub async fn current_tab_or_die(&self) -> Result<(), BrokerError> {
        let tabs = self.tabs.lock().await;
        if tabs.get(self.current_tab_index()).is_some() {
            Ok(())
        } else {
            Err(BrokerError::NoTab)
        }
    }

    pub async fn close_tab(&self, index: usize) -> Result<(), BrokerError> {
        let mut tabs = self.tabs.lock().await;
        if index >= tabs.len() {
            return Err(BrokerError::NoTab);
        }
        tabs.remove(index);
        let current = self.current_tab.load(Ordering::SeqCst);
        if tabs.is_empty() {
            // Nothing left to point at; index 0 is a no-op sentinel until
            // ensure_tab opens a new one.
            self.current_tab.store(0, Ordering::SeqCst);
        } else if current >= tabs.len() {
            self.current_tab.store(tabs.len() - 1, Ordering::SeqCst);
        } else if index <= current && current > 0 {
            self.current_tab.store(current - 1, Ordering::SeqCst);
        }
        Ok(())
    }

    pub async fn tabs_snapshot(&self) -> Vec<(usize, String)> {
        let tabs = self.tabs.lock().await;
        let mut out = Vec::with_capacity(tabs.len());
        for (i, tab) in tabs.iter().enumerate() {
            out.push((i, tab.page.url().await.unwrap_or_default()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    // Session/Tab construction requires a real browser launch; covered by
    // SessionManager's integration-style tests instead of unit tests here.
}
