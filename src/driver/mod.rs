//! Thin abstraction over the external headless-browser driver (§2, §4.1 of
//! SPEC_FULL.md). Everything else in this crate — snapshot registry, session
//! manager, tool dispatcher, autonomous orchestrator — is built on top of the
//! handful of operations exposed here; nothing outside this module touches
//! `chromiumoxide` directly.
//!
//! Grounded on `browser_setup.rs` (launch + stealth args) and
//! `web_search/browser.rs`'s `BrowserWrapper` (handler task lifecycle).

mod context;
mod page;
mod storage_state;

pub use context::DriverContext;
pub use page::{AxNode, ConsoleEntry, DriverPage, NetworkEntry};
pub use storage_state::{Cookie, LocalStorageEntry, OriginState, SameSite, StorageState};

/// Anything the broker needs from a browser driver. One production
/// implementation (`DriverContext`/`DriverPage` over `chromiumoxide`); tests
/// are expected to stand up a real headless instance against `about:blank`
/// rather than mock this trait, since the contract is almost entirely
/// CDP round-trips.
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { width: 1280, height: 720 }
    }
}

/// Options threaded from `BrokerConfig`/CLI into a freshly-launched context.
#[derive(Debug, Clone, Default)]
pub struct ContextOptions {
    pub user_data_dir: Option<std::path::PathBuf>,
    pub headless: bool,
    pub proxy_server: Option<String>,
    pub ignore_https_errors: bool,
    pub viewport: Option<Viewport>,
    pub user_agent: Option<String>,
    pub no_sandbox: bool,
    pub storage_state: Option<StorageState>,
}
