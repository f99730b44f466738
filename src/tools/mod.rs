//! Tool registry & dispatcher (spec.md §2 "Tool registry & dispatcher",
//! §4.4, §6 "Tool catalog"): ~60 named operations, grouped by capability,
//! each schema-validated and backed by a driver primitive. Grounded on
//! `mcp/registry.rs`'s name→handler catalog idiom and `tools/browser/
//! tools.rs`'s one-struct-per-tool-input shape, generalized from a fixed
//! crawl-only tool set to the full navigate/interact/capture/tabs/wait/
//! testing/diagnostics/storage/profiles/autonomous/ai-intent catalog.

pub mod ai_intent;
pub mod autonomous;
pub mod capture;
pub mod diagnostics;
pub mod interact;
pub mod misc;
pub mod navigate;
pub mod profiles;
pub mod storage;
pub mod tabs;
pub mod wait;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::autonomous::{CrawlHandle, LocalMemoryStore, MemoryBackend};
use crate::config::ImageResponses;
use crate::crawl_events::CrawlEventBus;
use crate::errors::BrokerError;
use crate::peer_sync::PeerSyncService;
use crate::session::Session;
use crate::state_store::SessionStateStore;
use crate::utils::constants::DEFAULT_NETWORK_IDLE_TIMEOUT_MS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    Navigate,
    Interact,
    Capture,
    Tabs,
    Wait,
    Testing,
    Diagnostics,
    Storage,
    Profiles,
    Autonomous,
    AiIntent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SideEffect {
    ReadOnly,
    Mutating,
    Destructive,
}

/// Static catalog entry (spec.md §4.4: "name, inputSchema, capability,
/// sideEffect"). `input_schema` is a function pointer rather than a stored
/// value so the schema is generated lazily (and only once, by the
/// `/openapi` handler) rather than on every registry construction.
pub struct ToolSpec {
    pub name: &'static str,
    pub capability: Capability,
    pub side_effect: SideEffect,
    pub input_schema: fn() -> serde_json::Value,
}

macro_rules! tool_catalog {
    ($( $name:literal => ($cap:ident, $effect:ident, $schema:ty) ),+ $(,)?) => {
        #[must_use]
        pub fn registry() -> Vec<ToolSpec> {
            vec![$(
                ToolSpec {
                    name: $name,
                    capability: Capability::$cap,
                    side_effect: SideEffect::$effect,
                    input_schema: || serde_json::to_value(schemars::schema_for!($schema)).unwrap_or_default(),
                },
            )+]
        }

        #[must_use]
        pub fn is_known_tool(name: &str) -> bool {
            matches!(name, $($name)|+)
        }
    };
}

tool_catalog! {
    "browser_navigate" => (Navigate, Mutating, navigate::NavigateArgs),
    "browser_navigate_back" => (Navigate, Mutating, navigate::NoArgs),
    "browser_navigate_forward" => (Navigate, Mutating, navigate::NoArgs),
    "browser_click" => (Interact, Mutating, interact::RefArgs),
    "browser_type" => (Interact, Mutating, interact::TypeArgs),
    "browser_hover" => (Interact, Mutating, interact::RefArgs),
    "browser_drag" => (Interact, Mutating, interact::DragArgs),
    "browser_press_key" => (Interact, Mutating, interact::PressKeyArgs),
    "browser_scroll" => (Interact, Mutating, interact::ScrollArgs),
    "browser_scroll_to_element" => (Interact, Mutating, interact::RefArgs),
    "browser_emulate_media" => (Interact, Mutating, interact::EmulateMediaArgs),
    "browser_emulate_geolocation" => (Interact, Mutating, interact::EmulateGeolocationArgs),
    "browser_emulate_timezone" => (Interact, Mutating, interact::EmulateTimezoneArgs),
    "browser_clock_install" => (Interact, Mutating, navigate::NoArgs),
    "browser_clock_fast_forward" => (Interact, Mutating, interact::ClockFastForwardArgs),
    "browser_clock_pause" => (Interact, Mutating, navigate::NoArgs),
    "browser_clock_resume" => (Interact, Mutating, navigate::NoArgs),
    "browser_clock_set_fixed_time" => (Interact, Mutating, interact::ClockSetFixedTimeArgs),
    "browser_take_screenshot" => (Capture, ReadOnly, capture::ScreenshotArgs),
    "browser_snapshot" => (Capture, ReadOnly, navigate::NoArgs),
    "browser_pdf_save" => (Capture, ReadOnly, capture::PdfSaveArgs),
    "browser_tab_list" => (Tabs, ReadOnly, navigate::NoArgs),
    "browser_tab_new" => (Tabs, Mutating, tabs::TabNewArgs),
    "browser_tab_select" => (Tabs, Mutating, tabs::TabIndexArgs),
    "browser_tab_close" => (Tabs, Destructive, tabs::TabCloseArgs),
    "browser_wait" => (Wait, ReadOnly, wait::WaitArgs),
    "browser_wait_for_text" => (Testing, ReadOnly, wait::WaitForTextArgs),
    "browser_console_messages" => (Diagnostics, ReadOnly, navigate::NoArgs),
    "browser_console_filtered" => (Diagnostics, ReadOnly, diagnostics::ConsoleFilteredArgs),
    "browser_network_requests" => (Diagnostics, ReadOnly, navigate::NoArgs),
    "browser_performance_metrics" => (Diagnostics, ReadOnly, navigate::NoArgs),
    "browser_save_storage_state" => (Storage, Mutating, storage::SaveStorageStateArgs),
    "browser_get_cookies" => (Storage, ReadOnly, navigate::NoArgs),
    "browser_set_cookie" => (Storage, Mutating, storage::SetCookieArgs),
    "browser_clear_cookies" => (Storage, Destructive, navigate::NoArgs),
    "browser_get_local_storage" => (Storage, ReadOnly, navigate::NoArgs),
    "browser_set_local_storage" => (Storage, Mutating, storage::SetLocalStorageArgs),
    "browser_save_profile" => (Profiles, Mutating, profiles::SaveProfileArgs),
    "browser_switch_profile" => (Profiles, Mutating, profiles::NameArgs),
    "browser_list_profiles" => (Profiles, ReadOnly, navigate::NoArgs),
    "browser_delete_profile" => (Profiles, Destructive, profiles::NameArgs),
    "browser_execute_intent" => (AiIntent, Mutating, ai_intent::ExecuteIntentArgs),
    "browser_execute_workflow" => (AiIntent, Mutating, ai_intent::ExecuteWorkflowArgs),
    "browser_analyze_context" => (AiIntent, ReadOnly, navigate::NoArgs),
    "browser_start_autonomous_crawl" => (Autonomous, Mutating, autonomous::StartCrawlArgs),
    "browser_configure_memory" => (Autonomous, Mutating, autonomous::ConfigureMemoryArgs),
    "browser_crawl_status" => (Autonomous, ReadOnly, navigate::NoArgs),
    "browser_cancel_crawl" => (Autonomous, Destructive, navigate::NoArgs),
    "browser_file_upload" => (Interact, Mutating, misc::FileUploadArgs),
    "browser_file_download" => (Capture, ReadOnly, misc::FileDownloadArgs),
    "browser_handle_dialog" => (Interact, Mutating, misc::HandleDialogArgs),
    "browser_install" => (Diagnostics, Mutating, navigate::NoArgs),
}

/// A handler's raw result before the dispatcher applies the post-call
/// snapshot-refresh / network-idle steps (spec.md §4.4 steps 4-6).
pub struct ToolResult {
    pub codes: Vec<String>,
    pub content: Vec<serde_json::Value>,
    pub capture_snapshot: bool,
    pub wait_for_network: bool,
}

impl ToolResult {
    #[must_use]
    pub fn ok(content: Vec<serde_json::Value>) -> Self {
        Self { codes: vec!["ok".to_string()], content, capture_snapshot: false, wait_for_network: false }
    }

    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::ok(vec![serde_json::json!({"type": "text", "text": text.into()})])
    }

    #[must_use]
    pub fn json(value: serde_json::Value) -> Self {
        Self::ok(vec![serde_json::json!({"type": "json", "json": value})])
    }

    #[must_use]
    pub fn capture_snapshot(mut self) -> Self {
        self.capture_snapshot = true;
        self
    }

    #[must_use]
    pub fn wait_for_network(mut self) -> Self {
        self.wait_for_network = true;
        self
    }
}

/// Resources shared across every tool call (spec.md §9 "explicit config, no
/// global state" — one instance built in the composition root, threaded
/// into the transport layer, never a process-wide singleton).
pub struct ToolContext {
    pub session_manager: Arc<SessionManager>,
    pub state_store: Arc<SessionStateStore>,
    pub peer_sync: Arc<PeerSyncService>,
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub event_bus: Option<Arc<CrawlEventBus>>,
    /// At most one active crawl per broker session (spec.md §3 "CrawlSession").
    pub crawls: DashMap<Uuid, CrawlHandle>,
    pub memory: RwLock<Arc<dyn MemoryBackend>>,
    pub edge_profile: Option<String>,
    pub image_responses: ImageResponses,
}

impl ToolContext {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_manager: Arc<SessionManager>,
        state_store: Arc<SessionStateStore>,
        peer_sync: Arc<PeerSyncService>,
        data_dir: PathBuf,
        output_dir: PathBuf,
        event_bus: Option<Arc<CrawlEventBus>>,
        edge_profile: Option<String>,
        image_responses: ImageResponses,
    ) -> Self {
        let memory_dir = data_dir.join("memory");
        const DEFAULT_MAX_MEMORY_STATES: usize = 500;
        Self {
            session_manager,
            state_store,
            peer_sync,
            data_dir,
            output_dir,
            event_bus,
            crawls: DashMap::new(),
            memory: RwLock::new(Arc::new(LocalMemoryStore::new(memory_dir, DEFAULT_MAX_MEMORY_STATES))),
            edge_profile,
            image_responses,
        }
    }
}

use crate::session::SessionManager;

/// Dispatch flow (spec.md §4.4):
/// 1. Resolve tool by name — `Unknown` if absent (checked by the caller via
///    `is_known_tool` before ever reaching here, but re-checked below as a
///    defense-in-depth boundary).
/// 2. Each handler validates its own input via `serde_json::from_value`,
///    returning `BadInput` on a schema mismatch.
/// 3. Ref-taking handlers resolve through the tab's snapshot registry,
///    returning `RefStale` on a version mismatch.
/// 4. The handler calls the driver façade and returns a `ToolResult`.
/// 5. If `capture_snapshot` is set, the tab's snapshot is refreshed.
/// 6. If `wait_for_network` is set, the tab awaits network idle (bounded).
pub async fn dispatch(
    ctx: &ToolContext,
    session: &Arc<Session>,
    name: &str,
    args: serde_json::Value,
) -> Result<ToolResult, BrokerError> {
    session.touch();
    let _guard = session.dispatch_lock.lock().await;

    let result = match name {
        "browser_navigate" => navigate::navigate(session, args).await,
        "browser_navigate_back" => navigate::navigate_back(session).await,
        "browser_navigate_forward" => navigate::navigate_forward(session).await,

        "browser_click" => interact::click(session, args).await,
        "browser_type" => interact::type_text(session, args).await,
        "browser_hover" => interact::hover(session, args).await,
        "browser_drag" => interact::drag(session, args).await,
        "browser_press_key" => interact::press_key(session, args).await,
        "browser_scroll" => interact::scroll(session, args).await,
        "browser_scroll_to_element" => interact::scroll_to_element(session, args).await,
        "browser_emulate_media" => interact::emulate_media(session, args).await,
        "browser_emulate_geolocation" => interact::emulate_geolocation(session, args).await,
        "browser_emulate_timezone" => interact::emulate_timezone(session, args).await,
        "browser_clock_install" => interact::clock_install(session).await,
        "browser_clock_fast_forward" => interact::clock_fast_forward(session, args).await,
        "browser_clock_pause" => interact::clock_pause(session).await,
        "browser_clock_resume" => interact::clock_resume(session).await,
        "browser_clock_set_fixed_time" => interact::clock_set_fixed_time(session, args).await,

        "browser_take_screenshot" => capture::take_screenshot(ctx, session, args).await,
        "browser_snapshot" => capture::snapshot(session).await,
        "browser_pdf_save" => capture::pdf_save(ctx, session, args).await,

        "browser_tab_list" => tabs::list(session).await,
        "browser_tab_new" => tabs::new_tab(session, args).await,
        "browser_tab_select" => tabs::select(session, args).await,
        "browser_tab_close" => tabs::close(session, args).await,

        "browser_wait" => wait::wait(args).await,
        "browser_wait_for_text" => wait::wait_for_text(session, args).await,

        "browser_console_messages" => diagnostics::console_messages(session).await,
        "browser_console_filtered" => diagnostics::console_filtered(session, args).await,
        "browser_network_requests" => diagnostics::network_requests(session).await,
        "browser_performance_metrics" => diagnostics::performance_metrics(session).await,

        "browser_save_storage_state" => storage::save_storage_state(ctx, session, args).await,
        "browser_get_cookies" => storage::get_cookies(session).await,
        "browser_set_cookie" => storage::set_cookie(session, args).await,
        "browser_clear_cookies" => storage::clear_cookies(session).await,
        "browser_get_local_storage" => storage::get_local_storage(session).await,
        "browser_set_local_storage" => storage::set_local_storage(session, args).await,

        "browser_save_profile" => profiles::save_profile(ctx, session, args).await,
        "browser_switch_profile" => profiles::switch_profile(ctx, session, args).await,
        "browser_list_profiles" => profiles::list_profiles(ctx).await,
        "browser_delete_profile" => profiles::delete_profile(ctx, args).await,

        "browser_execute_intent" => ai_intent::execute_intent(args),
        "browser_execute_workflow" => ai_intent::execute_workflow(args),
        "browser_analyze_context" => ai_intent::analyze_context(session).await,

        "browser_start_autonomous_crawl" => autonomous::start_crawl(ctx, session, args).await,
        "browser_configure_memory" => autonomous::configure_memory(ctx, args).await,
        "browser_crawl_status" => autonomous::crawl_status(ctx, session).await,
        "browser_cancel_crawl" => autonomous::cancel_crawl(ctx, session).await,

        "browser_file_upload" => misc::file_upload(session, args).await,
        "browser_file_download" => misc::file_download(session, args).await,
        "browser_handle_dialog" => misc::handle_dialog(session, args).await,
        "browser_install" => misc::install(),

        other => Err(BrokerError::Unknown(other.to_string())),
    }?;

    if result.capture_snapshot {
        let idx = session.current_tab_index();
        let mut tabs = session.tabs().await;
        if let Some(tab) = tabs.get_mut(idx) {
            if let Err(e) = tab.recapture_snapshot().await {
                tracing::warn!(error = %e, "post-action snapshot refresh failed");
            }
        }
    }

    if result.wait_for_network {
        let idx = session.current_tab_index();
        let tabs = session.tabs().await;
        if let Some(tab) = tabs.get(idx) {
            if let Err(e) = tab
                .page
                .wait_for_network_idle(Duration::from_millis(DEFAULT_NETWORK_IDLE_TIMEOUT_MS))
                .await
            {
                tracing::debug!(error = %e, "wait_for_network_idle timed out");
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_every_normative_tool_name() {
        let names: std::collections::HashSet<&str> = registry().iter().map(|t| t.name).collect();
        for expected in [
            "browser_navigate",
            "browser_click",
            "browser_type",
            "browser_snapshot",
            "browser_take_screenshot",
            "browser_pdf_save",
            "browser_tab_new",
            "browser_wait",
            "browser_console_messages",
            "browser_save_storage_state",
            "browser_save_profile",
            "browser_execute_intent",
            "browser_start_autonomous_crawl",
            "browser_configure_memory",
        ] {
            assert!(names.contains(expected), "registry missing {expected}");
        }
        assert!(names.len() >= 45);
    }

    #[test]
    fn is_known_tool_matches_registry_exactly() {
        let registered: std::collections::HashSet<&str> = registry().iter().map(|t| t.name).collect();
        for name in &registered {
            assert!(is_known_tool(name));
        }
        assert!(!is_known_tool("browser_does_not_exist"));
    }

    #[test]
    fn every_schema_generates_valid_json() {
        for spec in registry() {
            let schema = (spec.input_schema)();
            assert!(schema.is_object(), "{} schema did not serialize to an object", spec.name);
        }
    }
}
