//! Transport: two wire shapes on one listener (spec.md §2 "Transport",
//! §4.1), plus health/introspection and the OAuth proxy. Grounded on
//! `groblegark-coop/crates/mux/src/transport/mod.rs`'s router-assembly shape
//! (routes layered under one `CorsLayer`/auth `middleware::from_fn`) and
//! `.../main.rs`'s bind-and-serve wiring, generalized from mux's
//! WebSocket-bridge surface to the broker's RPC + legacy-SSE surface.

mod events;
mod health;
mod openapi;
pub mod port;
mod rpc;
mod sync;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::auth::{AuthConfig, OAuthProxyState};
use crate::crawl_events::CrawlEventBus;
use crate::peer_sync::{NodeId, PeerSyncService};
use crate::session::SessionManager;
use crate::tools::ToolContext;

/// Everything a request handler needs, built once in the composition root
/// (spec.md §9 "Global state → explicit config": no process-wide statics).
pub struct AppState {
    pub session_manager: Arc<SessionManager>,
    pub tool_ctx: Arc<ToolContext>,
    pub auth_config: AuthConfig,
    pub oauth: Option<Arc<OAuthProxyState>>,
    pub peer_sync: Arc<PeerSyncService>,
    pub event_bus: Arc<CrawlEventBus>,
    pub node_id: NodeId,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub data_dir: PathBuf,
    /// Per-session notification fan-out for the legacy `/events` channel
    /// (spec.md §4.1 "legacy one-way event stream"). Lazily created on
    /// first subscriber/publisher for a given session id.
    notifications: DashMap<Uuid, broadcast::Sender<serde_json::Value>>,
}

impl AppState {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_manager: Arc<SessionManager>,
        tool_ctx: Arc<ToolContext>,
        auth_config: AuthConfig,
        oauth: Option<Arc<OAuthProxyState>>,
        peer_sync: Arc<PeerSyncService>,
        event_bus: Arc<CrawlEventBus>,
        node_id: NodeId,
        data_dir: PathBuf,
    ) -> Self {
        Self {
            session_manager,
            tool_ctx,
            auth_config,
            oauth,
            peer_sync,
            event_bus,
            node_id,
            started_at: chrono::Utc::now(),
            data_dir,
            notifications: DashMap::new(),
        }
    }

    /// Channel used to push notifications to a session's `GET /events`
    /// subscriber(s); created on demand.
    fn notify_channel(&self, session_id: Uuid) -> broadcast::Sender<serde_json::Value> {
        self.notifications
            .entry(session_id)
            .or_insert_with(|| broadcast::channel(64).0)
            .clone()
    }

    pub fn notify(&self, session_id: Uuid, payload: serde_json::Value) {
        if let Some(tx) = self.notifications.get(&session_id) {
            let _ = tx.send(payload);
        }
    }
}

/// Assembles the full axum `Router`: primary RPC channel, legacy SSE
/// channel, health/introspection, peer-sync, and the OAuth proxy — all
/// under one permissive CORS layer (spec.md §4.1: "CORS is permissive;
/// `OPTIONS` returns 204").
pub fn build_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/rpc", axum::routing::post(rpc::rpc_post))
        .route("/events", axum::routing::get(events::events_get).post(events::events_post))
        .route("/health", axum::routing::get(health::health))
        .route("/ready", axum::routing::get(health::ready))
        .route("/live", axum::routing::get(health::live))
        .route("/openapi", axum::routing::get(openapi::openapi))
        .route("/sync/index", axum::routing::get(sync::index))
        .route("/sync/sessions/{name}", axum::routing::get(sync::pull_session))
        .route("/sync/sessions", axum::routing::post(sync::push_session))
        .route("/peers", axum::routing::get(sync::list_peers).post(sync::register_peer))
        .route("/peers/{id}", axum::routing::delete(sync::deregister_peer))
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    if let Some(oauth) = &state.oauth {
        router = router.merge(crate::auth::oauth_router(oauth.clone()));
    }

    router
}

/// Trivial struct-of-strings helper used by a couple of handlers to avoid
/// repeating `HashMap<String, String>` extractor types inline.
pub(crate) type QueryParams = HashMap<String, String>;
