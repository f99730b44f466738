//! Peer-sync HTTP surface (spec.md §4.7): `/sync/index`, session
//! pull/push, plus operator endpoints to register/list/deregister peers
//! (spec.md §3 "PeerNode: Registered manually; de-registered manually").
//! Grounded on `groblegark-coop/crates/mux/src/transport/http.rs`'s
//! register/list/deregister CRUD triad, generalized from coop sessions to
//! `PeerNode`s.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::errors::BrokerError;
use crate::peer_sync::{NodeId, PeerAuthMethod, PeerNode, SyncArchive};

use super::AppState;

/// `GET /sync/index`: this node's advertisement of locally-saved sessions.
pub async fn index(State(state): State<Arc<AppState>>) -> axum::response::Response {
    match state.peer_sync.local_index().await {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => e.into_response(),
    }
}

/// `GET /sync/sessions/:name`: downloads one session archive for a peer to
/// pull, including its checksum for the receiver to verify.
pub async fn pull_session(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> axum::response::Response {
    match state.peer_sync.export_archive(&name).await {
        Ok(archive) => Json(archive).into_response(),
        Err(e) => e.into_response(),
    }
}

/// `POST /sync/sessions`: accepts an uploaded archive, verifying checksum
/// and applying `(version, lastModified)` conflict resolution (spec.md §8
/// "Checksum integrity").
pub async fn push_session(
    State(state): State<Arc<AppState>>,
    Json(archive): Json<SyncArchive>,
) -> axum::response::Response {
    match state.peer_sync.accept_upload(archive).await {
        Ok(meta) => Json(meta).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterPeerRequest {
    pub url: String,
    #[serde(default)]
    pub auth_method: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
}

/// `POST /peers`: manual peer registration (spec.md §3 "PeerNode ...
/// Registered manually").
pub async fn register_peer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterPeerRequest>,
) -> axum::response::Response {
    let auth_method = match req.auth_method.as_deref() {
        Some("bearer") => PeerAuthMethod::Bearer,
        Some("shared_secret") => PeerAuthMethod::SharedSecret,
        _ => PeerAuthMethod::None,
    };
    let id = NodeId(uuid::Uuid::new_v4());
    let peer = PeerNode::new(id, req.url, auth_method, req.auth_token);
    state.peer_sync.register_peer(peer.clone()).await;
    Json(peer).into_response()
}

/// `GET /peers`: lists manually-registered peers with their last-seen
/// status.
pub async fn list_peers(State(state): State<Arc<AppState>>) -> axum::response::Response {
    Json(state.peer_sync.peers().await).into_response()
}

/// `DELETE /peers/:id`: manual deregistration.
pub async fn deregister_peer(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> axum::response::Response {
    let Ok(uuid) = uuid::Uuid::parse_str(&id) else {
        return BrokerError::BadInput(format!("invalid peer id: {id}")).into_response();
    };
    state.peer_sync.deregister_peer(NodeId(uuid)).await;
    axum::http::StatusCode::NO_CONTENT.into_response()
}
