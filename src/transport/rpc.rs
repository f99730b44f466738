//! Primary bidirectional channel (spec.md §4.1, §6): `POST /rpc`.
//!
//! "Client sends an initialization request via POST; the server allocates
//! a session id (UUID) and returns it in a header; subsequent messages
//! reference that session id. [...] Session ids may be reused across client
//! reconnections; a reconnect with an unknown id silently creates a new one
//! rather than failing." That silent-create rule is `SessionManager::
//! resolve_or_create`, used only by this handler (the legacy `/events`
//! handler deliberately uses plain `get` instead — spec.md §9 Open
//! Question #2).

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth;
use crate::errors::BrokerError;

use super::AppState;

const SESSION_HEADER: &str = "x-session-id";

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RpcMessage {
    /// Opens a new logical conversation; carries no tool call.
    Initialize,
    /// Invokes one registered tool by name (spec.md §4.4 dispatch flow).
    CallTool {
        tool: String,
        #[serde(default)]
        args: serde_json::Value,
    },
    /// Tears the session down explicitly rather than waiting on the idle
    /// sweeper.
    CloseSession,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum RpcResult {
    Ok {
        codes: Vec<String>,
        content: Vec<serde_json::Value>,
    },
    Error {
        error: crate::errors::ErrorBody,
    },
}

#[derive(Debug, Serialize)]
struct RpcResponse {
    #[serde(rename = "sessionId")]
    session_id: Uuid,
    #[serde(flatten)]
    result: RpcResult,
}

fn session_id_header(headers: &HeaderMap) -> Option<Uuid> {
    headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()).and_then(|s| Uuid::parse_str(s).ok())
}

/// `POST /rpc`. Honors `Accept: text/event-stream` by wrapping the same
/// single response as one SSE `message` event, so callers that always
/// drive the channel in "streaming reply" mode (spec.md §4.1) don't need a
/// separate code path for the common non-notifying case.
pub async fn rpc_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(msg): Json<serde_json::Value>,
) -> axum::response::Response {
    let principal = match auth::authenticate(&headers, &state.auth_config).await {
        Ok(p) => p,
        Err(e) => return e.into_response(),
    };
    if let Err(e) = auth::role_gate(&principal, &state.auth_config.required_roles) {
        return e.into_response();
    }

    let message: RpcMessage = match serde_json::from_value(msg) {
        Ok(m) => m,
        Err(e) => return BrokerError::BadInput(e.to_string()).into_response(),
    };

    let existing = session_id_header(&headers);
    let session = match state.session_manager.resolve_or_create(existing).await {
        Ok(s) => s,
        Err(e) => return e.into_response(),
    };
    let session_id = session.id;

    let result = match message {
        RpcMessage::Initialize => {
            RpcResult::Ok { codes: vec!["ok".to_string()], content: vec![serde_json::json!({"sessionId": session_id})] }
        }
        RpcMessage::CloseSession => {
            state.session_manager.close(session_id).await;
            RpcResult::Ok { codes: vec!["ok".to_string()], content: vec![] }
        }
        RpcMessage::CallTool { tool, args } => {
            if !crate::tools::is_known_tool(&tool) {
                RpcResult::Error { error: BrokerError::Unknown(tool).to_error_body() }
            } else {
                match crate::tools::dispatch(&state.tool_ctx, &session, &tool, args).await {
                    Ok(r) => RpcResult::Ok { codes: r.codes, content: r.content },
                    Err(e) => RpcResult::Error { error: e.to_error_body() },
                }
            }
        }
    };

    let response = RpcResponse { session_id, result };

    let wants_sse = headers
        .get(axum::http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("text/event-stream"));

    if wants_sse {
        let payload = serde_json::to_string(&response).unwrap_or_else(|_| "{}".to_string());
        let events = stream::once(async move { Ok::<_, std::convert::Infallible>(Event::default().data(payload)) });
        let mut resp = Sse::new(events).into_response();
        resp.headers_mut().insert(
            SESSION_HEADER,
            HeaderValue::from_str(&session_id.to_string()).unwrap_or(HeaderValue::from_static("invalid")),
        );
        return resp;
    }

    let mut resp = (StatusCode::OK, Json(response)).into_response();
    resp.headers_mut().insert(
        SESSION_HEADER,
        HeaderValue::from_str(&session_id.to_string()).unwrap_or(HeaderValue::from_static("invalid")),
    );
    resp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_message_parses() {
        let v = serde_json::json!({"type": "initialize"});
        let m: RpcMessage = serde_json::from_value(v).unwrap();
        assert!(matches!(m, RpcMessage::Initialize));
    }

    #[test]
    fn call_tool_message_parses() {
        let v = serde_json::json!({"type": "call_tool", "tool": "browser_navigate", "args": {"url": "about:blank"}});
        let m: RpcMessage = serde_json::from_value(v).unwrap();
        assert!(matches!(m, RpcMessage::CallTool { tool, .. } if tool == "browser_navigate"));
    }
}
