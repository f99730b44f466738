//! Legacy one-way event stream (spec.md §2 "Transport", §4.1): `GET
//! /events` opens a server-push stream, a sibling `POST /events` delivers
//! client messages. Unlike the primary `/rpc` channel, an unknown session
//! id here is a hard 404 — spec.md §9 Open Question #2 mandates the two
//! transports diverge on exactly this point.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth;
use crate::errors::BrokerError;

use super::AppState;

fn session_id_from(headers: &HeaderMap, query: &super::QueryParams) -> Option<Uuid> {
    headers
        .get("x-session-id")
        .and_then(|v| v.to_str().ok())
        .or_else(|| query.get("sessionId").map(String::as_str))
        .and_then(|s| Uuid::parse_str(s).ok())
}

/// `GET /events`: subscribes to the session's notification channel and the
/// broker-wide crawl event bus, re-emitted as SSE `message`/`crawl` events.
pub async fn events_get(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<super::QueryParams>,
) -> axum::response::Response {
    let principal = match auth::authenticate(&headers, &state.auth_config).await {
        Ok(p) => p,
        Err(e) => return e.into_response(),
    };
    if let Err(e) = auth::role_gate(&principal, &state.auth_config.required_roles) {
        return e.into_response();
    }

    let Some(session_id) = session_id_from(&headers, &query) else {
        return BrokerError::BadInput("missing x-session-id header or sessionId query param".to_string())
            .into_response();
    };
    // Legacy transport: unknown session id is a 404, never a silent create.
    if state.session_manager.get(session_id).await.is_none() {
        return (axum::http::StatusCode::NOT_FOUND, Json(serde_json::json!({"error": "unknown session"})))
            .into_response();
    }

    let notify_rx = state.notify_channel(session_id).subscribe();
    let crawl_rx = state.event_bus.subscribe();

    let notify_stream = stream::unfold(notify_rx, |mut rx| async move {
        match rx.recv().await {
            Ok(payload) => Some((
                Ok::<_, Infallible>(Event::default().event("message").data(payload.to_string())),
                rx,
            )),
            Err(tokio::sync::broadcast::error::RecvError::Closed) => None,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {
                Some((Ok(Event::default().event("message").data("{\"dropped\":true}")), rx))
            }
        }
    });
    let crawl_stream = stream::unfold(crawl_rx, |mut rx| async move {
        match rx.recv().await {
            Ok(event) => {
                let data = serde_json::to_string(&event).unwrap_or_default();
                Some((Ok::<_, Infallible>(Event::default().event("crawl").data(data)), rx))
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => None,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {
                Some((Ok(Event::default().event("crawl").data("{\"dropped\":true}")), rx))
            }
        }
    });

    let merged: std::pin::Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>> =
        Box::pin(stream::select(notify_stream, crawl_stream));

    Sse::new(merged).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))).into_response()
}

#[derive(Debug, Deserialize)]
struct EventsPostBody {
    tool: String,
    #[serde(default)]
    args: serde_json::Value,
}

/// `POST /events`: delivers one client message against an already-open
/// session. Results are returned inline for convenience *and* published to
/// the session's notification channel so a concurrent `GET /events`
/// subscriber observes the same outcome.
pub async fn events_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<super::QueryParams>,
    Json(body): Json<EventsPostBody>,
) -> axum::response::Response {
    let principal = match auth::authenticate(&headers, &state.auth_config).await {
        Ok(p) => p,
        Err(e) => return e.into_response(),
    };
    if let Err(e) = auth::role_gate(&principal, &state.auth_config.required_roles) {
        return e.into_response();
    }

    let Some(session_id) = session_id_from(&headers, &query) else {
        return BrokerError::BadInput("missing x-session-id header or sessionId query param".to_string())
            .into_response();
    };
    let Some(session) = state.session_manager.get(session_id).await else {
        return (axum::http::StatusCode::NOT_FOUND, Json(serde_json::json!({"error": "unknown session"})))
            .into_response();
    };

    if !crate::tools::is_known_tool(&body.tool) {
        return BrokerError::Unknown(body.tool).into_response();
    }

    let notify = |payload: serde_json::Value| state.notify(session_id, payload);
    match crate::tools::dispatch(&state.tool_ctx, &session, &body.tool, body.args).await {
        Ok(r) => {
            notify(serde_json::json!({"tool": "result", "content": r.content}));
            (axum::http::StatusCode::ACCEPTED, Json(serde_json::json!({"codes": r.codes, "content": r.content})))
                .into_response()
        }
        Err(e) => {
            notify(serde_json::json!({"tool": "error", "error": e.to_error_body()}));
            e.into_response()
        }
    }
}
