//! OAuth proxy (spec.md §4.2 "OAuth proxy" paragraph): exposes
//! `/.well-known/…`, `/authorize`, `/token`, `/register` and forwards them
//! to the configured upstream IdP, brokering dynamic client registration
//! rather than issuing tokens itself. Grounded on
//! `groblegark-coop/crates/mux/src/transport/http.rs`'s axum
//! handler/state shape and `.../credential/oauth.rs`'s token-response
//! types, generalized from "mux proxies session requests" to "broker
//! proxies IdP endpoints and mints DCR records".

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A pre-seeded client known to the broker without going through dynamic
/// registration: the broker's own first-party client, plus a small set of
/// trusted redirect URIs (spec.md: "Static clients ... are pre-seeded").
#[derive(Debug, Clone)]
pub struct StaticClient {
    pub client_id: String,
    pub redirect_uris: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
struct ClientRecord {
    client_id: String,
    client_secret: String,
    client_name: String,
    redirect_uris: Vec<String>,
}

/// Shared state for the OAuth proxy router.
pub struct OAuthProxyState {
    pub server_base_url: String,
    pub upstream_authorize_url: String,
    pub upstream_token_url: String,
    pub upstream_jwks_url: String,
    pub upstream_client_secret: Option<String>,
    /// DCR-minted clients, keyed by the freshly assigned `client_id`. Lost
    /// on restart by design: dynamic registrations are expected to be
    /// re-issued by callers rather than survive broker restarts.
    clients: RwLock<HashMap<String, ClientRecord>>,
    http: reqwest::Client,
}

impl OAuthProxyState {
    #[must_use]
    pub fn new(
        server_base_url: String,
        tenant_id: &str,
        client_secret: Option<String>,
        static_clients: Vec<StaticClient>,
    ) -> Arc<Self> {
        let mut clients = HashMap::new();
        for sc in static_clients {
            clients.insert(
                sc.client_id.clone(),
                ClientRecord {
                    client_id: sc.client_id,
                    client_secret: client_secret.clone().unwrap_or_default(),
                    client_name: "static".to_string(),
                    redirect_uris: sc.redirect_uris,
                },
            );
        }
        Arc::new(Self {
            server_base_url,
            upstream_authorize_url: format!("https://login.microsoftonline.com/{tenant_id}/oauth2/v2.0/authorize"),
            upstream_token_url: format!("https://login.microsoftonline.com/{tenant_id}/oauth2/v2.0/token"),
            upstream_jwks_url: format!("https://login.microsoftonline.com/{tenant_id}/discovery/v2.0/keys"),
            upstream_client_secret: client_secret,
            clients: RwLock::new(clients),
            http: reqwest::Client::new(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    client_name: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

#[derive(Debug, Serialize)]
struct RegisterResponse {
    client_id: String,
    client_secret: String,
    client_name: String,
    redirect_uris: Vec<String>,
}

/// `POST /register` — dynamic client registration (spec.md: "assigns a
/// fresh client id, reuses the broker's own IdP secret for downstream
/// exchange, and persists the record in an in-memory store").
async fn register(
    State(state): State<Arc<OAuthProxyState>>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    let client_id = format!("dcr-{}", Uuid::new_v4());
    let secret = state.upstream_client_secret.clone().unwrap_or_default();
    let record = ClientRecord {
        client_id: client_id.clone(),
        client_secret: secret.clone(),
        client_name: req.client_name.clone(),
        redirect_uris: req.redirect_uris.clone(),
    };
    state.clients.write().insert(client_id.clone(), record);

    (
        StatusCode::CREATED,
        Json(RegisterResponse {
            client_id,
            client_secret: secret,
            client_name: req.client_name,
            redirect_uris: req.redirect_uris,
        }),
    )
}

/// `GET /authorize` — redirects to the upstream IdP, preserving query
/// params verbatim. Local PKCE validation is intentionally skipped
/// (spec.md: "the IdP enforces it").
async fn authorize(
    State(state): State<Arc<OAuthProxyState>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencode(k), urlencode(v)))
        .collect::<Vec<_>>()
        .join("&");
    Redirect::temporary(&format!("{}?{query}", state.upstream_authorize_url))
}

fn urlencode(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' => c.to_string(),
            _ => format!("%{:02X}", c as u8),
        })
        .collect()
}

/// `POST /token` — forwards the token request to the upstream IdP
/// unchanged, passing through its response body and status.
async fn token(
    State(state): State<Arc<OAuthProxyState>>,
    axum::extract::Form(params): axum::extract::Form<HashMap<String, String>>,
) -> impl IntoResponse {
    let response = match state.http.post(&state.upstream_token_url).form(&params).send().await {
        Ok(r) => r,
        Err(e) => {
            return (StatusCode::BAD_GATEWAY, Json(serde_json::json!({"error": format!("{e}")})))
                .into_response();
        }
    };
    let status = StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    match response.json::<serde_json::Value>().await {
        Ok(body) => (status, Json(body)).into_response(),
        Err(_) => status.into_response(),
    }
}

/// `GET /.well-known/oauth-authorization-server` — metadata document
/// pointing at this proxy's own endpoints, per spec.md's `SERVER_BASE_URL`
/// env var ("Published external URL (used in OAuth metadata)").
async fn well_known_metadata(State(state): State<Arc<OAuthProxyState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "issuer": state.server_base_url,
        "authorization_endpoint": format!("{}/authorize", state.server_base_url),
        "token_endpoint": format!("{}/token", state.server_base_url),
        "registration_endpoint": format!("{}/register", state.server_base_url),
        "jwks_uri": state.upstream_jwks_url,
        "response_types_supported": ["code"],
        "grant_types_supported": ["authorization_code", "refresh_token"],
        "token_endpoint_auth_methods_supported": ["client_secret_post", "none"],
        "code_challenge_methods_supported": ["S256"],
    }))
}

pub fn oauth_router(state: Arc<OAuthProxyState>) -> Router {
    Router::new()
        .route("/.well-known/oauth-authorization-server", get(well_known_metadata))
        .route("/authorize", get(authorize))
        .route("/token", post(token))
        .route("/register", post(register))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> Arc<OAuthProxyState> {
        OAuthProxyState::new(
            "https://broker.example.com".to_string(),
            "test-tenant",
            Some("upstream-secret".to_string()),
            vec![StaticClient {
                client_id: "broker-self".to_string(),
                redirect_uris: vec!["http://127.0.0.1/callback".to_string()],
            }],
        )
    }

    #[test]
    fn static_client_is_pre_seeded() {
        let s = state();
        let clients = s.clients.read();
        assert!(clients.contains_key("broker-self"));
        assert_eq!(clients["broker-self"].client_secret, "upstream-secret");
    }

    #[tokio::test]
    async fn dynamic_registration_mints_fresh_client_id_and_reuses_secret() {
        let s = state();
        let resp = register(
            State(s.clone()),
            Json(RegisterRequest {
                client_name: "X".to_string(),
                redirect_uris: vec!["http://127.0.0.1/callback".to_string()],
            }),
        )
        .await
        .into_response();
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(s.clients.read().len(), 2);
    }
}
