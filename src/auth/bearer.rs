//! Bearer JWT auth against an upstream Entra-shaped IdP (spec.md §4.2
//! method 2). Grounded on `groblegark-coop/crates/mux/src/credential/
//! oauth.rs`'s token-response shapes and `.../broker.rs`'s exchange-flow
//! idiom, generalized from "broker mints its own token" to "broker
//! validates a caller-supplied token against the upstream IdP's JWKS".

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::HeaderMap;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{AuthConfig, AuthMethod, Principal};

#[derive(Debug, Clone, Deserialize)]
struct JwksKey {
    kid: String,
    n: String,
    e: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwks {
    keys: Vec<JwksKey>,
}

struct CachedJwks {
    jwks: Jwks,
    fetched_at: Instant,
}

/// JWKS documents change rarely; refetch at most once an hour per tenant,
/// keyed the same way `groblegark-coop`'s credential cache keys by client.
static JWKS_CACHE: Lazy<RwLock<HashMap<String, Arc<CachedJwks>>>> = Lazy::new(|| RwLock::new(HashMap::new()));

const JWKS_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Deserialize)]
struct Claims {
    sub: Option<String>,
    oid: Option<String>,
    tid: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    scp: Option<String>,
}

async fn fetch_jwks(tenant_id: &str) -> anyhow::Result<Arc<CachedJwks>> {
    {
        let cache = JWKS_CACHE.read().await;
        if let Some(entry) = cache.get(tenant_id) {
            if entry.fetched_at.elapsed() < JWKS_TTL {
                return Ok(entry.clone());
            }
        }
    }

    let url = format!("https://login.microsoftonline.com/{tenant_id}/discovery/v2.0/keys");
    let jwks: Jwks = reqwest::get(&url).await?.json().await?;
    let entry = Arc::new(CachedJwks { jwks, fetched_at: Instant::now() });
    JWKS_CACHE.write().await.insert(tenant_id.to_string(), entry.clone());
    Ok(entry)
}

/// spec.md §4.2: "accept known benign error codes (consent, audience) as
/// proof of signature validity; reject otherwise". The on-behalf-of
/// exchange is only attempted when a client secret is configured; its
/// result never overrides a failed local JWKS validation, only serves as
/// extra corroboration when local validation passed.
async fn on_behalf_of_corroborates(
    tenant_id: &str,
    client_id: &str,
    client_secret: &str,
    assertion: &str,
) -> bool {
    const BENIGN_ERROR_CODES: &[&str] = &["consent_required", "invalid_audience", "interaction_required"];

    let url = format!("https://login.microsoftonline.com/{tenant_id}/oauth2/v2.0/token");
    let body = [
        ("client_id", client_id),
        ("client_secret", client_secret),
        ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
        ("assertion", assertion),
        ("requested_token_use", "on_behalf_of"),
        ("scope", "https://graph.microsoft.com/.default"),
    ];
    let client = reqwest::Client::new();
    let Ok(resp) = client.post(&url).form(&body).send().await else {
        return false;
    };
    if resp.status().is_success() {
        return true;
    }
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<String>,
    }
    let Ok(parsed) = resp.json::<ErrorBody>().await else {
        return false;
    };
    parsed.error.as_deref().is_some_and(|code| BENIGN_ERROR_CODES.contains(&code))
}

pub async fn try_bearer(headers: &HeaderMap, config: &AuthConfig) -> anyhow::Result<Option<Principal>> {
    let Some(header_value) = headers.get("authorization").and_then(|v| v.to_str().ok()) else {
        return Ok(None);
    };
    let Some(token) = header_value.strip_prefix("Bearer ") else {
        return Ok(None);
    };

    let Some(tenant_id) = &config.azure_tenant_id else {
        anyhow::bail!("ENTRA_AUTH_ENABLED but AZURE_TENANT_ID is unset");
    };
    let Some(client_id) = &config.azure_client_id else {
        anyhow::bail!("ENTRA_AUTH_ENABLED but AZURE_CLIENT_ID is unset");
    };

    let header = decode_header(token)?;
    let kid = header.kid.ok_or_else(|| anyhow::anyhow!("JWT missing kid"))?;
    let jwks = fetch_jwks(tenant_id).await?;
    let key = jwks
        .jwks
        .keys
        .iter()
        .find(|k| k.kid == kid)
        .ok_or_else(|| anyhow::anyhow!("no JWKS key matching kid {kid}"))?;
    let decoding_key = DecodingKey::from_rsa_components(&key.n, &key.e)?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_issuer(&[
        format!("https://login.microsoftonline.com/{tenant_id}/v2.0"),
        format!("https://sts.windows.net/{tenant_id}/"),
    ]);
    validation.set_audience(&[client_id.clone(), format!("api://{client_id}")]);

    let decoded = match decode::<Claims>(token, &decoding_key, &validation) {
        Ok(d) => d,
        Err(e) => {
            tracing::debug!(error = %e, "bearer JWT failed local validation");
            return Ok(None);
        }
    };

    if let Some(secret) = &config.azure_client_secret {
        let corroborated = on_behalf_of_corroborates(tenant_id, client_id, secret, token).await;
        if !corroborated {
            tracing::debug!("on-behalf-of exchange neither succeeded nor returned a benign error");
            return Ok(None);
        }
    }

    let claims = decoded.claims;
    let subject = claims.oid.or(claims.sub).ok_or_else(|| anyhow::anyhow!("JWT missing sub/oid"))?;
    let scopes = claims.scp.map(|s| s.split_whitespace().map(str::to_string).collect()).unwrap_or_default();

    Ok(Some(Principal {
        method: AuthMethod::Bearer,
        subject,
        tenant: claims.tid,
        roles: claims.roles,
        scopes,
    }))
}

#[derive(Debug, Clone, Serialize)]
#[allow(dead_code)]
struct JwtBearerAssertionGrant<'a> {
    grant_type: &'a str,
}
