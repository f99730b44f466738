//! Managed identity auth (spec.md §4.2 method 3): the broker itself
//! acquires a token from the ambient platform credential source (an
//! IMDS-style metadata endpoint) to prove it is running under a
//! recognized identity, rather than validating a caller-supplied token.
//! Grounded on `groblegark-coop/crates/mux/src/credential/device_code.rs`'s
//! short poll-and-parse request shape.

use serde::Deserialize;

use super::{AuthConfig, AuthMethod, Principal};

const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const ARM_RESOURCE: &str = "https://management.azure.com/";

#[derive(Debug, Deserialize)]
struct ImdsTokenResponse {
    #[allow(dead_code)]
    access_token: String,
    client_id: Option<String>,
}

/// Attempts to acquire a token from the node's managed identity endpoint.
/// Success proves the *broker process* runs under a managed identity; it
/// says nothing about the caller, so the resulting principal always has an
/// empty role/scope set and callers must rely on `allow_anonymous_access`-
/// style role gating upstream if finer grain is needed.
pub async fn try_managed_identity(config: &AuthConfig) -> anyhow::Result<Option<Principal>> {
    let client = reqwest::Client::new();
    let mut request = client
        .get(IMDS_ENDPOINT)
        .header("Metadata", "true")
        .query(&[("api-version", IMDS_API_VERSION), ("resource", ARM_RESOURCE)]);

    if let Some(vault_url) = &config.azure_key_vault_url {
        request = request.query(&[("resource", vault_url.as_str())]);
    }

    let response = match request.send().await {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!(error = %e, "managed identity endpoint unreachable");
            return Ok(None);
        }
    };

    if !response.status().is_success() {
        tracing::debug!(status = %response.status(), "managed identity token request rejected");
        return Ok(None);
    }

    let body: ImdsTokenResponse = response.json().await?;
    let identity_type = if body.client_id.is_some() { "user-assigned" } else { "system-assigned" };

    Ok(Some(Principal {
        method: AuthMethod::ManagedIdentity,
        subject: body.client_id.unwrap_or_else(|| identity_type.to_string()),
        tenant: None,
        roles: Vec::new(),
        scopes: Vec::new(),
    }))
}
