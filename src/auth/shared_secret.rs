//! Shared-secret auth (spec.md §4.2 method 4): a pre-shared API key sent
//! in the `x-api-key` header, checked against the configured key set.
//! Grounded directly on `groblegark-coop/crates/mux/src/transport/
//! auth.rs`'s `constant_time_eq`, to avoid timing side-channels on key
//! comparison.

use axum::http::HeaderMap;

use super::{AuthConfig, AuthMethod, Principal};

const API_KEY_HEADER: &str = "x-api-key";

fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

pub fn try_shared_secret(headers: &HeaderMap, config: &AuthConfig) -> Option<Principal> {
    let presented = headers.get(API_KEY_HEADER)?.to_str().ok()?;
    let matched = config.api_keys.iter().any(|key| constant_time_eq(presented, key));
    if !matched {
        return None;
    }

    Some(Principal {
        method: AuthMethod::SharedSecret,
        subject: "shared-secret".to_string(),
        tenant: None,
        roles: Vec::new(),
        scopes: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config() -> AuthConfig {
        AuthConfig {
            tunnel_auth_enabled: false,
            tunnel_allowed_domains: vec![],
            trust_proxy: false,
            entra_auth_enabled: false,
            azure_tenant_id: None,
            azure_client_id: None,
            azure_client_secret: None,
            api_key_auth_enabled: true,
            api_keys: vec!["correct-horse-battery-staple".to_string()],
            managed_identity_enabled: false,
            azure_key_vault_url: None,
            allow_anonymous_access: false,
            required_roles: vec![],
        }
    }

    #[test]
    fn succeeds_with_matching_key() {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("correct-horse-battery-staple"));
        assert!(try_shared_secret(&headers, &config()).is_some());
    }

    #[test]
    fn fails_with_wrong_key() {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("wrong-key"));
        assert!(try_shared_secret(&headers, &config()).is_none());
    }

    #[test]
    fn fails_with_missing_header() {
        assert!(try_shared_secret(&HeaderMap::new(), &config()).is_none());
    }

    #[test]
    fn rejects_keys_of_different_length_without_panic() {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("short"));
        assert!(try_shared_secret(&headers, &config()).is_none());
    }
}
