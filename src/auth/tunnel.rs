//! Tunnel auth (spec.md §4.2 method 1): request headers indicate it
//! traversed a trusted tunnel (host suffix match against an allow-list)
//! *and* carry an upstream-identity header. Grounded on
//! `groblegark-coop/crates/mux/src/transport/auth.rs`'s header-inspection
//! idiom, generalized from a single bearer comparison to a host-suffix
//! match plus identity header extraction.

use axum::http::HeaderMap;

use super::{AuthConfig, AuthMethod, Principal};

const FORWARDED_HOST_HEADER: &str = "x-forwarded-host";
const IDENTITY_HEADER: &str = "x-ms-client-principal-id";

pub fn try_tunnel(headers: &HeaderMap, config: &AuthConfig) -> Option<Principal> {
    if !config.trust_proxy {
        return None;
    }

    let forwarded_host = headers.get(FORWARDED_HOST_HEADER)?.to_str().ok()?;
    let matches_allowlist = config
        .tunnel_allowed_domains
        .iter()
        .any(|domain| forwarded_host == domain || forwarded_host.ends_with(&format!(".{domain}")));
    if !matches_allowlist {
        return None;
    }

    let identity = headers.get(IDENTITY_HEADER)?.to_str().ok()?;
    if identity.is_empty() {
        return None;
    }

    Some(Principal {
        method: AuthMethod::Tunnel,
        subject: identity.to_string(),
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
            tunnel_auth_enabled: true,
            tunnel_allowed_domains: vec!["tunnel.example.com".to_string()],
            trust_proxy: true,
            entra_auth_enabled: false,
            azure_tenant_id: None,
            azure_client_id: None,
            azure_client_secret: None,
            api_key_auth_enabled: false,
            api_keys: vec![],
            managed_identity_enabled: false,
            azure_key_vault_url: None,
            allow_anonymous_access: false,
            required_roles: vec![],
        }
    }

    #[test]
    fn succeeds_when_host_suffix_matches_and_identity_present() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_HOST_HEADER, HeaderValue::from_static("agent1.tunnel.example.com"));
        headers.insert(IDENTITY_HEADER, HeaderValue::from_static("user-42"));
        let principal = try_tunnel(&headers, &config()).unwrap();
        assert_eq!(principal.subject, "user-42");
        assert_eq!(principal.method, AuthMethod::Tunnel);
    }

    #[test]
    fn fails_when_host_not_on_allowlist() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_HOST_HEADER, HeaderValue::from_static("evil.example.net"));
        headers.insert(IDENTITY_HEADER, HeaderValue::from_static("user-42"));
        assert!(try_tunnel(&headers, &config()).is_none());
    }

    #[test]
    fn fails_when_identity_header_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_HOST_HEADER, HeaderValue::from_static("agent1.tunnel.example.com"));
        assert!(try_tunnel(&headers, &config()).is_none());
    }

    #[test]
    fn fails_when_trust_proxy_disabled() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_HOST_HEADER, HeaderValue::from_static("agent1.tunnel.example.com"));
        headers.insert(IDENTITY_HEADER, HeaderValue::from_static("user-42"));
        assert!(try_tunnel(&headers, &AuthConfig { trust_proxy: false, ..config() }).is_none());
    }
}
