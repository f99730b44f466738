//! Authentication fan-in (spec.md §4.2): tunnel → bearer JWT → managed
//! identity → shared secret → anonymous, stopping at the first success,
//! followed by a role gate. Grounded on
//! `groblegark-coop/crates/mux/src/transport/auth.rs`'s constant-time
//! comparison and axum-middleware shape, generalized from "one shared
//! secret" to the full five-method chain spec.md calls for.

mod bearer;
mod managed_identity;
mod oauth_proxy;
mod shared_secret;
mod tunnel;

pub use oauth_proxy::{oauth_router, OAuthProxyState, StaticClient};

use axum::http::HeaderMap;

use crate::errors::BrokerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Tunnel,
    Bearer,
    ManagedIdentity,
    SharedSecret,
    Anonymous,
}

impl AuthMethod {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::Tunnel => "tunnel",
            AuthMethod::Bearer => "bearer",
            AuthMethod::ManagedIdentity => "managed_identity",
            AuthMethod::SharedSecret => "shared_secret",
            AuthMethod::Anonymous => "anonymous",
        }
    }
}

/// The authenticated principal, attached to the request context for
/// downstream use (spec.md §4.2).
#[derive(Debug, Clone)]
pub struct Principal {
    pub method: AuthMethod,
    pub subject: String,
    pub tenant: Option<String>,
    pub roles: Vec<String>,
    pub scopes: Vec<String>,
}

impl Principal {
    fn anonymous() -> Self {
        Self { method: AuthMethod::Anonymous, subject: "anonymous".to_string(), tenant: None, roles: vec![], scopes: vec![] }
    }
}

/// Resolved auth configuration (built from `Cli` by `AuthConfig::from_cli`).
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub tunnel_auth_enabled: bool,
    pub tunnel_allowed_domains: Vec<String>,
    pub trust_proxy: bool,
    pub entra_auth_enabled: bool,
    pub azure_tenant_id: Option<String>,
    pub azure_client_id: Option<String>,
    pub azure_client_secret: Option<String>,
    pub api_key_auth_enabled: bool,
    pub api_keys: Vec<String>,
    pub managed_identity_enabled: bool,
    pub azure_key_vault_url: Option<String>,
    pub allow_anonymous_access: bool,
    pub required_roles: Vec<String>,
}

impl AuthConfig {
    #[must_use]
    pub fn from_cli(cli: &crate::config::Cli) -> Self {
        Self {
            tunnel_auth_enabled: cli.tunnel_auth_enabled,
            tunnel_allowed_domains: cli.tunnel_allowed_domains.clone(),
            trust_proxy: cli.trust_proxy,
            entra_auth_enabled: cli.entra_auth_enabled,
            azure_tenant_id: cli.azure_tenant_id.clone(),
            azure_client_id: cli.azure_client_id.clone(),
            azure_client_secret: cli.azure_client_secret.clone(),
            api_key_auth_enabled: cli.api_key_auth_enabled,
            api_keys: cli.api_keys.clone(),
            managed_identity_enabled: cli.managed_identity_enabled,
            azure_key_vault_url: cli.azure_key_vault_url.clone(),
            allow_anonymous_access: cli.allow_anonymous_access,
            required_roles: cli.required_roles.clone(),
        }
    }

    /// List of methods currently advertised, for the `Unauthorized` error
    /// body (spec.md §4.2: "listing advertised methods").
    #[must_use]
    pub fn advertised_methods(&self) -> Vec<&'static str> {
        let mut methods = Vec::new();
        if self.tunnel_auth_enabled {
            methods.push("tunnel");
        }
        if self.entra_auth_enabled {
            methods.push("bearer");
        }
        if self.managed_identity_enabled {
            methods.push("managed_identity");
        }
        if self.api_key_auth_enabled {
            methods.push("shared_secret");
        }
        if self.allow_anonymous_access {
            methods.push("anonymous");
        }
        methods
    }
}

/// Runs the fixed-order fan-in (spec.md §4.2), stopping at the first
/// success. Returns `Unauthorized` with the advertised method list if all
/// attempted methods fail and anonymous access is not allowed.
pub async fn authenticate(headers: &HeaderMap, config: &AuthConfig) -> Result<Principal, BrokerError> {
    if config.tunnel_auth_enabled {
        if let Some(principal) = tunnel::try_tunnel(headers, config) {
            tracing::debug!(method = "tunnel", subject = %principal.subject, "auth succeeded");
            return Ok(principal);
        }
    }

    if config.entra_auth_enabled {
        match bearer::try_bearer(headers, config).await {
            Ok(Some(principal)) => {
                tracing::debug!(method = "bearer", subject = %principal.subject, "auth succeeded");
                return Ok(principal);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(method = "bearer", error = %e, "auth attempt failed"),
        }
    }

    if config.managed_identity_enabled {
        match managed_identity::try_managed_identity(config).await {
            Ok(Some(principal)) => {
                tracing::debug!(method = "managed_identity", identity_type = %principal.subject, "auth succeeded");
                return Ok(principal);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(method = "managed_identity", error = %e, "auth attempt failed"),
        }
    }

    if config.api_key_auth_enabled {
        if let Some(principal) = shared_secret::try_shared_secret(headers, config) {
            tracing::debug!(method = "shared_secret", "auth succeeded");
            return Ok(principal);
        }
    }

    if config.allow_anonymous_access {
        tracing::debug!(method = "anonymous", "auth succeeded");
        return Ok(Principal::anonymous());
    }

    tracing::warn!(advertised = ?config.advertised_methods(), "auth failed: no method succeeded");
    Err(BrokerError::Unauthorized(format!(
        "no auth method succeeded; advertised methods: {}",
        config.advertised_methods().join(", ")
    )))
}

/// spec.md §4.2: "a role gate checks that the extracted roles intersect
/// `requiredRoles` (when non-empty)".
pub fn role_gate(principal: &Principal, required_roles: &[String]) -> Result<(), BrokerError> {
    if required_roles.is_empty() {
        return Ok(());
    }
    if principal.roles.iter().any(|r| required_roles.contains(r)) {
        Ok(())
    } else {
        Err(BrokerError::Forbidden(format!(
            "principal '{}' lacks any of required roles: {}",
            principal.subject,
            required_roles.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn anonymous_allowed_when_no_method_configured_and_flag_set() {
        let config = AuthConfig {
            tunnel_auth_enabled: false,
            tunnel_allowed_domains: vec![],
            trust_proxy: false,
            entra_auth_enabled: false,
            azure_tenant_id: None,
            azure_client_id: None,
            azure_client_secret: None,
            api_key_auth_enabled: false,
            api_keys: vec![],
            managed_identity_enabled: false,
            azure_key_vault_url: None,
            allow_anonymous_access: true,
            required_roles: vec![],
        };
        let headers = HeaderMap::new();
        let principal = authenticate(&headers, &config).await.unwrap();
        assert_eq!(principal.method, AuthMethod::Anonymous);
    }

    #[tokio::test]
    async fn unauthorized_when_no_method_succeeds_and_anonymous_disallowed() {
        let config = AuthConfig {
            tunnel_auth_enabled: false,
            tunnel_allowed_domains: vec![],
            trust_proxy: false,
            entra_auth_enabled: false,
            azure_tenant_id: None,
            azure_client_id: None,
            azure_client_secret: None,
            api_key_auth_enabled: true,
            api_keys: vec!["expected-secret".to_string()],
            managed_identity_enabled: false,
            azure_key_vault_url: None,
            allow_anonymous_access: false,
            required_roles: vec![],
        };
        let headers = HeaderMap::new();
        assert!(matches!(authenticate(&headers, &config).await, Err(BrokerError::Unauthorized(_))));
    }

    #[test]
    fn role_gate_rejects_principal_without_required_role() {
        let principal = Principal {
            method: AuthMethod::Bearer,
            subject: "user-1".into(),
            tenant: None,
            roles: vec!["reader".into()],
            scopes: vec![],
        };
        assert!(role_gate(&principal, &["admin".to_string()]).is_err());
        assert!(role_gate(&principal, &["reader".to_string()]).is_ok());
        assert!(role_gate(&principal, &[]).is_ok());
    }
}
