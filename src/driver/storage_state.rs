//! Cookie / localStorage shapes shared by the driver façade and the
//! session-state store. Grounded on the storage-state protocol types used
//! elsewhere in the retrieval pack for cookie + origin-storage persistence.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SameSite {
    None,
    #[default]
    Lax,
    Strict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Unix timestamp in seconds; -1 means session cookie.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub same_site: Option<SameSite>,
}

impl Cookie {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: Some(domain.into()),
            path: None,
            expires: None,
            http_only: None,
            secure: None,
            same_site: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStorageEntry {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginState {
    pub origin: String,
    pub local_storage: Vec<LocalStorageEntry>,
}

/// Complete storage-state snapshot for a browser context: cookies plus
/// per-origin localStorage. Serialized verbatim into `storage-state.json`
/// by the session-state store (spec.md §4.7) and canonicalized for
/// checksumming during peer-sync (spec.md §8 "Checksum integrity").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageState {
    pub cookies: Vec<Cookie>,
    #[serde(default)]
    pub origins: Vec<OriginState>,
}

impl StorageState {
    /// Canonical bytes for checksumming: stable key order via `serde_json`'s
    /// struct field order (already deterministic) plus sorted cookies/origins
    /// so semantically-equal states hash identically regardless of capture order.
    #[must_use]
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut cookies = self.cookies.clone();
        cookies.sort_by(|a, b| (&a.domain, &a.name, &a.path).cmp(&(&b.domain, &b.name, &b.path)));
        let mut origins = self.origins.clone();
        origins.sort_by(|a, b| a.origin.cmp(&b.origin));
        for origin in &mut origins {
            origin.local_storage.sort_by(|a, b| a.name.cmp(&b.name));
        }
        let canonical = StorageState { cookies, origins };
        serde_json::to_vec(&canonical).unwrap_or_default()
    }
}
