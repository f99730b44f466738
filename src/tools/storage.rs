//! Storage-state tools (spec.md §6 "storage" capability, §4.7): cookie and
//! localStorage read/write, and capturing the full `StorageState` as a
//! saved session (distinct from `browser_save_profile`, which also records
//! title/URL/profile metadata — this tool is the raw cookie/localStorage
//! capture step the profile tools build on).

use schemars::JsonSchema;
use serde::Deserialize;

use crate::driver::{Cookie, OriginState, SameSite, StorageState};
use crate::errors::BrokerError;
use crate::session::Session;

use super::{ToolContext, ToolResult};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SaveStorageStateArgs {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SetCookieArgs {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SetLocalStorageArgs {
    pub key: String,
    pub value: String,
}

async fn current_page<'a>(session: &'a Session) -> Result<usize, BrokerError> {
    session.current_tab_or_die().await?;
    Ok(session.current_tab_index())
}

pub async fn get_cookies(session: &Session) -> Result<ToolResult, BrokerError> {
    let idx = current_page(session).await?;
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
    let cookies = tab.page.cookies().await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    Ok(ToolResult::json(serde_json::to_value(cookies).unwrap_or_default()))
}

pub async fn set_cookie(session: &Session, args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: SetCookieArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    let idx = current_page(session).await?;
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
    let mut cookie = Cookie::new(args.name, args.value, args.domain);
    cookie.path = args.path;
    cookie.same_site = Some(SameSite::default());
    tab.page.set_cookie(&cookie).await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    Ok(ToolResult::text("cookie set"))
}

pub async fn clear_cookies(session: &Session) -> Result<ToolResult, BrokerError> {
    let idx = current_page(session).await?;
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
    tab.page.clear_cookies().await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    Ok(ToolResult::text("cookies cleared"))
}

pub async fn get_local_storage(session: &Session) -> Result<ToolResult, BrokerError> {
    let idx = current_page(session).await?;
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
    let entries = tab.page.local_storage().await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    Ok(ToolResult::json(serde_json::to_value(entries).unwrap_or_default()))
}

pub async fn set_local_storage(session: &Session, args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: SetLocalStorageArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    let idx = current_page(session).await?;
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
    tab.page.set_local_storage(&args.key, &args.value).await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    Ok(ToolResult::text("local storage entry set"))
}

/// Captures cookies + localStorage for the current page into a full
/// `StorageState` and hands it to the session-state store under `name`.
pub async fn save_storage_state(ctx: &ToolContext, session: &Session, args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: SaveStorageStateArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    let idx = current_page(session).await?;
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
    let cookies = tab.page.cookies().await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    let local_storage = tab.page.local_storage().await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    let url = tab.page.url().await.unwrap_or_default();
    let title = tab.page.title().await.unwrap_or_default();
    drop(tabs);

    let origins = if local_storage.is_empty() {
        Vec::new()
    } else {
        let origin = url::Url::parse(&url).ok().map(|u| u.origin().ascii_serialization()).unwrap_or_default();
        vec![OriginState {
            origin,
            local_storage: local_storage
                .into_iter()
                .map(|(name, value)| crate::driver::LocalStorageEntry { name, value })
                .collect(),
        }]
    };
    let state = StorageState { cookies, origins };

    let meta = ctx
        .state_store
        .save(&args.name, url, title, args.description, None, None, &state, None)
        .await?;
    Ok(ToolResult::json(serde_json::to_value(meta).unwrap_or_default()))
}
