//! Profile tools (spec.md §6 "profiles" capability, §4.7 "SavedSession"):
//! the user-facing save/switch/list/delete surface built on top of
//! `SessionStateStore`, folding in page title/URL so a saved profile is
//! self-describing without a separate storage-state-only call.

use schemars::JsonSchema;
use serde::Deserialize;

use crate::driver::{LocalStorageEntry, OriginState, StorageState};
use crate::errors::BrokerError;
use crate::session::Session;

use super::{ToolContext, ToolResult};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SaveProfileArgs {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub workspace: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NameArgs {
    pub name: String,
}

async fn active_index(session: &Session) -> Result<usize, BrokerError> {
    session.current_tab_or_die().await?;
    Ok(session.current_tab_index())
}

pub async fn save_profile(ctx: &ToolContext, session: &Session, args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: SaveProfileArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    let idx = active_index(session).await?;
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
            local_storage: local_storage.into_iter().map(|(name, value)| LocalStorageEntry { name, value }).collect(),
        }]
    };
    let state = StorageState { cookies, origins };

    let meta = ctx
        .state_store
        .save(&args.name, url, title, args.description, ctx.edge_profile.clone(), args.workspace, &state, None)
        .await?;
    Ok(ToolResult::json(serde_json::to_value(meta).unwrap_or_default()))
}

/// Restores cookies onto the current page, navigates to the saved URL, and
/// replays localStorage for the page's own origin once loaded. A missing
/// `storage-state.json` degrades to a URL-only restore (spec.md §4.7).
pub async fn switch_profile(ctx: &ToolContext, session: &Session, args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: NameArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    let (meta, storage_state) = ctx.state_store.load(&args.name).await?;

    let idx = session.ensure_tab().await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    session.select_tab(idx);
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;

    let Some(state) = storage_state else {
        tab.page.navigate(&meta.url).await.map_err(|e| BrokerError::Driver(e.to_string()))?;
        return Ok(ToolResult::text(format!("restored '{}' (degraded: url only)", args.name)).capture_snapshot());
    };

    tab.page.clear_cookies().await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    for cookie in &state.cookies {
        tab.page.set_cookie(cookie).await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    }
    tab.page.navigate(&meta.url).await.map_err(|e| BrokerError::Driver(e.to_string()))?;

    let current_origin = url::Url::parse(&meta.url).ok().map(|u| u.origin().ascii_serialization());
    if let Some(origin) = current_origin {
        if let Some(origin_state) = state.origins.iter().find(|o| o.origin == origin) {
            for entry in &origin_state.local_storage {
                tab.page
                    .set_local_storage(&entry.name, &entry.value)
                    .await
                    .map_err(|e| BrokerError::Driver(e.to_string()))?;
            }
        }
    }

    Ok(ToolResult::text(format!("restored '{}'", args.name)).capture_snapshot())
}

pub async fn list_profiles(ctx: &ToolContext) -> Result<ToolResult, BrokerError> {
    let metas = ctx.state_store.list().await?;
    Ok(ToolResult::json(serde_json::to_value(metas).unwrap_or_default()))
}

pub async fn delete_profile(ctx: &ToolContext, args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: NameArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    ctx.state_store.delete(&args.name).await?;
    Ok(ToolResult::text(format!("deleted profile '{}'", args.name)))
}
