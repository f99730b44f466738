//! Tab-management tools (spec.md §6 "tabs" capability, §3 "Tab").

use schemars::JsonSchema;
use serde::Deserialize;

use crate::errors::BrokerError;
use crate::session::Session;

use super::ToolResult;

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct TabNewArgs {
    #[serde(default = "default_blank_url")]
    pub url: String,
}

fn default_blank_url() -> String {
    "about:blank".to_string()
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TabIndexArgs {
    pub index: usize,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TabCloseArgs {
    pub index: usize,
}

pub async fn list(session: &Session) -> Result<ToolResult, BrokerError> {
    let tabs = session.tabs_snapshot().await;
    let current = session.current_tab_index();
    let json = serde_json::json!({
        "tabs": tabs.iter().map(|(i, url)| serde_json::json!({"index": i, "url": url, "active": *i == current})).collect::<Vec<_>>(),
    });
    Ok(ToolResult::json(json))
}

pub async fn new_tab(session: &Session, args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: TabNewArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    let index = session.open_tab(&args.url).await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    Ok(ToolResult::json(serde_json::json!({"index": index})).capture_snapshot())
}

pub async fn select(session: &Session, args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: TabIndexArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    if args.index >= session.tab_count().await {
        return Err(BrokerError::NoTab);
    }
    session.select_tab(args.index);
    Ok(ToolResult::text(format!("selected tab {}", args.index)).capture_snapshot())
}

pub async fn close(session: &Session, args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: TabCloseArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    session.close_tab(args.index).await?;
    Ok(ToolResult::text(format!("closed tab {}", args.index)))
}
