//! Navigation tools (spec.md §6 "navigate" capability).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::errors::BrokerError;
use crate::session::Session;

use super::ToolResult;

/// Shared empty-input marker for tools that take no arguments.
#[derive(Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct NoArgs {}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NavigateArgs {
    pub url: String,
}

async fn current_tab_index_checked(session: &Session) -> Result<usize, BrokerError> {
    session.current_tab_or_die().await?;
    Ok(session.current_tab_index())
}

pub async fn navigate(session: &Session, args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: NavigateArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;

    let index = session.ensure_tab().await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    session.select_tab(index);
    let tabs = session.tabs().await;
    let tab = tabs.get(index).ok_or(BrokerError::NoTab)?;
    tab.page.navigate(&args.url).await.map_err(|e| BrokerError::Driver(e.to_string()))?;

    Ok(ToolResult::text(format!("navigated to {}", args.url)).capture_snapshot().wait_for_network())
}

pub async fn navigate_back(session: &Session) -> Result<ToolResult, BrokerError> {
    let index = current_tab_index_checked(session).await?;
    let tabs = session.tabs().await;
    let tab = tabs.get(index).ok_or(BrokerError::NoTab)?;
    tab.page.navigate_back().await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    Ok(ToolResult::text("navigated back").capture_snapshot())
}

pub async fn navigate_forward(session: &Session) -> Result<ToolResult, BrokerError> {
    let index = current_tab_index_checked(session).await?;
    let tabs = session.tabs().await;
    let tab = tabs.get(index).ok_or(BrokerError::NoTab)?;
    tab.page.navigate_forward().await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    Ok(ToolResult::text("navigated forward").capture_snapshot())
}
