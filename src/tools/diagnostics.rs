//! Diagnostics tools (spec.md §6 "diagnostics" capability): console and
//! network ring-buffer reads, and lightweight performance metrics.

use schemars::JsonSchema;
use serde::Deserialize;

use crate::errors::BrokerError;
use crate::session::Session;

use super::ToolResult;

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ConsoleFilteredArgs {
    pub level: Option<String>,
    pub contains: Option<String>,
}

pub async fn console_messages(session: &Session) -> Result<ToolResult, BrokerError> {
    session.current_tab_or_die().await?;
    let idx = session.current_tab_index();
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
    let entries = tab.page.console_messages();
    Ok(ToolResult::json(serde_json::json!({
        "messages": entries.iter().map(|e| serde_json::json!({
            "level": e.level, "text": e.text, "timestamp": e.timestamp,
        })).collect::<Vec<_>>(),
    })))
}

pub async fn console_filtered(session: &Session, args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: ConsoleFilteredArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    session.current_tab_or_die().await?;
    let idx = session.current_tab_index();
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
    let filtered: Vec<_> = tab
        .page
        .console_messages()
        .into_iter()
        .filter(|e| args.level.as_deref().map_or(true, |lvl| e.level.eq_ignore_ascii_case(lvl)))
        .filter(|e| args.contains.as_deref().map_or(true, |needle| e.text.contains(needle)))
        .map(|e| serde_json::json!({"level": e.level, "text": e.text, "timestamp": e.timestamp}))
        .collect();
    Ok(ToolResult::json(serde_json::json!({"messages": filtered})))
}

pub async fn network_requests(session: &Session) -> Result<ToolResult, BrokerError> {
    session.current_tab_or_die().await?;
    let idx = session.current_tab_index();
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
    let entries = tab.page.network_requests();
    Ok(ToolResult::json(serde_json::json!({
        "requests": entries.iter().map(|e| serde_json::json!({
            "method": e.method, "url": e.url, "status": e.status, "timestamp": e.timestamp,
        })).collect::<Vec<_>>(),
    })))
}

pub async fn performance_metrics(session: &Session) -> Result<ToolResult, BrokerError> {
    session.current_tab_or_die().await?;
    let idx = session.current_tab_index();
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
    let metrics = tab.page.performance_metrics().await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    Ok(ToolResult::json(serde_json::to_value(metrics).unwrap_or_default()))
}
