//! AI-intent tools (spec.md §6 "ai-intent" capability).
//!
//! `browser_execute_intent` and `browser_execute_workflow` are the
//! "planned surface" spec.md §9 calls out: their schemas are fixed and
//! stable for callers to build against, but the handlers are intentionally
//! stub — they validate input and report back without driving the browser.
//! `browser_analyze_context` is the one tool in this family that is fully
//! built, since it is read-only and needs nothing beyond what the session
//! and snapshot registry already expose.

use schemars::JsonSchema;
use serde::Deserialize;

use crate::errors::BrokerError;
use crate::session::Session;

use super::ToolResult;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExecuteIntentArgs {
    /// Free-form natural-language description of the desired outcome
    /// ("sign in with the test account", "add the first result to cart").
    pub intent: String,
    #[serde(default)]
    pub context: serde_json::Value,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExecuteWorkflowArgs {
    /// Name of a pre-defined multi-step workflow.
    pub workflow: String,
    #[serde(default)]
    pub steps: Vec<serde_json::Value>,
}

/// Stub handler (spec.md §9 open question 4): validates input, touches
/// nothing, and reports itself as experimental so callers don't mistake
/// the response for a completed action.
pub fn execute_intent(args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: ExecuteIntentArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    Ok(ToolResult::json(serde_json::json!({
        "status": "experimental",
        "intent": args.intent,
        "note": "browser_execute_intent is planned surface (spec.md §9): schema is stable, the browser was not driven",
    })))
}

/// Stub handler, same discipline as [`execute_intent`].
pub fn execute_workflow(args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: ExecuteWorkflowArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    Ok(ToolResult::json(serde_json::json!({
        "status": "experimental",
        "workflow": args.workflow,
        "stepCount": args.steps.len(),
        "note": "browser_execute_workflow is planned surface (spec.md §9): schema is stable, the browser was not driven",
    })))
}

/// Summarizes the current tab for a caller deciding what intent/workflow to
/// run next: URL, title, tab count, and the most recent accessibility
/// snapshot text if one has been captured.
pub async fn analyze_context(session: &Session) -> Result<ToolResult, BrokerError> {
    session.current_tab_or_die().await?;
    let idx = session.current_tab_index();
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
    let url = tab.page.url().await.unwrap_or_default();
    let title = tab.page.title().await.unwrap_or_default();
    let snapshot_text = tab.snapshots.current().map(crate::snapshot::Snapshot::text);

    Ok(ToolResult::json(serde_json::json!({
        "url": url,
        "title": title,
        "tabCount": tabs.len(),
        "currentTab": idx,
        "snapshot": snapshot_text,
    })))
}
