//! The remaining tool family members that don't fit neatly under one of the
//! named capability groups (spec.md §6: "plus file-upload/download, dialog
//! handling, and install helpers"): file input/output at the element level,
//! JS dialog handling, and the managed-browser install helper.

use std::path::PathBuf;
use std::time::Duration;

use schemars::JsonSchema;
use serde::Deserialize;

use crate::errors::BrokerError;
use crate::session::Session;

use super::ToolResult;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FileUploadArgs {
    pub r#ref: String,
    pub paths: Vec<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FileDownloadArgs {
    pub r#ref: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct HandleDialogArgs {
    pub accept: bool,
    pub prompt_text: Option<String>,
}

/// Sets the files on a `<input type="file">` tagged by the current
/// snapshot (driver façade's `set_file_input_ref`, the only way CDP lets
/// a caller attach files without a real OS file picker).
pub async fn file_upload(session: &Session, args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: FileUploadArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    session.current_tab_or_die().await?;
    let idx = session.current_tab_index();
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
    let dom_index = tab.snapshots.resolve(&args.r#ref)?;
    let paths: Vec<PathBuf> = args.paths.iter().map(PathBuf::from).collect();
    tab.page.set_file_input_ref(dom_index, paths).await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    Ok(ToolResult::text(format!("set files on {}", args.r#ref)))
}

/// Clicks the referenced element to trigger a download and reports that a
/// download was initiated. Chrome's own download manager (directed at
/// `--output-dir` by the launch flags in `browser_setup.rs`) takes it from
/// there; this broker does not track individual download completions.
pub async fn file_download(session: &Session, args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: FileDownloadArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    session.current_tab_or_die().await?;
    let idx = session.current_tab_index();
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
    let dom_index = tab.snapshots.resolve(&args.r#ref)?;
    tab.page.click_ref(dom_index).await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    drop(tabs);
    tokio::time::sleep(Duration::from_millis(250)).await;
    Ok(ToolResult::text(format!("download triggered from {}", args.r#ref)))
}

/// Accepts or dismisses a currently-open JS dialog (alert/confirm/prompt).
pub async fn handle_dialog(session: &Session, args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: HandleDialogArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    session.current_tab_or_die().await?;
    let idx = session.current_tab_index();
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
    tab.page
        .handle_dialog(args.accept, args.prompt_text.clone())
        .await
        .map_err(|e| BrokerError::Driver(e.to_string()))?;
    Ok(ToolResult::text(if args.accept { "dialog accepted" } else { "dialog dismissed" }))
}

/// Kicks off a managed-browser download in the background (spec.md CLI
/// surface: "install helpers") without blocking the RPC on a multi-hundred
/// megabyte fetch.
pub fn install() -> Result<ToolResult, BrokerError> {
    tokio::spawn(async {
        if let Err(e) = crate::browser_setup::download_managed_browser().await {
            tracing::warn!(error = %e, "background browser install failed");
        }
    });
    Ok(ToolResult::text("browser install started in the background"))
}
