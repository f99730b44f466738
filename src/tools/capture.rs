//! Capture tools (spec.md §6 "capture" capability): screenshots, PDFs, and
//! accessibility snapshots. Screenshot/PDF bytes are written under the
//! broker's `--output-dir` and referenced by path; whether the bytes are
//! *also* inlined as base64 follows `--image-responses` (spec.md CLI
//! surface: `allow`/`omit`/`auto`), mirroring `tools/browser/tools.rs`'s
//! own image-response negotiation.

use std::path::PathBuf;

use base64::Engine as _;
use schemars::JsonSchema;
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::BrokerError;
use crate::session::Session;

use super::{ToolContext, ToolResult};

const INLINE_THRESHOLD_BYTES: usize = 512 * 1024;

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ScreenshotArgs {
    pub filename: Option<String>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct PdfSaveArgs {
    pub filename: Option<String>,
}

async fn write_output_file(dir: &std::path::Path, sub: &str, filename: Option<String>, ext: &str, bytes: &[u8]) -> Result<PathBuf, BrokerError> {
    let target_dir = dir.join(sub);
    tokio::fs::create_dir_all(&target_dir)
        .await
        .map_err(|e| BrokerError::Internal(format!("creating output dir: {e}")))?;
    let name = filename.unwrap_or_else(|| format!("{}.{ext}", Uuid::new_v4()));
    let path = target_dir.join(name);
    tokio::fs::write(&path, bytes).await.map_err(|e| BrokerError::Internal(format!("writing {sub} file: {e}")))?;
    Ok(path)
}

fn should_inline(ctx: &ToolContext, size: usize) -> bool {
    match ctx.image_responses {
        crate::config::ImageResponses::Allow => true,
        crate::config::ImageResponses::Omit => false,
        crate::config::ImageResponses::Auto => size <= INLINE_THRESHOLD_BYTES,
    }
}

pub async fn take_screenshot(ctx: &ToolContext, session: &Session, args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: ScreenshotArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    session.current_tab_or_die().await?;
    let idx = session.current_tab_index();
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
    let bytes = tab.page.screenshot().await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    drop(tabs);

    let path = write_output_file(&ctx.output_dir, "screenshots", args.filename, "png", &bytes).await?;
    let mut content = vec![serde_json::json!({"type": "text", "text": format!("saved screenshot to {}", path.display())})];
    if should_inline(ctx, bytes.len()) {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
        content.push(serde_json::json!({"type": "image", "mimeType": "image/png", "data": encoded}));
    }
    Ok(ToolResult::ok(content))
}

pub async fn snapshot(session: &Session) -> Result<ToolResult, BrokerError> {
    session.current_tab_or_die().await?;
    let idx = session.current_tab_index();
    let mut tabs = session.tabs().await;
    let tab = tabs.get_mut(idx).ok_or(BrokerError::NoTab)?;
    let text = tab.recapture_snapshot().await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    Ok(ToolResult::text(text))
}

pub async fn pdf_save(ctx: &ToolContext, session: &Session, args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: PdfSaveArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    session.current_tab_or_die().await?;
    let idx = session.current_tab_index();
    let tabs = session.tabs().await;
    let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
    let bytes = tab.page.pdf().await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    drop(tabs);

    let path = write_output_file(&ctx.output_dir, "pdfs", args.filename, "pdf", &bytes).await?;
    Ok(ToolResult::text(format!("saved pdf to {}", path.display())))
}
