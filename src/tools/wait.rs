//! Wait tools (spec.md §6 "wait"/"testing" capabilities).

use std::time::Duration;

use schemars::JsonSchema;
use serde::Deserialize;

use crate::errors::BrokerError;
use crate::session::Session;

use super::ToolResult;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WaitArgs {
    pub millis: u64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WaitForTextArgs {
    pub text: String,
    #[serde(default = "default_timeout_millis")]
    pub timeout_millis: u64,
}

fn default_timeout_millis() -> u64 {
    10_000
}

pub async fn wait(args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: WaitArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    tokio::time::sleep(Duration::from_millis(args.millis)).await;
    Ok(ToolResult::text(format!("waited {}ms", args.millis)))
}

/// Polls `document.body.innerText` for the given substring, used by seed
/// scenario tests to assert a page reached a particular state without a
/// fixed sleep (spec.md §8).
pub async fn wait_for_text(session: &Session, args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: WaitForTextArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    session.current_tab_or_die().await?;
    let idx = session.current_tab_index();

    let deadline = tokio::time::Instant::now() + Duration::from_millis(args.timeout_millis);
    loop {
        {
            let tabs = session.tabs().await;
            let tab = tabs.get(idx).ok_or(BrokerError::NoTab)?;
            let found = tab
                .page
                .inner()
                .evaluate("document.body ? document.body.innerText : ''")
                .await
                .ok()
                .and_then(|v| v.into_value::<String>().ok())
                .map(|body| body.contains(&args.text))
                .unwrap_or(false);
            if found {
                return Ok(ToolResult::text(format!("found text: {}", args.text)));
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(BrokerError::Timeout(format!("text {:?} not found within {}ms", args.text, args.timeout_millis)));
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}
