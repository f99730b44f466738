//! Autonomous-crawl tools (spec.md §6 "autonomous" capability, §4.6): starts
//! a background `CrawlHandle`, reports its status, and lets a caller swap
//! the memory backend or cancel the run. At most one crawl per session is
//! tracked (spec.md §3 "CrawlSession").

use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;

use crate::autonomous::{CrawlConfig, ExternalMemoryStore, LocalMemoryStore, MemoryBackend};
use crate::errors::BrokerError;
use crate::session::Session;
use crate::utils::constants::{DEFAULT_GUARDRAIL_BURST, DEFAULT_GUARDRAIL_RATE_RPS, DEFAULT_MAX_DEPTH, DEFAULT_MAX_PAGES};

use super::{ToolContext, ToolResult};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct StartCrawlArgs {
    pub start_url: String,
    pub goal: String,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default)]
    pub allowed_domains: Option<Vec<String>>,
    #[serde(default)]
    pub blocked_domains: Vec<String>,
    #[serde(default)]
    pub blocked_pattern: Option<String>,
    #[serde(default = "default_per_host_visit_cap")]
    pub per_host_visit_cap: u32,
    #[serde(default = "default_rate_per_sec")]
    pub rate_per_sec: f64,
    #[serde(default = "default_burst")]
    pub burst: f64,
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: i64,
    #[serde(default)]
    pub capture_screenshots: bool,
}

fn default_max_depth() -> u32 {
    DEFAULT_MAX_DEPTH as u32
}
fn default_max_pages() -> u32 {
    DEFAULT_MAX_PAGES as u32
}
fn default_per_host_visit_cap() -> u32 {
    20
}
fn default_rate_per_sec() -> f64 {
    DEFAULT_GUARDRAIL_RATE_RPS
}
fn default_burst() -> f64 {
    DEFAULT_GUARDRAIL_BURST as f64
}
fn default_session_timeout_secs() -> i64 {
    1800
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum ConfigureMemoryArgs {
    Local {
        #[serde(default = "default_max_states")]
        max_states: usize,
    },
    External { base_url: String },
}

fn default_max_states() -> usize {
    500
}

pub async fn start_crawl(ctx: &ToolContext, session: &Arc<Session>, args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: StartCrawlArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;

    if let Some(existing) = ctx.crawls.get(&session.id) {
        if !existing.is_finished() {
            return Err(BrokerError::Conflict("a crawl is already running for this session".to_string()));
        }
    }

    let blocked_regex = args
        .blocked_pattern
        .as_deref()
        .map(regex::Regex::new)
        .transpose()
        .map_err(|e| BrokerError::BadInput(format!("invalid blocked_pattern: {e}")))?;

    let tab_index = session.ensure_tab().await.map_err(|e| BrokerError::Driver(e.to_string()))?;

    let config = CrawlConfig {
        start_url: args.start_url,
        goal: args.goal,
        max_depth: args.max_depth,
        max_pages: args.max_pages,
        allowed_domains: args.allowed_domains,
        blocked_domains: args.blocked_domains,
        blocked_regex,
        per_host_visit_cap: args.per_host_visit_cap,
        rate_per_sec: args.rate_per_sec,
        burst: args.burst,
        session_timeout: chrono::Duration::seconds(args.session_timeout_secs),
        output_dir: ctx.output_dir.join("crawls"),
        capture_screenshots: args.capture_screenshots,
    };

    let memory = ctx.memory.read().await.clone();
    let handle = crate::autonomous::start(session.clone(), tab_index, config, memory, ctx.event_bus.clone());
    let crawl_id = handle.crawl_id.clone();
    ctx.crawls.insert(session.id, handle);

    Ok(ToolResult::json(serde_json::json!({"crawlId": crawl_id, "status": "running"})))
}

pub async fn configure_memory(ctx: &ToolContext, args: serde_json::Value) -> Result<ToolResult, BrokerError> {
    let args: ConfigureMemoryArgs = serde_json::from_value(args).map_err(|e| BrokerError::BadInput(e.to_string()))?;
    let backend: Arc<dyn MemoryBackend> = match args {
        ConfigureMemoryArgs::Local { max_states } => Arc::new(LocalMemoryStore::new(ctx.data_dir.join("memory"), max_states)),
        ConfigureMemoryArgs::External { base_url } => Arc::new(ExternalMemoryStore::new(base_url)),
    };
    *ctx.memory.write().await = backend;
    Ok(ToolResult::text("memory backend updated"))
}

pub async fn crawl_status(ctx: &ToolContext, session: &Session) -> Result<ToolResult, BrokerError> {
    let Some(handle) = ctx.crawls.get(&session.id) else {
        return Err(BrokerError::Unknown("no crawl has been started for this session".to_string()));
    };
    let status = handle.status().await;
    let report = handle.report().await;
    Ok(ToolResult::json(serde_json::json!({
        "crawlId": handle.crawl_id,
        "status": format!("{status:?}"),
        "report": report,
    })))
}

pub async fn cancel_crawl(ctx: &ToolContext, session: &Session) -> Result<ToolResult, BrokerError> {
    let Some(handle) = ctx.crawls.get(&session.id) else {
        return Err(BrokerError::Unknown("no crawl has been started for this session".to_string()));
    };
    handle.request_stop();
    Ok(ToolResult::text("stop requested"))
}
