//! Wire/report shapes for the autonomous crawl orchestrator (spec.md §3,
//! §4.6). Grounded on `crawl_events::types::CrawlEvent`'s field shapes and
//! `page_extractor/schema.rs`'s `CrawlLink`-style plain-data records.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A crawl goal as given by the caller, plus the keyword set the scorer
/// derives from it once at session start (spec.md §4.6 "Scoring").
#[derive(Debug, Clone)]
pub struct CrawlGoal {
    pub text: String,
    pub keywords: HashSet<String>,
}

impl CrawlGoal {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let keywords = super::scorer::extract_goal_keywords(&text);
        Self { text, keywords }
    }
}

/// One clickable element surfaced during observation, carrying enough of
/// the accessibility snapshot for the planner to reason about and the
/// executor to act on by `ref_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickableElement {
    pub ref_id: String,
    pub role: String,
    pub text: String,
}

/// Step 1 of the per-step loop (spec.md §4.6): everything the planner needs
/// to propose the next action.
#[derive(Debug, Clone)]
pub struct ObservedPage {
    pub url: String,
    pub title: String,
    pub snapshot_text: String,
    pub links: Vec<String>,
    pub clickables: Vec<ClickableElement>,
}

/// An action the planner proposes, guardrails validate, and the executor
/// carries out against the driver (spec.md §4.6 "Executor").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PlannerAction {
    Navigate { url: String, depth: u32, priority: f64, reason: String },
    Click { ref_id: String, text: String, priority: f64, reason: String },
    Type { ref_id: String, text: String, priority: f64, reason: String },
    Wait { millis: u64 },
    Snapshot,
    Finish { reason: String },
}

impl PlannerAction {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            PlannerAction::Navigate { .. } => "navigate",
            PlannerAction::Click { .. } => "click",
            PlannerAction::Type { .. } => "type",
            PlannerAction::Wait { .. } => "wait",
            PlannerAction::Snapshot => "snapshot",
            PlannerAction::Finish { .. } => "finish",
        }
    }

    #[must_use]
    pub fn target(&self) -> String {
        match self {
            PlannerAction::Navigate { url, .. } => url.clone(),
            PlannerAction::Click { ref_id, .. } | PlannerAction::Type { ref_id, .. } => ref_id.clone(),
            PlannerAction::Wait { millis } => millis.to_string(),
            PlannerAction::Snapshot => String::new(),
            PlannerAction::Finish { reason } => reason.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlStatus {
    Running,
    Completed,
    Error,
    Cancelled,
}

/// One state the planner's memory has recorded, keyed by `stateHash`
/// (spec.md §4.6 "Memory").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlState {
    pub state_hash: String,
    pub url: String,
    pub title: String,
    pub depth: u32,
    pub snapshot_text: String,
    pub discovered_at: chrono::DateTime<chrono::Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlErrorEntry {
    pub step: u64,
    pub action: String,
    pub target: String,
    pub message: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlStats {
    pub pages_visited: usize,
    pub total_links: usize,
    pub max_depth: u32,
    pub duration_ms: u64,
    pub screenshots: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub action: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// The crawl orchestrator's final in-memory artifact (spec.md §4.6
/// "Reporter"), serialized to `{outputDir}/{sessionId}/report.json` and
/// `report.html` on finalize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlReport {
    pub crawl_id: String,
    pub goal: String,
    pub start_url: String,
    pub status: CrawlStatus,
    pub stats: CrawlStats,
    pub states: Vec<CrawlState>,
    pub errors: Vec<CrawlErrorEntry>,
    pub graph: CrawlGraph,
}
