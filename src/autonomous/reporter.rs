//! `CrawlReport` aggregation and on-disk rendering (spec.md §4.6
//! "Reporter"). Grounded on `content_saver/manifest_manager.rs`'s
//! directory-per-artifact write pattern and `crawl_events` for the field
//! names mirrored into `CrawlStats`.

use std::path::{Path, PathBuf};

use super::types::{
    CrawlErrorEntry, CrawlGraph, CrawlReport, CrawlState, CrawlStats, CrawlStatus, GraphEdge, GraphNode,
    PlannerAction,
};
use crate::errors::BrokerError;

pub struct Reporter {
    crawl_id: String,
    goal: String,
    start_url: String,
    started_at: chrono::DateTime<chrono::Utc>,
    states: Vec<CrawlState>,
    errors: Vec<CrawlErrorEntry>,
    graph: CrawlGraph,
    max_depth_seen: u32,
    total_links_seen: usize,
    screenshots_taken: usize,
    step: u64,
}

impl Reporter {
    #[must_use]
    pub fn new(crawl_id: String, goal: String, start_url: String) -> Self {
        Self {
            crawl_id,
            goal,
            start_url,
            started_at: chrono::Utc::now(),
            states: Vec::new(),
            errors: Vec::new(),
            graph: CrawlGraph::default(),
            max_depth_seen: 0,
            total_links_seen: 0,
            screenshots_taken: 0,
            step: 0,
        }
    }

    pub fn record_step(&mut self) -> u64 {
        self.step += 1;
        self.step
    }

    pub fn record_state(&mut self, state: CrawlState, from_hash: Option<&str>, action: &PlannerAction) {
        self.max_depth_seen = self.max_depth_seen.max(state.depth);
        self.graph.nodes.push(GraphNode { id: state.state_hash.clone(), url: state.url.clone(), title: state.title.clone() });
        if let Some(from) = from_hash {
            self.graph.edges.push(GraphEdge { from: from.to_string(), to: state.state_hash.clone(), action: action.kind().to_string() });
        }
        self.states.push(state);
    }

    pub fn record_links_observed(&mut self, count: usize) {
        self.total_links_seen += count;
    }

    pub fn record_screenshot(&mut self) {
        self.screenshots_taken += 1;
    }

    pub fn record_error(&mut self, action: &PlannerAction, message: String) {
        self.errors.push(CrawlErrorEntry {
            step: self.step,
            action: action.kind().to_string(),
            target: action.target(),
            message,
            timestamp: chrono::Utc::now(),
        });
    }

    #[must_use]
    pub fn build(&self, status: CrawlStatus) -> CrawlReport {
        CrawlReport {
            crawl_id: self.crawl_id.clone(),
            goal: self.goal.clone(),
            start_url: self.start_url.clone(),
            status,
            stats: CrawlStats {
                pages_visited: self.states.len(),
                total_links: self.total_links_seen,
                max_depth: self.max_depth_seen,
                duration_ms: (chrono::Utc::now() - self.started_at).num_milliseconds().max(0) as u64,
                screenshots: self.screenshots_taken,
                errors: self.errors.len(),
            },
            states: self.states.clone(),
            errors: self.errors.clone(),
            graph: self.graph.clone(),
        }
    }

    /// Writes `report.json` and `report.html` under
    /// `{outputDir}/{crawlId}/`, copying any referenced screenshots
    /// alongside (spec.md §4.6 "Reporter").
    pub async fn finalize(
        &self,
        status: CrawlStatus,
        output_dir: &Path,
        screenshot_source: Option<&Path>,
    ) -> Result<PathBuf, BrokerError> {
        let report = self.build(status);
        let dir = output_dir.join(&self.crawl_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| BrokerError::Internal(format!("creating report dir: {e}")))?;

        let json = serde_json::to_vec_pretty(&report)
            .map_err(|e| BrokerError::Internal(format!("serializing report: {e}")))?;
        tokio::fs::write(dir.join("report.json"), &json)
            .await
            .map_err(|e| BrokerError::Internal(format!("writing report.json: {e}")))?;

        let html = render_html(&report);
        tokio::fs::write(dir.join("report.html"), html)
            .await
            .map_err(|e| BrokerError::Internal(format!("writing report.html: {e}")))?;

        if let Some(source) = screenshot_source {
            let dest = dir.join("screenshots");
            tokio::fs::create_dir_all(&dest).await.ok();
            for state in &report.states {
                if let Some(name) = &state.screenshot {
                    let _ = tokio::fs::copy(source.join(name), dest.join(name)).await;
                }
            }
        }

        Ok(dir)
    }
}

/// Single-file HTML template with placeholders substituted; no dynamic JS
/// required for correctness (spec.md §4.6).
fn render_html(report: &CrawlReport) -> String {
    let states_rows: String = report
        .states
        .iter()
        .map(|s| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                html_escape(&s.state_hash),
                html_escape(&s.url),
                html_escape(&s.title),
                s.depth
            )
        })
        .collect();
    let error_rows: String = report
        .errors
        .iter()
        .map(|e| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                e.step,
                html_escape(&e.action),
                html_escape(&e.target),
                html_escape(&e.message)
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>Crawl report: {crawl_id}</title></head>
<body>
<h1>Crawl report: {crawl_id}</h1>
<p>Goal: {goal}</p>
<p>Start URL: {start_url}</p>
<p>Status: {status:?}</p>
<h2>Stats</h2>
<ul>
<li>Pages visited: {pages_visited}</li>
<li>Total links: {total_links}</li>
<li>Max depth: {max_depth}</li>
<li>Duration (ms): {duration_ms}</li>
<li>Screenshots: {screenshots}</li>
<li>Errors: {errors}</li>
</ul>
<h2>States</h2>
<table border="1"><tr><th>Hash</th><th>URL</th><th>Title</th><th>Depth</th></tr>{states_rows}</table>
<h2>Errors</h2>
<table border="1"><tr><th>Step</th><th>Action</th><th>Target</th><th>Message</th></tr>{error_rows}</table>
</body></html>"#,
        crawl_id = html_escape(&report.crawl_id),
        goal = html_escape(&report.goal),
        start_url = html_escape(&report.start_url),
        status = report.status,
        pages_visited = report.stats.pages_visited,
        total_links = report.stats.total_links,
        max_depth = report.stats.max_depth,
        duration_ms = report.stats.duration_ms,
        screenshots = report.stats.screenshots,
        errors = report.stats.errors,
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finalize_writes_json_and_html() {
        let dir = tempfile::tempdir().unwrap();
        let mut reporter = Reporter::new("crawl-1".into(), "find pricing".into(), "https://example.com".into());
        reporter.record_step();
        reporter.record_state(
            CrawlState {
                state_hash: "abc123".into(),
                url: "https://example.com".into(),
                title: "Home".into(),
                depth: 0,
                snapshot_text: "x".into(),
                discovered_at: chrono::Utc::now(),
                screenshot: None,
            },
            None,
            &PlannerAction::Snapshot,
        );
        let written = reporter.finalize(CrawlStatus::Completed, dir.path(), None).await.unwrap();
        assert!(tokio::fs::try_exists(written.join("report.json")).await.unwrap());
        assert!(tokio::fs::try_exists(written.join("report.html")).await.unwrap());
    }
}
