//! Autonomous crawl orchestrator (spec.md §4.6): one active crawl per
//! broker session, driven by a single task ("a single goroutine-equivalent
//! drives the loop"). Grounded on `crawl_engine/orchestrator.rs`'s
//! step-loop shape, generalized from "fetch + extract + enqueue" to
//! "observe + plan + guard + execute", with the same `CrawlEventBus`
//! publication points already built for `crate::crawl_events`.

mod executor;
mod guardrails;
mod memory;
mod planner;
mod reporter;
mod scorer;
mod types;

pub use guardrails::GuardrailConfig;
pub use memory::{ExternalMemoryStore, LocalMemoryStore, MemoryBackend};
pub use planner::EligibilityRules;
pub use reporter::Reporter;
pub use types::{CrawlGoal, CrawlReport, CrawlState, CrawlStatus, PlannerAction};

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::crawl_events::CrawlEventBus;
use crate::errors::BrokerError;
use crate::session::Session;

use guardrails::Guardrails;
use planner::Planner;

/// Caller-supplied parameters for a `browser_start_crawl`-style tool call
/// (spec.md §4.6, §6).
pub struct CrawlConfig {
    pub start_url: String,
    pub goal: String,
    pub max_depth: u32,
    pub max_pages: u32,
    pub allowed_domains: Option<Vec<String>>,
    pub blocked_domains: Vec<String>,
    pub blocked_regex: Option<regex::Regex>,
    pub per_host_visit_cap: u32,
    pub rate_per_sec: f64,
    pub burst: f64,
    pub session_timeout: chrono::Duration,
    pub output_dir: PathBuf,
    pub capture_screenshots: bool,
}

/// Caller-facing handle to a running (or finished) crawl: status, the live
/// report, and a cooperative stop signal.
pub struct CrawlHandle {
    pub crawl_id: String,
    status: Arc<Mutex<CrawlStatus>>,
    report: Arc<Mutex<Option<CrawlReport>>>,
    stop_requested: Arc<AtomicBool>,
    task: tokio::task::JoinHandle<()>,
}

impl CrawlHandle {
    pub async fn status(&self) -> CrawlStatus {
        *self.status.lock().await
    }

    pub async fn report(&self) -> Option<CrawlReport> {
        self.report.lock().await.clone()
    }

    /// Cooperative stop: the loop checks this once per step and ends the
    /// crawl as `cancelled` on the next iteration boundary.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Starts the autonomous crawl loop against `tab_index` of `session` as a
/// background task, returning immediately with a handle.
#[must_use]
pub fn start(
    session: Arc<Session>,
    tab_index: usize,
    config: CrawlConfig,
    memory: Arc<dyn MemoryBackend>,
    events: Option<Arc<CrawlEventBus>>,
) -> CrawlHandle {
    let crawl_id = uuid::Uuid::new_v4().to_string();
    let status = Arc::new(Mutex::new(CrawlStatus::Running));
    let report = Arc::new(Mutex::new(None));
    let stop_requested = Arc::new(AtomicBool::new(false));

    let task = tokio::spawn(run_loop(
        crawl_id.clone(),
        session,
        tab_index,
        config,
        memory,
        events,
        status.clone(),
        report.clone(),
        stop_requested.clone(),
    ));

    CrawlHandle { crawl_id, status, report, stop_requested, task }
}

#[allow(clippy::too_many_arguments)]
async fn run_loop(
    crawl_id: String,
    session: Arc<Session>,
    tab_index: usize,
    config: CrawlConfig,
    memory: Arc<dyn MemoryBackend>,
    events: Option<Arc<CrawlEventBus>>,
    status: Arc<Mutex<CrawlStatus>>,
    report_slot: Arc<Mutex<Option<CrawlReport>>>,
    stop_requested: Arc<AtomicBool>,
) {
    let goal = CrawlGoal::new(config.goal.clone());
    let mut planner = Planner::new(
        goal,
        EligibilityRules {
            max_depth: config.max_depth,
            max_pages: config.max_pages,
            allowed_domains: config.allowed_domains.clone(),
            blocked_regex: config.blocked_regex.clone(),
        },
    );
    let session_deadline = chrono::Utc::now() + config.session_timeout;
    let mut guardrails = Guardrails::new(GuardrailConfig {
        rate_per_sec: config.rate_per_sec,
        burst: config.burst,
        session_deadline,
        max_depth: config.max_depth,
        allowed_domains: config.allowed_domains.clone(),
        blocked_domains: config.blocked_domains.clone(),
        blocked_regex: config.blocked_regex.clone(),
        per_host_visit_cap: config.per_host_visit_cap,
    });
    let mut reporter = Reporter::new(crawl_id.clone(), config.goal.clone(), config.start_url.clone());

    if let Some(bus) = &events {
        let _ = bus
            .publish(crate::crawl_events::CrawlEvent::crawl_started(
                crawl_id.clone(),
                config.start_url.clone(),
                config.goal.clone(),
                config.max_depth,
                config.max_pages,
            ))
            .await;
    }

    let mut current_depth: u32 = 0;
    let mut previous_hash: Option<String> = None;
    let final_status;

    loop {
        if stop_requested.load(Ordering::SeqCst) {
            final_status = CrawlStatus::Cancelled;
            break;
        }

        // Terminal, not just per-action: a planner that keeps proposing
        // non-terminal actions without ever reaching `Finish` must still
        // stop within the session deadline (spec.md §8 "Crawl termination").
        if chrono::Utc::now() > session_deadline {
            reporter.record_error(&PlannerAction::Finish { reason: "session timeout".to_string() }, "session timeout exceeded".to_string());
            final_status = CrawlStatus::Error;
            break;
        }

        let step = reporter.record_step();
        let observed = {
            let _dispatch = session.dispatch_lock.lock().await;
            let mut tabs = session.tabs().await;
            let Some(tab) = tabs.get_mut(tab_index) else {
                final_status = CrawlStatus::Error;
                break;
            };
            match executor::observe(tab).await {
                Ok(o) => o,
                Err(e) => {
                    reporter.record_error(&PlannerAction::Snapshot, e.to_string());
                    final_status = CrawlStatus::Error;
                    break;
                }
            }
        };

        if let Some(bus) = &events {
            let _ = bus
                .publish(crate::crawl_events::CrawlEvent::step_observed(
                    crawl_id.clone(),
                    step,
                    observed.url.clone(),
                    observed.title.clone(),
                    observed.links.len(),
                    observed.clickables.len(),
                ))
                .await;
        }
        reporter.record_links_observed(observed.links.len());

        let (state_hash, is_new) = planner.observe(&observed, current_depth);
        if is_new {
            let mut screenshot_name = None;
            if config.capture_screenshots {
                let shot = {
                    let _dispatch = session.dispatch_lock.lock().await;
                    let tabs = session.tabs().await;
                    match tabs.get(tab_index) {
                        Some(tab) => executor::capture_screenshot(tab).await,
                        None => Err(BrokerError::NoTab),
                    }
                };
                match shot {
                    Ok(bytes) => match memory.store_screenshot(&state_hash, &bytes).await {
                        Ok(path) => {
                            reporter.record_screenshot();
                            screenshot_name = path.file_name().and_then(|n| n.to_str()).map(str::to_string);
                        }
                        Err(e) => tracing::warn!(error = %e, "failed to store crawl screenshot"),
                    },
                    Err(e) => tracing::warn!(error = %e, "failed to capture crawl screenshot"),
                }
            }

            let state = CrawlState {
                state_hash: state_hash.clone(),
                url: observed.url.clone(),
                title: observed.title.clone(),
                depth: current_depth,
                snapshot_text: observed.snapshot_text.clone(),
                discovered_at: chrono::Utc::now(),
                screenshot: screenshot_name,
            };
            let _ = memory.store_state(&state).await;
            reporter.record_state(state, previous_hash.as_deref(), &PlannerAction::Snapshot);
            if let Some(bus) = &events {
                let _ = bus
                    .publish(crate::crawl_events::CrawlEvent::state_discovered(
                        crawl_id.clone(),
                        state_hash.clone(),
                        observed.url.clone(),
                    ))
                    .await;
            }
        }
        previous_hash = Some(state_hash);

        let action = planner.next_action(&observed);
        if let Some(bus) = &events {
            let (priority, reason) = action_priority_reason(&action);
            let _ = bus
                .publish(crate::crawl_events::CrawlEvent::action_planned(
                    crawl_id.clone(),
                    action.kind().to_string(),
                    action.target(),
                    priority,
                    reason,
                ))
                .await;
        }

        if let PlannerAction::Finish { .. } = &action {
            final_status = CrawlStatus::Completed;
            break;
        }

        if let Err(BrokerError::Blocked(rule)) = guardrails.check(&action, current_depth) {
            if let Some(bus) = &events {
                let _ = bus
                    .publish(crate::crawl_events::CrawlEvent::action_blocked(
                        crawl_id.clone(),
                        action.kind().to_string(),
                        action.target(),
                        rule.clone(),
                    ))
                    .await;
            }
            reporter.record_error(&action, format!("blocked by guardrail: {rule}"));
            if rule == "session_timeout" {
                final_status = CrawlStatus::Error;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            continue;
        }

        if let PlannerAction::Navigate { depth, .. } = &action {
            current_depth = *depth;
        }

        let exec_result = {
            let _dispatch = session.dispatch_lock.lock().await;
            let mut tabs = session.tabs().await;
            match tabs.get_mut(tab_index) {
                Some(tab) => executor::execute(&action, tab).await,
                None => Err(BrokerError::NoTab),
            }
        };

        let succeeded = exec_result.is_ok();
        if let Some(bus) = &events {
            let _ = bus
                .publish(crate::crawl_events::CrawlEvent::action_executed(
                    crawl_id.clone(),
                    action.kind().to_string(),
                    action.target(),
                    succeeded,
                ))
                .await;
        }

        match exec_result {
            Ok(()) => {
                if let PlannerAction::Navigate { url, .. } = &action {
                    planner.record_outcome(url, true);
                    planner.mark_page_visited();
                }
            }
            Err(e) => {
                if let PlannerAction::Navigate { url, .. } = &action {
                    planner.record_outcome(url, false);
                }
                reporter.record_error(&action, e.to_string());
            }
        }

        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    }

    if let Some(bus) = &events {
        if final_status == CrawlStatus::Cancelled {
            let _ = bus
                .publish(crate::crawl_events::CrawlEvent::shutdown(crate::crawl_events::ShutdownReason::Cancelled))
                .await;
        } else {
            let report = reporter.build(final_status);
            let _ = bus
                .publish(crate::crawl_events::CrawlEvent::crawl_completed(
                    crawl_id.clone(),
                    report.stats.pages_visited,
                    report.stats.total_links,
                    std::time::Duration::from_millis(report.stats.duration_ms),
                ))
                .await;
        }
    }

    let _ = reporter.finalize(final_status, &config.output_dir, memory.screenshot_dir().as_deref()).await;
    *report_slot.lock().await = Some(reporter.build(final_status));
    *status.lock().await = final_status;
}

fn action_priority_reason(action: &PlannerAction) -> (f64, String) {
    match action {
        PlannerAction::Navigate { priority, reason, .. } => (*priority, reason.clone()),
        PlannerAction::Click { priority, reason, .. } => (*priority, reason.clone()),
        PlannerAction::Type { priority, reason, .. } => (*priority, reason.clone()),
        PlannerAction::Wait { .. } => (0.0, "sleep".to_string()),
        PlannerAction::Snapshot => (0.0, "capture only".to_string()),
        PlannerAction::Finish { reason } => (0.0, reason.clone()),
    }
}
