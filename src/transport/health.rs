//! `/health`, `/ready`, `/live` (spec.md §4.8). `/ready` and `/live` are
//! constant-time OK responses; `/health` aggregates independent probes
//! (heap vs total memory, uptime, session count) into a worst-status
//! rollup, read from `/proc` on Linux with a trivial fallback elsewhere —
//! the teacher has no metrics crate to lean on here, so this stays
//! hand-rolled rather than pulling in a new dependency for three numbers.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use super::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum Status {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize)]
struct MemoryProbe {
    rss_bytes: u64,
    total_bytes: u64,
    ratio: f64,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: Status,
    uptime_secs: i64,
    active_sessions: usize,
    active_crawls: usize,
    memory: Option<MemoryProbe>,
    node_id: String,
}

/// Reads RSS from `/proc/self/statm` and total memory from
/// `/proc/meminfo`. Returns `None` off Linux or on any parse failure —
/// a missing probe degrades the `/health` body, not the process.
#[cfg(target_os = "linux")]
fn memory_probe() -> Option<MemoryProbe> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let rss_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    // SAFETY: sysconf with a valid name constant never touches memory we own.
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if page_size <= 0 {
        return None;
    }
    let rss_bytes = rss_pages * page_size as u64;

    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    let total_kb: u64 = meminfo
        .lines()
        .find(|l| l.starts_with("MemTotal:"))
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|v| v.parse().ok())?;
    let total_bytes = total_kb * 1024;

    Some(MemoryProbe { rss_bytes, total_bytes, ratio: rss_bytes as f64 / total_bytes.max(1) as f64 })
}

#[cfg(not(target_os = "linux"))]
fn memory_probe() -> Option<MemoryProbe> {
    None
}

/// `GET /health`: worst-status rollup across independent probes (spec.md
/// §4.8). No single probe failing stops the others from reporting.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let memory = memory_probe();
    let active_sessions = state.session_manager.active_count().await;
    let active_crawls = state.tool_ctx.crawls.len();

    const DEGRADED_RATIO: f64 = 0.85;
    const UNHEALTHY_RATIO: f64 = 0.97;

    let status = match memory.as_ref().map(|m| m.ratio) {
        Some(ratio) if ratio >= UNHEALTHY_RATIO => Status::Unhealthy,
        Some(ratio) if ratio >= DEGRADED_RATIO => Status::Degraded,
        _ => Status::Healthy,
    };

    let body = HealthResponse {
        status,
        uptime_secs: chrono::Utc::now().signed_duration_since(state.started_at).num_seconds(),
        active_sessions,
        active_crawls,
        memory,
        node_id: state.node_id.to_string(),
    };

    let http_status = match body.status {
        Status::Healthy => axum::http::StatusCode::OK,
        Status::Degraded => axum::http::StatusCode::OK,
        Status::Unhealthy => axum::http::StatusCode::SERVICE_UNAVAILABLE,
    };

    (http_status, Json(body))
}

/// `GET /ready`: cheap constant-time check — the process is up and able to
/// accept the session-manager lock, nothing more.
pub async fn ready() -> impl IntoResponse {
    (axum::http::StatusCode::OK, Json(serde_json::json!({"ready": true})))
}

/// `GET /live`: constant-time liveness probe.
pub async fn live() -> impl IntoResponse {
    (axum::http::StatusCode::OK, Json(serde_json::json!({"alive": true})))
}
