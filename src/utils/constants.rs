//! Shared default values used across the session manager, guardrails, and
//! autonomous orchestrator.

/// Default guardrail rate limit: 2 requests per second, burst 5.
pub const DEFAULT_GUARDRAIL_RATE_RPS: f64 = 2.0;
pub const DEFAULT_GUARDRAIL_BURST: u32 = 5;

/// Screenshot quality: 80% JPEG compression, used by `browser_take_screenshot`
/// and the autonomous reporter.
pub const SCREENSHOT_QUALITY: u8 = 80;

/// Default maximum crawl depth.
pub const DEFAULT_MAX_DEPTH: u32 = 3;

/// Default maximum pages per autonomous crawl.
pub const DEFAULT_MAX_PAGES: u32 = 50;

/// Chrome user agent string for stealth mode.
///
/// Updated: 2025-01-29 to Chrome 132 (current stable). Chrome releases a new
/// stable build roughly every 4 weeks; revisit quarterly.
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

/// Default session idle timeout (30 minutes).
pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 30 * 60 * 1000;

/// Default maximum concurrent sessions.
pub const DEFAULT_MAX_CONCURRENT_SESSIONS: usize = 64;

/// Bound on the console/network ring buffers kept per tab.
pub const RING_BUFFER_CAPACITY: usize = 200;

/// Bound on outlinks/clickables extracted per observation step.
pub const MAX_LINKS_PER_STEP: usize = 50;
pub const MAX_CLICKABLES_PER_STEP: usize = 20;

/// Default bounded wait for `waitForNetwork=true` tool calls.
pub const DEFAULT_NETWORK_IDLE_TIMEOUT_MS: u64 = 30_000;

/// History window for the autonomous orchestrator's loop detector.
pub const LOOP_DETECTION_WINDOW_SECS: i64 = 60;
pub const LOOP_DETECTION_REPEAT_THRESHOLD: usize = 3;

/// Action-record history retention for loop detection (one hour).
pub const ACTION_HISTORY_RETENTION_SECS: i64 = 3600;
