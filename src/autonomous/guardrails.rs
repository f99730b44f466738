//! Ordered guardrail checks for the autonomous orchestrator (spec.md §4.6
//! "Guardrails"). The crawl loop is single-threaded per session ("a single
//! goroutine-equivalent drives the loop"), so unlike the teacher's
//! cross-crawl `rate_limiter.rs` this bucket needs no lock-free atomics —
//! grounded on the same token-bucket *idiom*, simplified to a plain struct
//! behind the orchestrator's own sequencing.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use regex::Regex;

use super::types::PlannerAction;
use crate::errors::BrokerError;
use crate::utils::constants::{
    ACTION_HISTORY_RETENTION_SECS, LOOP_DETECTION_REPEAT_THRESHOLD, LOOP_DETECTION_WINDOW_SECS,
};
use crate::utils::url_utils::extract_host;

struct TokenBucket {
    tokens: f64,
    capacity: f64,
    rate_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(rate_per_sec: f64, burst: f64) -> Self {
        Self { tokens: burst, capacity: burst, rate_per_sec, last_refill: Instant::now() }
    }

    fn try_consume(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate_per_sec).min(self.capacity);
        self.last_refill = now;
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

struct HistoryEntry {
    kind: &'static str,
    target: String,
    at: chrono::DateTime<chrono::Utc>,
}

pub struct GuardrailConfig {
    pub rate_per_sec: f64,
    pub burst: f64,
    pub session_deadline: chrono::DateTime<chrono::Utc>,
    pub max_depth: u32,
    pub allowed_domains: Option<Vec<String>>,
    pub blocked_domains: Vec<String>,
    pub blocked_regex: Option<Regex>,
    pub per_host_visit_cap: u32,
}

/// Destructive-intent / sensitive-data pattern lists (spec.md §4.6 rules 6-7).
const DESTRUCTIVE_PATTERNS: &[&str] =
    &["delete", "cancel", "logout", "sign out", "purchase", "submit-payment", "checkout", "remove account"];
const SENSITIVE_PATTERNS: &[&str] = &["password", "token", "credit-card", "credit card", "ssn", "social security"];

pub struct Guardrails {
    config: GuardrailConfig,
    bucket: TokenBucket,
    host_counts: std::collections::HashMap<String, u32>,
    history: VecDeque<HistoryEntry>,
}

impl Guardrails {
    #[must_use]
    pub fn new(config: GuardrailConfig) -> Self {
        let bucket = TokenBucket::new(config.rate_per_sec, config.burst);
        Self { config, bucket, host_counts: std::collections::HashMap::new(), history: VecDeque::new() }
    }

    /// Runs the ordered rejection rules (spec.md §4.6); first match wins.
    pub fn check(&mut self, action: &PlannerAction, current_depth: u32) -> Result<(), BrokerError> {
        if !self.bucket.try_consume() {
            return Err(BrokerError::Blocked("rate_limit".to_string()));
        }
        if chrono::Utc::now() > self.config.session_deadline {
            return Err(BrokerError::Blocked("session_timeout".to_string()));
        }
        let depth = match action {
            PlannerAction::Navigate { depth, .. } => *depth,
            _ => current_depth,
        };
        if depth > self.config.max_depth {
            return Err(BrokerError::Blocked("depth_cap".to_string()));
        }

        match action {
            PlannerAction::Navigate { url, .. } => self.check_navigate(url)?,
            PlannerAction::Click { text, .. } => self.check_click(text)?,
            PlannerAction::Type { text, .. } => self.check_type(text)?,
            PlannerAction::Wait { .. } | PlannerAction::Snapshot | PlannerAction::Finish { .. } => {}
        }

        self.record_allowed(action);
        Ok(())
    }

    fn check_navigate(&mut self, url: &str) -> Result<(), BrokerError> {
        let parsed = url::Url::parse(url).map_err(|_| BrokerError::Blocked("invalid_url".to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(BrokerError::Blocked("scheme_not_allowed".to_string()));
        }
        let host = extract_host(url).ok_or_else(|| BrokerError::Blocked("no_host".to_string()))?;
        if let Some(allowed) = &self.config.allowed_domains {
            if !allowed.iter().any(|d| host == *d || host.ends_with(&format!(".{d}"))) {
                return Err(BrokerError::Blocked("host_not_allowlisted".to_string()));
            }
        }
        if self.config.blocked_domains.iter().any(|d| host == *d || host.ends_with(&format!(".{d}"))) {
            return Err(BrokerError::Blocked("host_blocklisted".to_string()));
        }
        if let Some(re) = &self.config.blocked_regex {
            if re.is_match(url) {
                return Err(BrokerError::Blocked("url_regex_blocked".to_string()));
            }
        }
        let count = *self.host_counts.get(&host).unwrap_or(&0);
        if count >= self.config.per_host_visit_cap {
            return Err(BrokerError::Blocked("per_host_visit_cap".to_string()));
        }

        self.check_loop_detection(url)?;
        Ok(())
    }

    /// Same URL visited >= 3 times in the last 60s, or an A<->B oscillation
    /// over the last six navigations (spec.md §4.6 rule 5).
    fn check_loop_detection(&self, url: &str) -> Result<(), BrokerError> {
        let window_start = chrono::Utc::now() - chrono::Duration::seconds(LOOP_DETECTION_WINDOW_SECS);
        let recent_repeats = self
            .history
            .iter()
            .filter(|e| e.kind == "navigate" && e.target == url && e.at >= window_start)
            .count();
        if recent_repeats + 1 >= LOOP_DETECTION_REPEAT_THRESHOLD {
            return Err(BrokerError::Blocked("loop_detected_repeat".to_string()));
        }

        let last_six: Vec<&str> = self
            .history
            .iter()
            .rev()
            .filter(|e| e.kind == "navigate")
            .take(6)
            .map(|e| e.target.as_str())
            .collect();
        if last_six.len() == 6 {
            let distinct: std::collections::HashSet<&str> = last_six.iter().copied().collect();
            if distinct.len() == 2 {
                return Err(BrokerError::Blocked("loop_detected_oscillation".to_string()));
            }
        }
        Ok(())
    }

    fn check_click(&self, text: &str) -> Result<(), BrokerError> {
        let lower = text.to_ascii_lowercase();
        if DESTRUCTIVE_PATTERNS.iter().any(|p| lower.contains(p)) {
            return Err(BrokerError::Blocked("destructive_intent".to_string()));
        }
        Ok(())
    }

    fn check_type(&self, text: &str) -> Result<(), BrokerError> {
        let lower = text.to_ascii_lowercase();
        if SENSITIVE_PATTERNS.iter().any(|p| lower.contains(p)) {
            return Err(BrokerError::Blocked("sensitive_input".to_string()));
        }
        Ok(())
    }

    fn record_allowed(&mut self, action: &PlannerAction) {
        if let PlannerAction::Navigate { url, .. } = action {
            *self.host_counts.entry(extract_host(url).unwrap_or_default()).or_insert(0) += 1;
        }
        self.history.push_back(HistoryEntry { kind: action.kind(), target: action.target(), at: chrono::Utc::now() });
        let cutoff = chrono::Utc::now() - chrono::Duration::seconds(ACTION_HISTORY_RETENTION_SECS);
        while self.history.front().is_some_and(|e| e.at < cutoff) {
            self.history.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GuardrailConfig {
        GuardrailConfig {
            rate_per_sec: 1000.0,
            burst: 1000.0,
            session_deadline: chrono::Utc::now() + chrono::Duration::hours(1),
            max_depth: 5,
            allowed_domains: None,
            blocked_domains: vec![],
            blocked_regex: None,
            per_host_visit_cap: 100,
        }
    }

    #[test]
    fn rate_limit_trips_after_burst_exhausted() {
        let mut g = Guardrails::new(GuardrailConfig { rate_per_sec: 0.0, burst: 1.0, ..config() });
        let action = PlannerAction::Snapshot;
        assert!(g.check(&action, 0).is_ok());
        assert!(matches!(g.check(&action, 0), Err(BrokerError::Blocked(rule)) if rule == "rate_limit"));
    }

    #[test]
    fn destructive_click_text_is_blocked() {
        let mut g = Guardrails::new(config());
        let action = PlannerAction::Click {
            ref_id: "ref-0".into(),
            text: "Delete my account".into(),
            priority: 1.0,
            reason: "x".into(),
        };
        assert!(matches!(g.check(&action, 0), Err(BrokerError::Blocked(rule)) if rule == "destructive_intent"));
    }

    #[test]
    fn repeated_navigation_trips_loop_detection() {
        let mut g = Guardrails::new(config());
        let url = "https://example.com/a";
        let navigate =
            |u: &str| PlannerAction::Navigate { url: u.to_string(), depth: 1, priority: 1.0, reason: "x".into() };
        assert!(g.check(&navigate(url), 0).is_ok());
        assert!(g.check(&navigate(url), 0).is_ok());
        assert!(matches!(g.check(&navigate(url), 0), Err(BrokerError::Blocked(rule)) if rule == "loop_detected_repeat"));
    }
}
