//! Event type definitions for the crawl event system
//!
//! This module contains the core event types published on the crawl event
//! bus during an autonomous crawl session.

use serde::{Deserialize, Serialize};

/// Reason for event bus shutdown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ShutdownReason {
    /// Crawl completed successfully
    CrawlCompleted,
    /// Crawl encountered an error
    Error(String),
    /// Crawl was cancelled by user
    Cancelled,
}

/// Event types emitted during an autonomous crawl session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CrawlEvent {
    /// Emitted when a crawl session starts
    CrawlStarted {
        crawl_id: String,
        start_url: String,
        goal: String,
        max_depth: u32,
        max_pages: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// Emitted after the executor observes the current tab for a step
    StepObserved {
        crawl_id: String,
        step: u64,
        url: String,
        title: String,
        links_found: usize,
        clickable_found: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// Emitted when the planner proposes an action
    ActionPlanned {
        crawl_id: String,
        kind: String,
        target: String,
        priority: f64,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// Emitted when a guardrail rejects a proposed action
    ActionBlocked {
        crawl_id: String,
        kind: String,
        target: String,
        rule: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// Emitted when the executor runs an action against the driver
    ActionExecuted {
        crawl_id: String,
        kind: String,
        target: String,
        succeeded: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// Emitted when the planner records a newly discovered, not-yet-visited state
    StateDiscovered {
        crawl_id: String,
        state_hash: String,
        url: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// Emitted when the entire crawl session completes (success, error, or cancellation)
    CrawlCompleted {
        crawl_id: String,
        pages_visited: usize,
        total_links: usize,
        duration: std::time::Duration,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    /// Signals that the event bus is shutting down
    ///
    /// Subscribers should exit their event loops when receiving this event.
    Shutdown {
        reason: ShutdownReason,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

/// Result of publishing a batch of events
///
/// Provides detailed information about batch publication success/failure.
/// Unlike a Result type, this always represents successful execution of the
/// batch operation itself - the fields indicate how many individual events
/// succeeded or failed within the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPublishResult {
    /// Total number of events in the batch
    pub total: usize,

    /// Number of events successfully published
    pub published: usize,

    /// Number of events that failed to publish (no active subscribers)
    pub failed: usize,

    /// Peak subscriber count observed during batch
    pub max_subscribers: usize,
}

impl BatchPublishResult {
    /// Check if all events were successfully published
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.published == self.total && self.failed == 0
    }

    /// Check if any events failed to publish
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Calculate success rate as a percentage
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.published as f64 / self.total as f64) * 100.0
    }
}

/// Helper constructors for common events
impl CrawlEvent {
    #[must_use]
    pub fn crawl_started(crawl_id: String, start_url: String, goal: String, max_depth: u32, max_pages: u32) -> Self {
        Self::CrawlStarted {
            crawl_id,
            start_url,
            goal,
            max_depth,
            max_pages,
            timestamp: chrono::Utc::now(),
        }
    }

    #[must_use]
    pub fn step_observed(
        crawl_id: String,
        step: u64,
        url: String,
        title: String,
        links_found: usize,
        clickable_found: usize,
    ) -> Self {
        Self::StepObserved {
            crawl_id,
            step,
            url,
            title,
            links_found,
            clickable_found,
            timestamp: chrono::Utc::now(),
        }
    }

    #[must_use]
    pub fn action_planned(crawl_id: String, kind: String, target: String, priority: f64, reason: String) -> Self {
        Self::ActionPlanned {
            crawl_id,
            kind,
            target,
            priority,
            reason,
            timestamp: chrono::Utc::now(),
        }
    }

    #[must_use]
    pub fn action_blocked(crawl_id: String, kind: String, target: String, rule: String) -> Self {
        Self::ActionBlocked {
            crawl_id,
            kind,
            target,
            rule,
            timestamp: chrono::Utc::now(),
        }
    }

    #[must_use]
    pub fn action_executed(crawl_id: String, kind: String, target: String, succeeded: bool) -> Self {
        Self::ActionExecuted {
            crawl_id,
            kind,
            target,
            succeeded,
            timestamp: chrono::Utc::now(),
        }
    }

    #[must_use]
    pub fn state_discovered(crawl_id: String, state_hash: String, url: String) -> Self {
        Self::StateDiscovered {
            crawl_id,
            state_hash,
            url,
            timestamp: chrono::Utc::now(),
        }
    }

    #[must_use]
    pub fn crawl_completed(crawl_id: String, pages_visited: usize, total_links: usize, duration: std::time::Duration) -> Self {
        Self::CrawlCompleted {
            crawl_id,
            pages_visited,
            total_links,
            duration,
            timestamp: chrono::Utc::now(),
        }
    }

    #[must_use]
    pub fn shutdown(reason: ShutdownReason) -> Self {
        Self::Shutdown {
            reason,
            timestamp: chrono::Utc::now(),
        }
    }
}
