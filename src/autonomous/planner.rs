//! BFS-with-learned-priority planner (spec.md §4.6 "Planner"). Grounded on
//! `crawl_engine/crawl_types.rs`'s `CrawlQueue` (url/depth/retry_count) shape
//! and `crawl_engine/orchestrator.rs`'s `VecDeque`-backed visit queue,
//! reordered here by priority instead of pure FIFO.

use std::collections::{BinaryHeap, HashMap, HashSet};

use sha2::{Digest, Sha256};

use super::scorer::{self, Features};
use super::types::{ClickableElement, CrawlGoal, ObservedPage, PlannerAction};
use crate::utils::url_utils::{has_binary_extension, is_valid_url};

/// One pending outlink, ordered by `(depth asc, score desc)` as spec.md
/// §4.6 requires — shallower pages drain first, ties broken by score.
#[derive(Debug, Clone)]
struct QueueItem {
    url: String,
    depth: u32,
    score: f64,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.depth == other.depth && self.score == other.score
    }
}
impl Eq for QueueItem {}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap; we want shallower depth first, so invert
        // depth, then prefer higher score.
        other
            .depth
            .cmp(&self.depth)
            .then_with(|| self.score.partial_cmp(&other.score).unwrap_or(std::cmp::Ordering::Equal))
    }
}
impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Static eligibility rules for whether an outlink even enters the queue.
pub struct EligibilityRules {
    pub max_depth: u32,
    pub max_pages: u32,
    pub allowed_domains: Option<Vec<String>>,
    pub blocked_regex: Option<regex::Regex>,
}

pub struct Planner {
    goal: CrawlGoal,
    rules: EligibilityRules,
    queue: BinaryHeap<QueueItem>,
    visited_states: HashSet<String>,
    visited_url_patterns: HashMap<String, usize>,
    learned_patterns: HashMap<String, f64>,
    pub pages_visited: u32,
}

impl Planner {
    #[must_use]
    pub fn new(goal: CrawlGoal, rules: EligibilityRules) -> Self {
        Self {
            goal,
            rules,
            queue: BinaryHeap::new(),
            visited_states: HashSet::new(),
            visited_url_patterns: HashMap::new(),
            learned_patterns: HashMap::new(),
            pages_visited: 0,
        }
    }

    /// `stateHash = SHA-256(canonicalSnapshotBytes)[:16]` (spec.md §4.6).
    #[must_use]
    pub fn state_hash(snapshot_text: &str) -> String {
        let digest = Sha256::digest(snapshot_text.as_bytes());
        hex::encode(digest)[..16].to_string()
    }

    fn is_eligible(&self, url: &str, depth: u32) -> bool {
        if depth > self.rules.max_depth || self.pages_visited >= self.rules.max_pages {
            return false;
        }
        if !is_valid_url(url) || has_binary_extension(url) {
            return false;
        }
        if let Some(allowed) = &self.rules.allowed_domains {
            let Some(host) = crate::utils::url_utils::extract_host(url) else { return false };
            if !allowed.iter().any(|d| host == *d || host.ends_with(&format!(".{d}"))) {
                return false;
            }
        }
        if let Some(re) = &self.rules.blocked_regex {
            if re.is_match(url) {
                return false;
            }
        }
        true
    }

    /// Registers the observation's state hash and enqueues eligible
    /// outlinks (spec.md §4.6 "On observe"). A state already known to
    /// memory still has its fresh outlinks enqueued, it just isn't
    /// re-scored as a "new state" by the caller.
    pub fn observe(&mut self, observed: &ObservedPage, depth: u32) -> (String, bool) {
        let state_hash = Self::state_hash(&observed.snapshot_text);
        let is_new = self.visited_states.insert(state_hash.clone());

        for link in &observed.links {
            if !self.is_eligible(link, depth + 1) {
                continue;
            }
            let pattern = scorer::pattern_key(link);
            let siblings = *self.visited_url_patterns.get(&pattern).unwrap_or(&0);
            let learned = *self.learned_patterns.get(&pattern).unwrap_or(&0.0);
            let features = scorer::features_for_url(link, depth + 1, &self.goal.keywords, siblings, learned);
            let priority = scorer::score(&features);
            self.queue.push(QueueItem { url: link.clone(), depth: depth + 1, score: priority });
        }

        (state_hash, is_new)
    }

    /// Picks the next action: queue head, else the best "interesting"
    /// clickable on the current page, else `finish` (spec.md §4.6
    /// "Next target").
    pub fn next_action(&mut self, observed: &ObservedPage) -> PlannerAction {
        if self.pages_visited >= self.rules.max_pages {
            return PlannerAction::Finish { reason: "max pages reached".to_string() };
        }

        if let Some(item) = self.pop_next_queued() {
            let pattern = scorer::pattern_key(&item.url);
            *self.visited_url_patterns.entry(pattern).or_insert(0) += 1;
            return PlannerAction::Navigate {
                url: item.url,
                depth: item.depth,
                priority: item.score,
                reason: "queued outlink".to_string(),
            };
        }

        if let Some(clickable) = self.best_clickable(&observed.clickables) {
            return PlannerAction::Click {
                ref_id: clickable.ref_id.clone(),
                text: clickable.text.clone(),
                priority: 5.0,
                reason: "interesting clickable on current page".to_string(),
            };
        }

        PlannerAction::Finish { reason: "queue exhausted, no interesting clickables".to_string() }
    }

    fn pop_next_queued(&mut self) -> Option<QueueItem> {
        self.queue.pop()
    }

    fn best_clickable<'a>(&self, clickables: &'a [ClickableElement]) -> Option<&'a ClickableElement> {
        clickables
            .iter()
            .filter(|c| scorer::is_interesting_clickable(&c.text, &c.role))
            .max_by(|a, b| a.text.len().cmp(&b.text.len()))
    }

    /// Learning update after a navigation attempt, whether or not it
    /// produced a new state (spec.md §4.6 "Learning").
    pub fn record_outcome(&mut self, url: &str, success: bool) {
        let pattern = scorer::pattern_key(url);
        let delta = if success { 0.1 } else { -0.05 };
        let entry = self.learned_patterns.entry(pattern).or_insert(0.0);
        *entry = (*entry + delta).clamp(-1.0, 1.0);
    }

    pub fn mark_page_visited(&mut self) {
        self.pages_visited += 1;
    }

    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> EligibilityRules {
        EligibilityRules { max_depth: 3, max_pages: 50, allowed_domains: None, blocked_regex: None }
    }

    #[test]
    fn observe_enqueues_eligible_outlinks_only() {
        let mut planner = Planner::new(CrawlGoal::new("find pricing info"), rules());
        let observed = ObservedPage {
            url: "https://example.com".into(),
            title: "Home".into(),
            snapshot_text: "home page".into(),
            links: vec![
                "https://example.com/pricing".into(),
                "https://example.com/image.png".into(),
                "javascript:void(0)".into(),
            ],
            clickables: vec![],
        };
        planner.observe(&observed, 0);
        assert_eq!(planner.queue_len(), 1);
    }

    #[test]
    fn next_action_prefers_queue_head_then_clickable_then_finish() {
        let mut planner = Planner::new(CrawlGoal::new("docs"), rules());
        let empty = ObservedPage {
            url: "https://example.com".into(),
            title: "t".into(),
            snapshot_text: "x".into(),
            links: vec![],
            clickables: vec![],
        };
        assert!(matches!(planner.next_action(&empty), PlannerAction::Finish { .. }));

        let with_clickable = ObservedPage {
            clickables: vec![ClickableElement {
                ref_id: "ref-0".into(),
                role: "button".into(),
                text: "Read the documentation".into(),
            }],
            ..empty
        };
        assert!(matches!(planner.next_action(&with_clickable), PlannerAction::Click { .. }));
    }

    #[test]
    fn record_outcome_adjusts_learned_pattern_within_bounds() {
        let mut planner = Planner::new(CrawlGoal::new("x"), rules());
        for _ in 0..50 {
            planner.record_outcome("https://example.com/a/1", true);
        }
        let pattern = scorer::pattern_key("https://example.com/a/1");
        assert_eq!(*planner.learned_patterns.get(&pattern).unwrap(), 1.0);
    }
}
