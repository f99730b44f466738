//! Feature extraction and priority scoring for the BFS planner (spec.md
//! §4.6 "Scoring"). Grounded on `content_validator.rs`'s feature-flag-style
//! heuristics over a URL/page, recombined here into the fixed-weight linear
//! model the spec calls for.

use std::collections::HashSet;

use crate::utils::url_utils::{extract_host, url_pattern};

/// Stop words dropped when deriving goal keywords from the crawl goal text.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "the", "of", "to", "in", "on", "for", "with", "is", "are", "find", "about",
    "that", "this", "from", "by", "or", "as", "at", "be", "it", "all", "any",
];

/// Extracts lowercased, stop-word-filtered keywords from a crawl goal,
/// held for the lifetime of the session (spec.md §4.6).
#[must_use]
pub fn extract_goal_keywords(goal: &str) -> HashSet<String> {
    goal.split(|c: char| !c.is_alphanumeric())
        .map(|w| w.to_ascii_lowercase())
        .filter(|w| w.len() > 2 && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

const UTILITY_PATH_HINTS: &[&str] = &[
    "login", "signin", "signup", "register", "logout", "terms", "privacy", "cookie-policy",
    "cookies", "legal",
];
const NAV_PATH_HINTS: &[&str] = &["category", "tag", "tags", "archive", "page", "sitemap"];
const CONTENT_PATH_HINTS: &[&str] = &["article", "post", "blog", "docs", "guide", "story", "news"];

/// Linear-model weights applied to the feature vector below, in the same
/// order `features()` produces them. Tuned by hand, not learned: only
/// `learned_score` (the last feature) adapts at runtime.
const WEIGHTS: [f64; 10] = [
    -0.15, // depth (deeper pages score lower)
    -0.002, // url length
    -0.05, // path segment count
    -0.1, // query param count
    0.8, // looks_like_content_page
    -0.3, // looks_like_navigation
    -1.5, // looks_like_utility
    1.2, // contains_goal_keyword
    2.0, // semantic_relevance (share of goal keywords present)
    1.5, // learned_score for this URL pattern
];
const VISITED_SIBLING_WEIGHT: f64 = -0.2;
const BIAS: f64 = 0.5;

/// The feature vector spec.md §4.6 describes, computed once per candidate
/// URL or clickable.
#[derive(Debug, Clone, Copy, Default)]
pub struct Features {
    pub depth: f64,
    pub url_length: f64,
    pub path_segments: f64,
    pub query_params: f64,
    pub looks_like_content_page: f64,
    pub looks_like_navigation: f64,
    pub looks_like_utility: f64,
    pub contains_goal_keyword: f64,
    pub semantic_relevance: f64,
    pub learned_score: f64,
    pub visited_siblings: f64,
}

impl Features {
    fn as_array(&self) -> [f64; 10] {
        [
            self.depth,
            self.url_length,
            self.path_segments,
            self.query_params,
            self.looks_like_content_page,
            self.looks_like_navigation,
            self.looks_like_utility,
            self.contains_goal_keyword,
            self.semantic_relevance,
            self.learned_score,
        ]
    }
}

/// Computes the feature vector for a candidate outlink URL.
#[must_use]
pub fn features_for_url(
    url: &str,
    depth: u32,
    goal_keywords: &HashSet<String>,
    visited_siblings: usize,
    learned_score: f64,
) -> Features {
    let lower = url.to_ascii_lowercase();
    let path_segments = url::Url::parse(url)
        .ok()
        .and_then(|u| u.path_segments().map(|s| s.count()))
        .unwrap_or(0);
    let query_params =
        url::Url::parse(url).ok().map(|u| u.query_pairs().count()).unwrap_or(0);

    let looks_like_utility = UTILITY_PATH_HINTS.iter().any(|h| lower.contains(h));
    let looks_like_navigation = !looks_like_utility && NAV_PATH_HINTS.iter().any(|h| lower.contains(h));
    let looks_like_content =
        !looks_like_utility && CONTENT_PATH_HINTS.iter().any(|h| lower.contains(h));

    let matched_keywords = goal_keywords.iter().filter(|kw| lower.contains(kw.as_str())).count();
    let semantic_relevance = if goal_keywords.is_empty() {
        0.0
    } else {
        matched_keywords as f64 / goal_keywords.len() as f64
    };

    Features {
        depth: depth as f64,
        url_length: url.len() as f64,
        path_segments: path_segments as f64,
        query_params: query_params as f64,
        looks_like_content_page: f64::from(looks_like_content),
        looks_like_navigation: f64::from(looks_like_navigation),
        looks_like_utility: f64::from(looks_like_utility),
        contains_goal_keyword: f64::from(matched_keywords > 0),
        semantic_relevance,
        learned_score,
        visited_siblings: visited_siblings as f64,
    }
}

/// Passes the feature vector through the fixed-weight linear model, a
/// logistic squash to `[0, 1]`, then scales to `[0, 10]` priority.
#[must_use]
pub fn score(features: &Features) -> f64 {
    let linear: f64 = features
        .as_array()
        .iter()
        .zip(WEIGHTS.iter())
        .map(|(f, w)| f * w)
        .sum::<f64>()
        + features.visited_siblings * VISITED_SIBLING_WEIGHT
        + BIAS;
    let logistic = 1.0 / (1.0 + (-linear).exp());
    logistic * 10.0
}

/// Convenience wrapper for a "does this look like an interesting
/// clickable" threshold check (spec.md §4.6 "Next target").
#[must_use]
pub fn is_interesting_clickable(text: &str, role: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.len() < 3 || trimmed.len() > 120 {
        return false;
    }
    let lower = trimmed.to_ascii_lowercase();
    let destructive = ["delete", "cancel", "logout", "sign out", "remove", "deactivate"];
    if destructive.iter().any(|d| lower.contains(d)) {
        return false;
    }
    matches!(role, "button" | "a" | "link" | "menuitem" | "tab")
}

/// Re-derives the URL-pattern key used for the learned-score table,
/// delegating to the shared helper so planner and guardrails agree on one
/// normalization.
#[must_use]
pub fn pattern_key(url: &str) -> String {
    url_pattern(url)
}

/// Host used to count per-pattern "visited siblings" (spec.md §4.6).
#[must_use]
pub fn host_of(url: &str) -> Option<String> {
    extract_host(url)
}
