//! Per-tab accessibility-snapshot registry (spec.md §3 "Snapshot", §4.5).
//!
//! Element identity is accessibility-anchored, not DOM-anchored: every
//! capture assigns opaque `ref-N` keys to the nodes found by
//! [`DriverPage::accessibility_snapshot`](crate::driver::DriverPage::accessibility_snapshot).
//! A tool call naming a `ref` from an older capture of the same tab fails
//! with `RefStale` — the discipline the whole dispatcher leans on to stay
//! deterministic across rerenders.
//!
//! Grounded on `mcp/registry.rs`'s connection-isolated instance-map idiom,
//! generalized from "one entry per crawl" to "one entry per (tab, version)".

use std::collections::HashMap;

use crate::driver::AxNode;
use crate::errors::BrokerError;

/// One captured accessibility tree for a tab.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub version: u64,
    pub captured_at: chrono::DateTime<chrono::Utc>,
    /// `ref-N` -> index used to resolve `[data-ax-ref="N"]` in the page.
    refs: HashMap<String, usize>,
    pub nodes: Vec<AxNode>,
}

impl Snapshot {
    #[must_use]
    pub fn text(&self) -> String {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| format!("- [ref-{i}] {} \"{}\"", n.role, n.name))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Holds the most recent snapshot for a single tab. The tab owns one of
/// these; it is mutated only under the session's per-session mutex
/// (spec.md §5 "Shared resources"), so no internal locking is needed here.
#[derive(Debug, Default)]
pub struct SnapshotRegistry {
    current: Option<Snapshot>,
    next_version: u64,
}

impl SnapshotRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { current: None, next_version: 0 }
    }

    /// Replace the current snapshot with a freshly-captured node list.
    pub fn record(&mut self, nodes: Vec<AxNode>) -> &Snapshot {
        let version = self.next_version;
        self.next_version += 1;
        let refs = (0..nodes.len()).map(|i| (format!("ref-{i}"), i)).collect();
        self.current = Some(Snapshot { version, captured_at: chrono::Utc::now(), refs, nodes });
        self.current.as_ref().expect("just inserted")
    }

    #[must_use]
    pub fn current(&self) -> Option<&Snapshot> {
        self.current.as_ref()
    }

    /// Resolve a `ref-N` string against the current snapshot. Returns the
    /// DOM index used for `[data-ax-ref="..."]` lookups, or `RefStale` if
    /// the ref does not belong to the current capture.
    pub fn resolve(&self, r#ref: &str) -> Result<usize, BrokerError> {
        let snapshot = self.current.as_ref().ok_or_else(|| BrokerError::RefStale(r#ref.to_string()))?;
        snapshot.refs.get(r#ref).copied().ok_or_else(|| BrokerError::RefStale(r#ref.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str) -> AxNode {
        AxNode { role: "button".into(), name: name.into(), tag: "button".into() }
    }

    #[test]
    fn resolves_refs_from_current_snapshot_only() {
        let mut reg = SnapshotRegistry::new();
        reg.record(vec![node("a"), node("b")]);
        assert_eq!(reg.resolve("ref-0").unwrap(), 0);
        assert_eq!(reg.resolve("ref-1").unwrap(), 1);
        assert!(matches!(reg.resolve("ref-99"), Err(BrokerError::RefStale(_))));

        // A new capture invalidates refs from the previous version.
        reg.record(vec![node("c")]);
        assert!(matches!(reg.resolve("ref-1"), Err(BrokerError::RefStale(_))));
        assert_eq!(reg.resolve("ref-0").unwrap(), 0);
    }

    #[test]
    fn empty_registry_is_always_stale() {
        let reg = SnapshotRegistry::new();
        assert!(matches!(reg.resolve("ref-0"), Err(BrokerError::RefStale(_))));
    }
}
