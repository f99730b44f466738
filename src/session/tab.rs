//! A single browser tab within a [`Session`](super::Session): one
//! `DriverPage` plus the most recent accessibility snapshot for it.

use crate::driver::DriverPage;
use crate::snapshot::SnapshotRegistry;

pub struct Tab {
    pub page: DriverPage,
    pub snapshots: SnapshotRegistry,
}

impl Tab {
    #[must_use]
    pub fn new(page: DriverPage) -> Self {
        Self { page, snapshots: SnapshotRegistry::new() }
    }

    /// Re-captures the accessibility tree and records it in this tab's
    /// snapshot registry, returning the text form for tool responses.
    pub async fn recapture_snapshot(&mut self) -> anyhow::Result<String> {
        let nodes = self.page.accessibility_snapshot().await?;
        let snapshot = self.snapshots.record(nodes);
        Ok(snapshot.text())
    }
}
