//! Observation and action execution against the driver (spec.md §4.6
//! "Loop per step" step 1, and "Executor"). The link-extraction script is
//! grounded on `page_extractor/js_scripts.rs`'s `LINKS_SCRIPT` (absolute-URL
//! resolution via `new URL(href, location.href)`, skipping
//! `mailto:`/`javascript:`/`tel:`/`data:`); clickable surfacing reuses the
//! accessibility snapshot already captured for the tab instead of a second
//! DOM query.

use crate::errors::BrokerError;
use crate::session::Tab;
use crate::utils::constants::{MAX_CLICKABLES_PER_STEP, MAX_LINKS_PER_STEP};

use super::types::{ClickableElement, ObservedPage, PlannerAction};

const LINKS_SCRIPT: &str = r#"
(() => {
    const seen = new Set();
    const out = [];
    document.querySelectorAll('a[href]').forEach(a => {
        const href = a.getAttribute('href');
        if (!href) return;
        if (href.startsWith('mailto:') || href.startsWith('javascript:') ||
            href.startsWith('tel:') || href.startsWith('data:') || href.startsWith('#')) {
            return;
        }
        try {
            const absolute = new URL(href, window.location.href).href;
            if (!seen.has(absolute)) {
                seen.add(absolute);
                out.push(absolute);
            }
        } catch (e) {}
    });
    return out;
})()
"#;

const INTERACTIVE_ROLES: &[&str] = &["button", "a", "link", "menuitem", "tab", "checkbox", "radio", "textbox"];

/// Step 1 of the per-step loop: recaptures the snapshot, then derives
/// `links[]` (up to 50) and `clickableElements[]` (up to 20) from it.
pub async fn observe(tab: &mut Tab) -> Result<ObservedPage, BrokerError> {
    let url = tab.page.url().await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    let title = tab.page.title().await.map_err(|e| BrokerError::Driver(e.to_string()))?;

    let nodes = tab.page.accessibility_snapshot().await.map_err(|e| BrokerError::Driver(e.to_string()))?;
    let snapshot_text = tab.snapshots.record(nodes.clone()).text();

    let links: Vec<String> = tab
        .page
        .inner()
        .evaluate(LINKS_SCRIPT)
        .await
        .map_err(|e| BrokerError::Driver(e.to_string()))?
        .into_value()
        .unwrap_or_default();

    let clickables: Vec<ClickableElement> = nodes
        .iter()
        .enumerate()
        .filter(|(_, n)| INTERACTIVE_ROLES.contains(&n.role.as_str()) && !n.name.trim().is_empty())
        .map(|(i, n)| ClickableElement { ref_id: format!("ref-{i}"), role: n.role.clone(), text: n.name.clone() })
        .take(MAX_CLICKABLES_PER_STEP)
        .collect();

    Ok(ObservedPage {
        url,
        title,
        snapshot_text,
        links: links.into_iter().take(MAX_LINKS_PER_STEP).collect(),
        clickables,
    })
}

/// Captures a PNG screenshot of the tab for a newly discovered state
/// (spec.md §4.6 "Memory": screenshots are co-located by `stateHash`).
pub async fn capture_screenshot(tab: &Tab) -> Result<Vec<u8>, BrokerError> {
    tab.page.screenshot().await.map_err(|e| BrokerError::Driver(e.to_string()))
}

/// Step 4 of the per-step loop: translates a guardrail-approved action into
/// driver calls (spec.md §4.6 "Executor").
pub async fn execute(action: &PlannerAction, tab: &mut Tab) -> Result<(), BrokerError> {
    match action {
        PlannerAction::Navigate { url, .. } => {
            tokio::time::timeout(std::time::Duration::from_secs(30), tab.page.navigate(url))
                .await
                .map_err(|_| BrokerError::Timeout(format!("navigate to {url}")))?
                .map_err(|e| BrokerError::Driver(e.to_string()))
        }
        PlannerAction::Click { ref_id, .. } => {
            let index = tab.snapshots.resolve(ref_id)?;
            tab.page.click_ref(index).await.map_err(|e| BrokerError::Driver(e.to_string()))?;
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
            Ok(())
        }
        PlannerAction::Type { ref_id, text, .. } => {
            let index = tab.snapshots.resolve(ref_id)?;
            tab.page.type_ref(index, text).await.map_err(|e| BrokerError::Driver(e.to_string()))
        }
        PlannerAction::Wait { millis } => {
            tokio::time::sleep(std::time::Duration::from_millis(*millis)).await;
            Ok(())
        }
        PlannerAction::Snapshot => {
            tab.recapture_snapshot().await.map_err(|e| BrokerError::Driver(e.to_string())).map(|_| ())
        }
        PlannerAction::Finish { .. } => Ok(()),
    }
}
