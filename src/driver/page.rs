//! Per-page driver operations. Grounded on `page_extractor/extractors.rs`
//! (JS-evaluation idiom for structured extraction) and
//! `tools/browser/tools.rs`'s `browser_click`/`browser_type` (CDP-level
//! `find_element`/`click`/`type_str`/`press_key`, which reliably trigger
//! framework event handlers, unlike a raw `element.click()` via JS).

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetEmulatedMediaParams, SetGeolocationOverrideParams,
    SetTimezoneOverrideParams, SetVirtualTimePolicyParams, VirtualTimePolicy,
};
use chromiumoxide::cdp::browser_protocol::network::{
    ClearBrowserCookiesParams, GetCookiesParams, SetCookieParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams, HandleJavaScriptDialogParams, PrintToPdfParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EventConsoleApiCalled;
use chromiumoxide::Page;
use futures::StreamExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use super::storage_state::{Cookie, SameSite};
use crate::utils::constants::RING_BUFFER_CAPACITY;

/// One accessibility-tree node as captured by the snapshot JS. `ref_id` is
/// assigned by the snapshot registry, not by this struct (the JS side only
/// reports index-of-capture); see `crate::snapshot`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxNode {
    pub role: String,
    pub name: String,
    pub tag: String,
}

#[derive(Debug, Clone)]
pub struct ConsoleEntry {
    pub level: String,
    pub text: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub dom_content_loaded_ms: f64,
    pub load_event_ms: f64,
    pub transfer_size_bytes: f64,
    pub resource_count: f64,
}

#[derive(Debug, Clone)]
pub struct NetworkEntry {
    pub method: String,
    pub url: String,
    pub status: Option<u16>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// JS that walks interactive + landmark elements, tags each with a
/// `data-ax-ref` attribute equal to its capture-order index, and returns the
/// role/name/tag triple for each. Generalizes
/// `page_extractor::js_scripts::INTERACTIVE_ELEMENTS_SCRIPT`'s selector list
/// from "things a crawler can click" to "things an accessibility snapshot
/// should anchor a ref to".
const ACCESSIBILITY_SNAPSHOT_SCRIPT: &str = r#"
(() => {
    const selector = [
        'button', 'input', 'select', 'textarea', 'a[href]',
        'details', 'summary', '[role]', '[contenteditable="true"]',
        'h1', 'h2', 'h3', 'h4', 'h5', 'h6',
        'main', 'nav', 'header', 'footer', 'article', 'section',
    ].join(',');
    const nodes = Array.from(document.querySelectorAll(selector));
    const out = [];
    nodes.forEach((el, i) => {
        el.setAttribute('data-ax-ref', String(i));
        const role = el.getAttribute('role') || el.tagName.toLowerCase();
        const name = (el.getAttribute('aria-label') || el.innerText || el.value || '').trim().slice(0, 200);
        out.push({ role, name, tag: el.tagName.toLowerCase() });
    });
    return out;
})()
"#;

pub struct DriverPage {
    page: Page,
    console_task: Mutex<Option<JoinHandle<()>>>,
    console_log: Arc<Mutex<VecDeque<ConsoleEntry>>>,
    network_log: Arc<Mutex<VecDeque<NetworkEntry>>>,
}

impl DriverPage {
    pub(super) fn new(page: Page) -> Self {
        Self {
            page,
            console_task: Mutex::new(None),
            console_log: Arc::new(Mutex::new(VecDeque::with_capacity(RING_BUFFER_CAPACITY))),
            network_log: Arc::new(Mutex::new(VecDeque::with_capacity(RING_BUFFER_CAPACITY))),
        }
    }

    #[must_use]
    pub fn inner(&self) -> &Page {
        &self.page
    }

    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.page.goto(url).await.context("navigate")?;
        self.page.wait_for_navigation().await.context("wait_for_navigation")?;
        Ok(())
    }

    pub async fn navigate_back(&self) -> Result<()> {
        self.page.evaluate("history.back()").await.context("history.back")?;
        Ok(())
    }

    pub async fn navigate_forward(&self) -> Result<()> {
        self.page.evaluate("history.forward()").await.context("history.forward")?;
        Ok(())
    }

    pub async fn url(&self) -> Result<String> {
        Ok(self.page.url().await.context("reading url")?.unwrap_or_default())
    }

    pub async fn title(&self) -> Result<String> {
        let result = self
            .page
            .evaluate("document.title")
            .await
            .context("reading title")?;
        Ok(result.into_value::<String>().unwrap_or_default())
    }

    /// Capture an accessibility snapshot: tags every matched element with a
    /// `data-ax-ref` attribute and returns the ordered node list. The
    /// snapshot registry (`crate::snapshot`) turns the index into a stable
    /// `ref-N` string and remembers the CSS selector to resolve it later.
    pub async fn accessibility_snapshot(&self) -> Result<Vec<AxNode>> {
        let result = self
            .page
            .evaluate(ACCESSIBILITY_SNAPSHOT_SCRIPT)
            .await
            .context("accessibility snapshot script")?;
        let nodes: Vec<AxNode> = result.into_value().context("parsing accessibility snapshot")?;
        Ok(nodes)
    }

    /// Click the element tagged with `data-ax-ref="{index}"` by the most
    /// recent snapshot.
    pub async fn click_ref(&self, index: usize) -> Result<()> {
        let selector = format!("[data-ax-ref=\"{index}\"]");
        let element = self.page.find_element(&selector).await.context("find_element for click")?;
        element.click().await.context("click")?;
        Ok(())
    }

    pub async fn type_ref(&self, index: usize, text: &str) -> Result<()> {
        let selector = format!("[data-ax-ref=\"{index}\"]");
        let element = self.page.find_element(&selector).await.context("find_element for type")?;
        element.click().await.context("focus before type")?;
        tokio::time::sleep(Duration::from_millis(50)).await;
        element.type_str(text).await.context("type_str")?;
        Ok(())
    }

    pub async fn hover_ref(&self, index: usize) -> Result<()> {
        let selector = format!("[data-ax-ref=\"{index}\"]");
        let element = self.page.find_element(&selector).await.context("find_element for hover")?;
        element.hover().await.context("hover")?;
        Ok(())
    }

    pub async fn press_key(&self, key: &str) -> Result<()> {
        self.page.keyboard().down(key).await.context("keydown")?;
        self.page.keyboard().up(key).await.context("keyup")?;
        Ok(())
    }

    pub async fn scroll_by(&self, dx: f64, dy: f64) -> Result<()> {
        self.page.evaluate(format!("window.scrollBy({dx}, {dy})")).await.context("scrollBy")?;
        Ok(())
    }

    pub async fn scroll_to_ref(&self, index: usize) -> Result<()> {
        let script = format!(
            "document.querySelector('[data-ax-ref=\"{index}\"]')?.scrollIntoView({{block: 'center'}})"
        );
        self.page.evaluate(script).await.context("scrollIntoView")?;
        Ok(())
    }

    /// Drags from one ref-tagged element to another by synthesizing the
    /// HTML5 drag-and-drop event sequence, since native mouse drag does not
    /// reliably trigger a page's `dragstart`/`drop` handlers the way a real
    /// user gesture does.
    pub async fn drag_ref(&self, from_index: usize, to_index: usize) -> Result<()> {
        let script = format!(
            r#"(() => {{
                const src = document.querySelector('[data-ax-ref="{from_index}"]');
                const dst = document.querySelector('[data-ax-ref="{to_index}"]');
                if (!src || !dst) return false;
                const dt = new DataTransfer();
                const fire = (el, type) => el.dispatchEvent(new DragEvent(type, {{bubbles: true, cancelable: true, dataTransfer: dt}}));
                fire(src, 'dragstart');
                fire(dst, 'dragenter');
                fire(dst, 'dragover');
                fire(dst, 'drop');
                fire(src, 'dragend');
                return true;
            }})()"#
        );
        let result = self.page.evaluate(script).await.context("synthesizing drag")?;
        let ok: bool = result.into_value().unwrap_or(false);
        if !ok {
            anyhow::bail!("drag source or target ref not found in DOM");
        }
        Ok(())
    }

    /// Sets the files on a `<input type="file">` tagged by the most recent
    /// snapshot. CDP's `DOM.setFileInputFiles` is the only way to do this;
    /// assigning `.files` from page JS is blocked by browser security policy.
    pub async fn set_file_input_ref(&self, index: usize, paths: Vec<std::path::PathBuf>) -> Result<()> {
        let selector = format!("[data-ax-ref=\"{index}\"]");
        let element = self.page.find_element(&selector).await.context("find_element for file upload")?;
        element.set_file_input_files(paths).await.context("set_file_input_files")?;
        Ok(())
    }

    /// Accepts or dismisses a currently-open `window.alert`/`confirm`/`prompt`
    /// dialog. Must be called while a dialog is actually open (the caller is
    /// expected to have observed one via console/network taps or a prior
    /// navigation result).
    pub async fn handle_dialog(&self, accept: bool, prompt_text: Option<String>) -> Result<()> {
        let mut builder = HandleJavaScriptDialogParams::builder().accept(accept);
        if let Some(text) = prompt_text {
            builder = builder.prompt_text(text);
        }
        let params = builder.build().map_err(|e| anyhow::anyhow!("invalid dialog params: {e}"))?;
        self.page.execute(params).await.context("handle dialog")?;
        Ok(())
    }

    /// Coarse page-load performance metrics via the Navigation Timing API —
    /// simpler than wiring up the CDP `Performance` domain for the handful of
    /// numbers the `browser_performance_metrics` tool reports.
    pub async fn performance_metrics(&self) -> Result<PerformanceMetrics> {
        let result = self
            .page
            .evaluate(
                "(() => { const t = performance.timing; const nav = performance.getEntriesByType('navigation')[0]; return { domContentLoadedMs: t.domContentLoadedEventEnd - t.navigationStart, loadEventMs: t.loadEventEnd - t.navigationStart, transferSizeBytes: nav ? nav.transferSize : 0, resourceCount: performance.getEntriesByType('resource').length }; })()",
            )
            .await
            .context("performance metrics script")?;
        result.into_value().context("parsing performance metrics")
    }

    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        self.page.screenshot(params).await.context("screenshot")
    }

    pub async fn pdf(&self) -> Result<Vec<u8>> {
        let params = PrintToPdfParams::builder().build();
        self.page.pdf(params).await.context("print to pdf")
    }

    pub async fn emulate_media(&self, media: Option<&str>) -> Result<()> {
        let params = SetEmulatedMediaParams::builder().media(media.unwrap_or("").to_string()).build();
        self.page.execute(params).await.context("emulate media")?;
        Ok(())
    }

    pub async fn emulate_geolocation(&self, lat: f64, lon: f64, accuracy: f64) -> Result<()> {
        let params = SetGeolocationOverrideParams::builder()
            .latitude(lat)
            .longitude(lon)
            .accuracy(accuracy)
            .build();
        self.page.execute(params).await.context("emulate geolocation")?;
        Ok(())
    }

    pub async fn emulate_timezone(&self, tz: &str) -> Result<()> {
        let params = SetTimezoneOverrideParams::builder().timezone_id(tz.to_string()).build()
            .map_err(|e| anyhow::anyhow!("invalid timezone params: {e}"))?;
        self.page.execute(params).await.context("emulate timezone")?;
        Ok(())
    }

    pub async fn emulate_viewport(&self, width: u32, height: u32) -> Result<()> {
        let params = SetDeviceMetricsOverrideParams::builder()
            .width(width as i64)
            .height(height as i64)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(|e| anyhow::anyhow!("invalid viewport params: {e}"))?;
        self.page.execute(params).await.context("resize viewport")?;
        Ok(())
    }

    pub async fn clock_install(&self) -> Result<()> {
        let params = SetVirtualTimePolicyParams::builder()
            .policy(VirtualTimePolicy::Pause)
            .build()
            .map_err(|e| anyhow::anyhow!("invalid clock params: {e}"))?;
        self.page.execute(params).await.context("clock install")?;
        Ok(())
    }

    pub async fn clock_fast_forward(&self, millis: u64) -> Result<()> {
        let params = SetVirtualTimePolicyParams::builder()
            .policy(VirtualTimePolicy::Advance)
            .budget(millis as f64)
            .build()
            .map_err(|e| anyhow::anyhow!("invalid clock params: {e}"))?;
        self.page.execute(params).await.context("clock fast forward")?;
        Ok(())
    }

    pub async fn clock_pause(&self) -> Result<()> {
        self.clock_install().await
    }

    pub async fn clock_resume(&self) -> Result<()> {
        let params = SetVirtualTimePolicyParams::builder()
            .policy(VirtualTimePolicy::Advance)
            .build()
            .map_err(|e| anyhow::anyhow!("invalid clock params: {e}"))?;
        self.page.execute(params).await.context("clock resume")?;
        Ok(())
    }

    pub async fn clock_set_fixed_time(&self, epoch_millis: i64) -> Result<()> {
        let script = format!(
            "Date.now = () => {epoch_millis}; const __origDate = Date; Date = class extends __origDate {{ constructor(...a) {{ a.length ? super(...a) : super({epoch_millis}); }} static now() {{ return {epoch_millis}; }} }};"
        );
        self.page.evaluate(script).await.context("clock set fixed time")?;
        Ok(())
    }

    pub async fn cookies(&self) -> Result<Vec<Cookie>> {
        let params = GetCookiesParams::builder().build();
        let cdp_cookies = self.page.execute(params).await.context("get cookies")?;
        Ok(cdp_cookies
            .result
            .cookies
            .iter()
            .map(|c| Cookie {
                name: c.name.clone(),
                value: c.value.clone(),
                domain: Some(c.domain.clone()),
                path: Some(c.path.clone()),
                expires: Some(c.expires),
                http_only: Some(c.http_only),
                secure: Some(c.secure),
                same_site: None::<SameSite>,
            })
            .collect())
    }

    pub async fn set_cookie(&self, cookie: &Cookie) -> Result<()> {
        let mut builder = SetCookieParams::builder().name(cookie.name.clone()).value(cookie.value.clone());
        if let Some(domain) = &cookie.domain {
            builder = builder.domain(domain.clone());
        }
        if let Some(path) = &cookie.path {
            builder = builder.path(path.clone());
        }
        let params = builder.build().map_err(|e| anyhow::anyhow!("invalid cookie: {e}"))?;
        self.page.execute(params).await.context("set cookie")?;
        Ok(())
    }

    pub async fn clear_cookies(&self) -> Result<()> {
        let params = ClearBrowserCookiesParams::default();
        self.page.execute(params).await.context("clear cookies")?;
        Ok(())
    }

    pub async fn local_storage(&self) -> Result<std::collections::HashMap<String, String>> {
        let result = self
            .page
            .evaluate("JSON.stringify(Object.fromEntries(Object.entries(localStorage)))")
            .await
            .context("reading localStorage")?;
        let raw: String = result.into_value().unwrap_or_else(|_| "{}".to_string());
        Ok(serde_json::from_str(&raw).unwrap_or_default())
    }

    pub async fn set_local_storage(&self, key: &str, value: &str) -> Result<()> {
        let script = format!(
            "localStorage.setItem({}, {})",
            serde_json::to_string(key).unwrap_or_default(),
            serde_json::to_string(value).unwrap_or_default()
        );
        self.page.evaluate(script).await.context("localStorage.setItem")?;
        Ok(())
    }

    /// Waits for the page's network to go idle (no in-flight requests for a
    /// short quiescence window) or `timeout`, whichever comes first.
    pub async fn wait_for_network_idle(&self, timeout: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let inflight = self
                .page
                .evaluate("performance.getEntriesByType('resource').filter(r => !r.responseEnd).length")
                .await
                .ok()
                .and_then(|v| v.into_value::<f64>().ok())
                .unwrap_or(0.0);
            if inflight <= 0.0 {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                anyhow::bail!("timed out waiting for network idle");
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }

    /// Starts a background task collecting console events into a bounded
    /// ring buffer, mirroring `tools/browser/session.rs`'s
    /// `setup_console_listener`.
    pub async fn start_console_tap(&self) -> Result<()> {
        let mut events = self.page.event_listener::<EventConsoleApiCalled>().await.context("console listener")?;
        let log = self.console_log.clone();
        let task = tokio::task::spawn(async move {
            while let Some(event) = events.next().await {
                let level = format!("{:?}", event.r#type).to_lowercase();
                let text = event
                    .args
                    .iter()
                    .map(|arg| {
                        arg.value
                            .as_ref()
                            .map(|v| match v {
                                serde_json::Value::String(s) => s.clone(),
                                other => other.to_string(),
                            })
                            .or_else(|| arg.description.clone())
                            .unwrap_or_else(|| "[unknown]".to_string())
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                let mut log = log.lock();
                if log.len() >= RING_BUFFER_CAPACITY {
                    log.pop_front();
                }
                log.push_back(ConsoleEntry { level, text, timestamp: chrono::Utc::now() });
            }
        });
        *self.console_task.lock() = Some(task);
        Ok(())
    }

    #[must_use]
    pub fn console_messages(&self) -> Vec<ConsoleEntry> {
        self.console_log.lock().iter().cloned().collect()
    }

    #[must_use]
    pub fn network_requests(&self) -> Vec<NetworkEntry> {
        self.network_log.lock().iter().cloned().collect()
    }
}

impl Drop for DriverPage {
    fn drop(&mut self) {
        if let Some(task) = self.console_task.lock().take() {
            task.abort();
        }
    }
}
