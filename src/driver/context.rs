//! One `DriverContext` per broker [`Session`](crate::session::Session):
//! owns the `chromiumoxide::Browser` process, its CDP event-handler task,
//! and the profile directory. Grounded on `web_search/browser.rs`'s
//! `BrowserWrapper` (tracked handler `JoinHandle`, temp-dir cleanup on drop)
//! generalized from a single ad-hoc search browser to a per-session context
//! that can open many tabs.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result};
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use futures::StreamExt;
use tokio::task::JoinHandle;

use super::page::DriverPage;
use super::ContextOptions;
use crate::browser_profile::{create_unique_profile_with_prefix, BrowserProfile};
use crate::utils::constants::CHROME_USER_AGENT;

pub struct DriverContext {
    browser: Browser,
    handler: JoinHandle<()>,
    /// Kept alive so the profile directory is removed when the context is
    /// dropped, mirroring `BrowserProfile`'s RAII cleanup discipline.
    _profile: Option<BrowserProfile>,
}

impl DriverContext {
    pub async fn launch(opts: ContextOptions) -> Result<Self> {
        let chrome_path = match crate::browser_setup::find_browser_executable().await {
            Ok(path) => path,
            Err(_) => crate::browser_setup::download_managed_browser().await?,
        };

        let profile = match opts.user_data_dir.clone() {
            Some(dir) => {
                std::fs::create_dir_all(&dir).context("creating user-data-dir")?;
                None
            }
            None => Some(create_unique_profile_with_prefix("browker_ctx").context("allocating profile dir")?),
        };
        let user_data_dir: PathBuf = opts
            .user_data_dir
            .clone()
            .unwrap_or_else(|| profile.as_ref().expect("profile dir set when no explicit dir given").path().to_path_buf());

        let viewport = opts.viewport.unwrap_or_default();
        let mut builder = BrowserConfigBuilder::default()
            .request_timeout(Duration::from_secs(30))
            .window_size(viewport.width, viewport.height)
            .user_data_dir(user_data_dir)
            .chrome_executable(chrome_path)
            .headless_mode(if opts.headless { HeadlessMode::default() } else { HeadlessMode::False })
            .arg(format!("--user-agent={}", opts.user_agent.as_deref().unwrap_or(CHROME_USER_AGENT)))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");

        if opts.no_sandbox {
            builder = builder.arg("--no-sandbox");
        }
        if opts.ignore_https_errors {
            builder = builder.arg("--ignore-certificate-errors");
        }
        if let Some(proxy) = &opts.proxy_server {
            builder = builder.arg(format!("--proxy-server={proxy}"));
        }

        let config = builder.build().map_err(|e| anyhow::anyhow!("invalid browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config).await.context("launching browser")?;

        let handler_task = tokio::task::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::warn!(error = %e, "CDP handler error");
                }
            }
        });

        let mut ctx = Self { browser, handler: handler_task, _profile: profile };
        if let Some(state) = &opts.storage_state {
            ctx.apply_storage_state(state).await.context("applying storage state to new context")?;
        }
        Ok(ctx)
    }

    pub async fn new_page(&self, url: &str) -> Result<DriverPage> {
        let page = self.browser.new_page(url).await.context("opening new page")?;
        Ok(DriverPage::new(page))
    }

    /// Injects cookies from a saved `StorageState` into this context, ahead
    /// of any caller-visible page. localStorage is per-origin and per-page,
    /// so it is restored separately by the caller after navigating to the
    /// saved URL (see `browser_switch_profile`), not here.
    async fn apply_storage_state(&mut self, state: &super::StorageState) -> Result<()> {
        if state.cookies.is_empty() {
            return Ok(());
        }
        let page = self.new_page("about:blank").await?;
        for cookie in &state.cookies {
            page.set_cookie(cookie).await.context("restoring cookie")?;
        }
        Ok(())
    }

    /// Cookies across the whole context (all open pages share one
    /// cookie jar at the CDP `Network` domain level).
    pub async fn cookies(&self) -> Result<Vec<super::Cookie>> {
        let pages = self.browser.pages().await.context("listing pages")?;
        match pages.first() {
            Some(page) => DriverPage::new(page.clone()).cookies().await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.handler.abort();
        self.browser.close().await.context("closing browser")?;
        Ok(())
    }
}

impl Drop for DriverContext {
    fn drop(&mut self) {
        self.handler.abort();
    }
}
