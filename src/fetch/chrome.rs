// src/fetch/chrome.rs
//! Headless Chrome page fetcher. One browser process per call, shared by the
//! landing and data loads of a discovery hop; dropping the `Browser` handle
//! kills it, so the session is released on every exit path.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use reqwest::Url;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{discovered_url, PageFetcher};
use crate::error::FetchError;

const WINDOW_SIZE: (u32, u32) = (1280, 1696);

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ChromeFetcher {
    chrome_path: Option<PathBuf>,
    idle_timeout: Duration,
}

impl ChromeFetcher {
    pub fn new(chrome_path: Option<PathBuf>) -> Self {
        Self {
            chrome_path,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Browser-side idle timeout; keep it above the settle delay.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    fn launch_options(&self) -> Result<LaunchOptions<'static>> {
        LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .window_size(Some(WINDOW_SIZE))
            .path(self.chrome_path.clone())
            .idle_browser_timeout(self.idle_timeout)
            .args(vec![
                OsStr::new("--disable-gpu"),
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--log-level=3"),
            ])
            .build()
            .map_err(|e| anyhow!("chrome launch options: {e}"))
    }

    fn launch(&self) -> Result<(Browser, Arc<Tab>)> {
        let browser = Browser::new(self.launch_options()?).context("launch chrome")?;
        let tab = browser.new_tab().context("open tab")?;
        Ok((browser, tab))
    }

    fn capture(&self, url: &str, settle: Duration, cancel: &CancellationToken) -> Result<String> {
        let (_browser, tab) = self.launch()?;
        load(&tab, url, settle, cancel)
    }

    /// Both loads share one browser and tab.
    fn capture_via_landing(
        &self,
        landing: &Url,
        root: &Url,
        selector: &str,
        settle: Duration,
        cancel: &CancellationToken,
    ) -> Result<(Url, String), FetchError> {
        let browser_err = |url: &Url, e: anyhow::Error| FetchError::Browser {
            url: url.to_string(),
            source: e.into(),
        };
        let (_browser, tab) = self.launch().map_err(|e| browser_err(landing, e))?;
        let page = load(&tab, landing.as_str(), settle, cancel).map_err(|e| browser_err(landing, e))?;
        let url = discovered_url(&page, landing, root, selector)?;
        let body = load(&tab, url.as_str(), settle, cancel).map_err(|e| browser_err(&url, e))?;
        Ok((url, body))
    }
}

fn load(tab: &Tab, url: &str, settle: Duration, cancel: &CancellationToken) -> Result<String> {
    tab.navigate_to(url)
        .and_then(|tab| tab.wait_until_navigated())
        .with_context(|| format!("navigate to {url}"))?;

    std::thread::sleep(settle);
    if cancel.is_cancelled() {
        bail!("cancelled during settle delay");
    }

    tab.get_content().context("read page content")
}

#[async_trait]
impl PageFetcher for ChromeFetcher {
    async fn fetch(
        &self,
        url: &Url,
        settle: Duration,
        cancel: &CancellationToken,
    ) -> Result<String, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled(url.to_string()));
        }
        let this = self.clone();
        let target = url.to_string();
        let token = cancel.clone();
        // The browser API is blocking. A deadline that fires leaves this
        // worker running until navigation returns on its own.
        let res = tokio::task::spawn_blocking(move || this.capture(&target, settle, &token)).await?;
        res.map_err(|e| FetchError::Browser {
            url: url.to_string(),
            source: e.into(),
        })
    }

    async fn fetch_via_landing(
        &self,
        landing: &Url,
        root: &Url,
        selector: &str,
        settle: Duration,
        cancel: &CancellationToken,
    ) -> Result<(Url, String), FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled(landing.to_string()));
        }
        let this = self.clone();
        let (landing, root, selector) = (landing.clone(), root.clone(), selector.to_string());
        let token = cancel.clone();
        tokio::task::spawn_blocking(move || {
            this.capture_via_landing(&landing, &root, &selector, settle, &token)
        })
        .await?
    }

    fn name(&self) -> &'static str {
        "chrome"
    }
}
