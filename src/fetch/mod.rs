// src/fetch/mod.rs
pub mod chrome;
pub mod http;

use async_trait::async_trait;
use reqwest::Url;
use scraper::{Html, Selector};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::FetchError;

/// Produces the fully rendered text of a page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Navigate to `url`, pause `settle` for client-side rendering, return the document.
    /// Any browser session is released before returning, on success or failure.
    async fn fetch(
        &self,
        url: &Url,
        settle: Duration,
        cancel: &CancellationToken,
    ) -> Result<String, FetchError>;

    /// Discovery hop: landing page, then the data page it links to.
    /// Fetchers that hold a session reuse it for both loads.
    async fn fetch_via_landing(
        &self,
        landing: &Url,
        root: &Url,
        selector: &str,
        settle: Duration,
        cancel: &CancellationToken,
    ) -> Result<(Url, String), FetchError> {
        let page = self.fetch(landing, settle, cancel).await?;
        let url = discovered_url(&page, landing, root, selector)?;
        let body = self.fetch(&url, settle, cancel).await?;
        Ok((url, body))
    }

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub settle: Duration,
    pub deadline: Duration,
}

/// Runs one fetch under `opts.deadline`; cancellation wins over both.
pub async fn fetch_bounded(
    fetcher: &dyn PageFetcher,
    url: &Url,
    opts: FetchOptions,
    cancel: &CancellationToken,
) -> Result<String, FetchError> {
    debug!(target: "capture", fetcher = fetcher.name(), %url, "fetching");
    bounded(url, opts, cancel, fetcher.fetch(url, opts.settle, cancel)).await
}

async fn bounded<T, F>(
    url: &Url,
    opts: FetchOptions,
    cancel: &CancellationToken,
    fut: F,
) -> Result<T, FetchError>
where
    F: std::future::Future<Output = Result<T, FetchError>>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(FetchError::Cancelled(url.to_string())),
        res = tokio::time::timeout(opts.deadline, fut) => {
            res.unwrap_or_else(|_| Err(FetchError::Deadline {
                url: url.to_string(),
                deadline: opts.deadline,
            }))
        }
    }
}

/// Where the wait-times page lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSource {
    /// The data page URL is known up front.
    Fixed(Url),
    /// The landing page links to the data page through an anchor matching
    /// `selector`; its `href` is resolved against `root`.
    Discovered {
        landing: Url,
        root: Url,
        selector: String,
    },
}

impl PageSource {
    /// URL the cycle starts from.
    pub fn entry_url(&self) -> &Url {
        match self {
            PageSource::Fixed(url) => url,
            PageSource::Discovered { landing, .. } => landing,
        }
    }

    /// Loads the data page, doing the discovery hop if configured.
    /// `opts.deadline` bounds every page load of the call together.
    pub async fn load(
        &self,
        fetcher: &dyn PageFetcher,
        opts: FetchOptions,
        cancel: &CancellationToken,
    ) -> Result<(Url, String), FetchError> {
        match self {
            PageSource::Fixed(url) => {
                let page = fetch_bounded(fetcher, url, opts, cancel).await?;
                Ok((url.clone(), page))
            }
            PageSource::Discovered {
                landing,
                root,
                selector,
            } => {
                debug!(target: "capture", fetcher = fetcher.name(), %landing, "fetching via landing page");
                let hop = fetcher.fetch_via_landing(landing, root, selector, opts.settle, cancel);
                bounded(landing, opts, cancel, hop).await
            }
        }
    }
}

/// Resolves the data page URL from the landing page text.
pub fn discovered_url(page: &str, landing: &Url, root: &Url, selector: &str) -> Result<Url, FetchError> {
    let href = find_link_href(page, selector)?.ok_or_else(|| FetchError::DiscoveryLinkMissing {
        url: landing.to_string(),
        selector: selector.to_string(),
    })?;
    let url = root.join(&href).map_err(|e| FetchError::BadUrl {
        url: href.clone(),
        reason: e.to_string(),
    })?;
    info!(target: "capture", %url, "discovered wait-times page");
    Ok(url)
}

/// `href` of the first anchor matching `selector`, if any.
pub fn find_link_href(page: &str, selector: &str) -> Result<Option<String>, FetchError> {
    let sel = Selector::parse(selector).map_err(|e| FetchError::BadUrl {
        url: selector.to_string(),
        reason: format!("discovery selector does not parse: {e:?}"),
    })?;
    let doc = Html::parse_document(page);
    let href = doc
        .select(&sel)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .find(|h| !h.is_empty())
        .map(str::to_string);
    Ok(href)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LANDING: &str = r#"<html><body>
        <a class="btn btn-primary" href="/elsewhere">Other</a>
        <a class="btn btn-primary btn-lg in-btn-blue" href="/waittimes/Page14230.aspx">See wait times</a>
    </body></html>"#;

    #[test]
    fn finds_call_to_action_href() {
        let href = find_link_href(LANDING, "a.btn.btn-primary.btn-lg.in-btn-blue").unwrap();
        assert_eq!(href.as_deref(), Some("/waittimes/Page14230.aspx"));
    }

    #[test]
    fn missing_link_is_none() {
        let href = find_link_href(LANDING, "a.in-btn-green").unwrap();
        assert!(href.is_none());
    }

    #[test]
    fn relative_href_joins_onto_root() {
        let root = Url::parse("https://wait.example.org").unwrap();
        let landing = root.join("/waittimes/waittimes.aspx").unwrap();
        let url = discovered_url(LANDING, &landing, &root, "a.in-btn-blue").unwrap();
        assert_eq!(url.as_str(), "https://wait.example.org/waittimes/Page14230.aspx");

        let err = discovered_url(LANDING, &landing, &root, "a.in-btn-green").unwrap_err();
        assert!(matches!(err, FetchError::DiscoveryLinkMissing { .. }));
    }

    #[test]
    fn bad_selector_is_error() {
        assert!(find_link_href(LANDING, "a[[").is_err());
    }
}
