// src/fetch/http.rs
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::PageFetcher;
use crate::error::FetchError;

/// Plain GET for server-rendered deployments. The settle delay still applies
/// so pacing matches the browser fetcher.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &Url,
        settle: Duration,
        cancel: &CancellationToken,
    ) -> Result<String, FetchError> {
        let http_err = |source| FetchError::Http {
            url: url.to_string(),
            source,
        };
        let body = async {
            let rsp = self
                .client
                .get(url.clone())
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(http_err)?;
            let text = rsp.text().await.map_err(http_err)?;
            tokio::time::sleep(settle).await;
            Ok::<_, FetchError>(text)
        };
        tokio::select! {
            _ = cancel.cancelled() => Err(FetchError::Cancelled(url.to_string())),
            res = body => res,
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers one request with `status` and `body`, or holds the socket open when `status` is None.
    async fn serve_once(status: Option<&'static str>, body: &'static str) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 2048];
            let _ = sock.read(&mut buf).await;
            match status {
                Some(status) => {
                    let rsp = format!(
                        "HTTP/1.1 {status}\r\ncontent-type: text/html\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = sock.write_all(rsp.as_bytes()).await;
                    let _ = sock.shutdown().await;
                }
                None => tokio::time::sleep(Duration::from_secs(60)).await,
            }
        });
        Url::parse(&format!("http://{addr}/waittimes/Page14230.aspx")).unwrap()
    }

    fn fetcher() -> HttpFetcher {
        HttpFetcher::with_client(Client::builder().no_proxy().build().unwrap())
    }

    #[tokio::test]
    async fn returns_body_after_settle_delay() {
        let url = serve_once(Some("200 OK"), "<html>ok</html>").await;
        let started = Instant::now();
        let body = fetcher()
            .fetch(&url, Duration::from_millis(150), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(body, "<html>ok</html>");
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn error_status_is_http_failure() {
        let url = serve_once(Some("503 Service Unavailable"), "down").await;
        let err = fetcher()
            .fetch(&url, Duration::ZERO, &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            FetchError::Http { url: u, source } => {
                assert_eq!(u, url.to_string());
                assert_eq!(source.status().map(|s| s.as_u16()), Some(503));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancellation_wins_over_a_stalled_server() {
        let url = serve_once(None, "").await;
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });
        let err = tokio::time::timeout(
            Duration::from_secs(5),
            fetcher().fetch(&url, Duration::ZERO, &cancel),
        )
        .await
        .expect("fetch returns once cancelled")
        .unwrap_err();
        assert!(matches!(err, FetchError::Cancelled(_)));
    }
}
