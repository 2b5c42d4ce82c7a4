//! Sequential page fetching with a politeness delay.
//!
//! Transport failures are never retried. They are folded into the returned
//! [`FetchedPage`] with a synthetic status so a crawl can keep going.

use crate::config::{NetworkConfig, get_random_sleep_duration};
use crate::error::Result;
use crate::html::HtmlPage;
use crate::urls::normalize_url;
use reqwest::Client;
use serde::Serialize;
use tokio::time::sleep;
use url::Url;

/// Status reported for a request that timed out.
pub const TIMEOUT_STATUS: u16 = 504;
/// Status reported for a transport failure of any other kind.
pub const UNKNOWN_STATUS: u16 = 600;

/// Why a fetch did not produce a usable page.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "kind", content = "status", rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Http(u16),
    Unknown,
}

impl FailureKind {
    pub fn status(&self) -> u16 {
        match self {
            FailureKind::Timeout => TIMEOUT_STATUS,
            FailureKind::Http(status) => *status,
            FailureKind::Unknown => UNKNOWN_STATUS,
        }
    }
}

/// Result of a single GET.
#[derive(Serialize, Debug, Clone)]
pub struct FetchedPage {
    pub url: Url,
    pub status: u16,
    /// Body text, present only for successful responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

impl FetchedPage {
    fn failed(url: Url, failure: FailureKind) -> Self {
        Self {
            url,
            status: failure.status(),
            body: None,
            failure: Some(failure),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Parses the body as HTML. `None` when the fetch failed.
    pub fn html(&self) -> Result<Option<HtmlPage>> {
        match &self.body {
            Some(body) => Ok(Some(HtmlPage::from_text(body, self.url.as_str())?)),
            None => Ok(None),
        }
    }
}

/// True for a missing status or any status of 400 and above.
pub fn is_bad_status(status: Option<u16>) -> bool {
    status.is_none_or(|s| s >= 400)
}

/// HTTP client configured with the toolkit's user agent and timeout.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    network: NetworkConfig,
}

impl Fetcher {
    pub fn new(network: NetworkConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&network.user_agent)
            .timeout(network.request_timeout)
            .build()?;
        Ok(Self { client, network })
    }

    /// GETs `url`, adding `https://` when no scheme is given.
    ///
    /// Only an unparseable URL is an error. Timeouts, HTTP error statuses and
    /// other transport failures come back as a page with `failure` set.
    pub async fn fetch_page(&self, url: &str) -> Result<FetchedPage> {
        let url = normalize_url(url)?;
        tracing::debug!(target: "fetch", "Attempting to GET: {}", url);

        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                let failure = if e.is_timeout() {
                    tracing::warn!(target: "fetch", "Timeout fetching {}: {}", url, e);
                    FailureKind::Timeout
                } else {
                    tracing::warn!(target: "fetch", "Request error fetching {}: {}", url, e);
                    FailureKind::Unknown
                };
                return Ok(FetchedPage::failed(url, failure));
            }
        };

        let status = response.status().as_u16();
        tracing::debug!(target: "fetch", "GET {} status: {}", url, status);
        if is_bad_status(Some(status)) {
            tracing::warn!(target: "fetch", "HTTP error fetching {}: {}", url, status);
            return Ok(FetchedPage::failed(url, FailureKind::Http(status)));
        }

        match response.text().await {
            Ok(body) => Ok(FetchedPage {
                url,
                status,
                body: Some(body),
                failure: None,
            }),
            Err(e) => {
                tracing::warn!(target: "fetch", "Failed to read body from {}: {}", url, e);
                let failure = if e.is_timeout() {
                    FailureKind::Timeout
                } else {
                    FailureKind::Unknown
                };
                Ok(FetchedPage::failed(url, failure))
            }
        }
    }

    /// Fetches `urls` one after another, sleeping a random configured
    /// duration between requests. `on_page` sees each page as it lands.
    pub async fn fetch_pages<F>(&self, urls: &[String], mut on_page: F) -> Result<Vec<FetchedPage>>
    where
        F: FnMut(&FetchedPage),
    {
        let mut pages = Vec::with_capacity(urls.len());
        for (i, url) in urls.iter().enumerate() {
            if i > 0 {
                let pause = get_random_sleep_duration(&self.network);
                tracing::debug!(target: "fetch", "Sleeping {:?} before {}", pause, url);
                sleep(pause).await;
            }
            let page = self.fetch_page(url).await?;
            on_page(&page);
            pages.push(page);
        }
        let failed = pages.iter().filter(|p| !p.is_success()).count();
        tracing::info!(target: "fetch", "Fetched {} pages ({} failed)", pages.len(), failed);
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{}/page", addr)
    }

    fn fetcher() -> Fetcher {
        Fetcher::new(NetworkConfig {
            request_timeout: Duration::from_secs(5),
            sleep_between_requests: (0.0, 0.0),
            ..NetworkConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_is_bad_status() {
        assert!(is_bad_status(None));
        assert!(is_bad_status(Some(404)));
        assert!(is_bad_status(Some(UNKNOWN_STATUS)));
        assert!(!is_bad_status(Some(200)));
        assert!(!is_bad_status(Some(302)));
    }

    #[test]
    fn test_failure_status_codes() {
        assert_eq!(FailureKind::Timeout.status(), 504);
        assert_eq!(FailureKind::Unknown.status(), 600);
        assert_eq!(FailureKind::Http(403).status(), 403);
    }

    #[tokio::test]
    async fn test_fetch_success_parses_html() {
        let url = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 27\r\nConnection: close\r\n\r\n<html><h1>Hello</h1></html>",
        )
        .await;
        let page = fetcher().fetch_page(&url).await.unwrap();
        assert!(page.is_success());
        assert_eq!(page.status, 200);
        let html = page.html().unwrap().unwrap();
        let got = crate::html::parse_text(&html, &["h1"], &Default::default()).unwrap();
        assert_eq!(got, crate::models::Extracted::Single("Hello".into()));
    }

    #[tokio::test]
    async fn test_fetch_http_error_is_classified() {
        let url = serve_once(
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        let page = fetcher().fetch_page(&url).await.unwrap();
        assert_eq!(page.failure, Some(FailureKind::Http(404)));
        assert_eq!(page.status, 404);
        assert!(page.html().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_unknown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let page = fetcher()
            .fetch_page(&format!("http://{}/", addr))
            .await
            .unwrap();
        assert_eq!(page.failure, Some(FailureKind::Unknown));
        assert_eq!(page.status, UNKNOWN_STATUS);
    }

    #[tokio::test]
    async fn test_fetch_pages_reports_each_page() {
        let first = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok",
        )
        .await;
        let second = serve_once(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;

        let mut seen = 0;
        let pages = fetcher()
            .fetch_pages(&[first, second], |_| seen += 1)
            .await
            .unwrap();
        assert_eq!(seen, 2);
        assert!(pages[0].is_success());
        assert_eq!(pages[1].failure, Some(FailureKind::Http(500)));
    }

    #[tokio::test]
    async fn test_fetch_invalid_url_is_error() {
        assert!(fetcher().fetch_page("").await.is_err());
    }
}
