//! Page fetch backends
//!
//! This module defines the [`PageFetcher`] capability the crawler is generic over,
//! and the plain-HTTP implementation:
//! - GET with redirects followed, headers lower-cased
//! - Wall-clock load time
//! - Subresources rebuilt from the markup and sized with HEAD requests
//! - Error classification into page-level failures
//!
//! The navigation timeout bounds the page request alone. The HEAD requests that
//! follow share a separate, shorter budget; whatever they have not answered by
//! then is reported without a size.

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::crawler::{ResourceInfo, ResourceKind};
use crate::extractor::extract_resources;
use crate::http::{
    build_http_client, build_raw_client, describe_request_error, lowercase_headers,
    probe_content_encoding, probe_content_length,
};
use crate::robots::{fetch_robots, RobotsFetch};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

/// Concurrent HEAD requests per page
const HEAD_CONCURRENCY: usize = 8;

/// Time allowed for all HEAD requests of one page, after the page itself loaded
const SIDE_REQUEST_BUDGET: Duration = Duration::from_secs(2);

/// Page-level fetch failures
///
/// None of these abort a site crawl; the crawler logs them and moves on.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Timed out after {secs}s loading {url}")]
    Timeout { url: String, secs: u64 },

    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("{url} is not an HTML document (content-type: {content_type})")]
    NotHtml { url: String, content_type: String },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Fetcher used before initialize()")]
    NotInitialized,
}

/// Per-request fetch options
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Capture a full-page PNG, if the backend can render
    pub take_screenshot: bool,
}

/// Raw output of one fetch, before link and JSON-LD extraction
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub final_url: Url,
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub html: String,
    pub load_time: u64,
    pub resources: Vec<ResourceInfo>,
    pub console_errors: Vec<String>,
    pub screenshot: Option<Vec<u8>>,
}

/// A backend able to load a page and report what it saw
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Acquires whatever the backend needs (a browser process, for instance)
    async fn initialize(&mut self) -> Result<(), FetchError> {
        Ok(())
    }

    /// Loads one page
    ///
    /// Implementations enforce the navigation timeout themselves and clean up
    /// anything the page opened before returning.
    async fn fetch(&self, url: &Url, options: &FetchOptions) -> Result<FetchedPage, FetchError>;

    /// The `Crawl-delay` robots.txt asks of this fetcher's user agent on `site`
    ///
    /// Backends that do not read robots.txt report `None`.
    async fn crawl_delay(&self, _site: &Url) -> Option<Duration> {
        None
    }

    /// Releases backend resources; calling it more than once is a no-op
    async fn close(&mut self) -> Result<(), FetchError> {
        Ok(())
    }
}

#[async_trait]
impl<F: PageFetcher + ?Sized> PageFetcher for Box<F> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn initialize(&mut self) -> Result<(), FetchError> {
        (**self).initialize().await
    }

    async fn fetch(&self, url: &Url, options: &FetchOptions) -> Result<FetchedPage, FetchError> {
        (**self).fetch(url, options).await
    }

    async fn crawl_delay(&self, site: &Url) -> Option<Duration> {
        (**self).crawl_delay(site).await
    }

    async fn close(&mut self) -> Result<(), FetchError> {
        (**self).close().await
    }
}

/// Fetches pages with plain HTTP requests
///
/// The served markup is treated as the DOM, so client-side rendering is not
/// observed and no console errors are reported.
pub struct HttpFetcher {
    client: Client,
    raw_client: Client,
    user_agent: String,
    navigation_timeout: Duration,
    side_request_budget: Duration,
    probe_resources: bool,
    max_resource_probes: usize,
}

impl HttpFetcher {
    /// Creates a fetcher from the crawler and user agent configuration
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rankscope::config::Config;
    /// use rankscope::crawler::HttpFetcher;
    ///
    /// let config = Config::default();
    /// let fetcher = HttpFetcher::new(&config.user_agent, &config.crawler).unwrap();
    /// ```
    pub fn new(
        user_agent: &UserAgentConfig,
        crawler: &CrawlerConfig,
    ) -> Result<Self, reqwest::Error> {
        let navigation_timeout = Duration::from_secs(crawler.navigation_timeout_secs);
        let side_request_budget = SIDE_REQUEST_BUDGET.min(navigation_timeout);
        Ok(Self {
            client: build_http_client(user_agent, navigation_timeout)?,
            raw_client: build_raw_client(user_agent, side_request_budget)?,
            user_agent: user_agent.user_agent_string(),
            navigation_timeout,
            side_request_budget,
            probe_resources: crawler.probe_resources,
            max_resource_probes: crawler.max_resource_probes,
        })
    }

    /// Disables resource HEAD requests; sizes stay 0
    pub fn without_resource_probes(mut self) -> Self {
        self.probe_resources = false;
        self
    }

    /// Fills in resource sizes with bounded concurrent HEAD requests
    async fn measure_sizes(&self, resources: &mut [ResourceInfo]) {
        if !self.probe_resources || self.max_resource_probes == 0 {
            return;
        }

        let raw = &self.raw_client;
        futures::stream::iter(resources.iter_mut().take(self.max_resource_probes))
            .for_each_concurrent(HEAD_CONCURRENCY, |resource| async move {
                resource.size = probe_content_length(raw, &resource.url).await;
            })
            .await;
    }

    /// Fills in `content-encoding` and resource sizes before `deadline`
    ///
    /// Requests still pending at the deadline are dropped: the encoding stays
    /// unknown and unmeasured resources keep size 0.
    async fn fill_side_details(
        &self,
        final_url: &Url,
        headers: &mut BTreeMap<String, String>,
        resources: &mut [ResourceInfo],
    ) {
        let deadline = tokio::time::Instant::now() + self.side_request_budget;

        if !headers.contains_key("content-encoding") {
            let encoding = probe_content_encoding(&self.raw_client, final_url.as_str());
            if let Ok(Some(encoding)) = tokio::time::timeout_at(deadline, encoding).await {
                headers.insert("content-encoding".to_string(), encoding);
            }
        }

        let sizes = self.measure_sizes(resources);
        if tokio::time::timeout_at(deadline, sizes).await.is_err() {
            tracing::debug!(
                "Resource sizes for {} incomplete after {:?}",
                final_url,
                self.side_request_budget
            );
        }
    }
}

/// Runs `load`, failing with [`FetchError::Timeout`] once `limit` has passed
///
/// The load future is dropped on timeout, so the caller can clean up right after.
pub(crate) async fn within_navigation_timeout<T>(
    url: &Url,
    limit: Duration,
    load: impl Future<Output = Result<T, FetchError>>,
) -> Result<T, FetchError> {
    tokio::time::timeout(limit, load)
        .await
        .map_err(|_| FetchError::Timeout {
            url: url.to_string(),
            secs: limit.as_secs(),
        })?
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self, url: &Url, options: &FetchOptions) -> Result<FetchedPage, FetchError> {
        if options.take_screenshot {
            tracing::debug!("Screenshots need the browser backend; skipping for {}", url);
        }

        let start = Instant::now();
        let Document {
            final_url,
            status_code,
            mut headers,
            html,
        } = within_navigation_timeout(url, self.navigation_timeout, self.load_document(url))
            .await?;
        let load_time = start.elapsed().as_millis() as u64;

        let mut subresources = extract_resources(&html, &final_url);
        self.fill_side_details(&final_url, &mut headers, &mut subresources).await;

        let mut resources = Vec::with_capacity(subresources.len() + 1);
        resources.push(ResourceInfo::new(
            ResourceKind::Other,
            final_url.as_str(),
            html.len() as u64,
        ));
        resources.extend(subresources);

        tracing::debug!(
            "Fetched {} -> {} ({}, {} bytes, {} ms)",
            url,
            final_url,
            status_code,
            html.len(),
            load_time
        );

        Ok(FetchedPage {
            final_url,
            status_code,
            headers,
            html,
            load_time,
            resources,
            console_errors: Vec::new(),
            screenshot: None,
        })
    }

    async fn crawl_delay(&self, site: &Url) -> Option<Duration> {
        match fetch_robots(&self.client, site).await {
            RobotsFetch::Found(robots) => robots
                .crawl_delay(&self.user_agent)
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok()),
            _ => None,
        }
    }
}

/// The page request's response, read in full
struct Document {
    final_url: Url,
    status_code: u16,
    headers: BTreeMap<String, String>,
    html: String,
}

impl HttpFetcher {
    async fn load_document(&self, url: &Url) -> Result<Document, FetchError> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| self.classify_request_error(url, &e))?;

        let status_code = response.status().as_u16();
        let final_url = response.url().clone();
        let headers = lowercase_headers(response.headers());

        if let Some(content_type) = headers.get("content-type") {
            if !is_html_content_type(content_type) {
                return Err(FetchError::NotHtml {
                    url: url.to_string(),
                    content_type: content_type.clone(),
                });
            }
        }

        let html = response
            .text()
            .await
            .map_err(|e| self.classify_request_error(url, &e))?;

        Ok(Document {
            final_url,
            status_code,
            headers,
            html,
        })
    }

    fn classify_request_error(&self, url: &Url, e: &reqwest::Error) -> FetchError {
        if e.is_timeout() {
            return FetchError::Timeout {
                url: url.to_string(),
                secs: self.navigation_timeout.as_secs(),
            };
        }
        FetchError::Network {
            url: url.to_string(),
            message: describe_request_error(e),
        }
    }
}

fn is_html_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime.is_empty() || mime == "text/html" || mime == "application/xhtml+xml"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        let config = Config::default();
        HttpFetcher::new(&config.user_agent, &config.crawler).unwrap()
    }

    fn fetcher_with_timeout(secs: u64) -> HttpFetcher {
        let mut config = Config::default();
        config.crawler.navigation_timeout_secs = secs;
        HttpFetcher::new(&config.user_agent, &config.crawler).unwrap()
    }

    #[test]
    fn test_is_html_content_type() {
        assert!(is_html_content_type("text/html"));
        assert!(is_html_content_type("Text/HTML; charset=utf-8"));
        assert!(is_html_content_type("application/xhtml+xml"));
        assert!(!is_html_content_type("application/pdf"));
        assert!(!is_html_content_type("application/json"));
    }

    #[tokio::test]
    async fn test_fetch_html_page_with_resources() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"<html><body><img src="/logo.png"><script src="/app.js"></script></body></html>"#,
                "text/html",
            ))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/logo.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 1500]))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/", server.uri())).unwrap();
        let page = fetcher().fetch(&url, &FetchOptions::default()).await.unwrap();

        assert_eq!(page.status_code, 200);
        assert_eq!(page.final_url, url);
        assert!(page.html.contains("logo.png"));
        assert_eq!(page.headers.get("content-type").map(String::as_str), Some("text/html"));

        assert_eq!(page.resources.len(), 3);
        assert_eq!(page.resources[0].kind, ResourceKind::Other);
        assert_eq!(page.resources[0].size, page.html.len() as u64);

        let logo = page
            .resources
            .iter()
            .find(|r| r.url.ends_with("/logo.png"))
            .unwrap();
        assert_eq!(logo.kind, ResourceKind::Image);
        assert_eq!(logo.size, 1500);

        let script = page
            .resources
            .iter()
            .find(|r| r.url.ends_with("/app.js"))
            .unwrap();
        assert_eq!(script.size, 0);
        assert!(page.console_errors.is_empty());
    }

    #[tokio::test]
    async fn test_error_status_is_returned_as_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(
                ResponseTemplate::new(404).set_body_raw("<h1>Not found</h1>", "text/html"),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();
        let page = fetcher()
            .without_resource_probes()
            .fetch(&url, &FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(page.status_code, 404);
    }

    #[tokio::test]
    async fn test_non_html_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/report.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("%PDF-1.4", "application/pdf"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/report.pdf", server.uri())).unwrap();
        let result = fetcher().fetch(&url, &FetchOptions::default()).await;
        assert!(matches!(result, Err(FetchError::NotHtml { .. })));
    }

    #[tokio::test]
    async fn test_slow_resource_does_not_fail_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"<html><body><img src="/hero.png"><img src="/icon.png"></body></html>"#,
                "text/html",
            ))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/hero.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![0u8; 2048])
                    .set_delay(Duration::from_secs(4)),
            )
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/icon.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 300]))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/", server.uri())).unwrap();
        let started = Instant::now();
        let page = fetcher_with_timeout(2)
            .fetch(&url, &FetchOptions::default())
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(4));
        let size_of = |suffix: &str| {
            page.resources
                .iter()
                .find(|r| r.url.ends_with(suffix))
                .map(|r| r.size)
                .unwrap()
        };
        assert_eq!(size_of("/hero.png"), 0);
        assert_eq!(size_of("/icon.png"), 300);
    }

    #[tokio::test]
    async fn test_slow_page_is_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<p>late</p>", "text/html")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/", server.uri())).unwrap();
        let result = fetcher_with_timeout(1).fetch(&url, &FetchOptions::default()).await;
        assert!(matches!(result, Err(FetchError::Timeout { secs: 1, .. })));
    }

    #[tokio::test]
    async fn test_navigation_timeout_drops_load_before_returning() {
        struct DropFlag(Arc<AtomicBool>);
        impl Drop for DropFlag {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let guard = DropFlag(Arc::clone(&dropped));
        let url = Url::parse("https://example.com/").unwrap();
        let load = async move {
            let _guard = guard;
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, FetchError>(())
        };

        let result = within_navigation_timeout(&url, Duration::from_millis(100), load).await;
        assert!(matches!(result, Err(FetchError::Timeout { .. })));
        assert!(dropped.load(Ordering::SeqCst));

        let quick = within_navigation_timeout(&url, Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(quick.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_crawl_delay_read_from_robots() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("User-agent: *\nCrawl-delay: 1.5\nDisallow: /private"),
            )
            .mount(&server)
            .await;

        let site = Url::parse(&server.uri()).unwrap();
        assert_eq!(
            fetcher().crawl_delay(&site).await,
            Some(Duration::from_millis(1500))
        );
    }

    #[tokio::test]
    async fn test_no_robots_means_no_crawl_delay() {
        let server = MockServer::start().await;
        let site = Url::parse(&server.uri()).unwrap();
        assert_eq!(fetcher().crawl_delay(&site).await, None);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let url = Url::parse("http://127.0.0.1:1/").unwrap();
        let result = fetcher().fetch(&url, &FetchOptions::default()).await;
        assert!(matches!(result, Err(FetchError::Network { .. })));
    }
}
