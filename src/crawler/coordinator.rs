//! Crawl coordination: single-page crawl and bounded breadth-first site traversal

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::{FetchError, FetchOptions, PageFetcher};
use crate::crawler::CrawlResult;
use crate::extractor::{extract_json_ld, extract_links};
use crate::url::{extract_domain, normalize_url};
use crate::{UrlError, UrlResult};
use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};
use url::Url;

/// Time a fetch may run past its navigation timeout to finish side requests
/// and close what it opened; must exceed the fetcher's side-request budget
pub const DEFAULT_FETCH_GRACE: Duration = Duration::from_secs(5);

/// Upper bound on a robots.txt `Crawl-delay` the crawler will honor
pub const MAX_CRAWL_DELAY: Duration = Duration::from_secs(10);

/// Crawler settings that survive past configuration loading
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub navigation_timeout: Duration,
    /// Added to `navigation_timeout` for the crawler's own bound on a fetch
    pub fetch_grace: Duration,
    pub max_links_per_page: usize,
    /// Minimum pause between fetches; robots.txt may raise it
    pub politeness_delay: Duration,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self::from(&CrawlerConfig::default())
    }
}

impl From<&CrawlerConfig> for CrawlSettings {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            navigation_timeout: Duration::from_secs(config.navigation_timeout_secs),
            fetch_grace: DEFAULT_FETCH_GRACE,
            max_links_per_page: config.max_links_per_page,
            politeness_delay: Duration::from_millis(config.politeness_delay_ms),
        }
    }
}

/// Drives a [`PageFetcher`] over one site
///
/// Pages are fetched one at a time in breadth-first order. The fetcher's resources
/// are acquired by [`Crawler::initialize`] and must be released with
/// [`Crawler::close`]; [`crate::audit::run_site_audit`] does both.
pub struct Crawler<F: PageFetcher> {
    fetcher: F,
    settings: CrawlSettings,
    initialized: bool,
}

impl<F: PageFetcher> Crawler<F> {
    pub fn new(fetcher: F, settings: CrawlSettings) -> Self {
        Self {
            fetcher,
            settings,
            initialized: false,
        }
    }

    pub fn settings(&self) -> &CrawlSettings {
        &self.settings
    }

    /// Acquires the fetcher's resources (idempotent)
    pub async fn initialize(&mut self) -> Result<(), FetchError> {
        if self.initialized {
            return Ok(());
        }
        tracing::debug!("Initializing {} fetcher", self.fetcher.name());
        self.fetcher.initialize().await?;
        self.initialized = true;
        Ok(())
    }

    /// Releases the fetcher's resources; safe to call repeatedly
    pub async fn close(&mut self) -> Result<(), FetchError> {
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;
        self.fetcher.close().await
    }

    /// Fetches a single page and extracts its links and JSON-LD
    ///
    /// Links are classified against the host of `url` itself.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlResult)` - The page loaded (whatever its status code)
    /// * `Err(FetchError)` - Timeout, network failure, or non-HTML content
    pub async fn crawl_page(
        &self,
        url: &Url,
        take_screenshot: bool,
    ) -> Result<CrawlResult, FetchError> {
        let domain = extract_domain(url).unwrap_or_default();
        self.crawl_page_for_domain(url, &domain, take_screenshot).await
    }

    async fn crawl_page_for_domain(
        &self,
        url: &Url,
        domain: &str,
        take_screenshot: bool,
    ) -> Result<CrawlResult, FetchError> {
        let options = FetchOptions { take_screenshot };
        let navigation = self.settings.navigation_timeout;

        // Fetchers time out navigation themselves; this only catches one that hangs
        // while cleaning up.
        let page = tokio::time::timeout(
            navigation + self.settings.fetch_grace,
            self.fetcher.fetch(url, &options),
        )
        .await
        .map_err(|_| FetchError::Timeout {
            url: url.to_string(),
            secs: navigation.as_secs(),
        })??;

        let links = extract_links(
            &page.html,
            &page.final_url,
            domain,
            self.settings.max_links_per_page,
        );
        let json_ld_data = extract_json_ld(&page.html);

        Ok(CrawlResult {
            url: url.to_string(),
            final_url: page.final_url.to_string(),
            status_code: page.status_code,
            headers: page.headers,
            page_size: page.html.len() as u64,
            html: page.html,
            load_time: page.load_time,
            resources: page.resources,
            internal_links: links.internal,
            external_links: links.external,
            json_ld_data,
            console_errors: page.console_errors,
            screenshot: page.screenshot,
        })
    }

    /// Crawls a site breadth-first starting at `start_url`
    ///
    /// # Traversal
    ///
    /// 1. Normalize the start URL and take its host as the crawl's domain
    /// 2. Pop URLs from a FIFO queue, fetching each one at a time
    /// 3. After each successful fetch, enqueue its internal links not yet seen,
    ///    only while fetched + queued stays under `max_pages`
    /// 4. A failed fetch is logged and skipped
    ///
    /// Fetches after the first are spaced by the politeness delay, raised to the
    /// site's robots.txt `Crawl-delay` (at most [`MAX_CRAWL_DELAY`]) when the
    /// fetcher reports one.
    ///
    /// At most `max_pages` results are returned, none sharing a URL. An empty
    /// result means nothing could be fetched; the caller decides how fatal that is.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<CrawlResult>)` - Pages in fetch order
    /// * `Err(UrlError)` - The start URL is not a crawlable HTTP(S) URL
    pub async fn crawl_website(
        &self,
        start_url: &str,
        max_pages: usize,
    ) -> UrlResult<Vec<CrawlResult>> {
        let start = normalize_url(start_url)?;
        let domain = extract_domain(&start).ok_or(UrlError::MissingDomain)?;
        let delay = if max_pages > 1 {
            self.politeness_delay(&start).await
        } else {
            Duration::ZERO
        };

        let mut queue: VecDeque<Url> = VecDeque::from([start.clone()]);
        let mut seen: HashSet<String> = HashSet::from([start.to_string()]);
        let mut results: Vec<CrawlResult> = Vec::new();
        let mut failures = 0usize;
        let started = Instant::now();

        tracing::info!("Crawling {} (max {} pages)", start, max_pages);

        while let Some(url) = queue.pop_front() {
            if results.len() >= max_pages {
                break;
            }

            let first_fetch = results.is_empty() && failures == 0;
            if !first_fetch && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let page = match self.crawl_page_for_domain(&url, &domain, false).await {
                Ok(page) => page,
                Err(e) => {
                    failures += 1;
                    tracing::warn!("Skipping {}: {}", url, e);
                    continue;
                }
            };

            for link in &page.internal_links {
                if results.len() + 1 + queue.len() >= max_pages {
                    break;
                }
                if !seen.insert(link.clone()) {
                    continue;
                }
                match Url::parse(link) {
                    Ok(next) => {
                        tracing::trace!("Queued {}", next);
                        queue.push_back(next);
                    }
                    Err(e) => tracing::debug!("Dropping unparsable link {}: {}", link, e),
                }
            }

            tracing::debug!(
                "Crawled {} ({}) [{}/{}]",
                page.url,
                page.status_code,
                results.len() + 1,
                max_pages
            );
            results.push(page);
        }

        tracing::info!(
            "Crawl of {} finished: {} pages, {} failures in {:?}",
            start,
            results.len(),
            failures,
            started.elapsed()
        );

        Ok(results)
    }

    async fn politeness_delay(&self, start: &Url) -> Duration {
        let configured = self.settings.politeness_delay;
        let Some(requested) = self.fetcher.crawl_delay(start).await else {
            return configured;
        };
        let delay = effective_delay(configured, requested);
        if delay > configured {
            tracing::info!("Honoring robots.txt Crawl-delay: {:?} between fetches", delay);
        }
        delay
    }
}

/// The larger of the configured delay and the robots.txt request, capped
fn effective_delay(configured: Duration, requested: Duration) -> Duration {
    configured.max(requested.min(MAX_CRAWL_DELAY))
}
