//! Crawler module for page fetching and site traversal
//!
//! This module contains the crawling logic, including:
//! - The `PageFetcher` backends (plain HTTP, and headless Chromium behind the
//!   `browser` feature)
//! - Single-page crawls that turn a fetched page into a [`CrawlResult`]
//! - Bounded breadth-first traversal of one site

#[cfg(feature = "browser")]
mod browser;
mod coordinator;
mod fetcher;
mod result;

#[cfg(feature = "browser")]
pub use browser::BrowserFetcher;
pub use coordinator::{CrawlSettings, Crawler, DEFAULT_FETCH_GRACE, MAX_CRAWL_DELAY};
pub use fetcher::{FetchError, FetchOptions, FetchedPage, HttpFetcher, PageFetcher};
pub use result::{CrawlResult, ResourceInfo, ResourceKind};

use crate::config::{Config, FetchBackend};
use crate::AuditError;

/// Builds the fetch backend selected in the configuration
///
/// # Returns
///
/// * `Ok(Box<dyn PageFetcher>)` - An uninitialized fetcher
/// * `Err(AuditError)` - The HTTP client could not be built, or the browser backend
///   was requested in a build without the `browser` feature
pub fn build_fetcher(config: &Config) -> Result<Box<dyn PageFetcher>, AuditError> {
    match config.crawler.backend {
        FetchBackend::Http => Ok(Box::new(HttpFetcher::new(
            &config.user_agent,
            &config.crawler,
        )?)),
        #[cfg(feature = "browser")]
        FetchBackend::Browser => Ok(Box::new(BrowserFetcher::new(
            config.user_agent.user_agent_string(),
            std::time::Duration::from_secs(config.crawler.navigation_timeout_secs),
        ))),
        #[cfg(not(feature = "browser"))]
        FetchBackend::Browser => Err(AuditError::Fetch(FetchError::Browser(
            "this build has no browser support; rebuild with `--features browser`".to_string(),
        ))),
    }
}

/// Builds a crawler over the configured backend
pub fn build_crawler(config: &Config) -> Result<Crawler<Box<dyn PageFetcher>>, AuditError> {
    let fetcher = build_fetcher(config)?;
    Ok(Crawler::new(fetcher, CrawlSettings::from(&config.crawler)))
}
