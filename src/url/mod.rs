//! URL handling module for Rankscope
//!
//! This module provides URL normalization, domain extraction, and internal/external
//! link classification relative to the audited site.

mod normalize;

use url::Url;

pub use normalize::normalize_url;

/// Where a link points relative to the audited site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkScope {
    /// Same host as the crawl's starting URL
    Internal,
    /// Any other host
    External,
}

impl LinkScope {
    /// Returns true if the link should be followed by the crawler
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal)
    }
}

/// Extracts the lower-cased host of a URL, without port
///
/// Returns `None` for URLs that have no host (e.g. `data:` URLs).
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Classifies a URL against the audit's starting domain
///
/// A link is internal if and only if its host equals `domain` (case-insensitive).
/// Subdomains and `www.` variants are different hosts and therefore external.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use rankscope::url::{classify_link, LinkScope};
///
/// let link = Url::parse("https://example.com/about").unwrap();
/// assert_eq!(classify_link(&link, "example.com"), LinkScope::Internal);
///
/// let link = Url::parse("https://blog.example.com/").unwrap();
/// assert_eq!(classify_link(&link, "example.com"), LinkScope::External);
/// ```
pub fn classify_link(url: &Url, domain: &str) -> LinkScope {
    match extract_domain(url) {
        Some(host) if host.eq_ignore_ascii_case(domain) => LinkScope::Internal,
        _ => LinkScope::External,
    }
}
