//! Link extraction and internal/external classification

use crate::url::{classify_link, normalize_url, LinkScope};
use scraper::Html;
use std::collections::HashSet;
use url::Url;

use super::select_all;

/// Links found on a page, split by scope
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedLinks {
    /// Normalized links whose host equals the crawl's starting host
    pub internal: Vec<String>,
    /// Normalized links to any other host
    pub external: Vec<String>,
}

/// Extracts same-document links and classifies them against `domain`
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:`, `data:` links
/// - Fragment-only links (same-page anchors)
/// - Anything that is not HTTP(S) after resolution
///
/// Links are resolved against `base_url` (the post-redirect URL), normalized,
/// deduplicated in document order, and each list is capped at `max_per_scope`.
///
/// # Example
///
/// ```
/// use rankscope::extractor::extract_links;
/// use url::Url;
///
/// let html = r#"<a href="/about">About</a><a href="https://other.org/">Other</a>"#;
/// let base = Url::parse("https://example.com/").unwrap();
/// let links = extract_links(html, &base, "example.com", 50);
/// assert_eq!(links.internal, vec!["https://example.com/about"]);
/// assert_eq!(links.external, vec!["https://other.org/"]);
/// ```
pub fn extract_links(
    html: &str,
    base_url: &Url,
    domain: &str,
    max_per_scope: usize,
) -> ExtractedLinks {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = ExtractedLinks::default();

    for element in select_all(&document, "a[href]") {
        if element.value().attr("download").is_some() {
            continue;
        }

        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(resolved) = resolve_link(href, base_url) else {
            continue;
        };

        if !seen.insert(resolved.to_string()) {
            continue;
        }

        let bucket = match classify_link(&resolved, domain) {
            LinkScope::Internal => &mut links.internal,
            LinkScope::External => &mut links.external,
        };
        if bucket.len() < max_per_scope {
            bucket.push(resolved.to_string());
        }

        if links.internal.len() >= max_per_scope && links.external.len() >= max_per_scope {
            break;
        }
    }

    links
}

/// Resolves a link href to a normalized absolute URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel:, data: schemes
/// - fragment-only hrefs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    normalize_url(absolute.as_str()).ok()
}
