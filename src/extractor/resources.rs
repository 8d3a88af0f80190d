//! Subresource discovery from markup
//!
//! Used when no browser is available to observe network traffic: the resource list
//! is rebuilt from the elements that would have triggered the requests.

use crate::crawler::{ResourceInfo, ResourceKind};
use scraper::Html;
use std::collections::HashSet;
use url::Url;

use super::select_all;

/// Lists images, scripts, stylesheets and fonts referenced by the markup
///
/// Sizes are left at 0; the fetcher fills them in when it can.
pub fn extract_resources(html: &str, base_url: &Url) -> Vec<ResourceInfo> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut resources = Vec::new();

    let mut push = |kind: ResourceKind, href: Option<&str>| {
        let Some(href) = href.map(str::trim).filter(|h| !h.is_empty()) else {
            return;
        };
        if href.starts_with("data:") {
            return;
        }
        let Ok(absolute) = base_url.join(href) else {
            return;
        };
        if !matches!(absolute.scheme(), "http" | "https") {
            return;
        }
        if seen.insert(absolute.to_string()) {
            resources.push(ResourceInfo::new(kind, absolute.to_string(), 0));
        }
    };

    for img in select_all(&document, "img") {
        push(ResourceKind::Image, img.value().attr("src"));
    }

    for script in select_all(&document, "script[src]") {
        push(ResourceKind::Script, script.value().attr("src"));
    }

    for link in select_all(&document, "link[href]") {
        let rel = link.value().attr("rel").unwrap_or("").to_ascii_lowercase();
        let href = link.value().attr("href");
        let rels: Vec<&str> = rel.split_whitespace().collect();

        if rels.contains(&"stylesheet") {
            push(ResourceKind::Stylesheet, href);
        } else if rels.contains(&"preload") || rels.contains(&"prefetch") {
            let kind = match link.value().attr("as").unwrap_or("") {
                "font" => ResourceKind::Font,
                "style" => ResourceKind::Stylesheet,
                "script" => ResourceKind::Script,
                "image" => ResourceKind::Image,
                _ => href.map(infer_kind_from_url).unwrap_or(ResourceKind::Other),
            };
            push(kind, href);
        } else if rels.iter().any(|r| *r == "icon" || *r == "apple-touch-icon") {
            push(ResourceKind::Image, href);
        }
    }

    resources
}

/// Guesses a resource kind from a URL's file extension
pub fn infer_kind_from_url(url: &str) -> ResourceKind {
    let path = url
        .split(['?', '#'])
        .next()
        .unwrap_or(url)
        .to_ascii_lowercase();
    let extension = path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");

    match extension {
        "png" | "jpg" | "jpeg" | "gif" | "webp" | "avif" | "svg" | "ico" | "bmp" => {
            ResourceKind::Image
        }
        "js" | "mjs" => ResourceKind::Script,
        "css" => ResourceKind::Stylesheet,
        "woff" | "woff2" | "ttf" | "otf" | "eot" => ResourceKind::Font,
        _ => ResourceKind::Other,
    }
}
