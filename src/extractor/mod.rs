//! Extraction of structured facts from a page's DOM
//!
//! Every function here is pure: it reads markup the crawler already fetched and
//! returns owned data. Nothing in this module performs I/O.
//!
//! - Links split into internal and external sets
//! - JSON-LD blocks that parse as valid JSON
//! - Subresources referenced by the markup
//! - On-page facts read by the audit rules (title, meta tags, headings, ...)

mod json_ld;
mod links;
mod page_facts;
mod resources;

pub use json_ld::extract_json_ld;
pub use links::{extract_links, ExtractedLinks};
pub use page_facts::{
    canonical_hrefs, count_words, has_address_element, headings, html_lang, images, meta_content,
    meta_contents, phone_links, title, visible_text, Heading, ImageTag, PageFacts,
    TRACKED_META_KEYS,
};
pub use resources::{extract_resources, infer_kind_from_url};

use scraper::{ElementRef, Html, Selector};

/// Selects all elements matching a CSS selector
///
/// An unparsable selector yields no elements rather than an error.
pub(crate) fn select_all<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

/// Collects the trimmed, whitespace-collapsed text content of an element
pub(crate) fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
