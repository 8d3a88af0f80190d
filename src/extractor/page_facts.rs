//! On-page facts read by the audit rules
//!
//! The free functions take an already-parsed [`Html`]. [`PageFacts`] runs all of them
//! once and keeps owned results, so async code never holds a parsed document.

use scraper::Html;
use std::collections::BTreeMap;

use super::{element_text, select_all};

/// Elements whose text is never shown to a reader
const HIDDEN_TEXT_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// A heading element in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    /// 1 for `<h1>` through 6 for `<h6>`
    pub level: u8,
    pub text: String,
}

/// An `<img>` element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTag {
    pub src: String,
    /// Raw `alt` attribute; `None` when the attribute is absent
    pub alt: Option<String>,
}

impl ImageTag {
    /// True when the image carries a non-blank alt text
    pub fn has_alt(&self) -> bool {
        self.alt.as_deref().map_or(false, |a| !a.trim().is_empty())
    }
}

/// Meta keys (`name` or `property`) captured by [`PageFacts`]
pub const TRACKED_META_KEYS: &[&str] = &[
    "description",
    "viewport",
    "og:title",
    "og:description",
    "og:image",
    "og:url",
    "twitter:card",
    "twitter:title",
    "twitter:description",
    "twitter:image",
];

/// Everything the audit rules read from one page's markup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageFacts {
    pub title: Option<String>,
    /// First non-blank content per key in [`TRACKED_META_KEYS`]
    pub meta: BTreeMap<String, String>,
    /// Every `robots` and `googlebot` meta directive
    pub robots_directives: Vec<String>,
    pub canonical_hrefs: Vec<String>,
    pub headings: Vec<Heading>,
    pub images: Vec<ImageTag>,
    pub lang: Option<String>,
    pub word_count: usize,
    pub phone_links: Vec<String>,
    pub has_address_element: bool,
}

impl PageFacts {
    /// Parses `html` once and collects every fact
    pub fn from_html(html: &str) -> Self {
        let document = Html::parse_document(html);

        let meta = TRACKED_META_KEYS
            .iter()
            .filter_map(|key| meta_content(&document, key).map(|v| (key.to_string(), v)))
            .collect();

        let mut robots_directives = meta_contents(&document, "robots");
        robots_directives.extend(meta_contents(&document, "googlebot"));

        Self {
            title: title(&document),
            meta,
            robots_directives,
            canonical_hrefs: canonical_hrefs(&document),
            headings: headings(&document),
            images: images(&document),
            lang: html_lang(&document),
            word_count: count_words(&visible_text(&document)),
            phone_links: phone_links(&document),
            has_address_element: has_address_element(&document),
        }
    }

    /// Looks up a tracked meta value
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(String::as_str)
    }

    /// `<h1>` headings only
    pub fn h1s(&self) -> impl Iterator<Item = &Heading> {
        self.headings.iter().filter(|h| h.level == 1)
    }
}

/// Returns the trimmed text of the first `<title>`, or `None` if missing or blank
pub fn title(document: &Html) -> Option<String> {
    select_all(document, "title")
        .first()
        .map(element_text)
        .filter(|t| !t.is_empty())
}

/// Returns the `content` of the first `<meta>` whose `name` or `property` equals `key`
///
/// The key comparison ignores ASCII case. Blank content counts as absent.
pub fn meta_content(document: &Html, key: &str) -> Option<String> {
    meta_contents(document, key).into_iter().next()
}

/// Returns the non-blank `content` of every `<meta>` matching `key`
pub fn meta_contents(document: &Html, key: &str) -> Vec<String> {
    select_all(document, "meta[content]")
        .into_iter()
        .filter(|meta| {
            let element = meta.value();
            [element.attr("name"), element.attr("property")]
                .into_iter()
                .flatten()
                .any(|k| k.trim().eq_ignore_ascii_case(key))
        })
        .filter_map(|meta| meta.value().attr("content"))
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .collect()
}

/// Returns the `href` of every `<link rel="canonical">`
pub fn canonical_hrefs(document: &Html) -> Vec<String> {
    select_all(document, "link[rel][href]")
        .into_iter()
        .filter(|link| {
            link.value()
                .attr("rel")
                .unwrap_or("")
                .split_whitespace()
                .any(|rel| rel.eq_ignore_ascii_case("canonical"))
        })
        .filter_map(|link| link.value().attr("href"))
        .map(|href| href.trim().to_string())
        .collect()
}

/// Returns every `<h1>`..`<h6>` in document order
pub fn headings(document: &Html) -> Vec<Heading> {
    select_all(document, "h1, h2, h3, h4, h5, h6")
        .into_iter()
        .filter_map(|heading| {
            let level = heading.value().name().strip_prefix('h')?.parse().ok()?;
            Some(Heading {
                level,
                text: element_text(&heading),
            })
        })
        .collect()
}

/// Returns every `<img>` element
pub fn images(document: &Html) -> Vec<ImageTag> {
    select_all(document, "img")
        .into_iter()
        .map(|img| ImageTag {
            src: img.value().attr("src").unwrap_or("").trim().to_string(),
            alt: img.value().attr("alt").map(str::to_string),
        })
        .collect()
}

/// Returns the `lang` attribute of the root `<html>` element
pub fn html_lang(document: &Html) -> Option<String> {
    document
        .root_element()
        .value()
        .attr("lang")
        .map(str::trim)
        .filter(|lang| !lang.is_empty())
        .map(str::to_string)
}

/// Collects the text a reader would see in the page body
pub fn visible_text(document: &Html) -> String {
    let root = select_all(document, "body")
        .into_iter()
        .next()
        .unwrap_or_else(|| document.root_element());

    let mut words: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map_or(false, |e| HIDDEN_TEXT_ELEMENTS.contains(&e.name()))
        });
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }
    words.join(" ")
}

/// Counts words: whitespace-separated tokens containing at least one letter or digit
pub fn count_words(text: &str) -> usize {
    text.split_whitespace()
        .filter(|token| token.chars().any(char::is_alphanumeric))
        .count()
}

/// Returns the numbers behind `tel:` links, without the scheme
pub fn phone_links(document: &Html) -> Vec<String> {
    select_all(document, "a[href]")
        .into_iter()
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter_map(|href| {
            href.get(..4)
                .filter(|scheme| scheme.eq_ignore_ascii_case("tel:"))
                .map(|_| href[4..].trim().to_string())
        })
        .filter(|number| !number.is_empty())
        .collect()
}

/// True when the page contains an `<address>` element
pub fn has_address_element(document: &Html) -> bool {
    !select_all(document, "address").is_empty()
}
