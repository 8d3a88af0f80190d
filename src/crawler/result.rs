//! Crawl output types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Kind of a subresource loaded by a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Image,
    Script,
    Stylesheet,
    Font,
    Other,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Image => "image",
            Self::Script => "script",
            Self::Stylesheet => "stylesheet",
            Self::Font => "font",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// A resource observed while loading a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInfo {
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub url: String,
    /// Bytes, 0 if unknown
    pub size: u64,
}

impl ResourceInfo {
    pub fn new(kind: ResourceKind, url: impl Into<String>, size: u64) -> Self {
        Self {
            kind,
            url: url.into(),
            size,
        }
    }
}

/// Everything learned about one fetched page
///
/// Produced once by the crawler and only read afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    /// The URL that was requested
    pub url: String,
    /// The URL after redirects
    pub final_url: String,
    pub status_code: u16,
    /// Response headers with lower-cased names
    pub headers: BTreeMap<String, String>,
    /// Full rendered markup
    pub html: String,
    /// Milliseconds from request start until the page settled
    pub load_time: u64,
    /// Byte length of `html`
    pub page_size: u64,
    pub resources: Vec<ResourceInfo>,
    pub internal_links: Vec<String>,
    pub external_links: Vec<String>,
    pub json_ld_data: Vec<Value>,
    pub console_errors: Vec<String>,
    /// PNG bytes, only when requested
    #[serde(skip)]
    pub screenshot: Option<Vec<u8>>,
}

impl CrawlResult {
    /// Creates a result for already-fetched markup with no resources or links
    ///
    /// Useful for auditing pages obtained outside the crawler.
    pub fn new(url: impl Into<String>, status_code: u16, html: impl Into<String>) -> Self {
        let url = url.into();
        let html = html.into();
        Self {
            final_url: url.clone(),
            url,
            status_code,
            headers: BTreeMap::new(),
            page_size: html.len() as u64,
            html,
            load_time: 0,
            resources: Vec::new(),
            internal_links: Vec::new(),
            external_links: Vec::new(),
            json_ld_data: Vec::new(),
            console_errors: Vec::new(),
            screenshot: None,
        }
    }

    /// Looks up a response header by (case-insensitive) name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns true for 2xx status codes
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}
