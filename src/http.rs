//! HTTP client construction and lightweight probes
//!
//! This module builds the `reqwest` clients shared by the HTTP fetch backend and by
//! rules that make their own requests (robots.txt, sitemap), and classifies probe
//! outcomes so callers never have to deal with raw transport errors.

use crate::config::UserAgentConfig;
use reqwest::header::{HeaderMap, ACCEPT_ENCODING, CONTENT_LENGTH};
use reqwest::{redirect::Policy, Client};
use std::collections::BTreeMap;
use std::time::Duration;

/// Maximum redirect hops followed for any request
const MAX_REDIRECTS: usize = 10;

/// Builds the decoding HTTP client used for page and probe requests
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Whole-request timeout
///
/// # Example
///
/// ```no_run
/// use rankscope::config::UserAgentConfig;
/// use rankscope::http::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client(&UserAgentConfig::default(), Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent_string())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Builds a client that leaves response bodies and encoding headers untouched
///
/// The decoding client strips `content-encoding` and `content-length` once it has
/// decompressed a body, so header-only probes go through this one instead.
pub fn build_raw_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent_string())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .no_gzip()
        .no_brotli()
        .build()
}

/// Outcome of fetching an auxiliary text resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// 2xx response with its body
    Found { status: u16, body: String },
    /// 4xx response: the resource does not exist
    Missing { status: u16 },
    /// 5xx response or transport failure: existence unknown
    Unavailable { reason: String },
}

impl Probe {
    /// Returns true if the resource was retrieved
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

/// Fetches a small text resource and classifies the outcome
///
/// Never fails: 5xx and network errors are reported as [`Probe::Unavailable`].
pub async fn probe_text(client: &Client, url: &str) -> Probe {
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!("Probe of {} failed: {}", url, e);
            return Probe::Unavailable {
                reason: describe_request_error(&e),
            };
        }
    };

    let status = response.status();
    if status.is_server_error() {
        return Probe::Unavailable {
            reason: format!("HTTP {}", status.as_u16()),
        };
    }
    if !status.is_success() {
        return Probe::Missing {
            status: status.as_u16(),
        };
    }

    match response.text().await {
        Ok(body) => Probe::Found {
            status: status.as_u16(),
            body,
        },
        Err(e) => Probe::Unavailable {
            reason: describe_request_error(&e),
        },
    }
}

/// Reads the `content-length` of a resource with a HEAD request
///
/// Returns 0 when the request fails, the status is not 2xx, or the header is absent.
pub async fn probe_content_length(client: &Client, url: &str) -> u64 {
    match client.head(url).send().await {
        Ok(response) if response.status().is_success() => header_content_length(response.headers()),
        Ok(_) => 0,
        Err(e) => {
            tracing::trace!("HEAD {} failed: {}", url, e);
            0
        }
    }
}

/// Asks the server which `content-encoding` it would use for a page
pub async fn probe_content_encoding(client: &Client, url: &str) -> Option<String> {
    let response = client
        .head(url)
        .header(ACCEPT_ENCODING, "gzip, deflate, br")
        .send()
        .await
        .ok()?;

    response
        .headers()
        .get("content-encoding")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty() && v != "identity")
}

/// Copies a header map into a map with lower-cased keys
///
/// Repeated headers are joined with `", "`.
pub fn lowercase_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        map.entry(name.as_str().to_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    map
}

fn header_content_length(headers: &HeaderMap) -> u64 {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

/// Maps a reqwest error to a short human-readable cause
pub fn describe_request_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        "Connection refused".to_string()
    } else if e.is_redirect() {
        "Too many redirects".to_string()
    } else {
        e.to_string()
    }
}
