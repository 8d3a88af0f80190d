//! Robots.txt handling module
//!
//! Fetches a site's robots.txt and exposes what the audit needs from it: whether
//! search crawlers are shut out, declared sitemaps, and crawl delays.

mod parser;

pub use parser::ParsedRobots;

use crate::http::{probe_text, Probe};
use reqwest::Client;
use url::Url;

/// Outcome of fetching a site's robots.txt
#[derive(Debug, Clone)]
pub enum RobotsFetch {
    /// The file exists and was parsed
    Found(ParsedRobots),
    /// The server answered with a 4xx status
    Missing { status: u16 },
    /// 5xx response or network failure
    Unavailable { reason: String },
}

/// Returns the robots.txt URL for the origin of `url`
pub fn robots_url(url: &Url) -> Option<Url> {
    url.join("/robots.txt").ok()
}

/// Fetches and parses robots.txt for the origin of `site_url`
///
/// # Arguments
///
/// * `client` - The HTTP client to use (its timeout bounds the request)
/// * `site_url` - Any URL on the site
///
/// # Returns
///
/// A [`RobotsFetch`]; transport problems are folded into `Unavailable`.
pub async fn fetch_robots(client: &Client, site_url: &Url) -> RobotsFetch {
    let Some(robots_url) = robots_url(site_url) else {
        return RobotsFetch::Unavailable {
            reason: format!("Cannot derive robots.txt URL from {}", site_url),
        };
    };

    tracing::debug!("Fetching {}", robots_url);
    match probe_text(client, robots_url.as_str()).await {
        Probe::Found { body, .. } => RobotsFetch::Found(ParsedRobots::from_content(&body)),
        Probe::Missing { status } => RobotsFetch::Missing { status },
        Probe::Unavailable { reason } => RobotsFetch::Unavailable { reason },
    }
}
