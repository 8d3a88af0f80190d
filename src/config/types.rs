use serde::Deserialize;

/// Main configuration structure for Rankscope
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub checks: ChecksConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Which engine fetches and renders pages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchBackend {
    /// Plain HTTP GET; the served markup is the DOM
    #[default]
    Http,
    /// Headless Chromium; the rendered DOM is serialized after load
    Browser,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of pages successfully fetched per site crawl
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: usize,

    /// Per-page navigation timeout (seconds)
    #[serde(
        rename = "navigation-timeout-secs",
        default = "default_navigation_timeout_secs"
    )]
    pub navigation_timeout_secs: u64,

    /// Cap on internal and on external links kept per page
    #[serde(rename = "max-links-per-page", default = "default_max_links_per_page")]
    pub max_links_per_page: usize,

    /// Pause between consecutive page fetches (milliseconds)
    #[serde(rename = "politeness-delay-ms", default)]
    pub politeness_delay_ms: u64,

    /// Fetch backend
    #[serde(default)]
    pub backend: FetchBackend,

    /// Issue HEAD requests to learn the size of page resources (HTTP backend only)
    #[serde(rename = "probe-resources", default = "default_true")]
    pub probe_resources: bool,

    /// Upper bound on resource HEAD probes per page
    #[serde(rename = "max-resource-probes", default = "default_max_resource_probes")]
    pub max_resource_probes: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            navigation_timeout_secs: default_navigation_timeout_secs(),
            max_links_per_page: default_max_links_per_page(),
            politeness_delay_ms: 0,
            backend: FetchBackend::default(),
            probe_resources: true,
            max_resource_probes: default_max_resource_probes(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name", default = "default_crawler_name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version", default = "default_crawler_version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url", default = "default_contact_url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email", default = "default_contact_email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the user agent string: `Name/Version (+ContactURL; ContactEmail)`
    pub fn user_agent_string(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: default_crawler_name(),
            crawler_version: default_crawler_version(),
            contact_url: default_contact_url(),
            contact_email: default_contact_email(),
        }
    }
}

/// Settings for rules that make their own network requests
#[derive(Debug, Clone, Deserialize)]
pub struct ChecksConfig {
    /// Timeout for robots.txt and sitemap probes (seconds)
    #[serde(
        rename = "network-timeout-secs",
        default = "default_network_timeout_secs"
    )]
    pub network_timeout_secs: u64,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            network_timeout_secs: default_network_timeout_secs(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Where to write the JSON audit report, if anywhere
    #[serde(rename = "json-path", default)]
    pub json_path: Option<String>,
}

fn default_max_pages() -> usize {
    10
}

fn default_navigation_timeout_secs() -> u64 {
    30
}

fn default_max_links_per_page() -> usize {
    50
}

fn default_max_resource_probes() -> usize {
    50
}

fn default_network_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_crawler_name() -> String {
    "Rankscope".to_string()
}

fn default_crawler_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_contact_url() -> String {
    "https://example.com/rankscope".to_string()
}

fn default_contact_email() -> String {
    "crawler@example.com".to_string()
}
