//! Rankscope: a crawl-and-audit engine for on-page and technical SEO health
//!
//! This crate crawls a website breadth-first, evaluates every crawled page set against a
//! catalog of independent rules, and folds the rule outcomes into weighted category and
//! overall scores.

pub mod audit;
pub mod config;
pub mod crawler;
pub mod extractor;
pub mod http;
pub mod output;
pub mod robots;
pub mod rules;
pub mod scoring;
pub mod url;

use thiserror::Error;

/// Main error type for Rankscope operations
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("Page fetch failed: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Crawl of {url} produced no pages")]
    EmptyCrawl { url: String },

    #[error("Cannot audit an empty page set")]
    NoPages,

    #[error("Duplicate rule id registered: {0}")]
    DuplicateRule(String),

    #[error("Category {category} rules weigh {actual} points, budget is {expected}")]
    CategoryBudget {
        category: rules::RuleCategory,
        expected: u32,
        actual: u32,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Rankscope operations
pub type Result<T> = std::result::Result<T, AuditError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use audit::{run_site_audit, AuditReport};
pub use config::Config;
pub use crawler::{CrawlResult, Crawler, HttpFetcher, PageFetcher, ResourceInfo, ResourceKind};
pub use rules::{AuditRuleContext, Issue, Rule, RuleCategory, RuleCheckResult, RuleEngine, Severity};
pub use scoring::{CategoryWeights, ScoreAggregator, ScoreSummary};
pub use url::{classify_link, extract_domain, normalize_url, LinkScope};
