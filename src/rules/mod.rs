//! Audit rule catalog
//!
//! A rule is an independent, stateless check over one audit run's crawl results.
//! Each belongs to a [`RuleCategory`] and contributes at most its weight in points
//! to that category's fixed budget.
//!
//! Rules follow one of three scoring shapes:
//! - **Binary gate**: full weight when a signal is present, 0 when absent, a graded
//!   partial score when present but malformed
//! - **Range/threshold**: discrete bands as a measurement departs from its ideal range
//! - **Coverage**: `round(weight × coverage)` over a population of elements

mod engine;
mod local_seo;
mod onpage;
mod performance;
mod structured_data;
mod technical;

pub use engine::{AuditResults, RuleEngine};

use crate::crawler::CrawlResult;
use crate::extractor::PageFacts;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// The five scoring categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RuleCategory {
    #[serde(rename = "technical")]
    Technical,
    #[serde(rename = "onpage")]
    OnPage,
    #[serde(rename = "structured-data")]
    StructuredData,
    #[serde(rename = "performance")]
    Performance,
    #[serde(rename = "local-seo")]
    LocalSeo,
}

impl RuleCategory {
    pub const ALL: [RuleCategory; 5] = [
        Self::Technical,
        Self::OnPage,
        Self::StructuredData,
        Self::Performance,
        Self::LocalSeo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Technical => "technical",
            Self::OnPage => "onpage",
            Self::StructuredData => "structured-data",
            Self::Performance => "performance",
            Self::LocalSeo => "local-seo",
        }
    }

    /// Fixed point budget; the five budgets sum to 100
    pub fn budget(&self) -> u32 {
        match self {
            Self::Technical => 35,
            Self::OnPage => 25,
            Self::StructuredData => 20,
            Self::Performance => 15,
            Self::LocalSeo => 5,
        }
    }
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How strongly an issue affects search outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Critical => "critical",
            Self::Warning => "warning",
            Self::Info => "info",
        };
        f.write_str(name)
    }
}

/// A finding emitted by a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Assigned by whatever stores the page; always `None` here
    pub page_id: Option<i64>,
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    pub recommendation: String,
    /// Measurements backing the message
    pub metadata: Value,
}

impl Issue {
    pub fn new(
        rule_id: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        Self {
            page_id: None,
            rule_id: rule_id.into(),
            severity,
            message: message.into(),
            recommendation: recommendation.into(),
            metadata: json!({}),
        }
    }

    pub fn critical(
        rule_id: impl Into<String>,
        message: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        Self::new(rule_id, Severity::Critical, message, recommendation)
    }

    pub fn warning(
        rule_id: impl Into<String>,
        message: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        Self::new(rule_id, Severity::Warning, message, recommendation)
    }

    pub fn info(
        rule_id: impl Into<String>,
        message: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        Self::new(rule_id, Severity::Info, message, recommendation)
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Outcome of one rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCheckResult {
    pub passed: bool,
    /// Points awarded, `0..=weight`
    pub score: u32,
    pub issues: Vec<Issue>,
}

impl RuleCheckResult {
    /// Full weight, no issues
    pub fn pass(weight: u32) -> Self {
        Self {
            passed: true,
            score: weight,
            issues: Vec::new(),
        }
    }

    pub fn new(passed: bool, score: u32, issues: Vec<Issue>) -> Self {
        Self {
            passed,
            score,
            issues,
        }
    }

    /// A failed result carrying a single issue
    pub fn fail(score: u32, issue: Issue) -> Self {
        Self::new(false, score, vec![issue])
    }

    pub fn with_issue(mut self, issue: Issue) -> Self {
        self.issues.push(issue);
        self
    }
}

/// Shared, read-only input to every rule of one audit run
#[derive(Debug)]
pub struct AuditRuleContext<'a> {
    /// The first crawled page
    pub page: &'a CrawlResult,
    pub all_pages: &'a [CrawlResult],
    pub project_domain: &'a str,
    /// Markup facts of `page`, parsed once
    pub facts: PageFacts,
}

impl<'a> AuditRuleContext<'a> {
    /// Builds the context; `None` when there are no pages
    pub fn new(all_pages: &'a [CrawlResult], project_domain: &'a str) -> Option<Self> {
        let page = all_pages.first()?;
        Some(Self {
            page,
            all_pages,
            project_domain,
            facts: PageFacts::from_html(&page.html),
        })
    }
}

/// A rule that could not produce a result
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid page data: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Failed(String),
}

/// Static description of a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleInfo {
    pub id: &'static str,
    pub category: RuleCategory,
    pub name: &'static str,
    pub description: &'static str,
    pub weight: u32,
}

/// A single audit check
#[async_trait]
pub trait Rule: Send + Sync {
    fn info(&self) -> &RuleInfo;

    /// Evaluates the rule; must return a score within `0..=weight`
    async fn check(&self, context: &AuditRuleContext<'_>) -> Result<RuleCheckResult, RuleError>;

    fn id(&self) -> &'static str {
        self.info().id
    }

    fn category(&self) -> RuleCategory {
        self.info().category
    }

    fn name(&self) -> &'static str {
        self.info().name
    }

    fn description(&self) -> &'static str {
        self.info().description
    }

    fn weight(&self) -> u32 {
        self.info().weight
    }
}

/// `round(weight × fraction)` with the fraction clamped to `[0, 1]`
pub(crate) fn scaled(weight: u32, fraction: f64) -> u32 {
    (f64::from(weight) * fraction.clamp(0.0, 1.0)).round() as u32
}

/// Percentage of `covered` in `total`, rounded; an empty population is 100%
pub(crate) fn coverage_percent(covered: usize, total: usize) -> u32 {
    if total == 0 {
        return 100;
    }
    ((covered as f64 / total as f64) * 100.0).round() as u32
}

/// `round(weight × coveragePercent / 100)`
pub(crate) fn coverage_score(weight: u32, covered: usize, total: usize) -> u32 {
    scaled(weight, f64::from(coverage_percent(covered, total)) / 100.0)
}

/// Builds the full catalog in report order
///
/// `client` is used by rules that make their own requests (robots.txt, sitemap).
pub fn default_catalog(client: Client) -> Vec<Arc<dyn Rule>> {
    let mut rules = technical::rules(client);
    rules.extend(onpage::rules());
    rules.extend(structured_data::rules());
    rules.extend(performance::rules());
    rules.extend(local_seo::rules());
    rules
}
