//! One complete site audit: crawl, evaluate, score

use crate::crawler::{CrawlResult, Crawler, PageFetcher};
use crate::rules::{AuditResults, Issue, RuleEngine, Severity};
use crate::scoring::{CategoryWeights, ScoreAggregator, ScoreSummary};
use crate::url::{extract_domain, normalize_url};
use crate::{AuditError, UrlError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What the report keeps of each crawled page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummary {
    pub url: String,
    pub final_url: String,
    pub status_code: u16,
    pub load_time: u64,
    pub page_size: u64,
    pub resource_count: usize,
    pub internal_links: usize,
    pub external_links: usize,
    pub json_ld_blocks: usize,
}

impl From<&CrawlResult> for PageSummary {
    fn from(page: &CrawlResult) -> Self {
        Self {
            url: page.url.clone(),
            final_url: page.final_url.clone(),
            status_code: page.status_code,
            load_time: page.load_time,
            page_size: page.page_size,
            resource_count: page.resources.len(),
            internal_links: page.internal_links.len(),
            external_links: page.external_links.len(),
            json_ld_blocks: page.json_ld_data.len(),
        }
    }
}

/// Result of [`run_site_audit`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub url: String,
    pub domain: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub pages: Vec<PageSummary>,
    pub scores: ScoreSummary,
    pub results: AuditResults,
}

impl AuditReport {
    /// All issues, most severe first, then by rule id
    pub fn issues(&self) -> Vec<&Issue> {
        let mut issues: Vec<&Issue> = self
            .results
            .values()
            .flat_map(|result| result.issues.iter())
            .collect();
        issues.sort_by(|a, b| a.severity.cmp(&b.severity).then_with(|| a.rule_id.cmp(&b.rule_id)));
        issues
    }

    pub fn issue_counts(&self) -> BTreeMap<Severity, usize> {
        let mut counts = BTreeMap::new();
        for issue in self.results.values().flat_map(|result| &result.issues) {
            *counts.entry(issue.severity).or_insert(0) += 1;
        }
        counts
    }

    /// Number of rules that passed
    pub fn passed_rules(&self) -> usize {
        self.results.values().filter(|result| result.passed).count()
    }

    pub fn duration(&self) -> chrono::Duration {
        self.completed_at - self.started_at
    }
}

/// Audits a site end to end
///
/// # Steps
///
/// 1. Initialize the crawler's fetcher
/// 2. Crawl up to `max_pages` pages breadth-first from `url`
/// 3. Close the fetcher, whether or not the crawl succeeded
/// 4. Run every rule of `engine` against the crawled pages
/// 5. Aggregate category and overall scores with the fixed budgets
///
/// # Returns
///
/// * `Ok(AuditReport)` - The audit completed
/// * `Err(AuditError::EmptyCrawl)` - Not even the start page could be fetched
/// * `Err(AuditError)` - Bad start URL or the fetcher failed to start
pub async fn run_site_audit<F: PageFetcher>(
    crawler: &mut Crawler<F>,
    engine: &RuleEngine,
    url: &str,
    max_pages: usize,
) -> crate::Result<AuditReport> {
    let started_at = Utc::now();
    let start = normalize_url(url)?;
    let domain = extract_domain(&start).ok_or(UrlError::MissingDomain)?;

    tracing::info!("Starting audit of {}", start);
    crawler.initialize().await?;

    let crawl = crawler.crawl_website(start.as_str(), max_pages).await;
    if let Err(e) = crawler.close().await {
        tracing::warn!("Failed to release fetcher: {}", e);
    }

    let pages = crawl?;
    if pages.is_empty() {
        return Err(AuditError::EmptyCrawl {
            url: start.to_string(),
        });
    }

    let results = engine.run_audit(&pages, &domain).await?;
    let scores = ScoreAggregator::compute_scores(
        &results,
        &engine.rule_categories(),
        &CategoryWeights::default(),
    );

    tracing::info!(
        "Audit of {} complete: overall score {} over {} pages",
        start,
        scores.overall,
        pages.len()
    );

    Ok(AuditReport {
        url: start.to_string(),
        domain,
        started_at,
        completed_at: Utc::now(),
        pages: pages.iter().map(PageSummary::from).collect(),
        scores,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::{CrawlSettings, FetchError, FetchOptions, FetchedPage};
    use crate::rules::{
        AuditRuleContext, Rule, RuleCategory, RuleCheckResult, RuleError, RuleInfo,
    };
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use url::Url;

    /// Serves one page at the site root and counts lifecycle calls
    struct RootOnly {
        html: Option<&'static str>,
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PageFetcher for RootOnly {
        fn name(&self) -> &'static str {
            "root-only"
        }

        async fn fetch(&self, url: &Url, _: &FetchOptions) -> Result<FetchedPage, FetchError> {
            match (url.path(), self.html) {
                ("/", Some(html)) => Ok(FetchedPage {
                    final_url: url.clone(),
                    status_code: 200,
                    headers: BTreeMap::new(),
                    html: html.to_string(),
                    load_time: 40,
                    resources: Vec::new(),
                    console_errors: Vec::new(),
                    screenshot: None,
                }),
                _ => Err(FetchError::Network {
                    url: url.to_string(),
                    message: "Connection refused".to_string(),
                }),
            }
        }

        async fn close(&mut self) -> Result<(), FetchError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct HasTitle;

    const HAS_TITLE: RuleInfo = RuleInfo {
        id: "has-title",
        category: RuleCategory::OnPage,
        name: "Has title",
        description: "The page has a title",
        weight: 25,
    };

    #[async_trait]
    impl Rule for HasTitle {
        fn info(&self) -> &RuleInfo {
            &HAS_TITLE
        }

        async fn check(
            &self,
            context: &AuditRuleContext<'_>,
        ) -> Result<RuleCheckResult, RuleError> {
            match context.facts.title {
                Some(_) => Ok(RuleCheckResult::pass(self.weight())),
                None => Ok(RuleCheckResult::fail(
                    0,
                    Issue::critical(self.id(), "No title", "Add a <title>"),
                )),
            }
        }
    }

    fn crawler(html: Option<&'static str>) -> (Crawler<RootOnly>, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let fetcher = RootOnly {
            html,
            closes: Arc::clone(&closes),
        };
        let settings = CrawlSettings {
            navigation_timeout: Duration::from_secs(1),
            fetch_grace: Duration::from_secs(1),
            max_links_per_page: 50,
            politeness_delay: Duration::ZERO,
        };
        (Crawler::new(fetcher, settings), closes)
    }

    fn engine() -> RuleEngine {
        RuleEngine::new(vec![Arc::new(HasTitle)]).unwrap()
    }

    #[tokio::test]
    async fn test_audit_scores_and_closes() {
        let (mut crawler, closes) = crawler(Some("<title>Home</title><a href=\"/gone\">x</a>"));
        let report = run_site_audit(&mut crawler, &engine(), "https://Example.com", 5)
            .await
            .unwrap();

        assert_eq!(report.url, "https://example.com/");
        assert_eq!(report.domain, "example.com");
        assert_eq!(report.pages.len(), 1);
        assert_eq!(report.pages[0].internal_links, 1);
        assert_eq!(report.scores.per_category[&RuleCategory::OnPage], 100);
        assert_eq!(report.scores.overall, 25);
        assert_eq!(report.passed_rules(), 1);
        assert!(report.completed_at >= report.started_at);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_crawl_is_fatal_and_still_closes() {
        let (mut crawler, closes) = crawler(None);
        let result = run_site_audit(&mut crawler, &engine(), "https://example.com/", 5).await;

        assert!(matches!(result, Err(AuditError::EmptyCrawl { .. })));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_start_url() {
        let (mut crawler, closes) = crawler(None);
        let result = run_site_audit(&mut crawler, &engine(), "ftp://example.com/", 5).await;

        assert!(matches!(result, Err(AuditError::UrlError(_))));
        assert_eq!(closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_issue_ordering() {
        let (mut crawler, _) = crawler(Some("<p>untitled</p>"));
        let report = run_site_audit(&mut crawler, &engine(), "https://example.com/", 1)
            .await
            .unwrap();

        let issues = report.issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].rule_id, "has-title");
        assert_eq!(report.issue_counts()[&Severity::Critical], 1);
        assert_eq!(report.scores.overall, 0);
    }
}
