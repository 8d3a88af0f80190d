//! Rule registry and isolated execution

use super::{default_catalog, AuditRuleContext, Issue, Rule, RuleCategory, RuleCheckResult};
use crate::crawler::CrawlResult;
use crate::scoring::CategoryWeights;
use crate::AuditError;
use futures::future::join_all;
use futures::FutureExt;
use reqwest::Client;
use serde_json::json;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-rule outcomes keyed by rule id
pub type AuditResults = BTreeMap<String, RuleCheckResult>;

/// Holds the rule catalog and runs it against crawl results
///
/// The catalog is read-only after construction, so one engine can serve many
/// concurrent audits.
pub struct RuleEngine {
    rules: Vec<Arc<dyn Rule>>,
    index: HashMap<&'static str, usize>,
}

impl RuleEngine {
    /// Registers `rules` in order, rejecting duplicate ids
    pub fn new(rules: Vec<Arc<dyn Rule>>) -> crate::Result<Self> {
        let mut index = HashMap::with_capacity(rules.len());
        for (position, rule) in rules.iter().enumerate() {
            if index.insert(rule.id(), position).is_some() {
                return Err(AuditError::DuplicateRule(rule.id().to_string()));
            }
        }
        debug!("Registered {} audit rules", rules.len());
        Ok(Self { rules, index })
    }

    /// Engine over the full 28-rule catalog
    pub fn with_default_catalog(client: Client) -> crate::Result<Self> {
        Self::new(default_catalog(client))
    }

    pub fn get_rule(&self, id: &str) -> Option<&Arc<dyn Rule>> {
        self.index.get(id).map(|&position| &self.rules[position])
    }

    pub fn get_all_rules(&self) -> &[Arc<dyn Rule>] {
        &self.rules
    }

    pub fn get_rules_by_category(&self, category: RuleCategory) -> Vec<&Arc<dyn Rule>> {
        self.rules
            .iter()
            .filter(|rule| rule.category() == category)
            .collect()
    }

    /// The `rule id → category` lookup used by score aggregation
    pub fn rule_categories(&self) -> HashMap<String, RuleCategory> {
        self.rules
            .iter()
            .map(|rule| (rule.id().to_string(), rule.category()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Checks that each category's rule weights add up to its budget
    pub fn verify_budgets(&self, weights: &CategoryWeights) -> crate::Result<()> {
        for (category, expected) in weights.iter() {
            let actual: u32 = self
                .get_rules_by_category(category)
                .iter()
                .map(|rule| rule.weight())
                .sum();
            if actual != expected {
                return Err(AuditError::CategoryBudget {
                    category,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Runs every rule against `pages`
    ///
    /// A rule that errors or panics is recorded as a failed result with score 0 and
    /// one critical issue; the remaining rules are unaffected. Fails only when
    /// `pages` is empty.
    pub async fn run_audit(
        &self,
        pages: &[CrawlResult],
        project_domain: &str,
    ) -> crate::Result<AuditResults> {
        let context = AuditRuleContext::new(pages, project_domain).ok_or(AuditError::NoPages)?;
        info!("Running {} rules over {} pages", self.rules.len(), pages.len());

        let outcomes = join_all(self.rules.iter().map(|rule| {
            let context = &context;
            async move {
                let outcome = AssertUnwindSafe(rule.check(context)).catch_unwind().await;
                (rule, outcome)
            }
        }))
        .await;

        let mut results = AuditResults::new();
        for (rule, outcome) in outcomes {
            let result = match outcome {
                Ok(Ok(mut result)) => {
                    if result.score > rule.weight() {
                        warn!(
                            "Rule {} scored {} over its weight {}; clamping",
                            rule.id(),
                            result.score,
                            rule.weight()
                        );
                        result.score = rule.weight();
                    }
                    result
                }
                Ok(Err(e)) => {
                    warn!("Rule {} failed: {}", rule.id(), e);
                    failed_result(rule.as_ref(), &e.to_string())
                }
                Err(panic) => {
                    let reason = panic_message(panic.as_ref());
                    warn!("Rule {} panicked: {}", rule.id(), reason);
                    failed_result(rule.as_ref(), &reason)
                }
            };
            debug!("Rule {}: {}/{}", rule.id(), result.score, rule.weight());
            results.insert(rule.id().to_string(), result);
        }

        Ok(results)
    }
}

fn failed_result(rule: &dyn Rule, reason: &str) -> RuleCheckResult {
    RuleCheckResult::fail(
        0,
        Issue::critical(
            rule.id(),
            format!("Rule execution failed: {}", reason),
            "Re-run the audit; if the failure persists, check that the page is reachable and well-formed.",
        )
        .with_metadata(json!({ "error": reason })),
    )
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "rule panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::page;
    use crate::rules::{RuleError, RuleInfo, Severity};
    use async_trait::async_trait;

    struct FixedRule(RuleInfo, u32);

    #[async_trait]
    impl Rule for FixedRule {
        fn info(&self) -> &RuleInfo {
            &self.0
        }

        async fn check(&self, _: &AuditRuleContext<'_>) -> Result<RuleCheckResult, RuleError> {
            Ok(RuleCheckResult::new(true, self.1, Vec::new()))
        }
    }

    struct FailingRule(RuleInfo);

    #[async_trait]
    impl Rule for FailingRule {
        fn info(&self) -> &RuleInfo {
            &self.0
        }

        async fn check(&self, _: &AuditRuleContext<'_>) -> Result<RuleCheckResult, RuleError> {
            Err(RuleError::Failed("boom".to_string()))
        }
    }

    struct PanickingRule(RuleInfo);

    #[async_trait]
    impl Rule for PanickingRule {
        fn info(&self) -> &RuleInfo {
            &self.0
        }

        async fn check(
            &self,
            context: &AuditRuleContext<'_>,
        ) -> Result<RuleCheckResult, RuleError> {
            if !context.all_pages.is_empty() {
                panic!("unexpected markup");
            }
            Ok(RuleCheckResult::pass(self.weight()))
        }
    }

    fn info(id: &'static str, weight: u32) -> RuleInfo {
        RuleInfo {
            id,
            category: RuleCategory::Technical,
            name: id,
            description: id,
            weight,
        }
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let rules: Vec<Arc<dyn Rule>> = vec![
            Arc::new(FixedRule(info("a", 5), 5)),
            Arc::new(FixedRule(info("a", 3), 3)),
        ];
        assert!(matches!(
            RuleEngine::new(rules),
            Err(AuditError::DuplicateRule(id)) if id == "a"
        ));
    }

    #[test]
    fn test_default_catalog_lookup_and_budgets() {
        let engine = RuleEngine::with_default_catalog(Client::new()).unwrap();
        assert_eq!(engine.len(), 28);
        assert_eq!(engine.get_rule("load-time").unwrap().weight(), 5);
        assert!(engine.get_rule("nope").is_none());
        assert_eq!(engine.get_rules_by_category(RuleCategory::LocalSeo).len(), 2);
        assert_eq!(
            engine.rule_categories().get("json-ld"),
            Some(&RuleCategory::StructuredData)
        );
        assert!(engine.verify_budgets(&CategoryWeights::default()).is_ok());
    }

    #[test]
    fn test_verify_budgets_reports_mismatch() {
        let engine = RuleEngine::new(vec![Arc::new(FixedRule(info("a", 5), 5))]).unwrap();
        let err = engine.verify_budgets(&CategoryWeights::default()).unwrap_err();
        assert!(matches!(
            err,
            AuditError::CategoryBudget {
                category: RuleCategory::Technical,
                expected: 35,
                actual: 5
            }
        ));
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let engine = RuleEngine::new(vec![
            Arc::new(FixedRule(info("ok", 4), 4)),
            Arc::new(FailingRule(info("fails", 3))),
            Arc::new(PanickingRule(info("panics", 2))),
        ])
        .unwrap();

        let pages = vec![page("https://example.com/", "<html></html>")];
        let results = engine.run_audit(&pages, "example.com").await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results["ok"].score, 4);

        let failed = &results["fails"];
        assert!(!failed.passed);
        assert_eq!(failed.score, 0);
        assert_eq!(failed.issues[0].severity, Severity::Critical);
        assert_eq!(failed.issues[0].message, "Rule execution failed: boom");

        let panicked = &results["panics"];
        assert_eq!(panicked.score, 0);
        assert_eq!(
            panicked.issues[0].message,
            "Rule execution failed: unexpected markup"
        );
    }

    #[tokio::test]
    async fn test_scores_clamped_to_weight() {
        let engine = RuleEngine::new(vec![Arc::new(FixedRule(info("greedy", 2), 9))]).unwrap();
        let pages = vec![page("https://example.com/", "")];
        let results = engine.run_audit(&pages, "example.com").await.unwrap();
        assert_eq!(results["greedy"].score, 2);
    }

    #[tokio::test]
    async fn test_empty_page_set() {
        let engine = RuleEngine::with_default_catalog(Client::new()).unwrap();
        assert!(matches!(
            engine.run_audit(&[], "example.com").await,
            Err(AuditError::NoPages)
        ));
    }
}
