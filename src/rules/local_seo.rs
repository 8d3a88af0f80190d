//! Local SEO rules: business identity consistency across the crawl

use super::structured_data::{entities, entity_types, LOCAL_BUSINESS_TYPES};
use super::{
    scaled, AuditRuleContext, Issue, Rule, RuleCategory, RuleCheckResult, RuleError, RuleInfo,
};
use crate::extractor::PageFacts;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Shorter digit strings are extensions or fragments, not phone numbers
const MIN_PHONE_DIGITS: usize = 7;

pub(super) fn rules() -> Vec<Arc<dyn Rule>> {
    vec![Arc::new(NapConsistencyRule), Arc::new(AddressMarkupRule)]
}

/// Comparison key for a phone number: its last ten digits
///
/// `+1 (555) 010-0199` and `555.010.0199` share a key.
fn phone_key(raw: &str) -> Option<String> {
    let digits: Vec<char> = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < MIN_PHONE_DIGITS {
        return None;
    }
    let start = digits.len().saturating_sub(10);
    Some(digits[start..].iter().collect())
}

/// Collects every `telephone` string anywhere inside a JSON-LD value
fn json_ld_telephones<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| json_ld_telephones(item, out)),
        Value::Object(map) => {
            for (key, inner) in map {
                match (key.as_str(), inner) {
                    ("telephone", Value::String(phone)) => out.push(phone),
                    _ => json_ld_telephones(inner, out),
                }
            }
        }
        _ => {}
    }
}

pub struct NapConsistencyRule;

const NAP_CONSISTENCY: RuleInfo = RuleInfo {
    id: "nap-consistency",
    category: RuleCategory::LocalSeo,
    name: "NAP consistency",
    description: "The same phone number is published on every crawled page",
    weight: 3,
};

#[async_trait]
impl Rule for NapConsistencyRule {
    fn info(&self) -> &RuleInfo {
        &NAP_CONSISTENCY
    }

    async fn check(&self, context: &AuditRuleContext<'_>) -> Result<RuleCheckResult, RuleError> {
        let mut raw_numbers: Vec<String> = context.facts.phone_links.clone();
        for page in context.all_pages.iter().skip(1) {
            raw_numbers.extend(PageFacts::from_html(&page.html).phone_links);
        }
        for page in context.all_pages {
            let mut phones = Vec::new();
            page.json_ld_data
                .iter()
                .for_each(|block| json_ld_telephones(block, &mut phones));
            raw_numbers.extend(phones.into_iter().map(str::to_string));
        }

        let distinct: BTreeSet<String> = raw_numbers.iter().filter_map(|n| phone_key(n)).collect();

        match distinct.len() {
            0 => Ok(RuleCheckResult::fail(
                0,
                Issue::warning(
                    self.id(),
                    "No phone number found on the crawled pages",
                    "Publish a clickable phone number, e.g. <a href=\"tel:+15550100199\">(555) 010-0199</a>, and repeat it as \"telephone\" in your LocalBusiness JSON-LD.",
                ),
            )),
            1 => Ok(RuleCheckResult::pass(self.weight())),
            n => Ok(RuleCheckResult::fail(
                scaled(self.weight(), 0.5),
                Issue::warning(
                    self.id(),
                    format!("Found {} different phone numbers across the site", n),
                    "Use one primary phone number everywhere so search engines can match your business listing.",
                )
                .with_metadata(json!({ "phone_numbers": raw_numbers })),
            )),
        }
    }
}

pub struct AddressMarkupRule;

const ADDRESS_MARKUP: RuleInfo = RuleInfo {
    id: "address-markup",
    category: RuleCategory::LocalSeo,
    name: "Address markup",
    description: "A postal address is marked up with <address> or schema.org",
    weight: 2,
};

#[async_trait]
impl Rule for AddressMarkupRule {
    fn info(&self) -> &RuleInfo {
        &ADDRESS_MARKUP
    }

    async fn check(&self, context: &AuditRuleContext<'_>) -> Result<RuleCheckResult, RuleError> {
        let mut is_local_business = false;
        let mut has_schema_address = false;
        for page in context.all_pages {
            for entity in entities(&page.json_ld_data) {
                let types = entity_types(entity);
                is_local_business |= types
                    .iter()
                    .any(|t| LOCAL_BUSINESS_TYPES.iter().any(|known| known == t));
                has_schema_address |=
                    types.contains(&"PostalAddress") || entity.get("address").is_some();
            }
        }

        let has_address_element = context.facts.has_address_element
            || context
                .all_pages
                .iter()
                .skip(1)
                .any(|page| PageFacts::from_html(&page.html).has_address_element);

        if has_schema_address || has_address_element {
            return Ok(RuleCheckResult::pass(self.weight()));
        }

        let recommendation = "Add a schema.org PostalAddress, e.g. \"address\": \
            {\"@type\": \"PostalAddress\", \"streetAddress\": \"1 Main St\", \
            \"addressLocality\": \"Springfield\"}, or wrap the address in an <address> element.";
        let issue = if is_local_business {
            Issue::critical(
                self.id(),
                "LocalBusiness markup declares no address",
                recommendation,
            )
        } else {
            Issue::warning(self.id(), "No marked-up postal address found", recommendation)
        };
        Ok(RuleCheckResult::fail(0, issue))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::{page, run, run_html};
    use crate::rules::Severity;

    #[test]
    fn test_phone_key() {
        assert_eq!(phone_key("+1 (555) 010-0199").as_deref(), Some("5550100199"));
        assert_eq!(phone_key("555.010.0199").as_deref(), Some("5550100199"));
        assert_eq!(phone_key("ext 12"), None);
    }

    #[test]
    fn test_json_ld_telephones_nested() {
        let value = json!({
            "@graph": [
                {"@type": "Organization", "contactPoint": {"telephone": "+1-555-010-0199"}},
                {"@type": "Store", "telephone": "555 010 0200"}
            ]
        });
        let mut phones = Vec::new();
        json_ld_telephones(&value, &mut phones);
        phones.sort();
        assert_eq!(phones, vec!["+1-555-010-0199", "555 010 0200"]);
    }

    #[tokio::test]
    async fn test_nap_missing_phone() {
        let result = run_html(&NapConsistencyRule, "<p>Call us</p>").await;
        assert_eq!(result.score, 0);
        assert_eq!(result.issues[0].severity, Severity::Warning);
    }

    #[tokio::test]
    async fn test_nap_consistent_across_pages_and_schema() {
        let mut home = page("https://example.com/", r#"<a href="tel:+1-555-010-0199">Call</a>"#);
        home.json_ld_data = vec![json!({"@type": "LocalBusiness", "telephone": "(555) 010-0199"})];
        let contact = page("https://example.com/contact", r#"<a href="TEL:5550100199">Call</a>"#);

        assert_eq!(run(&NapConsistencyRule, &[home, contact]).await, RuleCheckResult::pass(3));
    }

    #[tokio::test]
    async fn test_nap_conflicting_numbers() {
        let home = page("https://example.com/", r#"<a href="tel:5550100199">Call</a>"#);
        let contact = page("https://example.com/contact", r#"<a href="tel:5550100200">Call</a>"#);

        let result = run(&NapConsistencyRule, &[home, contact]).await;
        assert_eq!(result.score, 2);
        assert!(!result.passed);
    }

    #[tokio::test]
    async fn test_address_element_on_secondary_page() {
        let home = page("https://example.com/", "<p>Welcome</p>");
        let contact = page(
            "https://example.com/contact",
            "<address>1 Main St, Springfield</address>",
        );
        assert_eq!(run(&AddressMarkupRule, &[home, contact]).await, RuleCheckResult::pass(2));
    }

    #[tokio::test]
    async fn test_address_from_schema() {
        let mut home = page("https://example.com/", "<p>Welcome</p>");
        home.json_ld_data = vec![json!({
            "@context": "https://schema.org",
            "@type": "Dentist",
            "name": "Bright Smiles",
            "address": {"@type": "PostalAddress", "streetAddress": "1 Main St"}
        })];
        assert_eq!(run(&AddressMarkupRule, &[home]).await, RuleCheckResult::pass(2));
    }

    #[tokio::test]
    async fn test_local_business_without_address_is_critical() {
        let mut home = page("https://example.com/", "<p>Welcome</p>");
        home.json_ld_data = vec![json!({"@type": "Restaurant", "name": "Luigi's"})];

        let result = run(&AddressMarkupRule, &[home]).await;
        assert_eq!(result.score, 0);
        assert_eq!(result.issues[0].severity, Severity::Critical);

        let plain = run_html(&AddressMarkupRule, "<p>Welcome</p>").await;
        assert_eq!(plain.issues[0].severity, Severity::Warning);
    }
}
