//! Structured-data rules over the primary page's JSON-LD

use super::{
    scaled, AuditRuleContext, Issue, Rule, RuleCategory, RuleCheckResult, RuleError, RuleInfo,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

pub(super) fn rules() -> Vec<Arc<dyn Rule>> {
    vec![
        Arc::new(JsonLdRule),
        Arc::new(SchemaShapeRule {
            info: RuleInfo {
                id: "organization-schema",
                category: RuleCategory::StructuredData,
                name: "Organization schema",
                description: "Organization markup, when present, is complete",
                weight: 3,
            },
            label: "Organization",
            types: &["Organization", "Corporation", "NGO", "EducationalOrganization"],
            required: &["name", "url"],
            recommended: &["logo", "sameAs", "contactPoint", "description"],
        }),
        Arc::new(SchemaShapeRule {
            info: RuleInfo {
                id: "product-schema",
                category: RuleCategory::StructuredData,
                name: "Product schema",
                description: "Product markup, when present, is complete",
                weight: 3,
            },
            label: "Product",
            types: &["Product"],
            required: &["name"],
            recommended: &["image", "description", "offers", "brand", "sku", "aggregateRating"],
        }),
        Arc::new(SchemaShapeRule {
            info: RuleInfo {
                id: "article-schema",
                category: RuleCategory::StructuredData,
                name: "Article schema",
                description: "Article markup, when present, is complete",
                weight: 3,
            },
            label: "Article",
            types: &["Article", "NewsArticle", "BlogPosting", "TechArticle"],
            required: &["headline"],
            recommended: &["author", "datePublished", "dateModified", "image", "publisher"],
        }),
        Arc::new(SchemaShapeRule {
            info: RuleInfo {
                id: "local-business-schema",
                category: RuleCategory::StructuredData,
                name: "LocalBusiness schema",
                description: "LocalBusiness markup, when present, is complete",
                weight: 3,
            },
            label: "LocalBusiness",
            types: LOCAL_BUSINESS_TYPES,
            required: &["name", "address"],
            recommended: &[
                "telephone",
                "openingHours|openingHoursSpecification",
                "geo",
                "url",
                "priceRange",
                "image",
            ],
        }),
    ]
}

/// `LocalBusiness` and its common subtypes
pub(crate) const LOCAL_BUSINESS_TYPES: &[&str] = &[
    "LocalBusiness",
    "AutoRepair",
    "Dentist",
    "FinancialService",
    "FoodEstablishment",
    "HealthAndBeautyBusiness",
    "HomeAndConstructionBusiness",
    "LegalService",
    "LodgingBusiness",
    "MedicalBusiness",
    "ProfessionalService",
    "RealEstateAgent",
    "Restaurant",
    "Store",
];

/// Flattens JSON-LD blocks into typed entities
///
/// Top-level arrays and `@graph` members are expanded; only objects carrying an
/// `@type` are returned.
pub(crate) fn entities(blocks: &[Value]) -> Vec<&Value> {
    fn walk<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
        match value {
            Value::Array(items) => items.iter().for_each(|item| walk(item, out)),
            Value::Object(map) => {
                if map.contains_key("@type") {
                    out.push(value);
                }
                if let Some(graph) = map.get("@graph") {
                    walk(graph, out);
                }
            }
            _ => {}
        }
    }

    let mut out = Vec::new();
    for block in blocks {
        walk(block, &mut out);
    }
    out
}

/// The entity's `@type` values with any schema.org prefix removed
pub(crate) fn entity_types(entity: &Value) -> Vec<&str> {
    fn strip(t: &str) -> &str {
        t.rsplit_once('/').map_or(t, |(_, name)| name)
    }
    match entity.get("@type") {
        Some(Value::String(t)) => vec![strip(t)],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(strip).collect(),
        _ => Vec::new(),
    }
}

/// True when `property` (or any `a|b` alternative) holds a non-empty value
fn has_property(entity: &Value, property: &str) -> bool {
    property.split('|').any(|name| match entity.get(name) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        Some(_) => true,
    })
}

fn declares_schema_org(block: &Value) -> bool {
    match block {
        Value::Array(items) => items.iter().any(declares_schema_org),
        Value::Object(map) => map
            .get("@context")
            .map_or(false, |context| context.to_string().contains("schema.org")),
        _ => false,
    }
}

pub struct JsonLdRule;

const JSON_LD: RuleInfo = RuleInfo {
    id: "json-ld",
    category: RuleCategory::StructuredData,
    name: "JSON-LD structured data",
    description: "The page embeds schema.org JSON-LD",
    weight: 8,
};

#[async_trait]
impl Rule for JsonLdRule {
    fn info(&self) -> &RuleInfo {
        &JSON_LD
    }

    async fn check(&self, context: &AuditRuleContext<'_>) -> Result<RuleCheckResult, RuleError> {
        let blocks = &context.page.json_ld_data;
        if blocks.is_empty() {
            return Ok(RuleCheckResult::fail(
                0,
                Issue::warning(
                    self.id(),
                    "No JSON-LD structured data found",
                    "Describe the page with schema.org JSON-LD, e.g. `<script type=\"application/ld+json\">{\"@context\":\"https://schema.org\",\"@type\":\"Organization\",\"name\":\"...\",\"url\":\"...\"}</script>`.",
                ),
            ));
        }

        let types: Vec<&str> = entities(blocks)
            .into_iter()
            .flat_map(entity_types)
            .collect();

        if !blocks.iter().any(declares_schema_org) {
            return Ok(RuleCheckResult::fail(
                scaled(self.weight(), 0.7),
                Issue::warning(
                    self.id(),
                    "JSON-LD blocks do not declare the schema.org vocabulary",
                    "Add `\"@context\": \"https://schema.org\"` to each block.",
                )
                .with_metadata(json!({ "blocks": blocks.len(), "types": types })),
            ));
        }

        Ok(RuleCheckResult::pass(self.weight()))
    }
}

/// Checks one schema.org type for required and recommended properties
///
/// Absent types are optional and score full weight.
pub struct SchemaShapeRule {
    info: RuleInfo,
    label: &'static str,
    types: &'static [&'static str],
    required: &'static [&'static str],
    recommended: &'static [&'static str],
}

struct ShapeFinding {
    missing_required: Vec<&'static str>,
    missing_recommended: Vec<&'static str>,
}

impl SchemaShapeRule {
    fn inspect(&self, entity: &Value) -> ShapeFinding {
        let missing = |props: &'static [&'static str]| -> Vec<&'static str> {
            props.iter().copied().filter(|p| !has_property(entity, p)).collect()
        };
        ShapeFinding {
            missing_required: missing(self.required),
            missing_recommended: missing(self.recommended),
        }
    }
}

#[async_trait]
impl Rule for SchemaShapeRule {
    fn info(&self) -> &RuleInfo {
        &self.info
    }

    async fn check(&self, context: &AuditRuleContext<'_>) -> Result<RuleCheckResult, RuleError> {
        let best = entities(&context.page.json_ld_data)
            .into_iter()
            .filter(|entity| {
                entity_types(entity)
                    .iter()
                    .any(|t| self.types.iter().any(|known| known == t))
            })
            .map(|entity| self.inspect(entity))
            .min_by_key(|f| (f.missing_required.len(), f.missing_recommended.len()));

        let Some(finding) = best else {
            return Ok(RuleCheckResult::pass(self.weight()));
        };

        if !finding.missing_required.is_empty() {
            return Ok(RuleCheckResult::fail(
                0,
                Issue::critical(
                    self.id(),
                    format!(
                        "{} schema is missing required properties: {}",
                        self.label,
                        finding.missing_required.join(", ")
                    ),
                    format!(
                        "Add {} to the {} JSON-LD; search engines ignore incomplete entities.",
                        finding
                            .missing_required
                            .iter()
                            .map(|p| format!("`\"{}\"`", p))
                            .collect::<Vec<_>>()
                            .join(", "),
                        self.label
                    ),
                )
                .with_metadata(json!({ "missing_required": finding.missing_required })),
            ));
        }

        let total = self.recommended.len();
        let present = total - finding.missing_recommended.len();
        let coverage = if total == 0 {
            1.0
        } else {
            present as f64 / total as f64
        };
        let score = scaled(self.weight(), 0.6 + 0.4 * coverage);

        let mut result = RuleCheckResult::new(true, score, Vec::new());
        if !finding.missing_recommended.is_empty() {
            result = result.with_issue(
                Issue::info(
                    self.id(),
                    format!(
                        "{} schema lacks recommended properties: {}",
                        self.label,
                        finding.missing_recommended.join(", ")
                    ),
                    format!(
                        "Add the missing properties to qualify for {} rich results.",
                        self.label
                    ),
                )
                .with_metadata(json!({
                    "missing_recommended": finding.missing_recommended,
                    "coverage": (coverage * 100.0).round(),
                })),
            );
        }
        Ok(result)
    }
}
