//! On-page content rules

use super::{
    coverage_percent, coverage_score, scaled, AuditRuleContext, Issue, Rule, RuleCategory,
    RuleCheckResult, RuleError, RuleInfo,
};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

const TITLE_MIN: usize = 30;
const TITLE_MAX: usize = 60;
const DESCRIPTION_MIN: usize = 120;
const DESCRIPTION_MAX: usize = 160;
const THIN_CONTENT_WORDS: usize = 300;
const RICH_CONTENT_WORDS: usize = 500;

const OPEN_GRAPH_TAGS: &[&str] = &["og:title", "og:description", "og:image", "og:url"];
const TWITTER_TAGS: &[&str] = &[
    "twitter:card",
    "twitter:title",
    "twitter:description",
    "twitter:image",
];

pub(super) fn rules() -> Vec<Arc<dyn Rule>> {
    vec![
        Arc::new(TitleTagRule),
        Arc::new(MetaDescriptionRule),
        Arc::new(H1TagRule),
        Arc::new(HeadingHierarchyRule),
        Arc::new(ImageAltRule),
        Arc::new(WordCountRule),
        Arc::new(SocialTagsRule),
    ]
}

pub struct TitleTagRule;

const TITLE_TAG: RuleInfo = RuleInfo {
    id: "title-tag",
    category: RuleCategory::OnPage,
    name: "Title tag",
    description: "The page has a <title> of 30 to 60 characters",
    weight: 5,
};

#[async_trait]
impl Rule for TitleTagRule {
    fn info(&self) -> &RuleInfo {
        &TITLE_TAG
    }

    async fn check(&self, context: &AuditRuleContext<'_>) -> Result<RuleCheckResult, RuleError> {
        let id = self.id();
        let Some(title) = context.facts.title.as_deref() else {
            return Ok(RuleCheckResult::fail(
                0,
                Issue::critical(
                    id,
                    "Page has no <title>",
                    "Add a unique, descriptive title of 30-60 characters, e.g. `<title>Handmade Oak Tables | Brand</title>`.",
                ),
            ));
        };

        let length = title.chars().count();
        let metadata = json!({ "title": title, "length": length });

        if length < TITLE_MIN {
            return Ok(RuleCheckResult::fail(
                scaled(self.weight(), 0.5),
                Issue::warning(
                    id,
                    format!("Title is too short ({} characters)", length),
                    format!(
                        "Expand the title to {}-{} characters with the page's main keyword.",
                        TITLE_MIN, TITLE_MAX
                    ),
                )
                .with_metadata(metadata),
            ));
        }

        if length > TITLE_MAX {
            return Ok(RuleCheckResult::fail(
                scaled(self.weight(), 0.7),
                Issue::warning(
                    id,
                    format!("Title is too long ({} characters) and will be truncated", length),
                    format!(
                        "Shorten the title to at most {} characters, keywords first.",
                        TITLE_MAX
                    ),
                )
                .with_metadata(metadata),
            ));
        }

        Ok(RuleCheckResult::pass(self.weight()))
    }
}

pub struct MetaDescriptionRule;

const META_DESCRIPTION: RuleInfo = RuleInfo {
    id: "meta-description",
    category: RuleCategory::OnPage,
    name: "Meta description",
    description: "The page has a meta description of 120 to 160 characters",
    weight: 5,
};

#[async_trait]
impl Rule for MetaDescriptionRule {
    fn info(&self) -> &RuleInfo {
        &META_DESCRIPTION
    }

    async fn check(&self, context: &AuditRuleContext<'_>) -> Result<RuleCheckResult, RuleError> {
        let id = self.id();
        let Some(description) = context.facts.meta("description") else {
            return Ok(RuleCheckResult::fail(
                0,
                Issue::critical(
                    id,
                    "Page has no meta description",
                    "Add `<meta name=\"description\" content=\"...\">` summarizing the page in 120-160 characters.",
                ),
            ));
        };

        let length = description.chars().count();
        if !(DESCRIPTION_MIN..=DESCRIPTION_MAX).contains(&length) {
            let problem = if length < DESCRIPTION_MIN { "short" } else { "long" };
            return Ok(RuleCheckResult::fail(
                scaled(self.weight(), 0.7),
                Issue::warning(
                    id,
                    format!("Meta description is too {} ({} characters)", problem, length),
                    format!(
                        "Rewrite the description to {}-{} characters with a clear call to action.",
                        DESCRIPTION_MIN, DESCRIPTION_MAX
                    ),
                )
                .with_metadata(json!({ "length": length })),
            ));
        }

        Ok(RuleCheckResult::pass(self.weight()))
    }
}

pub struct H1TagRule;

const H1_TAG: RuleInfo = RuleInfo {
    id: "h1-tag",
    category: RuleCategory::OnPage,
    name: "H1 heading",
    description: "The page has exactly one non-empty <h1>",
    weight: 4,
};

#[async_trait]
impl Rule for H1TagRule {
    fn info(&self) -> &RuleInfo {
        &H1_TAG
    }

    async fn check(&self, context: &AuditRuleContext<'_>) -> Result<RuleCheckResult, RuleError> {
        let id = self.id();
        let texts: Vec<&str> = context.facts.h1s().map(|h| h.text.as_str()).collect();

        match texts.as_slice() {
            [] => Ok(RuleCheckResult::fail(
                0,
                Issue::critical(
                    id,
                    "Page has no <h1> heading",
                    "Add one `<h1>` stating the page's main topic.",
                ),
            )),
            [text] if text.is_empty() => Ok(RuleCheckResult::fail(
                scaled(self.weight(), 0.5),
                Issue::warning(
                    id,
                    "The <h1> heading is empty",
                    "Give the `<h1>` visible text describing the page.",
                ),
            )),
            [_] => Ok(RuleCheckResult::pass(self.weight())),
            many => {
                let listed = many
                    .iter()
                    .map(|t| format!("\"{}\"", t))
                    .collect::<Vec<_>>()
                    .join(", ");
                Ok(RuleCheckResult::fail(
                    scaled(self.weight(), 0.5),
                    Issue::warning(
                        id,
                        format!("Page has {} <h1> headings: {}", many.len(), listed),
                        "Keep a single `<h1>` and demote the others to `<h2>`.",
                    )
                    .with_metadata(json!({ "count": many.len(), "headings": many })),
                ))
            }
        }
    }
}

pub struct HeadingHierarchyRule;

const HEADING_HIERARCHY: RuleInfo = RuleInfo {
    id: "heading-hierarchy",
    category: RuleCategory::OnPage,
    name: "Heading hierarchy",
    description: "Heading levels descend without skipping a level",
    weight: 2,
};

#[async_trait]
impl Rule for HeadingHierarchyRule {
    fn info(&self) -> &RuleInfo {
        &HEADING_HIERARCHY
    }

    async fn check(&self, context: &AuditRuleContext<'_>) -> Result<RuleCheckResult, RuleError> {
        let id = self.id();
        let headings = &context.facts.headings;

        if headings.is_empty() {
            return Ok(RuleCheckResult::fail(
                0,
                Issue::warning(
                    id,
                    "Page has no headings",
                    "Structure the content with `<h1>` to `<h3>` headings.",
                ),
            ));
        }

        let skips: Vec<String> = headings
            .windows(2)
            .filter(|pair| pair[1].level > pair[0].level + 1)
            .map(|pair| format!("h{} -> h{}", pair[0].level, pair[1].level))
            .collect();

        if skips.is_empty() {
            return Ok(RuleCheckResult::pass(self.weight()));
        }

        Ok(RuleCheckResult::fail(
            scaled(self.weight(), 0.5),
            Issue::warning(
                id,
                format!("Heading levels are skipped {} time(s): {}", skips.len(), skips.join(", ")),
                "Nest headings one level at a time, e.g. an `<h2>` before any `<h3>`.",
            )
            .with_metadata(json!({ "skips": skips })),
        ))
    }
}

pub struct ImageAltRule;

const IMAGE_ALT: RuleInfo = RuleInfo {
    id: "image-alt",
    category: RuleCategory::OnPage,
    name: "Image alt text",
    description: "Every <img> carries an alt attribute",
    weight: 4,
};

#[async_trait]
impl Rule for ImageAltRule {
    fn info(&self) -> &RuleInfo {
        &IMAGE_ALT
    }

    async fn check(&self, context: &AuditRuleContext<'_>) -> Result<RuleCheckResult, RuleError> {
        let images = &context.facts.images;
        let total = images.len();
        let missing: Vec<&str> = images
            .iter()
            .filter(|img| img.alt.is_none())
            .map(|img| img.src.as_str())
            .collect();

        if missing.is_empty() {
            return Ok(RuleCheckResult::pass(self.weight()));
        }

        let covered = total - missing.len();
        let decorative = images
            .iter()
            .filter(|img| img.alt.is_some() && !img.has_alt())
            .count();
        let percent = coverage_percent(covered, total);

        Ok(RuleCheckResult::fail(
            coverage_score(self.weight(), covered, total),
            Issue::warning(
                self.id(),
                format!(
                    "{} of {} images have no alt attribute ({}% coverage)",
                    missing.len(),
                    total,
                    percent
                ),
                "Describe each image in `alt=\"...\"`; use `alt=\"\"` for purely decorative images.",
            )
            .with_metadata(json!({
                "total": total,
                "missing": missing.len(),
                "decorative": decorative,
                "coverage": percent,
                "examples": missing.iter().take(10).collect::<Vec<_>>(),
            })),
        ))
    }
}

pub struct WordCountRule;

const WORD_COUNT: RuleInfo = RuleInfo {
    id: "word-count",
    category: RuleCategory::OnPage,
    name: "Content length",
    description: "The page carries enough visible text to rank",
    weight: 3,
};

#[async_trait]
impl Rule for WordCountRule {
    fn info(&self) -> &RuleInfo {
        &WORD_COUNT
    }

    async fn check(&self, context: &AuditRuleContext<'_>) -> Result<RuleCheckResult, RuleError> {
        let words = context.facts.word_count;
        let metadata = json!({ "words": words });

        if words < THIN_CONTENT_WORDS {
            return Ok(RuleCheckResult::fail(
                0,
                Issue::warning(
                    self.id(),
                    format!("Thin content: only {} words of visible text", words),
                    format!(
                        "Expand the page to at least {} words of useful, original text.",
                        RICH_CONTENT_WORDS
                    ),
                )
                .with_metadata(metadata),
            ));
        }

        if words < RICH_CONTENT_WORDS {
            return Ok(RuleCheckResult::fail(
                scaled(self.weight(), 0.7),
                Issue::info(
                    self.id(),
                    format!("Page has {} words of visible text", words),
                    format!(
                        "Pages with {}+ words tend to rank for more queries.",
                        RICH_CONTENT_WORDS
                    ),
                )
                .with_metadata(metadata),
            ));
        }

        Ok(RuleCheckResult::pass(self.weight()))
    }
}

pub struct SocialTagsRule;

const SOCIAL_TAGS: RuleInfo = RuleInfo {
    id: "social-tags",
    category: RuleCategory::OnPage,
    name: "Social sharing tags",
    description: "Open Graph and Twitter Card tags are complete",
    weight: 2,
};

#[async_trait]
impl Rule for SocialTagsRule {
    fn info(&self) -> &RuleInfo {
        &SOCIAL_TAGS
    }

    async fn check(&self, context: &AuditRuleContext<'_>) -> Result<RuleCheckResult, RuleError> {
        let facts = &context.facts;
        let missing = |tags: &[&'static str]| -> Vec<&'static str> {
            tags.iter().copied().filter(|t| facts.meta(t).is_none()).collect()
        };
        let missing_og = missing(OPEN_GRAPH_TAGS);
        let missing_twitter = missing(TWITTER_TAGS);

        let og_coverage = coverage_percent(
            OPEN_GRAPH_TAGS.len() - missing_og.len(),
            OPEN_GRAPH_TAGS.len(),
        );
        let twitter_coverage = coverage_percent(
            TWITTER_TAGS.len() - missing_twitter.len(),
            TWITTER_TAGS.len(),
        );
        let coverage = f64::from(og_coverage + twitter_coverage) / 200.0;

        let mut result = RuleCheckResult::new(
            missing_og.is_empty() && missing_twitter.is_empty(),
            scaled(self.weight(), coverage),
            Vec::new(),
        );

        if !missing_og.is_empty() {
            result = result.with_issue(
                Issue::warning(
                    self.id(),
                    format!("Missing Open Graph tags: {}", missing_og.join(", ")),
                    "Add e.g. `<meta property=\"og:title\" content=\"...\">` so shared links render a rich preview.",
                )
                .with_metadata(json!({ "missing": missing_og, "coverage": og_coverage })),
            );
        }
        if !missing_twitter.is_empty() {
            result = result.with_issue(
                Issue::info(
                    self.id(),
                    format!("Missing Twitter Card tags: {}", missing_twitter.join(", ")),
                    "Add e.g. `<meta name=\"twitter:card\" content=\"summary_large_image\">`.",
                )
                .with_metadata(json!({ "missing": missing_twitter, "coverage": twitter_coverage })),
            );
        }
        Ok(result)
    }
}
