//! Performance rules over load timing and page weight

use super::{
    coverage_score, scaled, AuditRuleContext, Issue, Rule, RuleCategory, RuleCheckResult,
    RuleError, RuleInfo,
};
use crate::crawler::{CrawlResult, ResourceKind};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

const MB: u64 = 1024 * 1024;
const IMAGE_BUDGET_BYTES: u64 = 200 * 1024;
const COMPRESSED_ENCODINGS: &[&str] = &["gzip", "br", "deflate", "zstd"];

pub(super) fn rules() -> Vec<Arc<dyn Rule>> {
    vec![
        Arc::new(LoadTimeRule),
        Arc::new(PageSizeRule),
        Arc::new(CompressionRule),
        Arc::new(ImageWeightRule),
        Arc::new(RequestCountRule),
    ]
}

/// HTML bytes plus every subresource except the document's own entry
fn total_page_weight(page: &CrawlResult) -> u64 {
    let subresources: u64 = page
        .resources
        .iter()
        .filter(|r| !(r.kind == ResourceKind::Other && r.url == page.final_url))
        .map(|r| r.size)
        .sum();
    page.page_size + subresources
}

fn format_bytes(bytes: u64) -> String {
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else {
        format!("{} KB", bytes / 1024)
    }
}

pub struct LoadTimeRule;

const LOAD_TIME: RuleInfo = RuleInfo {
    id: "load-time",
    category: RuleCategory::Performance,
    name: "Load time",
    description: "The page finishes loading within 2 seconds",
    weight: 5,
};

#[async_trait]
impl Rule for LoadTimeRule {
    fn info(&self) -> &RuleInfo {
        &LOAD_TIME
    }

    async fn check(&self, context: &AuditRuleContext<'_>) -> Result<RuleCheckResult, RuleError> {
        let ms = context.page.load_time;
        let seconds = ms as f64 / 1000.0;
        let metadata = json!({ "load_time_ms": ms });
        let recommendation =
            "Compress and lazy-load images, defer non-critical scripts, and cache static assets.";

        let result = match ms {
            0..=2000 => RuleCheckResult::pass(self.weight()),
            2001..=3000 => RuleCheckResult::fail(
                scaled(self.weight(), 0.8),
                Issue::warning(
                    self.id(),
                    format!("Page took {:.1}s to load", seconds),
                    recommendation,
                )
                .with_metadata(metadata),
            ),
            3001..=5000 => RuleCheckResult::fail(
                scaled(self.weight(), 0.5),
                Issue::warning(
                    self.id(),
                    format!("Page took {:.1}s to load", seconds),
                    recommendation,
                )
                .with_metadata(metadata),
            ),
            _ => RuleCheckResult::fail(
                0,
                Issue::critical(
                    self.id(),
                    format!("Page took {:.1}s to load; most visitors leave after 5s", seconds),
                    recommendation,
                )
                .with_metadata(metadata),
            ),
        };
        Ok(result)
    }
}

pub struct PageSizeRule;

const PAGE_SIZE: RuleInfo = RuleInfo {
    id: "page-size",
    category: RuleCategory::Performance,
    name: "Page weight",
    description: "The page and its resources weigh at most 1 MB",
    weight: 4,
};

#[async_trait]
impl Rule for PageSizeRule {
    fn info(&self) -> &RuleInfo {
        &PAGE_SIZE
    }

    async fn check(&self, context: &AuditRuleContext<'_>) -> Result<RuleCheckResult, RuleError> {
        let bytes = total_page_weight(context.page);
        let message = format!("Page weighs {}", format_bytes(bytes));
        let metadata = json!({ "bytes": bytes, "html_bytes": context.page.page_size });
        let recommendation = "Serve modern image formats, minify CSS/JS and drop unused libraries.";

        let result = if bytes <= MB {
            RuleCheckResult::pass(self.weight())
        } else if bytes <= 2 * MB {
            RuleCheckResult::fail(
                scaled(self.weight(), 0.7),
                Issue::warning(self.id(), message, recommendation).with_metadata(metadata),
            )
        } else if bytes <= 3 * MB {
            RuleCheckResult::fail(
                scaled(self.weight(), 0.3),
                Issue::warning(self.id(), message, recommendation).with_metadata(metadata),
            )
        } else {
            RuleCheckResult::fail(
                0,
                Issue::critical(self.id(), message, recommendation).with_metadata(metadata),
            )
        };
        Ok(result)
    }
}

pub struct CompressionRule;

const COMPRESSION: RuleInfo = RuleInfo {
    id: "compression",
    category: RuleCategory::Performance,
    name: "Text compression",
    description: "The document is served gzip, brotli or zstd compressed",
    weight: 2,
};

#[async_trait]
impl Rule for CompressionRule {
    fn info(&self) -> &RuleInfo {
        &COMPRESSION
    }

    async fn check(&self, context: &AuditRuleContext<'_>) -> Result<RuleCheckResult, RuleError> {
        let encoding = context
            .page
            .header("content-encoding")
            .map(|e| e.trim().to_ascii_lowercase());

        let compressed = encoding
            .as_deref()
            .map_or(false, |e| {
                e.split(',').any(|part| COMPRESSED_ENCODINGS.contains(&part.trim()))
            });

        if compressed {
            return Ok(RuleCheckResult::pass(self.weight()));
        }

        Ok(RuleCheckResult::fail(
            0,
            Issue::warning(
                self.id(),
                "The HTML response is not compressed",
                "Enable gzip or brotli on the server, e.g. `gzip on;` in nginx.",
            )
            .with_metadata(json!({ "content_encoding": encoding })),
        ))
    }
}

pub struct ImageWeightRule;

const IMAGE_WEIGHT: RuleInfo = RuleInfo {
    id: "image-weight",
    category: RuleCategory::Performance,
    name: "Image weight",
    description: "No image exceeds 200 KB",
    weight: 2,
};

#[async_trait]
impl Rule for ImageWeightRule {
    fn info(&self) -> &RuleInfo {
        &IMAGE_WEIGHT
    }

    async fn check(&self, context: &AuditRuleContext<'_>) -> Result<RuleCheckResult, RuleError> {
        let images: Vec<_> = context
            .page
            .resources
            .iter()
            .filter(|r| r.kind == ResourceKind::Image)
            .collect();
        let oversized: Vec<_> = images
            .iter()
            .filter(|r| r.size > IMAGE_BUDGET_BYTES)
            .map(|r| json!({ "url": r.url, "bytes": r.size }))
            .collect();

        if oversized.is_empty() {
            return Ok(RuleCheckResult::pass(self.weight()));
        }

        let total = images.len();
        Ok(RuleCheckResult::fail(
            coverage_score(self.weight(), total - oversized.len(), total),
            Issue::warning(
                self.id(),
                format!("{} of {} images are larger than 200 KB", oversized.len(), total),
                "Resize images to their display size and serve WebP or AVIF.",
            )
            .with_metadata(json!({ "images": oversized })),
        ))
    }
}

pub struct RequestCountRule;

const REQUEST_COUNT: RuleInfo = RuleInfo {
    id: "request-count",
    category: RuleCategory::Performance,
    name: "Request count",
    description: "The page loads with at most 50 requests",
    weight: 2,
};

#[async_trait]
impl Rule for RequestCountRule {
    fn info(&self) -> &RuleInfo {
        &REQUEST_COUNT
    }

    async fn check(&self, context: &AuditRuleContext<'_>) -> Result<RuleCheckResult, RuleError> {
        let requests = context.page.resources.len();
        if requests <= 50 {
            return Ok(RuleCheckResult::pass(self.weight()));
        }

        let score = if requests <= 100 {
            scaled(self.weight(), 0.5)
        } else {
            0
        };
        Ok(RuleCheckResult::fail(
            score,
            Issue::warning(
                self.id(),
                format!("Page makes {} requests", requests),
                "Bundle scripts and styles, inline critical CSS and use image sprites or SVG icons.",
            )
            .with_metadata(json!({ "requests": requests })),
        ))
    }
}
