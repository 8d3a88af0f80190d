//! Technical rules: transport, crawlability and document basics

use super::{
    coverage_score, scaled, AuditRuleContext, Issue, Rule, RuleCategory, RuleCheckResult,
    RuleError, RuleInfo,
};
use crate::http::{probe_text, Probe};
use crate::robots::{fetch_robots, RobotsFetch};
use crate::url::normalize_url;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use url::Url;

/// Crawler token used when judging robots.txt
const SEARCH_CRAWLER: &str = "Googlebot";

/// Locations probed for a sitemap, in order
const SITEMAP_PATHS: &[&str] = &["/sitemap.xml", "/sitemap_index.xml"];

pub(super) fn rules(client: Client) -> Vec<Arc<dyn Rule>> {
    vec![
        Arc::new(HttpsRule),
        Arc::new(RobotsTxtRule {
            client: client.clone(),
        }),
        Arc::new(XmlSitemapRule { client }),
        Arc::new(CanonicalTagRule),
        Arc::new(IndexabilityRule),
        Arc::new(HttpStatusRule),
        Arc::new(MobileViewportRule),
        Arc::new(HtmlLangRule),
        Arc::new(ConsoleErrorsRule),
    ]
}

fn page_url(context: &AuditRuleContext<'_>) -> Result<Url, RuleError> {
    Url::parse(&context.page.final_url).map_err(|e| {
        RuleError::InvalidInput(format!("final URL {}: {}", context.page.final_url, e))
    })
}

pub struct HttpsRule;

const HTTPS: RuleInfo = RuleInfo {
    id: "https",
    category: RuleCategory::Technical,
    name: "HTTPS",
    description: "The page is served over HTTPS with Strict-Transport-Security",
    weight: 5,
};

#[async_trait]
impl Rule for HttpsRule {
    fn info(&self) -> &RuleInfo {
        &HTTPS
    }

    async fn check(&self, context: &AuditRuleContext<'_>) -> Result<RuleCheckResult, RuleError> {
        let url = page_url(context)?;
        let id = self.id();

        if url.scheme() != "https" {
            return Ok(RuleCheckResult::fail(
                0,
                Issue::critical(
                    id,
                    format!("Page is served over insecure {}", url.scheme().to_uppercase()),
                    "Serve every page over HTTPS and redirect HTTP requests with a 301.",
                )
                .with_metadata(json!({ "url": url.as_str() })),
            ));
        }

        if context.page.header("strict-transport-security").is_none() {
            return Ok(RuleCheckResult::pass(self.weight()).with_issue(Issue::info(
                id,
                "HTTPS is enabled but the Strict-Transport-Security header is missing",
                "Add the header, e.g. `Strict-Transport-Security: max-age=31536000; includeSubDomains`.",
            )));
        }

        Ok(RuleCheckResult::pass(self.weight()))
    }
}

pub struct RobotsTxtRule {
    client: Client,
}

const ROBOTS_TXT: RuleInfo = RuleInfo {
    id: "robots-txt",
    category: RuleCategory::Technical,
    name: "robots.txt",
    description: "A robots.txt exists, admits search crawlers and declares a sitemap",
    weight: 4,
};

#[async_trait]
impl Rule for RobotsTxtRule {
    fn info(&self) -> &RuleInfo {
        &ROBOTS_TXT
    }

    async fn check(&self, context: &AuditRuleContext<'_>) -> Result<RuleCheckResult, RuleError> {
        let url = page_url(context)?;
        let id = self.id();

        match fetch_robots(&self.client, &url).await {
            RobotsFetch::Found(robots) => {
                if robots.blocks_everything(SEARCH_CRAWLER) {
                    return Ok(RuleCheckResult::fail(
                        0,
                        Issue::critical(
                            id,
                            "robots.txt blocks search engines from the entire site",
                            "Remove `Disallow: /` for `User-agent: *` unless the site must stay out of search results.",
                        ),
                    ));
                }

                let sitemaps = robots.sitemaps();
                if sitemaps.is_empty() {
                    return Ok(RuleCheckResult::pass(self.weight()).with_issue(Issue::info(
                        id,
                        "robots.txt does not reference a sitemap",
                        "Add a line such as `Sitemap: https://example.com/sitemap.xml`.",
                    )));
                }

                Ok(RuleCheckResult::pass(self.weight()))
            }
            RobotsFetch::Missing { status } => Ok(RuleCheckResult::fail(
                0,
                Issue::warning(
                    id,
                    format!("No robots.txt found (HTTP {})", status),
                    "Create /robots.txt, e.g. `User-agent: *` / `Allow: /` / `Sitemap: https://example.com/sitemap.xml`.",
                )
                .with_metadata(json!({ "status": status })),
            )),
            RobotsFetch::Unavailable { reason } => Ok(RuleCheckResult::fail(
                0,
                Issue::info(
                    id,
                    format!("robots.txt could not be retrieved: {}", reason),
                    "Make sure /robots.txt is reachable and answers with HTTP 200.",
                )
                .with_metadata(json!({ "reason": reason })),
            )),
        }
    }
}

pub struct XmlSitemapRule {
    client: Client,
}

const XML_SITEMAP: RuleInfo = RuleInfo {
    id: "xml-sitemap",
    category: RuleCategory::Technical,
    name: "XML sitemap",
    description: "An XML sitemap is published at a standard location",
    weight: 4,
};

impl XmlSitemapRule {
    fn evaluate_body(&self, url: &Url, body: &str) -> RuleCheckResult {
        let lowered = body.to_ascii_lowercase();
        let is_sitemap = lowered.contains("<urlset") || lowered.contains("<sitemapindex");
        let entries = lowered.matches("<loc>").count();
        let metadata = json!({ "url": url.as_str(), "entries": entries });

        if !is_sitemap {
            return RuleCheckResult::fail(
                scaled(self.weight(), 0.5),
                Issue::warning(
                    self.id(),
                    format!("{} exists but is not an XML sitemap", url),
                    "Serve a `<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">` document listing canonical URLs.",
                )
                .with_metadata(metadata),
            );
        }

        if entries == 0 {
            return RuleCheckResult::fail(
                scaled(self.weight(), 0.5),
                Issue::warning(
                    self.id(),
                    format!("Sitemap {} lists no URLs", url),
                    "Add a `<url><loc>...</loc></url>` entry for every indexable page.",
                )
                .with_metadata(metadata),
            );
        }

        RuleCheckResult::pass(self.weight())
    }
}

#[async_trait]
impl Rule for XmlSitemapRule {
    fn info(&self) -> &RuleInfo {
        &XML_SITEMAP
    }

    async fn check(&self, context: &AuditRuleContext<'_>) -> Result<RuleCheckResult, RuleError> {
        let base = page_url(context)?;
        let mut unavailable: Option<String> = None;

        for path in SITEMAP_PATHS {
            let Ok(url) = base.join(path) else {
                continue;
            };
            match probe_text(&self.client, url.as_str()).await {
                Probe::Found { body, .. } => return Ok(self.evaluate_body(&url, &body)),
                Probe::Missing { .. } => {}
                Probe::Unavailable { reason } => unavailable = Some(reason),
            }
        }

        let issue = match unavailable {
            Some(reason) => Issue::info(
                self.id(),
                format!("Sitemap could not be retrieved: {}", reason),
                "Make sure /sitemap.xml is reachable and answers with HTTP 200.",
            )
            .with_metadata(json!({ "reason": reason })),
            None => Issue::warning(
                self.id(),
                "No XML sitemap found at /sitemap.xml or /sitemap_index.xml",
                "Publish /sitemap.xml listing every indexable URL and reference it from robots.txt.",
            ),
        };
        Ok(RuleCheckResult::fail(0, issue))
    }
}

pub struct CanonicalTagRule;

const CANONICAL_TAG: RuleInfo = RuleInfo {
    id: "canonical-tag",
    category: RuleCategory::Technical,
    name: "Canonical tag",
    description: "The page declares exactly one valid canonical URL",
    weight: 4,
};

#[async_trait]
impl Rule for CanonicalTagRule {
    fn info(&self) -> &RuleInfo {
        &CANONICAL_TAG
    }

    async fn check(&self, context: &AuditRuleContext<'_>) -> Result<RuleCheckResult, RuleError> {
        let id = self.id();
        let half = scaled(self.weight(), 0.5);
        let hrefs = &context.facts.canonical_hrefs;

        let href = match hrefs.as_slice() {
            [] => {
                return Ok(RuleCheckResult::fail(
                    0,
                    Issue::warning(
                        id,
                        "No canonical tag found",
                        "Add `<link rel=\"canonical\" href=\"https://example.com/page\">` to the <head>.",
                    ),
                ))
            }
            [href] => href,
            _ => {
                return Ok(RuleCheckResult::fail(
                    half,
                    Issue::warning(
                        id,
                        format!(
                            "{} canonical tags found; search engines may ignore all of them",
                            hrefs.len()
                        ),
                        "Keep a single `<link rel=\"canonical\">` element per page.",
                    )
                    .with_metadata(json!({ "canonicals": hrefs })),
                ))
            }
        };

        let page = page_url(context)?;
        let Some(canonical) = page
            .join(href)
            .ok()
            .and_then(|u| normalize_url(u.as_str()).ok())
        else {
            return Ok(RuleCheckResult::fail(
                half,
                Issue::warning(
                    id,
                    format!("Canonical URL \"{}\" is not a valid HTTP(S) URL", href),
                    "Use an absolute URL, e.g. `https://example.com/page`.",
                ),
            ));
        };

        if canonical.host_str() != page.host_str() {
            return Ok(RuleCheckResult::fail(
                half,
                Issue::warning(
                    id,
                    format!("Canonical URL points to another host: {}", canonical),
                    "Point the canonical at this site unless the content is syndicated on purpose.",
                )
                .with_metadata(json!({ "canonical": canonical.as_str() })),
            ));
        }

        let this_page = normalize_url(page.as_str()).ok();
        if this_page.as_ref() != Some(&canonical) {
            return Ok(RuleCheckResult::pass(self.weight()).with_issue(
                Issue::info(
                    id,
                    format!("Page canonicalizes to {}", canonical),
                    "Confirm this page is meant to be a duplicate of its canonical URL.",
                )
                .with_metadata(json!({ "canonical": canonical.as_str() })),
            ));
        }

        Ok(RuleCheckResult::pass(self.weight()))
    }
}

pub struct IndexabilityRule;

const INDEXABILITY: RuleInfo = RuleInfo {
    id: "indexability",
    category: RuleCategory::Technical,
    name: "Indexability",
    description: "No meta robots or X-Robots-Tag directive keeps the page out of the index",
    weight: 5,
};

#[async_trait]
impl Rule for IndexabilityRule {
    fn info(&self) -> &RuleInfo {
        &INDEXABILITY
    }

    async fn check(&self, context: &AuditRuleContext<'_>) -> Result<RuleCheckResult, RuleError> {
        let id = self.id();
        let mut directives: Vec<String> = context.facts.robots_directives.clone();
        if let Some(header) = context.page.header("x-robots-tag") {
            directives.push(header.to_string());
        }

        let tokens: Vec<String> = directives
            .iter()
            .flat_map(|d| d.split(','))
            .map(|t| t.trim().to_ascii_lowercase())
            .collect();
        let has = |token: &str| tokens.iter().any(|t| t == token);

        if has("noindex") || has("none") {
            return Ok(RuleCheckResult::fail(
                0,
                Issue::critical(
                    id,
                    "Page is excluded from search results by a noindex directive",
                    "Remove `noindex` from the robots meta tag and the X-Robots-Tag header.",
                )
                .with_metadata(json!({ "directives": directives })),
            ));
        }

        if has("nofollow") {
            return Ok(RuleCheckResult::fail(
                scaled(self.weight(), 0.8),
                Issue::warning(
                    id,
                    "Page tells search engines not to follow its links",
                    "Drop `nofollow` from the robots directives so link equity flows to linked pages.",
                )
                .with_metadata(json!({ "directives": directives })),
            ));
        }

        Ok(RuleCheckResult::pass(self.weight()))
    }
}

pub struct HttpStatusRule;

const HTTP_STATUS: RuleInfo = RuleInfo {
    id: "http-status",
    category: RuleCategory::Technical,
    name: "HTTP status",
    description: "Crawled pages answer with success status codes",
    weight: 5,
};

#[async_trait]
impl Rule for HttpStatusRule {
    fn info(&self) -> &RuleInfo {
        &HTTP_STATUS
    }

    async fn check(&self, context: &AuditRuleContext<'_>) -> Result<RuleCheckResult, RuleError> {
        let id = self.id();
        let page = context.page;

        if !page.is_success() {
            return Ok(RuleCheckResult::fail(
                0,
                Issue::critical(
                    id,
                    format!("Page returned HTTP {}", page.status_code),
                    "Make the page answer with HTTP 200, or redirect it permanently to a live URL.",
                )
                .with_metadata(json!({ "url": page.url, "status": page.status_code })),
            ));
        }

        let broken: Vec<_> = context
            .all_pages
            .iter()
            .filter(|p| p.status_code >= 400)
            .map(|p| json!({ "url": p.url, "status": p.status_code }))
            .collect();
        let total = context.all_pages.len();
        let score = coverage_score(self.weight(), total - broken.len(), total);

        let mut result = RuleCheckResult::new(broken.is_empty(), score, Vec::new());
        if !broken.is_empty() {
            result = result.with_issue(
                Issue::warning(
                    id,
                    format!("{} of {} crawled pages returned an error status", broken.len(), total),
                    "Fix or redirect the broken URLs and update the links pointing to them.",
                )
                .with_metadata(json!({ "pages": broken })),
            );
        }
        if page.url != page.final_url {
            result = result.with_issue(
                Issue::info(
                    id,
                    format!("{} redirects to {}", page.url, page.final_url),
                    "Link directly to the final URL to save a redirect hop.",
                )
                .with_metadata(json!({ "from": page.url, "to": page.final_url })),
            );
        }
        Ok(result)
    }
}

pub struct MobileViewportRule;

const MOBILE_VIEWPORT: RuleInfo = RuleInfo {
    id: "mobile-viewport",
    category: RuleCategory::Technical,
    name: "Mobile viewport",
    description: "A responsive viewport meta tag is present",
    weight: 4,
};

#[async_trait]
impl Rule for MobileViewportRule {
    fn info(&self) -> &RuleInfo {
        &MOBILE_VIEWPORT
    }

    async fn check(&self, context: &AuditRuleContext<'_>) -> Result<RuleCheckResult, RuleError> {
        let id = self.id();
        let Some(viewport) = context.facts.meta("viewport") else {
            return Ok(RuleCheckResult::fail(
                0,
                Issue::critical(
                    id,
                    "No viewport meta tag; the page will render at desktop width on phones",
                    "Add `<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">`.",
                ),
            ));
        };

        let normalized: String = viewport
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();

        if !normalized.contains("width=device-width") {
            return Ok(RuleCheckResult::fail(
                scaled(self.weight(), 0.5),
                Issue::warning(
                    id,
                    format!("Viewport \"{}\" does not use width=device-width", viewport),
                    "Use `content=\"width=device-width, initial-scale=1\"`.",
                )
                .with_metadata(json!({ "viewport": viewport })),
            ));
        }

        if normalized.contains("user-scalable=no") || normalized.contains("maximum-scale=1") {
            return Ok(RuleCheckResult::pass(self.weight()).with_issue(
                Issue::info(
                    id,
                    "Viewport prevents users from zooming",
                    "Remove `user-scalable=no` and `maximum-scale=1` so the page stays accessible.",
                )
                .with_metadata(json!({ "viewport": viewport })),
            ));
        }

        Ok(RuleCheckResult::pass(self.weight()))
    }
}

pub struct HtmlLangRule;

const HTML_LANG: RuleInfo = RuleInfo {
    id: "html-lang",
    category: RuleCategory::Technical,
    name: "Document language",
    description: "The <html> element declares a valid language",
    weight: 2,
};

fn is_language_tag(lang: &str) -> bool {
    let mut parts = lang.split(['-', '_']);
    let primary = parts.next().unwrap_or("");
    (2..=3).contains(&primary.len())
        && primary.chars().all(|c| c.is_ascii_alphabetic())
        && parts.all(|p| {
            !p.is_empty() && p.len() <= 8 && p.chars().all(|c| c.is_ascii_alphanumeric())
        })
}

#[async_trait]
impl Rule for HtmlLangRule {
    fn info(&self) -> &RuleInfo {
        &HTML_LANG
    }

    async fn check(&self, context: &AuditRuleContext<'_>) -> Result<RuleCheckResult, RuleError> {
        let id = self.id();
        match context.facts.lang.as_deref() {
            None => Ok(RuleCheckResult::fail(
                0,
                Issue::warning(
                    id,
                    "The <html> element has no lang attribute",
                    "Declare the content language, e.g. `<html lang=\"en\">`.",
                ),
            )),
            Some(lang) if !is_language_tag(lang) => Ok(RuleCheckResult::fail(
                scaled(self.weight(), 0.5),
                Issue::warning(
                    id,
                    format!("\"{}\" is not a valid language tag", lang),
                    "Use a BCP 47 tag such as `en`, `en-GB` or `pt-BR`.",
                )
                .with_metadata(json!({ "lang": lang })),
            )),
            Some(_) => Ok(RuleCheckResult::pass(self.weight())),
        }
    }
}

pub struct ConsoleErrorsRule;

const CONSOLE_ERRORS: RuleInfo = RuleInfo {
    id: "console-errors",
    category: RuleCategory::Technical,
    name: "JavaScript errors",
    description: "The page loads without console errors",
    weight: 2,
};

#[async_trait]
impl Rule for ConsoleErrorsRule {
    fn info(&self) -> &RuleInfo {
        &CONSOLE_ERRORS
    }

    async fn check(&self, context: &AuditRuleContext<'_>) -> Result<RuleCheckResult, RuleError> {
        let errors = &context.page.console_errors;
        if errors.is_empty() {
            return Ok(RuleCheckResult::pass(self.weight()));
        }

        let score = if errors.len() <= 3 {
            scaled(self.weight(), 0.5)
        } else {
            0
        };
        let sample: Vec<_> = errors.iter().take(5).collect();
        Ok(RuleCheckResult::fail(
            score,
            Issue::warning(
                self.id(),
                format!("{} JavaScript error(s) logged while loading the page", errors.len()),
                "Fix the failing scripts; errors can stop content and structured data from rendering.",
            )
            .with_metadata(json!({ "count": errors.len(), "errors": sample })),
        ))
    }
}
