//! Integration tests for complete audits
//!
//! A wiremock server plays the audited site, including robots.txt and the
//! sitemap that the technical rules request on their own.

use rankscope::config::{Config, UserAgentConfig};
use rankscope::crawler::build_crawler;
use rankscope::http::build_http_client;
use rankscope::output::{format_summary, read_json_report, write_json_report};
use rankscope::{run_site_audit, AuditError, Rule, RuleCategory, RuleEngine, Severity};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HOME: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <title>Handmade Oak Furniture for Every Home | Acme</title>
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <script type="application/ld+json">
    {"@context": "https://schema.org", "@type": "Organization", "name": "Acme", "url": "https://acme.test/"}
  </script>
</head>
<body>
  <h1>Handmade oak furniture</h1>
  <a href="/about">About us</a>
  <a href="tel:+1-555-010-0199">Call</a>
</body>
</html>"#;

const ABOUT: &str = r#"<html lang="en"><head><title>About</title></head>
<body><h1>About Acme</h1><address>1 Main St, Springfield</address>
<a href="tel:555.010.0199">Call</a></body></html>"#;

async fn mount_site(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(HOME, "text/html"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(ABOUT, "text/html"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "User-agent: *\nAllow: /\nSitemap: {}/sitemap.xml\n",
            server.uri()
        )))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            format!(
                r#"<?xml version="1.0"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"><url><loc>{}/</loc></url></urlset>"#,
                server.uri()
            ),
            "application/xml",
        ))
        .mount(server)
        .await;
}

fn engine() -> RuleEngine {
    let client = build_http_client(&UserAgentConfig::default(), Duration::from_secs(5))
        .expect("Failed to build client");
    RuleEngine::with_default_catalog(client).expect("Catalog has unique ids")
}

fn config() -> Config {
    let mut config = Config::default();
    config.crawler.navigation_timeout_secs = 2;
    config
}

#[tokio::test]
async fn test_full_audit_of_small_site() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let engine = engine();
    let mut crawler = build_crawler(&config()).expect("Failed to build crawler");
    let report = run_site_audit(&mut crawler, &engine, &server.uri(), 10)
        .await
        .expect("Audit failed");

    assert_eq!(report.domain, "127.0.0.1");
    assert_eq!(report.pages.len(), 2);
    assert_eq!(report.results.len(), 28);

    for (id, result) in &report.results {
        let rule = engine.get_rule(id).expect("result for a registered rule");
        assert!(result.score <= rule.weight(), "{} over weight", id);
    }
    assert!(report.scores.overall <= 100);
    assert!(report.scores.per_category.values().all(|score| *score <= 100));

    // Served over plain HTTP
    let https = &report.results["https"];
    assert_eq!(https.score, 0);
    assert_eq!(https.issues[0].severity, Severity::Critical);

    assert_eq!(report.results["robots-txt"].score, 4);
    assert_eq!(report.results["xml-sitemap"].score, 4);
    assert_eq!(report.results["http-status"].score, 5);
    assert_eq!(report.results["mobile-viewport"].score, 4);
    assert_eq!(report.results["html-lang"].score, 2);
    assert_eq!(report.results["title-tag"].score, 5);
    assert_eq!(report.results["h1-tag"].score, 4);
    assert_eq!(report.results["json-ld"].score, 8);
    assert!(report.results["organization-schema"].passed);
    assert_eq!(report.results["product-schema"].score, 3);
    assert_eq!(report.results["nap-consistency"].score, 3);
    assert_eq!(report.results["address-markup"].score, 2);

    assert_eq!(report.scores.per_category[&RuleCategory::LocalSeo], 100);

    let summary = format_summary(&report);
    assert!(summary.contains("[critical] https"));
}

#[tokio::test]
async fn test_missing_robots_and_sitemap() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(HOME, "text/html"))
        .mount(&server)
        .await;

    let mut crawler = build_crawler(&config()).expect("Failed to build crawler");
    let report = run_site_audit(&mut crawler, &engine(), &server.uri(), 1)
        .await
        .expect("Audit failed");

    assert_eq!(report.pages.len(), 1);

    let robots = &report.results["robots-txt"];
    assert_eq!(robots.score, 0);
    assert_eq!(robots.issues[0].severity, Severity::Warning);

    let sitemap = &report.results["xml-sitemap"];
    assert_eq!(sitemap.score, 0);
    assert!(!sitemap.passed);
}

#[tokio::test]
async fn test_unreachable_site_is_an_empty_crawl() {
    let mut config = config();
    config.crawler.navigation_timeout_secs = 1;
    let mut crawler = build_crawler(&config).expect("Failed to build crawler");

    let result = run_site_audit(&mut crawler, &engine(), "http://127.0.0.1:1/", 5).await;
    assert!(matches!(result, Err(AuditError::EmptyCrawl { .. })));
}

#[tokio::test]
async fn test_report_round_trips_through_json() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let mut crawler = build_crawler(&config()).expect("Failed to build crawler");
    let report = run_site_audit(&mut crawler, &engine(), &server.uri(), 1)
        .await
        .expect("Audit failed");

    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("audit.json");
    write_json_report(&report, &path).expect("write report");

    let loaded = read_json_report(&path).expect("read report");
    assert_eq!(loaded.scores, report.scores);
    assert_eq!(loaded.results, report.results);
    assert_eq!(loaded.pages, report.pages);
}
