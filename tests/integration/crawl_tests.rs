//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! site traversal end-to-end over the HTTP fetch backend.

use rankscope::config::Config;
use rankscope::crawler::{build_crawler, Crawler, PageFetcher};
use rankscope::ResourceKind;
use std::collections::HashSet;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html_page(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><head><title>Test</title></head><body>{}</body></html>", body),
        "text/html",
    )
}

async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html_page(body))
        .mount(server)
        .await;
}

fn test_crawler(configure: impl FnOnce(&mut Config)) -> Crawler<Box<dyn PageFetcher>> {
    let mut config = Config::default();
    config.crawler.navigation_timeout_secs = 2;
    configure(&mut config);
    build_crawler(&config).expect("Failed to build crawler")
}

fn paths(pages: &[rankscope::CrawlResult]) -> Vec<String> {
    pages
        .iter()
        .map(|p| url::Url::parse(&p.url).expect("crawled URL").path().to_string())
        .collect()
}

#[tokio::test]
async fn test_full_crawl_breadth_first() {
    let server = MockServer::start().await;

    mount_page(&server, "/", r#"<a href="/page1">1</a> <a href="/page2">2</a>"#).await;
    mount_page(&server, "/page1", r#"<a href="/page3">3</a> <a href="/">home</a>"#).await;
    mount_page(&server, "/page2", r#"<a href="/page1/">1 again</a>"#).await;
    mount_page(&server, "/page3", "<p>leaf</p>").await;

    let mut crawler = test_crawler(|_| {});
    crawler.initialize().await.expect("initialize");
    let pages = crawler
        .crawl_website(&server.uri(), 10)
        .await
        .expect("Crawl failed");
    crawler.close().await.expect("close");

    assert_eq!(paths(&pages), vec!["/", "/page1", "/page2", "/page3"]);
    assert!(pages.iter().all(|p| p.status_code == 200));

    let unique: HashSet<_> = pages.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(unique.len(), pages.len());
}

#[tokio::test]
async fn test_max_pages_is_a_hard_cap() {
    let server = MockServer::start().await;

    let links: String = (1..=6).map(|i| format!(r#"<a href="/p{}">{}</a>"#, i, i)).collect();
    mount_page(&server, "/", &links).await;
    for i in 1..=6 {
        mount_page(&server, &format!("/p{}", i), "<p>page</p>").await;
    }

    let crawler = test_crawler(|_| {});
    let pages = crawler.crawl_website(&server.uri(), 3).await.expect("Crawl failed");

    assert_eq!(paths(&pages), vec!["/", "/p1", "/p2"]);
}

#[tokio::test]
async fn test_external_links_are_recorded_not_followed() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        r#"<a href="https://partner.example.org/deal">partner</a>
           <a href="mailto:hi@example.com">mail</a>
           <a href="/about">about</a>"#,
    )
    .await;
    mount_page(&server, "/about", "<p>about</p>").await;

    let crawler = test_crawler(|_| {});
    let pages = crawler.crawl_website(&server.uri(), 10).await.expect("Crawl failed");

    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].external_links, vec!["https://partner.example.org/deal"]);
    assert_eq!(pages[0].internal_links, vec![format!("{}/about", server.uri())]);
}

#[tokio::test]
async fn test_failed_pages_are_skipped() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        r#"<a href="/brochure.pdf">pdf</a> <a href="/slow">slow</a> <a href="/ok">ok</a>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/brochure.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8; 64], "application/pdf"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html_page("<p>late</p>").set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;
    mount_page(&server, "/ok", "<p>ok</p>").await;

    let crawler = test_crawler(|config| config.crawler.navigation_timeout_secs = 1);
    let pages = crawler.crawl_website(&server.uri(), 10).await.expect("Crawl failed");

    assert_eq!(paths(&pages), vec!["/", "/ok"]);
}

#[tokio::test]
async fn test_error_status_pages_are_kept() {
    let server = MockServer::start().await;

    mount_page(&server, "/", r#"<a href="/missing">gone</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_raw("<h1>Not found</h1>", "text/html"))
        .mount(&server)
        .await;

    let crawler = test_crawler(|_| {});
    let pages = crawler.crawl_website(&server.uri(), 10).await.expect("Crawl failed");

    assert_eq!(pages.len(), 2);
    assert_eq!(pages[1].status_code, 404);
    assert!(!pages[1].is_success());
}

#[tokio::test]
async fn test_unreachable_start_yields_no_pages() {
    let crawler = test_crawler(|config| config.crawler.navigation_timeout_secs = 1);
    let pages = crawler
        .crawl_website("http://127.0.0.1:1/", 10)
        .await
        .expect("Start URL is valid");

    assert!(pages.is_empty());
}

#[tokio::test]
async fn test_invalid_start_url_is_rejected() {
    let crawler = test_crawler(|_| {});
    assert!(crawler.crawl_website("ftp://example.com/", 10).await.is_err());
}

#[tokio::test]
async fn test_page_facts_headers_and_resources() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Robots-Tag", "index, follow")
                .set_body_raw(
                    r#"<html><head>
                    <script type="application/ld+json">{"@context":"https://schema.org","@type":"Organization","name":"Acme"}</script>
                    <script type="application/ld+json">{ not json </script>
                    <link rel="stylesheet" href="/site.css">
                    </head><body><img src="/logo.png" alt="Acme"></body></html>"#,
                    "text/html",
                ),
        )
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/logo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 4096]))
        .mount(&server)
        .await;

    let crawler = test_crawler(|_| {});
    let pages = crawler.crawl_website(&server.uri(), 1).await.expect("Crawl failed");
    let page = &pages[0];

    assert_eq!(page.header("x-robots-tag"), Some("index, follow"));
    assert_eq!(page.json_ld_data.len(), 1);
    assert_eq!(page.json_ld_data[0]["name"], "Acme");
    assert_eq!(page.page_size, page.html.len() as u64);

    assert_eq!(page.resources[0].kind, ResourceKind::Other);
    assert_eq!(page.resources[0].size, page.page_size);

    let logo = page
        .resources
        .iter()
        .find(|r| r.kind == ResourceKind::Image)
        .expect("image resource");
    assert_eq!(logo.url, format!("{}/logo.png", server.uri()));
    assert_eq!(logo.size, 4096);

    let css = page
        .resources
        .iter()
        .find(|r| r.kind == ResourceKind::Stylesheet)
        .expect("stylesheet resource");
    assert_eq!(css.size, 0);
}

#[tokio::test]
async fn test_redirect_is_followed() {
    let server = MockServer::start().await;

    mount_page(&server, "/", r#"<a href="/old">old</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("location", format!("{}/new", server.uri()).as_str()),
        )
        .mount(&server)
        .await;
    mount_page(&server, "/new", "<p>new home</p>").await;

    let crawler = test_crawler(|_| {});
    let pages = crawler.crawl_website(&server.uri(), 10).await.expect("Crawl failed");

    assert_eq!(pages.len(), 2);
    assert_eq!(pages[1].url, format!("{}/old", server.uri()));
    assert_eq!(pages[1].final_url, format!("{}/new", server.uri()));
}

#[tokio::test]
async fn test_slow_subresource_keeps_page() {
    let server = MockServer::start().await;

    mount_page(&server, "/", r#"<img src="/banner.jpg"> <a href="/next">next</a>"#).await;
    mount_page(&server, "/next", "<p>next</p>").await;
    Mock::given(method("HEAD"))
        .and(path("/banner.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0u8; 8192])
                .set_delay(Duration::from_secs(4)),
        )
        .mount(&server)
        .await;

    let crawler = test_crawler(|_| {});
    let pages = crawler.crawl_website(&server.uri(), 10).await.expect("Crawl failed");

    assert_eq!(paths(&pages), vec!["/", "/next"]);
    let banner = pages[0]
        .resources
        .iter()
        .find(|r| r.kind == ResourceKind::Image)
        .expect("image resource");
    assert_eq!(banner.size, 0);
}

#[tokio::test]
async fn test_robots_crawl_delay_is_honored() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nCrawl-delay: 1"))
        .mount(&server)
        .await;
    mount_page(&server, "/", r#"<a href="/a">a</a>"#).await;
    mount_page(&server, "/a", "<p>a</p>").await;

    let crawler = test_crawler(|_| {});
    let started = std::time::Instant::now();
    let pages = crawler.crawl_website(&server.uri(), 10).await.expect("Crawl failed");

    assert_eq!(paths(&pages), vec!["/", "/a"]);
    assert!(started.elapsed() >= Duration::from_secs(1));
}
