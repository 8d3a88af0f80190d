//! Rankscope main entry point
//!
//! This is the command-line interface for the Rankscope SEO auditor.

use anyhow::Context;
use clap::Parser;
use rankscope::config::{load_config_with_hash, validate, Config, FetchBackend};
use rankscope::crawler::build_crawler;
use rankscope::http::build_http_client;
use rankscope::output::{print_summary, write_json_report};
use rankscope::rules::{Rule, RuleCategory};
use rankscope::{normalize_url, run_site_audit, CategoryWeights, RuleEngine};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Rankscope: an SEO crawler and auditor
///
/// Rankscope crawls a site breadth-first, checks every page set against a
/// catalog of technical, on-page, structured-data, performance and local SEO
/// rules, and reports weighted scores with concrete fixes.
#[derive(Parser, Debug)]
#[command(name = "rankscope")]
#[command(version)]
#[command(about = "An SEO crawler and auditor", long_about = None)]
struct Cli {
    /// Site to audit
    #[arg(value_name = "URL")]
    url: String,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum number of pages to crawl (overrides the config file)
    #[arg(long, value_name = "N")]
    max_pages: Option<usize>,

    /// Render pages in headless Chromium instead of plain HTTP
    #[arg(long)]
    browser: bool,

    /// Write the full report as JSON (overrides the config file)
    #[arg(long, value_name = "PATH")]
    json: Option<PathBuf>,

    /// Validate config and show what would be audited without crawling
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = resolve_config(&cli)?;

    if cli.dry_run {
        handle_dry_run(&cli.url, &config)
    } else {
        handle_audit(&cli.url, config).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("rankscope=info,warn"),
            1 => EnvFilter::new("rankscope=debug,info"),
            2 => EnvFilter::new("rankscope=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the config file, if any, and applies command-line overrides
fn resolve_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    if let Some(max_pages) = cli.max_pages {
        config.crawler.max_pages = max_pages;
    }
    if cli.browser {
        config.crawler.backend = FetchBackend::Browser;
    }
    if let Some(json) = &cli.json {
        config.output.json_path = Some(json.display().to_string());
    }

    validate(&config).context("Invalid command-line overrides")?;
    Ok(config)
}

/// Handles the --dry-run mode: validates inputs and shows what would be audited
fn handle_dry_run(url: &str, config: &Config) -> anyhow::Result<()> {
    let start = normalize_url(url).with_context(|| format!("Cannot audit {}", url))?;

    println!("=== Rankscope Dry Run ===\n");
    println!("Target: {}", start);

    println!("\nCrawler Configuration:");
    println!("  Backend: {:?}", config.crawler.backend);
    println!("  Max pages: {}", config.crawler.max_pages);
    println!(
        "  Navigation timeout: {}s",
        config.crawler.navigation_timeout_secs
    );
    println!("  Max links per page: {}", config.crawler.max_links_per_page);
    println!("  Politeness delay: {}ms", config.crawler.politeness_delay_ms);
    println!("  Probe resources: {}", config.crawler.probe_resources);

    println!("\nUser Agent: {}", config.user_agent.user_agent_string());

    let client = build_http_client(&config.user_agent, Duration::from_secs(1))?;
    let engine = RuleEngine::with_default_catalog(client)?;
    println!("\nRules ({}):", engine.len());
    for category in RuleCategory::ALL {
        let rules = engine.get_rules_by_category(category);
        println!(
            "  {} ({} points): {}",
            category,
            category.budget(),
            rules.iter().map(|r| r.id()).collect::<Vec<_>>().join(", ")
        );
    }

    if let Some(path) = &config.output.json_path {
        println!("\nJSON report: {}", path);
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the main audit operation
async fn handle_audit(url: &str, config: Config) -> anyhow::Result<()> {
    let client = build_http_client(
        &config.user_agent,
        Duration::from_secs(config.checks.network_timeout_secs),
    )?;
    let engine = RuleEngine::with_default_catalog(client)?;
    engine.verify_budgets(&CategoryWeights::default())?;

    let mut crawler = build_crawler(&config)?;
    let report = run_site_audit(&mut crawler, &engine, url, config.crawler.max_pages)
        .await
        .with_context(|| format!("Audit of {} failed", url))?;

    print_summary(&report);

    if let Some(path) = &config.output.json_path {
        write_json_report(&report, Path::new(path))
            .with_context(|| format!("Failed to write report to {}", path))?;
        println!("\n✓ Report written to: {}", path);
    }

    Ok(())
}
