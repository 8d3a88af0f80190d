//! Plain-text audit summary

use crate::audit::AuditReport;
use crate::rules::{RuleCategory, Severity};
use std::fmt::Write;

/// Issues listed in full before the summary switches to counts
const MAX_LISTED_ISSUES: usize = 20;

/// Formats the report's scores and most severe issues
pub fn format_summary(report: &AuditReport) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(out, "=== SEO Audit: {} ===\n", report.url);

    let _ = writeln!(out, "Overview:");
    let _ = writeln!(out, "  Pages crawled: {}", report.pages.len());
    let _ = writeln!(
        out,
        "  Rules passed: {} / {}",
        report.passed_rules(),
        report.results.len()
    );
    let _ = writeln!(
        out,
        "  Duration: {:.1}s",
        report.duration().num_milliseconds() as f64 / 1000.0
    );
    let _ = writeln!(out, "  Overall score: {} / 100\n", report.scores.overall);

    let _ = writeln!(out, "Category Scores:");
    for category in RuleCategory::ALL {
        let score = report
            .scores
            .per_category
            .get(&category)
            .copied()
            .unwrap_or(0);
        let _ = writeln!(
            out,
            "  {:<16} {:>3}  (weight {})",
            category.as_str(),
            score,
            category.budget()
        );
    }
    let _ = writeln!(out);

    let counts = report.issue_counts();
    let count = |severity: Severity| counts.get(&severity).copied().unwrap_or(0);
    let _ = writeln!(
        out,
        "Issues: {} critical, {} warning, {} info",
        count(Severity::Critical),
        count(Severity::Warning),
        count(Severity::Info)
    );

    let issues = report.issues();
    for issue in issues.iter().take(MAX_LISTED_ISSUES) {
        let _ = writeln!(
            out,
            "  [{}] {}: {}",
            issue.severity, issue.rule_id, issue.message
        );
        let _ = writeln!(out, "      -> {}", issue.recommendation);
    }
    if issues.len() > MAX_LISTED_ISSUES {
        let _ = writeln!(out, "  ... and {} more", issues.len() - MAX_LISTED_ISSUES);
    }

    out
}

/// Prints [`format_summary`] to stdout
pub fn print_summary(report: &AuditReport) {
    print!("{}", format_summary(report));
}
