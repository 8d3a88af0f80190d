//! JSON report files

use crate::audit::AuditReport;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Writes the full report as pretty-printed JSON
///
/// Parent directories are created as needed.
pub fn write_json_report(report: &AuditReport, path: &Path) -> crate::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    tracing::info!("Wrote audit report to {}", path.display());
    Ok(())
}

/// Loads a report written by [`write_json_report`]
pub fn read_json_report(path: &Path) -> crate::Result<AuditReport> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::summary::tests::sample_report;
    use crate::rules::RuleCategory;
    use crate::AuditError;
    use tempfile::TempDir;

    #[test]
    fn test_write_creates_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reports").join("example.json");

        write_json_report(&sample_report(), &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["domain"], "example.com");
        assert_eq!(value["scores"]["per_category"]["onpage"], 12);
        assert_eq!(value["results"]["h1-tag"]["issues"][0]["severity"], "critical");
        assert!(value["results"]["h1-tag"]["issues"][0]["page_id"].is_null());
    }

    #[test]
    fn test_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        write_json_report(&sample_report(), &path).unwrap();

        let report = read_json_report(&path).unwrap();
        assert_eq!(report.scores.per_category[&RuleCategory::Technical], 14);
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.started_at, sample_report().started_at);
    }

    #[test]
    fn test_read_missing_file() {
        let result = read_json_report(Path::new("/nonexistent/report.json"));
        assert!(matches!(result, Err(AuditError::Io(_))));
    }
}
