use crate::error::Result;
use crate::types::ResultSet;
use clap::ValueEnum;
use serde::Serialize;
use std::path::Path;
use tokio::fs;
use tracing::debug;

pub const SUMMARY_TITLE: &str = "DNS Analyzer Summary";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Text,
    Json,
}

/// JSON 导出的单行记录，超时的 latency_ms 为 null
#[derive(Debug, Serialize)]
struct ExportRecord<'a> {
    name: &'a str,
    address: &'a str,
    latency_ms: Option<f64>,
    timed_out: bool,
    fastest: bool,
}

/// Title line followed by one `<name> - <address> -> <value>` line per outcome.
pub fn render_text(result: &ResultSet) -> String {
    let mut doc = String::from(SUMMARY_TITLE);
    doc.push('\n');
    for outcome in result.outcomes() {
        doc.push_str(&outcome.to_string());
        doc.push('\n');
    }
    doc
}

pub fn render_json(result: &ResultSet) -> Result<String> {
    let winner = result.winner();
    let records: Vec<ExportRecord> = result
        .outcomes()
        .iter()
        .map(|o| ExportRecord {
            name: &o.entry.name,
            address: &o.entry.address,
            latency_ms: o.latency_ms(),
            timed_out: o.timed_out(),
            fastest: winner == Some(&o.entry),
        })
        .collect();
    Ok(serde_json::to_string_pretty(&records)?)
}

pub async fn write_summary(path: &Path, result: &ResultSet, format: ExportFormat) -> Result<()> {
    let content = match format {
        ExportFormat::Text => render_text(result),
        ExportFormat::Json => render_json(result)?,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    fs::write(path, content).await?;
    debug!(?path, ?format, "summary exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProbeOutcome, ServerEntry};
    use std::time::Duration;
    use tempfile::tempdir;

    fn sample() -> ResultSet {
        ResultSet::from_outcomes(vec![
            ProbeOutcome::new(ServerEntry::new("Google", "8.8.8.8"), Some(Duration::from_micros(12_345))),
            ProbeOutcome::new(ServerEntry::new("Quad9", "9.9.9.9"), None),
        ])
    }

    #[test]
    fn test_render_text() {
        let doc = render_text(&sample());
        let lines: Vec<_> = doc.lines().collect();
        assert_eq!(
            lines,
            vec![
                "DNS Analyzer Summary",
                "Google - 8.8.8.8 -> 12.35 ms",
                "Quad9 - 9.9.9.9 -> Timeout",
            ]
        );
    }

    #[test]
    fn test_render_json_uses_null_for_timeout() -> Result<()> {
        let doc = render_json(&sample())?;
        let value: serde_json::Value = serde_json::from_str(&doc)?;

        assert_eq!(value[0]["name"], "Google");
        assert_eq!(value[0]["fastest"], true);
        assert!(value[1]["latency_ms"].is_null());
        assert_eq!(value[1]["timed_out"], true);
        assert_eq!(value[1]["fastest"], false);
        Ok(())
    }

    #[tokio::test]
    async fn test_write_summary() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("reports").join("summary.txt");

        write_summary(&path, &sample(), ExportFormat::Text).await?;

        let content = fs::read_to_string(&path).await?;
        assert!(content.contains("Quad9 - 9.9.9.9 -> Timeout"));
        Ok(())
    }
}
