use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use crate::errors::QuorumError;
use crate::models::ConsolidatedReport;
use crate::reporting::render_markdown;
use super::ReportSink;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    Json,
    Markdown,
    #[default]
    Both,
}

impl FromStr for OutputFormat {
    type Err = QuorumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "markdown" | "md" => Ok(Self::Markdown),
            "both" | "all" => Ok(Self::Both),
            other => Err(QuorumError::Config(format!("Unknown output format: {}", other))),
        }
    }
}

/// Writes `<dir>/<audit_id>/report.json` and `report.md`.
#[derive(Debug, Clone)]
pub struct FileReportSink {
    output_dir: PathBuf,
    format: OutputFormat,
}

impl FileReportSink {
    pub fn new(output_dir: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self { output_dir: output_dir.into(), format }
    }

    pub fn report_dir(&self, audit_id: &str) -> PathBuf {
        self.output_dir.join(audit_id)
    }

    async fn write(path: &Path, content: &str) -> Result<(), QuorumError> {
        tokio::fs::write(path, content)
            .await
            .map_err(|e| QuorumError::Persist(format!("Failed to write {}: {}", path.display(), e)))
    }
}

#[async_trait]
impl ReportSink for FileReportSink {
    async fn persist(&self, report: &ConsolidatedReport) -> Result<String, QuorumError> {
        let audit_id = &report.metadata.audit_id;
        let dir = self.report_dir(audit_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| QuorumError::Persist(format!("Failed to create {}: {}", dir.display(), e)))?;

        if matches!(self.format, OutputFormat::Json | OutputFormat::Both) {
            let json = serde_json::to_string_pretty(report)?;
            Self::write(&dir.join("report.json"), &json).await?;
        }
        if matches!(self.format, OutputFormat::Markdown | OutputFormat::Both) {
            Self::write(&dir.join("report.md"), &render_markdown(report)).await?;
        }

        info!(audit_id = %audit_id, dir = %dir.display(), "Report persisted");
        Ok(audit_id.clone())
    }
}

/// Load a previously persisted JSON report.
pub async fn load_report(path: &Path) -> Result<ConsolidatedReport, QuorumError> {
    let json = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert!("pdf".parse::<OutputFormat>().is_err());
    }
}
