pub mod file;

use async_trait::async_trait;
use crate::errors::QuorumError;
use crate::models::ConsolidatedReport;

pub use file::{FileReportSink, OutputFormat};

/// Destination for finished reports. Returns an identifier for the stored copy.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn persist(&self, report: &ConsolidatedReport) -> Result<String, QuorumError>;
}
