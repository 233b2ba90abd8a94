use std::sync::Arc;

use async_trait::async_trait;
use quorum::agents::{AgentRegistry, AgentSpec, Tier};
use quorum::errors::{QuorumError, RetryConfig};
use quorum::pipeline::{AnalysisTransport, AuditPipeline, PipelineSettings};
use quorum::prompts::PromptBuilder;
use quorum::sink::file::load_report;
use quorum::sink::{FileReportSink, OutputFormat};
use tempfile::TempDir;

const SOURCE: &str = "pragma solidity ^0.8.0;\n\ncontract Bank {\n    function withdraw() external {\n        (bool ok, ) = msg.sender.call{value: 1}(\"\");\n    }\n}\n";

/// Every agent reports the same reentrancy issue; the supervisor confirms it.
struct Agreeing;

#[async_trait]
impl AnalysisTransport for Agreeing {
    async fn call(&self, agent: &AgentSpec, _prompt: &str, _system: &str) -> Result<String, QuorumError> {
        if agent.is_supervisor() {
            return Ok(r#"{"verified_findings": [{"title": "Reentrancy in withdraw", "severity": "HIGH",
                "category": "security", "reported_by": ["deepseek-chat", "llama-70b"]}],
                "gas_optimizations": [], "risk_level": "HIGH"}"#
                .to_string());
        }
        Ok(r#"{"security_findings": [{"title": "Reentrancy in withdraw", "severity": "HIGH"}],
               "gas_optimizations": [{"title": "Cache storage reads", "severity": "LOW"}]}"#
            .to_string())
    }
}

fn pipeline() -> AuditPipeline {
    let mut settings = PipelineSettings::default();
    settings.dispatch.retry = RetryConfig { max_retries: 0 };
    AuditPipeline::new(
        Arc::new(AgentRegistry::builtin()),
        Arc::new(PromptBuilder::builtin().unwrap()),
        Arc::new(Agreeing),
        settings,
    )
}

#[tokio::test]
async fn test_persisted_report_round_trips() {
    let dir = TempDir::new().unwrap();
    let sink = FileReportSink::new(dir.path(), OutputFormat::Both);
    let report = pipeline()
        .with_sink(Arc::new(sink.clone()))
        .run_audit(SOURCE, "Bank", Tier::Free)
        .await
        .unwrap();

    let report_dir = sink.report_dir(&report.metadata.audit_id);
    assert!(report_dir.join("report.md").exists());

    let loaded = load_report(&report_dir.join("report.json")).await.unwrap();
    assert_eq!(loaded.metadata.audit_id, report.metadata.audit_id);
    assert_eq!(loaded.metadata.contract_name, "Bank");
    assert_eq!(loaded.scores, report.scores);
    assert_eq!(loaded.risk_level, report.risk_level);
    assert_eq!(loaded.statistics.total_findings, report.statistics.total_findings);
    assert_eq!(loaded.agent_results.len(), report.agent_results.len());
    assert!(loaded.metadata.supervisor_verified);

    let markdown = std::fs::read_to_string(report_dir.join("report.md")).unwrap();
    assert!(markdown.contains("Smart Contract Audit: Bank"));
    assert!(markdown.contains("Reentrancy in withdraw"));
}

#[tokio::test]
async fn test_json_only_sink_skips_markdown() {
    let dir = TempDir::new().unwrap();
    let sink = FileReportSink::new(dir.path(), OutputFormat::Json);
    let report = pipeline()
        .with_sink(Arc::new(sink.clone()))
        .run_audit(SOURCE, "Bank", Tier::Free)
        .await
        .unwrap();

    let report_dir = sink.report_dir(&report.metadata.audit_id);
    assert!(report_dir.join("report.json").exists());
    assert!(!report_dir.join("report.md").exists());
}

#[tokio::test]
async fn test_persistence_failure_still_returns_report() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "occupied").unwrap();
    let sink = FileReportSink::new(&blocker, OutputFormat::Both);

    let report = pipeline()
        .with_sink(Arc::new(sink))
        .run_audit(SOURCE, "Bank", Tier::Free)
        .await
        .unwrap();

    assert_eq!(report.metadata.contract_name, "Bank");
    assert!(report.statistics.total_findings >= 1);
}

#[tokio::test]
async fn test_load_report_rejects_garbage() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.json");
    std::fs::write(&path, "not json").unwrap();
    assert!(matches!(load_report(&path).await, Err(QuorumError::Json(_))));
}
