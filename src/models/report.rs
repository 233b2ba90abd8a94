use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use super::finding::{Category, Finding, Severity};
use super::parsed::{ParseStrategy, ParsedResult};
use super::verdict::{DeploymentRecommendation, RiskLevel, Scores, VerdictSource};
use crate::agents::Tier;
use crate::pipeline::state::AuditStage;

/// Per-agent provenance line in the report metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRunSummary {
    pub agent_id: String,
    pub display_name: String,
    pub succeeded: bool,
    pub parse_strategy: ParseStrategy,
    pub confidence: f32,
    pub findings: usize,
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub audit_id: String,
    pub contract_name: String,
    pub tier: Tier,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub agents: Vec<AgentRunSummary>,
    pub agents_succeeded: usize,
    pub supervisor: String,
    pub supervisor_id: String,
    pub supervisor_verified: bool,
    pub verdict_source: VerdictSource,
    pub all_agents_failed: bool,
    pub low_confidence: bool,
    pub stages: Vec<AuditStage>,
    /// Source sections left out of the prompt to fit the budget.
    #[serde(default)]
    pub omitted_sections: Vec<String>,
    pub engine_version: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl SeverityCounts {
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
            Severity::Info => self.info += 1,
        }
    }

    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
            Severity::Info => self.info,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.info
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportStatistics {
    pub total_findings: usize,
    pub verified_findings: usize,
    pub unverified_findings: usize,
    pub false_positives: usize,
    pub by_severity: SeverityCounts,
    pub by_category: BTreeMap<Category, SeverityCounts>,
}

/// Terminal artifact of an audit. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedReport {
    pub metadata: ReportMetadata,
    pub executive_summary: String,
    pub scores: Scores,
    pub risk_level: RiskLevel,
    pub deployment_recommendation: DeploymentRecommendation,
    pub findings_by_category: BTreeMap<Category, Vec<Finding>>,
    pub statistics: ReportStatistics,
    pub false_positives: Vec<Finding>,
    /// Every agent's normalized reply, kept for transparency.
    pub agent_results: Vec<ParsedResult>,
}

impl ConsolidatedReport {
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.findings_by_category.values().flatten()
    }

    pub fn findings_in(&self, category: Category) -> &[Finding] {
        self.findings_by_category
            .get(&category)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Which parse stage each agent's reply needed, for diagnostics.
    pub fn provenance(&self) -> Vec<(&str, ParseStrategy, f32)> {
        self.agent_results
            .iter()
            .map(|r| (r.agent_id.as_str(), r.parse_strategy, r.confidence))
            .collect()
    }

    pub fn agent_result(&self, agent_id: &str) -> Option<&ParsedResult> {
        self.agent_results.iter().find(|r| r.agent_id == agent_id)
    }
}
