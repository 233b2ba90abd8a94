use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use crate::agents::{AgentSpec, Tier};
use crate::models::{
    normalize_title, AgentRunSummary, Category, ConsolidatedReport, Finding, ParsedResult, ReportMetadata,
    ReportStatistics, Scores, Severity, SeverityCounts, SupervisorVerdict, VerdictSource,
};
use crate::pipeline::state::AuditStage;
use crate::utils::formatting::pluralize;

/// Mean confidence of successful agents below which a report is flagged.
pub const LOW_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Everything about the run the report needs besides results and verdict.
#[derive(Debug, Clone)]
pub struct ConsolidationContext {
    pub audit_id: String,
    pub contract_name: String,
    pub tier: Tier,
    pub agents: Vec<AgentSpec>,
    pub supervisor: AgentSpec,
    /// The supervisor's own normalized reply, if it was called.
    pub supervisor_result: Option<ParsedResult>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub stages: Vec<AuditStage>,
    pub omitted_sections: Vec<String>,
}

pub fn engine_version() -> String {
    match option_env!("GIT_HASH") {
        Some(hash) => format!("{} ({})", env!("CARGO_PKG_VERSION"), hash),
        None => env!("CARGO_PKG_VERSION").to_string(),
    }
}

/// Merge agent results and the verdict into the final report. Pure: the same
/// inputs always produce the same report.
pub fn consolidate(
    results: &[ParsedResult],
    verdict: &SupervisorVerdict,
    ctx: &ConsolidationContext,
) -> ConsolidatedReport {
    let mut results: Vec<ParsedResult> = results.to_vec();
    results.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));

    let findings_by_category = bucket(&verdict.verified_findings);
    let false_positives = number_sequentially(&verdict.false_positives, "FP");
    let statistics = statistics(&findings_by_category, false_positives.len());

    let agents: Vec<AgentRunSummary> = results.iter().map(|r| run_summary(r, &ctx.agents)).collect();
    let agents_succeeded = results.iter().filter(|r| r.succeeded()).count();
    let all_agents_failed = agents_succeeded == 0;
    let low_confidence = all_agents_failed
        || verdict.source == VerdictSource::HeuristicOnly
        || mean_confidence(&results) < LOW_CONFIDENCE_THRESHOLD;

    let scores = Scores {
        security: verdict.scores.security.min(100),
        gas: verdict.scores.gas.min(100),
        quality: verdict.scores.quality.min(100),
        overall: verdict.scores.overall.min(100),
    };

    let executive_summary = executive_summary(ctx, verdict, &statistics, scores.overall, agents_succeeded, results.len());

    let mut agent_results = results;
    if let Some(sup) = &ctx.supervisor_result {
        agent_results.push(sup.clone());
    }

    ConsolidatedReport {
        metadata: ReportMetadata {
            audit_id: ctx.audit_id.clone(),
            contract_name: ctx.contract_name.clone(),
            tier: ctx.tier,
            started_at: ctx.started_at,
            completed_at: ctx.completed_at,
            agents,
            agents_succeeded,
            supervisor: ctx.supervisor.display_name.clone(),
            supervisor_id: ctx.supervisor.id.clone(),
            supervisor_verified: verdict.supervisor_verified(),
            verdict_source: verdict.source.clone(),
            all_agents_failed,
            low_confidence,
            stages: ctx.stages.clone(),
            omitted_sections: ctx.omitted_sections.clone(),
            engine_version: engine_version(),
        },
        executive_summary,
        scores,
        risk_level: verdict.risk_level,
        deployment_recommendation: verdict.deployment_recommendation,
        findings_by_category,
        statistics,
        false_positives,
        agent_results,
    }
}

/// Split findings into the three category buckets (always all present) and
/// assign ids such as `SEC-01` in severity order.
fn bucket(findings: &[Finding]) -> BTreeMap<Category, Vec<Finding>> {
    let mut sorted: Vec<Finding> = findings.to_vec();
    sorted.sort_by(|a, b| {
        a.severity
            .cmp(&b.severity)
            .then_with(|| normalize_title(&a.title).cmp(&normalize_title(&b.title)))
            .then_with(|| a.reported_by.cmp(&b.reported_by))
    });

    let mut buckets: BTreeMap<Category, Vec<Finding>> = Category::ALL.iter().map(|c| (*c, Vec::new())).collect();
    for finding in sorted {
        let bucket = buckets.entry(finding.category).or_default();
        let mut finding = finding;
        finding.id = format!("{}-{:02}", finding.category.id_prefix(), bucket.len() + 1);
        bucket.push(finding);
    }
    buckets
}

fn number_sequentially(findings: &[Finding], prefix: &str) -> Vec<Finding> {
    findings
        .iter()
        .enumerate()
        .map(|(i, f)| {
            let mut f = f.clone();
            f.id = format!("{}-{:02}", prefix, i + 1);
            f
        })
        .collect()
}

fn statistics(buckets: &BTreeMap<Category, Vec<Finding>>, false_positives: usize) -> ReportStatistics {
    let mut stats = ReportStatistics {
        false_positives,
        ..Default::default()
    };
    for (category, findings) in buckets {
        let mut counts = SeverityCounts::default();
        for finding in findings {
            counts.record(finding.severity);
            stats.by_severity.record(finding.severity);
            if finding.verified {
                stats.verified_findings += 1;
            } else {
                stats.unverified_findings += 1;
            }
        }
        stats.total_findings += findings.len();
        stats.by_category.insert(*category, counts);
    }
    stats
}

fn run_summary(result: &ParsedResult, specs: &[AgentSpec]) -> AgentRunSummary {
    let display_name = specs
        .iter()
        .find(|s| s.id == result.agent_id)
        .map(|s| s.display_name.clone())
        .unwrap_or_else(|| result.agent_id.clone());
    AgentRunSummary {
        agent_id: result.agent_id.clone(),
        display_name,
        succeeded: result.succeeded(),
        parse_strategy: result.parse_strategy,
        confidence: result.confidence,
        findings: result.findings.len(),
        elapsed_ms: result.elapsed_ms,
        error: result.error.as_ref().map(|e| e.to_string()),
    }
}

fn mean_confidence(results: &[ParsedResult]) -> f32 {
    let succeeded: Vec<f32> = results.iter().filter(|r| r.succeeded()).map(|r| r.confidence).collect();
    if succeeded.is_empty() {
        return 0.0;
    }
    succeeded.iter().sum::<f32>() / succeeded.len() as f32
}

fn executive_summary(
    ctx: &ConsolidationContext,
    verdict: &SupervisorVerdict,
    stats: &ReportStatistics,
    overall: u8,
    agents_succeeded: usize,
    agents_total: usize,
) -> String {
    let breakdown: Vec<String> = Severity::ALL
        .iter()
        .filter_map(|s| {
            let n = stats.by_severity.get(*s);
            (n > 0).then(|| format!("{} {}", n, s.as_str().to_lowercase()))
        })
        .collect();
    let found = if breakdown.is_empty() {
        "no findings".to_string()
    } else {
        format!("{} ({})", pluralize(stats.total_findings, "finding"), breakdown.join(", "))
    };

    let basis = match &verdict.source {
        VerdictSource::Supervisor { .. } => format!("verified by {}", ctx.supervisor.display_name),
        VerdictSource::LocalConsensus => "cross-checked by local consensus; supervisor verification unavailable".to_string(),
        VerdictSource::HeuristicOnly => "inferred from source heuristics only; no model analysis succeeded".to_string(),
    };

    let mut summary = format!(
        "{} ({} tier) was analyzed by {} of {} agents with {}, {}. Overall risk is {} with a score of {}/100. {}.",
        ctx.contract_name,
        ctx.tier,
        agents_succeeded,
        agents_total,
        found,
        basis,
        verdict.risk_level,
        overall,
        verdict.deployment_recommendation.describe(),
    );
    if let Some(notes) = verdict.summary.as_deref().filter(|s| !s.trim().is_empty()) {
        summary.push_str("\n\n");
        summary.push_str(notes.trim());
    }
    summary
}
