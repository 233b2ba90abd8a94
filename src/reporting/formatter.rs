use crate::models::{Category, ConsolidatedReport, Finding, Severity, SeverityCounts, VerdictSource};
use crate::utils::formatting::format_duration;

pub fn format_finding_markdown(finding: &Finding) -> String {
    let mut out = format!(
        "### {} {}\n\n**Severity:** {}  \n**Reported by:** {}  \n**Verified:** {}\n",
        finding.id,
        finding.title,
        finding.severity,
        finding.corroborated_by.join(", "),
        if finding.verified { "yes" } else { "no" },
    );
    if let Some(reference) = &finding.code_reference {
        out.push_str(&format!("**Location:** `{}`\n", reference));
    }
    if !finding.description.is_empty() {
        out.push_str(&format!("\n{}\n", finding.description));
    }
    if !finding.impact.is_empty() {
        out.push_str(&format!("\n**Impact:** {}\n", finding.impact));
    }
    if !finding.recommendation.is_empty() {
        out.push_str(&format!("\n**Recommendation:** {}\n", finding.recommendation));
    }
    if let Some(note) = &finding.analysis_note {
        out.push_str(&format!("\n> {}\n", note));
    }
    out
}

pub fn format_severity_table(counts: &SeverityCounts) -> String {
    let mut out = String::from("| Severity | Count |\n|---|---|\n");
    for severity in Severity::ALL {
        out.push_str(&format!("| {} | {} |\n", severity, counts.get(severity)));
    }
    out.push_str(&format!("| **Total** | **{}** |\n", counts.total()));
    out
}

fn category_heading(category: Category) -> &'static str {
    match category {
        Category::Security => "Security Findings",
        Category::Gas => "Gas Optimizations",
        Category::Quality => "Code Quality",
    }
}

/// Full Markdown rendering of a report.
pub fn render_markdown(report: &ConsolidatedReport) -> String {
    let meta = &report.metadata;
    let mut out = format!("# Smart Contract Audit: {}\n\n", meta.contract_name);
    out.push_str(&format!("- Audit ID: {}\n", meta.audit_id));
    out.push_str(&format!("- Tier: {}\n", meta.tier));
    out.push_str(&format!("- Assessment Date: {}\n", meta.completed_at.format("%Y-%m-%d %H:%M UTC")));
    out.push_str(&format!("- Engine: {}\n", meta.engine_version));
    let verification = match &meta.verdict_source {
        VerdictSource::Supervisor { strategy, .. } => format!("supervisor {} ({} reply)", meta.supervisor, strategy),
        VerdictSource::LocalConsensus => "local consensus (supervisor unavailable)".to_string(),
        VerdictSource::HeuristicOnly => "source heuristics only".to_string(),
    };
    out.push_str(&format!("- Verification: {}\n", verification));
    if meta.low_confidence {
        out.push_str("\n> **Low confidence:** agent replies were missing or poorly structured. Treat these results as indicative only.\n");
    }

    out.push_str("\n## Executive Summary\n\n");
    out.push_str(&report.executive_summary);
    out.push_str("\n\n");
    out.push_str(&format!(
        "| Score | Value |\n|---|---|\n| Security | {} |\n| Gas | {} |\n| Quality | {} |\n| **Overall** | **{}** |\n\n",
        report.scores.security, report.scores.gas, report.scores.quality, report.scores.overall
    ));
    out.push_str(&format!("**Risk level:** {}  \n**Deployment:** {}\n\n", report.risk_level, report.deployment_recommendation.describe()));
    out.push_str(&format_severity_table(&report.statistics.by_severity));

    for (category, findings) in &report.findings_by_category {
        out.push_str(&format!("\n## {}\n\n", category_heading(*category)));
        if findings.is_empty() {
            out.push_str("No findings.\n");
            continue;
        }
        for finding in findings {
            out.push_str(&format_finding_markdown(finding));
            out.push_str("\n---\n\n");
        }
    }

    if !report.false_positives.is_empty() {
        out.push_str("\n## Dismissed as False Positives\n\n");
        for fp in &report.false_positives {
            out.push_str(&format!("- {} {} ({})\n", fp.id, fp.title, fp.reported_by));
        }
    }

    if !meta.omitted_sections.is_empty() {
        out.push_str("\n## Scope Notes\n\nOmitted from analysis to fit the token budget:\n\n");
        for section in &meta.omitted_sections {
            out.push_str(&format!("- {}\n", section));
        }
    }

    out.push_str("\n## Agents\n\n| Agent | Status | Parse | Confidence | Findings | Time |\n|---|---|---|---|---|---|\n");
    for agent in &meta.agents {
        let status = match &agent.error {
            None => "ok".to_string(),
            Some(e) => format!("failed: {}", e.replace('|', "/")),
        };
        out.push_str(&format!(
            "| {} | {} | {} | {:.2} | {} | {} |\n",
            agent.display_name,
            status,
            agent.parse_strategy,
            agent.confidence,
            agent.findings,
            format_duration(agent.elapsed_ms),
        ));
    }
    out
}
