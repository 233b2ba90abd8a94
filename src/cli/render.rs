use console::style;

use crate::models::{ConsolidatedReport, Finding, RiskLevel, Severity};

pub fn render_severity_badge(severity: Severity) -> String {
    let label = format!("[{}]", severity.as_str());
    match severity {
        Severity::Critical => style(label).red().bold().to_string(),
        Severity::High => style(label).red().to_string(),
        Severity::Medium => style(label).yellow().to_string(),
        Severity::Low => style(label).blue().to_string(),
        Severity::Info => style(label).dim().to_string(),
    }
}

fn render_risk(risk: RiskLevel) -> String {
    match risk {
        RiskLevel::Critical => style(risk.as_str()).red().bold().to_string(),
        RiskLevel::High => style(risk.as_str()).red().to_string(),
        RiskLevel::Medium => style(risk.as_str()).yellow().to_string(),
        RiskLevel::Low => style(risk.as_str()).green().to_string(),
    }
}

fn render_finding(finding: &Finding) -> String {
    let mark = if finding.verified { style("✓").green() } else { style("?").dim() };
    let mut line = format!(
        "  {} {} {} {}",
        mark,
        style(&finding.id).dim(),
        render_severity_badge(finding.severity),
        finding.title,
    );
    if let Some(reference) = &finding.code_reference {
        line.push_str(&format!(" {}", style(format!("({})", reference)).dim()));
    }
    line
}

/// Terminal summary of a finished audit.
pub fn render_summary(report: &ConsolidatedReport) -> String {
    let meta = &report.metadata;
    let mut out = format!(
        "\n{} {} {}\n",
        style("▶").green().bold(),
        style(&meta.contract_name).white().bold(),
        style(format!("({} tier, audit {})", meta.tier, meta.audit_id)).dim(),
    );
    out.push_str(&format!(
        "\n  Score     {}/100  (security {}, gas {}, quality {})\n",
        style(report.scores.overall).bold(),
        report.scores.security,
        report.scores.gas,
        report.scores.quality,
    ));
    out.push_str(&format!("  Risk      {}\n", render_risk(report.risk_level)));
    out.push_str(&format!("  Verdict   {}\n", report.deployment_recommendation.describe()));
    out.push_str(&format!(
        "  Agents    {}/{} succeeded, {}\n",
        meta.agents_succeeded,
        meta.agents.len(),
        if meta.supervisor_verified {
            style("supervisor verified").green().to_string()
        } else {
            style("not supervisor verified").yellow().to_string()
        },
    ));
    if meta.low_confidence {
        out.push_str(&format!(
            "  {} Low confidence result, review manually\n",
            style("⚠").yellow().bold()
        ));
    }

    for (category, findings) in &report.findings_by_category {
        if findings.is_empty() {
            continue;
        }
        out.push_str(&format!("\n{}\n", style(category.as_str().to_uppercase()).cyan().bold()));
        for finding in findings {
            out.push_str(&render_finding(finding));
            out.push('\n');
        }
    }
    if !report.false_positives.is_empty() {
        out.push_str(&format!(
            "\n{}\n",
            style(format!("{} dismissed as false positives", report.false_positives.len())).dim()
        ));
    }
    out
}
