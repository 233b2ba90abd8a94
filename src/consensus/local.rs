use std::collections::{BTreeMap, BTreeSet};

use crate::models::{
    Category, DeploymentRecommendation, Finding, ParsedResult, RiskLevel, Severity, SupervisorVerdict, VerdictSource,
};
use super::scoring::ScoringPolicy;
use tracing::debug;

pub const UNCORROBORATED_NOTE: &str = "reported by a single agent; not independently confirmed";

/// Verdict computed without a supervisor model.
///
/// Findings are grouped by category and normalized title. A group reported by
/// two or more distinct agents is confirmed and keeps its most severe
/// contributor's finding; a single-contributor group is kept unverified. Only
/// confirmed findings count towards the score.
pub fn local_consensus(results: &[ParsedResult], policy: &ScoringPolicy) -> SupervisorVerdict {
    let mut groups: BTreeMap<(Category, String), Vec<&Finding>> = BTreeMap::new();
    for result in results.iter().filter(|r| r.succeeded()) {
        for finding in &result.findings {
            groups.entry(finding.dedup_key()).or_default().push(finding);
        }
    }

    let mut confirmed = Vec::new();
    let mut unconfirmed = Vec::new();
    for (_, members) in groups {
        let agents: BTreeSet<&str> = members
            .iter()
            .flat_map(|f| std::iter::once(f.reported_by.as_str()).chain(f.corroborated_by.iter().map(String::as_str)))
            .collect();
        // Ties on severity keep the first contributor, which is stable because results are sorted.
        let Some(lead) = members.iter().min_by_key(|f| f.severity) else {
            continue;
        };
        let mut finding = (*lead).clone();
        finding.corroborated_by = agents.iter().map(|a| a.to_string()).collect();
        if agents.len() >= 2 {
            finding.verified = true;
            confirmed.push(finding);
        } else {
            finding.verified = false;
            finding.append_note(UNCORROBORATED_NOTE);
            unconfirmed.push(finding);
        }
    }

    let scores = policy.scores(&confirmed);
    let risk_level = consensus_risk(&confirmed, &unconfirmed);
    debug!(
        confirmed = confirmed.len(),
        unconfirmed = unconfirmed.len(),
        overall = scores.overall,
        "Local consensus computed"
    );

    let mut findings = confirmed;
    findings.extend(unconfirmed);
    findings.sort_by(|a, b| {
        a.severity
            .cmp(&b.severity)
            .then(b.verified.cmp(&a.verified))
            .then(a.category.cmp(&b.category))
            .then(a.title.cmp(&b.title))
    });

    SupervisorVerdict {
        verified_findings: findings,
        false_positives: Vec::new(),
        scores,
        risk_level,
        deployment_recommendation: DeploymentRecommendation::for_risk(risk_level),
        summary: None,
        source: VerdictSource::LocalConsensus,
    }
}

/// Risk follows confirmed findings; an uncorroborated CRITICAL or HIGH still
/// raises it to at least MEDIUM.
fn consensus_risk(confirmed: &[Finding], unconfirmed: &[Finding]) -> RiskLevel {
    let risk = RiskLevel::from_findings(confirmed);
    let serious_unconfirmed = unconfirmed.iter().any(|f| f.severity <= Severity::High);
    if serious_unconfirmed && risk < RiskLevel::Medium {
        RiskLevel::Medium
    } else {
        risk
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ParseStrategy, Scores};

    fn finding(agent: &str, title: &str, severity: Severity) -> Finding {
        Finding {
            id: format!("{}#1", agent),
            severity,
            category: Category::Security,
            title: title.to_string(),
            description: format!("{} says so", agent),
            impact: String::new(),
            recommendation: String::new(),
            code_reference: None,
            reported_by: agent.to_string(),
            corroborated_by: vec![agent.to_string()],
            verified: false,
            analysis_note: None,
        }
    }

    fn result(agent: &str, findings: Vec<Finding>) -> ParsedResult {
        ParsedResult {
            agent_id: agent.to_string(),
            findings,
            false_positives: Vec::new(),
            scores: Scores::default(),
            scores_reported: false,
            parse_strategy: ParseStrategy::Direct,
            confidence: 1.0,
            summary: None,
            risk_level: None,
            deployment_recommendation: None,
            notes: Vec::new(),
            error: None,
            elapsed_ms: 10,
        }
    }

    #[test]
    fn test_title_variants_collapse_into_confirmed_finding() {
        let results = vec![
            result("a", vec![finding("a", "Reentrancy in withdraw()", Severity::High)]),
            result("b", vec![finding("b", "reentrancy in withdraw", Severity::Critical)]),
        ];
        let verdict = local_consensus(&results, &ScoringPolicy::default());
        assert_eq!(verdict.verified_findings.len(), 1);
        let merged = &verdict.verified_findings[0];
        assert!(merged.verified);
        assert_eq!(merged.severity, Severity::Critical);
        assert_eq!(merged.reported_by, "b");
        assert_eq!(merged.corroborated_by, vec!["a", "b"]);
        assert_eq!(verdict.scores.overall, 70);
        assert_eq!(verdict.source, VerdictSource::LocalConsensus);
    }

    #[test]
    fn test_three_agents_one_critical() {
        let results: Vec<ParsedResult> = ["a", "b", "c"]
            .iter()
            .map(|a| result(a, vec![finding(a, "Missing access control", Severity::Critical)]))
            .collect();
        let verdict = local_consensus(&results, &ScoringPolicy::default());
        assert_eq!(verdict.verified_findings.len(), 1);
        assert_eq!(verdict.scores.overall, 70);
        assert_eq!(verdict.risk_level, RiskLevel::Critical);
        assert_eq!(verdict.deployment_recommendation, DeploymentRecommendation::DoNotDeploy);
    }

    #[test]
    fn test_single_contributor_is_demoted_not_scored() {
        let results = vec![
            result("a", vec![finding("a", "Oracle manipulation", Severity::Critical)]),
            result("b", vec![]),
        ];
        let verdict = local_consensus(&results, &ScoringPolicy::default());
        let kept = &verdict.verified_findings[0];
        assert!(!kept.verified);
        assert_eq!(kept.analysis_note.as_deref(), Some(UNCORROBORATED_NOTE));
        assert_eq!(verdict.scores.overall, 100);
        assert_eq!(verdict.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_same_agent_twice_is_not_corroboration() {
        let results = vec![result("a", vec![
            finding("a", "Unchecked call", Severity::Medium),
            finding("a", "unchecked call", Severity::Medium),
        ])];
        let verdict = local_consensus(&results, &ScoringPolicy::default());
        assert_eq!(verdict.verified_findings.len(), 1);
        assert!(!verdict.verified_findings[0].verified);
    }

    #[test]
    fn test_failed_results_are_ignored() {
        let mut failed = result("a", vec![finding("a", "Ghost", Severity::High)]);
        failed.error = Some(crate::models::TransportFailure::new(crate::models::FailureKind::Timeout, "late"));
        let verdict = local_consensus(&[failed], &ScoringPolicy::default());
        assert!(verdict.verified_findings.is_empty());
        assert_eq!(verdict.risk_level, RiskLevel::Low);
    }
}
