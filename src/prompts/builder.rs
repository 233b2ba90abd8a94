use serde_json::json;
use tracing::{debug, info};

use super::loader::{PromptLoader, PromptVariables};
use super::sections::{split_sections, SourceSection};
use crate::agents::{AgentSpec, TierPolicy};
use crate::errors::{InputError, QuorumError};
use crate::models::{AnalysisRequest, ParsedResult, PromptVariant};
use crate::utils::truncation::{estimate_tokens, tokens_to_chars, truncate_with_marker};

/// Smallest source allowance worth sending to a model.
pub const MIN_SOURCE_TOKENS: usize = 256;
/// Held back from the source allowance for the omitted-sections summary.
const SUMMARY_RESERVE_TOKENS: usize = 64;
/// Room left for the truncation marker itself.
const MARKER_RESERVE_CHARS: usize = 96;
const MAX_OMITTED_LISTED: usize = 12;
const MAX_FINDING_DESCRIPTION: usize = 400;

/// Source text trimmed to a token allowance.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSource {
    pub text: String,
    /// Labels of sections left out, with their kind and size.
    pub omitted: Vec<String>,
    pub truncated: bool,
}

impl PreparedSource {
    /// Note listing omitted sections, never longer than the tokens reserved for it.
    /// Labels that do not fit are counted in a trailing "and N more".
    fn summary(&self) -> Option<String> {
        if self.omitted.is_empty() {
            return None;
        }
        const PREFIX: &str = "Note: omitted from the source above to fit the analysis budget: ";
        let limit = tokens_to_chars(SUMMARY_RESERVE_TOKENS);
        let more_room = format!("; and {} more.", self.omitted.len()).len();

        let mut listed: Vec<&str> = Vec::new();
        let mut chars = PREFIX.len();
        for (i, label) in self.omitted.iter().take(MAX_OMITTED_LISTED).enumerate() {
            let last = i + 1 == self.omitted.len();
            let needed = label.chars().count() + 2 + if last { 0 } else { more_room };
            if chars + needed > limit {
                break;
            }
            chars += label.chars().count() + 2;
            listed.push(label.as_str());
        }

        let extra = self.omitted.len() - listed.len();
        let more = format!("and {} more", extra);
        if extra > 0 {
            listed.push(&more);
        }
        Some(format!("{}{}.", PREFIX, listed.join("; ")))
    }
}

/// Keep the highest-priority sections that fit in `allowance_tokens`. The whole
/// source is returned untouched when it already fits; when not even the
/// top-priority section fits, that section is truncated with a visible marker.
pub fn fit_source(source: &str, contract_name: &str, allowance_tokens: usize) -> PreparedSource {
    if estimate_tokens(source) <= allowance_tokens {
        return PreparedSource { text: source.to_string(), omitted: Vec::new(), truncated: false };
    }

    let sections = split_sections(source);
    let mut order: Vec<&SourceSection> = sections.iter().collect();
    order.sort_by_key(|s| (s.priority(contract_name), s.index));

    let allowance = allowance_tokens.saturating_sub(SUMMARY_RESERVE_TOKENS);
    let mut kept: Vec<(usize, String)> = Vec::new();
    let mut truncated = false;
    let mut used = 0usize;

    for (rank, section) in order.iter().enumerate() {
        let tokens = section.tokens();
        if used + tokens <= allowance {
            kept.push((section.index, section.text.clone()));
            used += tokens;
        } else if rank == 0 {
            let max_chars = tokens_to_chars(allowance).saturating_sub(MARKER_RESERVE_CHARS);
            kept.push((section.index, truncate_with_marker(&section.text, max_chars)));
            truncated = true;
            break;
        }
    }

    let kept_indices: Vec<usize> = kept.iter().map(|(i, _)| *i).collect();
    let omitted = sections
        .iter()
        .filter(|s| !kept_indices.contains(&s.index))
        .map(|s| format!("{} ({}, ~{} tokens)", s.label(), s.kind.as_str(), s.tokens()))
        .collect();

    kept.sort_by_key(|(i, _)| *i);
    let text = kept.into_iter().map(|(_, t)| t).collect::<Vec<_>>().join("");
    PreparedSource { text, omitted, truncated }
}

/// A rendered prompt plus what was cut to make it fit.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltPrompt {
    pub user: String,
    pub estimated_tokens: usize,
    pub omitted_sections: Vec<String>,
    pub truncated: bool,
}

/// Renders first-stage and supervisor prompts under a tier's token budget.
pub struct PromptBuilder {
    audit_template: String,
    supervisor_template: String,
    auditor_system: String,
    supervisor_system: String,
    loader: PromptLoader,
}

impl PromptBuilder {
    /// Load every template up front so that building prompts cannot fail on I/O.
    pub fn new(loader: PromptLoader) -> Result<Self, QuorumError> {
        Ok(Self {
            audit_template: loader.load_or_builtin("audit")?,
            supervisor_template: loader.load_or_builtin("supervisor")?,
            auditor_system: loader.load_or_builtin("system-auditor")?,
            supervisor_system: loader.load_or_builtin("system-supervisor")?,
            loader,
        })
    }

    pub fn builtin() -> Result<Self, QuorumError> {
        Self::new(PromptLoader::builtin())
    }

    pub fn system_prompt(&self, agent: &AgentSpec) -> String {
        let template = if agent.is_supervisor() { &self.supervisor_system } else { &self.auditor_system };
        let vars = PromptVariables {
            focus: Some(agent.specialty.focus().to_string()),
            ..Default::default()
        };
        self.loader.interpolate(template, &vars)
    }

    fn base_variables(request: &AnalysisRequest, policy: &TierPolicy) -> PromptVariables {
        PromptVariables {
            contract_name: request.contract_name.clone(),
            tier: request.tier.to_string(),
            analysis_depth: policy.analysis_depth.clone(),
            scope: Some(scope_text(request.prompt_variant).to_string()),
            ..Default::default()
        }
    }

    /// First-stage prompt shared by every analysis agent of the tier.
    pub fn build_prompt(&self, request: &AnalysisRequest, policy: &TierPolicy) -> Result<BuiltPrompt, InputError> {
        let mut vars = Self::base_variables(request, policy);
        let fixed = estimate_tokens(&self.loader.interpolate(&self.audit_template, &vars));
        let available = policy.token_budget.saturating_sub(fixed);
        if available < MIN_SOURCE_TOKENS {
            return Err(InputError::InsufficientBudget { available, required: MIN_SOURCE_TOKENS });
        }

        let prepared = fit_source(&request.source_text, &request.contract_name, available);
        if !prepared.omitted.is_empty() || prepared.truncated {
            info!(
                contract = %request.contract_name,
                omitted = prepared.omitted.len(),
                truncated = prepared.truncated,
                "Source trimmed to fit prompt budget"
            );
        }
        vars.omitted_sections = prepared.summary();
        vars.source_code = prepared.text;

        let user = self.loader.interpolate(&self.audit_template, &vars);
        let estimated_tokens = estimate_tokens(&user);
        debug!(tokens = estimated_tokens, budget = policy.token_budget, "Built analysis prompt");
        Ok(BuiltPrompt {
            user,
            estimated_tokens,
            omitted_sections: prepared.omitted,
            truncated: prepared.truncated,
        })
    }

    /// Verification prompt: the source plus every agent's findings. Findings may use
    /// at most half of the space left by the template; the least severe go first.
    pub fn build_supervisor_prompt(
        &self,
        request: &AnalysisRequest,
        policy: &TierPolicy,
        results: &[ParsedResult],
    ) -> Result<BuiltPrompt, InputError> {
        let mut vars = Self::base_variables(request, policy);
        vars.agent_count = Some(results.len().to_string());
        let fixed = estimate_tokens(&self.loader.interpolate(&self.supervisor_template, &vars));
        let remaining = policy.supervisor_token_budget.saturating_sub(fixed);

        let findings = serialize_findings(results, remaining / 2);
        let available = remaining.saturating_sub(estimate_tokens(&findings));
        if available < MIN_SOURCE_TOKENS {
            return Err(InputError::InsufficientBudget { available, required: MIN_SOURCE_TOKENS });
        }

        let prepared = fit_source(&request.source_text, &request.contract_name, available);
        vars.agent_findings = Some(findings);
        vars.omitted_sections = prepared.summary();
        vars.source_code = prepared.text;

        let user = self.loader.interpolate(&self.supervisor_template, &vars);
        Ok(BuiltPrompt {
            estimated_tokens: estimate_tokens(&user),
            user,
            omitted_sections: prepared.omitted,
            truncated: prepared.truncated,
        })
    }
}

fn scope_text(variant: PromptVariant) -> &'static str {
    match variant {
        PromptVariant::Full => {
            "Identify security vulnerabilities, gas optimizations and code quality issues. \
             Report each issue once, in the most fitting category."
        }
        PromptVariant::SecurityFocused => {
            "Focus exclusively on security vulnerabilities. \
             Leave gas_optimizations and code_quality as empty arrays."
        }
    }
}

/// Compact JSON listing of agent findings, most severe first, cut from the
/// least severe end until it fits `max_tokens`.
fn serialize_findings(results: &[ParsedResult], max_tokens: usize) -> String {
    let auditors: Vec<serde_json::Value> = results
        .iter()
        .map(|r| {
            json!({
                "id": r.agent_id,
                "status": if r.succeeded() { "ok" } else { "failed" },
                "findings": r.findings.len(),
            })
        })
        .collect();

    let mut entries: Vec<(&str, &crate::models::Finding)> = results
        .iter()
        .flat_map(|r| r.findings.iter().map(move |f| (r.agent_id.as_str(), f)))
        .collect();
    entries.sort_by(|a, b| {
        a.1.severity
            .cmp(&b.1.severity)
            .then_with(|| a.0.cmp(b.0))
            .then_with(|| a.1.title.cmp(&b.1.title))
    });

    let findings: Vec<serde_json::Value> = entries
        .iter()
        .map(|(agent, f)| {
            json!({
                "agent": agent,
                "severity": f.severity,
                "category": f.category,
                "title": f.title,
                "description": clip_description(&f.description),
                "code_reference": f.code_reference,
            })
        })
        .collect();

    // Envelope plus one separator per entry; sizes are estimated once
    let mut used = estimate_tokens(&json!({ "auditors": auditors, "findings": [] }).to_string());
    let mut kept = 0;
    for entry in &findings {
        let cost = estimate_tokens(&entry.to_string()) + 1;
        if used + cost > max_tokens {
            break;
        }
        used += cost;
        kept += 1;
    }

    let dropped = findings.len() - kept;
    let rendered = json!({ "auditors": auditors, "findings": &findings[..kept] }).to_string();
    if dropped > 0 {
        debug!(dropped, "Dropped low-severity findings from supervisor prompt");
        return format!("{}\n({} lower-severity findings omitted for length)", rendered, dropped);
    }
    rendered
}

fn clip_description(text: &str) -> String {
    if text.chars().count() <= MAX_FINDING_DESCRIPTION {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(MAX_FINDING_DESCRIPTION).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::Tier;
    use crate::models::{Category, Finding, ParseStrategy, Scores, Severity};

    fn request(source: &str) -> AnalysisRequest {
        AnalysisRequest::new(source, "Vault", Tier::Free, PromptVariant::Full).unwrap()
    }

    fn policy(budget: usize) -> TierPolicy {
        TierPolicy { token_budget: budget, supervisor_token_budget: budget, ..TierPolicy::defaults_for(Tier::Free) }
    }

    fn big_contract(name: &str, lines: usize) -> String {
        let mut s = format!("contract {} {{\n    constructor() {{}}\n", name);
        for i in 0..lines {
            s.push_str(&format!("    function f{}() external {{ uint256 x = {}; }}\n", i, i));
        }
        s.push_str("}\n");
        s
    }

    fn finding(title: &str, severity: Severity) -> Finding {
        Finding {
            id: String::new(),
            severity,
            category: Category::Security,
            title: title.into(),
            description: "desc".into(),
            impact: String::new(),
            recommendation: String::new(),
            code_reference: None,
            reported_by: "a".into(),
            corroborated_by: vec![],
            verified: false,
            analysis_note: None,
        }
    }

    #[test]
    fn test_small_source_kept_whole() {
        let builder = PromptBuilder::builtin().unwrap();
        let src = "contract Vault { function withdraw() external {} }";
        let prompt = builder.build_prompt(&request(src), &policy(12_000)).unwrap();
        assert!(prompt.user.contains(src));
        assert!(prompt.omitted_sections.is_empty());
        assert!(!prompt.truncated);
        assert!(prompt.user.contains("Vault"));
    }

    #[test]
    fn test_insufficient_budget() {
        let builder = PromptBuilder::builtin().unwrap();
        let err = builder.build_prompt(&request("contract Vault {}"), &policy(300)).unwrap_err();
        assert!(matches!(err, InputError::InsufficientBudget { required: MIN_SOURCE_TOKENS, .. }));
    }

    #[test]
    fn test_fit_prefers_named_contract() {
        let src = format!(
            "{}{}{}",
            "// File: lib/openzeppelin/Ownable.sol\n".to_string() + &big_contract("Ownable", 40),
            "// File: src/Helper.sol\n".to_string() + &big_contract("Helper", 40),
            "// File: src/Vault.sol\n".to_string() + &big_contract("Vault", 10),
        );
        let prepared = fit_source(&src, "Vault", 700);
        assert!(prepared.text.contains("contract Vault"));
        assert!(!prepared.truncated);
        assert!(prepared.omitted.iter().any(|o| o.contains("Ownable")));
    }

    #[test]
    fn test_fit_truncates_when_nothing_fits() {
        let src = big_contract("Vault", 400);
        let prepared = fit_source(&src, "Vault", 300);
        assert!(prepared.truncated);
        assert!(prepared.text.contains("contract Vault"));
        assert!(prepared.text.contains("truncated"));
        assert!(estimate_tokens(&prepared.text) <= 300);
    }

    #[test]
    fn test_omitted_summary_in_prompt() {
        let builder = PromptBuilder::builtin().unwrap();
        let src = format!(
            "{}{}",
            "// File: src/Vault.sol\n".to_string() + &big_contract("Vault", 10),
            "// File: src/Other.sol\n".to_string() + &big_contract("Other", 200),
        );
        let prompt = builder.build_prompt(&request(&src), &policy(2_500)).unwrap();
        assert!(prompt.user.contains("omitted from the source above"));
        assert_eq!(prompt.omitted_sections.len(), 1);
    }

    #[test]
    fn test_many_omitted_sections_stay_within_budget() {
        let mut src = "// File: src/Vault.sol\n".to_string() + &big_contract("Vault", 10);
        for i in 0..40 {
            src.push_str(&format!("// File: lib/vendor/protocol-dependencies/contracts/token/Dependency{}.sol\n", i));
            src.push_str(&big_contract(&format!("Dependency{}", i), 20));
        }
        let prepared = fit_source(&src, "Vault", 2_000);
        assert!(prepared.omitted.len() > MAX_OMITTED_LISTED);
        let summary = prepared.summary().unwrap();
        assert!(estimate_tokens(&summary) <= SUMMARY_RESERVE_TOKENS);
        assert!(summary.ends_with("more."));

        let builder = PromptBuilder::builtin().unwrap();
        let budget = policy(3_000);
        let prompt = builder.build_prompt(&request(&src), &budget).unwrap();
        assert!(prompt.user.contains("contract Vault"));
        assert!(prompt.estimated_tokens <= budget.token_budget);
    }

    #[test]
    fn test_security_focused_scope() {
        let builder = PromptBuilder::builtin().unwrap();
        let req = AnalysisRequest::new("contract Vault {}", "Vault", Tier::Free, PromptVariant::SecurityFocused).unwrap();
        let prompt = builder.build_prompt(&req, &policy(12_000)).unwrap();
        assert!(prompt.user.contains("exclusively on security"));
    }

    #[test]
    fn test_supervisor_prompt_lists_findings_by_severity() {
        let builder = PromptBuilder::builtin().unwrap();
        let result = ParsedResult {
            agent_id: "agent-a".into(),
            findings: vec![finding("Unused variable", Severity::Low), finding("Reentrancy", Severity::Critical)],
            false_positives: vec![],
            scores: Scores::default(),
            scores_reported: false,
            parse_strategy: ParseStrategy::Direct,
            confidence: 1.0,
            summary: None,
            risk_level: None,
            deployment_recommendation: None,
            notes: vec![],
            error: None,
            elapsed_ms: 10,
        };
        let prompt = builder
            .build_supervisor_prompt(&request("contract Vault {}"), &policy(12_000), &[result])
            .unwrap();
        let reentrancy = prompt.user.find("Reentrancy").unwrap();
        let unused = prompt.user.find("Unused variable").unwrap();
        assert!(reentrancy < unused);
        assert!(prompt.user.contains("agent-a"));
    }

    #[test]
    fn test_serialize_findings_drops_least_severe() {
        let findings: Vec<Finding> = (0..50)
            .map(|i| finding(&format!("Low issue number {}", i), Severity::Low))
            .chain(std::iter::once(finding("Critical issue", Severity::Critical)))
            .collect();
        let result = ParsedResult {
            agent_id: "a".into(),
            findings,
            false_positives: vec![],
            scores: Scores::default(),
            scores_reported: false,
            parse_strategy: ParseStrategy::Direct,
            confidence: 1.0,
            summary: None,
            risk_level: None,
            deployment_recommendation: None,
            notes: vec![],
            error: None,
            elapsed_ms: 0,
        };
        let text = serialize_findings(&[result], 200);
        assert!(text.contains("Critical issue"));
        assert!(text.contains("lower-severity findings omitted"));
    }

    #[test]
    fn test_serialize_thousands_of_findings_fits_budget() {
        let findings: Vec<Finding> = (0..5_000)
            .map(|i| finding(&format!("Unused variable {}", i), Severity::Info))
            .chain(std::iter::once(finding("Reentrancy in withdraw", Severity::High)))
            .collect();
        let result = ParsedResult {
            agent_id: "a".into(),
            findings,
            false_positives: vec![],
            scores: Scores::default(),
            scores_reported: false,
            parse_strategy: ParseStrategy::Direct,
            confidence: 1.0,
            summary: None,
            risk_level: None,
            deployment_recommendation: None,
            notes: vec![],
            error: None,
            elapsed_ms: 0,
        };
        let text = serialize_findings(&[result], 1_000);
        let listing = text.split('\n').next().unwrap();
        assert!(estimate_tokens(listing) <= 1_000);
        assert!(listing.contains("Reentrancy in withdraw"));
        let listed: serde_json::Value = serde_json::from_str(listing).unwrap();
        let kept = listed["findings"].as_array().unwrap().len();
        assert!(kept > 0 && kept < 5_001);
        assert!(text.ends_with(&format!("({} lower-severity findings omitted for length)", 5_001 - kept)));
    }

    #[test]
    fn test_system_prompt_carries_focus() {
        let builder = PromptBuilder::builtin().unwrap();
        let registry = crate::agents::AgentRegistry::builtin();
        let (agents, supervisor) = registry.select_agents(Tier::Free);
        assert!(builder.system_prompt(&agents[0]).contains(agents[0].specialty.focus()));
        assert!(builder.system_prompt(&supervisor).contains("verifying"));
    }
}
