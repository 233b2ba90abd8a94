use crate::agents::{AgentSpec, TierPolicy};
use crate::models::{
    AnalysisRequest, DeploymentRecommendation, ParseStrategy, ParsedResult, RiskLevel, SupervisorVerdict,
    VerdictSource,
};
use crate::normalizer::{heuristic, normalize};
use crate::pipeline::dispatcher::{AgentCall, Dispatcher};
use crate::prompts::PromptBuilder;
use super::dedup::deduplicate_findings;
use super::local::local_consensus;
use super::scoring::ScoringPolicy;
use tracing::{info, warn};

/// Attribution used for findings inferred from the contract source itself.
pub const SOURCE_HEURISTICS: &str = "source-heuristics";

/// Result of the verification stage.
#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    pub verdict: SupervisorVerdict,
    /// The supervisor's normalized reply, when a call was made.
    pub supervisor_result: Option<ParsedResult>,
    /// Why the supervisor's reply was not used, if it was not.
    pub fallback_reason: Option<String>,
}

/// Second-stage verification of the agents' findings by a supervisor model.
pub struct Supervisor<'a> {
    dispatcher: &'a Dispatcher,
    builder: &'a PromptBuilder,
    scoring: ScoringPolicy,
}

impl<'a> Supervisor<'a> {
    pub fn new(dispatcher: &'a Dispatcher, builder: &'a PromptBuilder, scoring: ScoringPolicy) -> Self {
        Self { dispatcher, builder, scoring }
    }

    /// Ask the supervisor to confirm, dispute or merge the agents' findings.
    /// Falls back to local consensus when the call fails or its reply could
    /// only be read heuristically.
    pub async fn verify(
        &self,
        request: &AnalysisRequest,
        policy: &TierPolicy,
        supervisor: &AgentSpec,
        results: &[ParsedResult],
    ) -> VerificationOutcome {
        let prompt = match self.builder.build_supervisor_prompt(request, policy, results) {
            Ok(prompt) => prompt,
            Err(e) => {
                let reason = format!("supervisor prompt could not be built: {}", e);
                return self.fallback(request, results, None, reason);
            }
        };

        let call = AgentCall {
            agent: supervisor.clone(),
            system: self.builder.system_prompt(supervisor),
        };
        let raw = self.dispatcher.call_one(&call, &prompt.user, policy.supervisor_timeout).await;
        let parsed = normalize(&raw);

        if let Some(error) = &parsed.error {
            let reason = format!("supervisor call failed: {}", error);
            return self.fallback(request, results, Some(parsed), reason);
        }
        if parsed.parse_strategy == ParseStrategy::Heuristic {
            let reason = "supervisor reply had no recoverable structure".to_string();
            return self.fallback(request, results, Some(parsed), reason);
        }

        let verdict = self.from_supervisor(supervisor, &parsed);
        info!(
            supervisor = %supervisor.id,
            strategy = %parsed.parse_strategy,
            verified = verdict.verified_findings.len(),
            false_positives = verdict.false_positives.len(),
            "Supervisor verdict accepted"
        );
        VerificationOutcome {
            verdict,
            supervisor_result: Some(parsed),
            fallback_reason: None,
        }
    }

    fn from_supervisor(&self, supervisor: &AgentSpec, parsed: &ParsedResult) -> SupervisorVerdict {
        let mut verified = deduplicate_findings(parsed.findings.clone());
        for finding in &mut verified {
            finding.verified = true;
        }
        let scores = if parsed.scores_reported {
            parsed.scores
        } else {
            self.scoring.scores(&verified)
        };
        let risk_level = parsed.risk_level.unwrap_or_else(|| RiskLevel::from_findings(&verified));
        SupervisorVerdict {
            deployment_recommendation: parsed
                .deployment_recommendation
                .unwrap_or_else(|| DeploymentRecommendation::for_risk(risk_level)),
            verified_findings: verified,
            false_positives: deduplicate_findings(parsed.false_positives.clone()),
            scores,
            risk_level,
            summary: parsed.summary.clone(),
            source: VerdictSource::Supervisor {
                agent_id: supervisor.id.clone(),
                strategy: parsed.parse_strategy,
            },
        }
    }

    fn fallback(
        &self,
        request: &AnalysisRequest,
        results: &[ParsedResult],
        supervisor_result: Option<ParsedResult>,
        reason: String,
    ) -> VerificationOutcome {
        warn!(reason = %reason, "Supervisor unavailable, using local consensus");
        let verdict = if results.iter().any(ParsedResult::succeeded) {
            local_consensus(results, &self.scoring)
        } else {
            heuristic_verdict(&request.source_text)
        };
        VerificationOutcome {
            verdict,
            supervisor_result,
            fallback_reason: Some(reason),
        }
    }
}

/// Verdict built from keyword heuristics over the contract source, used when
/// no model produced anything usable.
pub fn heuristic_verdict(source_text: &str) -> SupervisorVerdict {
    let synthesized = heuristic::synthesize(source_text, SOURCE_HEURISTICS);
    SupervisorVerdict {
        verified_findings: synthesized.findings,
        false_positives: Vec::new(),
        scores: synthesized.scores,
        risk_level: synthesized.risk_level,
        deployment_recommendation: DeploymentRecommendation::for_risk(synthesized.risk_level),
        summary: None,
        source: VerdictSource::HeuristicOnly,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use async_trait::async_trait;
    use crate::agents::{Specialty, Tier};
    use crate::errors::{QuorumError, RetryConfig};
    use crate::models::{Finding, PromptVariant, Scores, Severity};
    use crate::pipeline::dispatcher::DispatchSettings;
    use crate::pipeline::transport::AnalysisTransport;

    struct Scripted(Result<String, ()>);

    #[async_trait]
    impl AnalysisTransport for Scripted {
        async fn call(&self, _agent: &AgentSpec, _prompt: &str, _system: &str) -> Result<String, QuorumError> {
            self.0.clone().map_err(|_| QuorumError::Authentication("denied".into()))
        }
    }

    fn supervisor_spec() -> AgentSpec {
        AgentSpec {
            id: "sup".into(),
            display_name: "Supervisor".into(),
            specialty: Specialty::Verification,
            tier: Tier::Free,
            provider: "openrouter".into(),
            model: "m".into(),
        }
    }

    fn agent_result(agent: &str, title: &str) -> ParsedResult {
        let finding = Finding {
            id: format!("{}#1", agent),
            severity: Severity::High,
            category: crate::models::Category::Security,
            title: title.into(),
            description: String::new(),
            impact: String::new(),
            recommendation: String::new(),
            code_reference: None,
            reported_by: agent.into(),
            corroborated_by: vec![agent.into()],
            verified: false,
            analysis_note: None,
        };
        ParsedResult {
            agent_id: agent.into(),
            findings: vec![finding],
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
            elapsed_ms: 1,
        }
    }

    async fn verify_with(reply: Result<String, ()>, results: &[ParsedResult]) -> VerificationOutcome {
        let settings = DispatchSettings { max_concurrency: 1, retry: RetryConfig { max_retries: 0 } };
        let dispatcher = Dispatcher::new(Arc::new(Scripted(reply)), settings);
        let builder = PromptBuilder::builtin().unwrap();
        let request = AnalysisRequest::new(
            "contract Vault { function withdraw() external {} }",
            "Vault",
            Tier::Free,
            PromptVariant::Full,
        )
        .unwrap();
        let policy = TierPolicy::defaults_for(Tier::Free);
        Supervisor::new(&dispatcher, &builder, ScoringPolicy::default())
            .verify(&request, &policy, &supervisor_spec(), results)
            .await
    }

    #[tokio::test]
    async fn test_supervisor_reply_is_used() {
        let reply = r#"{"verified_findings": [{"title": "Reentrancy", "severity": "CRITICAL", "category": "security", "reported_by": ["a", "b"]}],
                        "false_positives": [], "scores": {"security": 40, "gas": 80, "quality": 70, "overall": 55},
                        "risk_level": "CRITICAL", "deployment_recommendation": "do_not_deploy"}"#;
        let results = [agent_result("a", "Reentrancy"), agent_result("b", "Reentrancy")];
        let outcome = verify_with(Ok(reply.to_string()), &results).await;
        assert!(outcome.fallback_reason.is_none());
        assert!(outcome.verdict.supervisor_verified());
        assert_eq!(outcome.verdict.scores.overall, 55);
        assert!(outcome.verdict.verified_findings[0].verified);
    }

    #[tokio::test]
    async fn test_supervisor_title_variants_are_penalized_once() {
        let reply = r#"{"verified_findings": [
                          {"title": "Reentrancy in withdraw()", "severity": "HIGH", "category": "security", "reported_by": ["a"]},
                          {"title": "reentrancy in withdraw", "severity": "HIGH", "category": "security", "reported_by": ["b"]}
                        ]}"#;
        let results = [agent_result("a", "Reentrancy in withdraw()"), agent_result("b", "reentrancy in withdraw")];
        let outcome = verify_with(Ok(reply.to_string()), &results).await;
        let findings = &outcome.verdict.verified_findings;
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].corroborated_by, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(outcome.verdict.scores.overall, 80);
    }

    #[tokio::test]
    async fn test_failed_supervisor_falls_back_to_local() {
        let results = [agent_result("a", "Reentrancy"), agent_result("b", "reentrancy")];
        let outcome = verify_with(Err(()), &results).await;
        assert!(outcome.fallback_reason.is_some());
        assert_eq!(outcome.verdict.source, VerdictSource::LocalConsensus);
        assert_eq!(outcome.verdict.scores.overall, 80);
    }

    #[tokio::test]
    async fn test_heuristic_supervisor_reply_falls_back() {
        let results = [agent_result("a", "Reentrancy")];
        let outcome = verify_with(Ok("I think the contract is fine.".into()), &results).await;
        assert_eq!(outcome.verdict.source, VerdictSource::LocalConsensus);
        assert_eq!(
            outcome.supervisor_result.map(|r| r.parse_strategy),
            Some(ParseStrategy::Heuristic)
        );
    }

    #[test]
    fn test_heuristic_verdict_over_source() {
        let verdict = heuristic_verdict("function kill() external { selfdestruct(payable(owner)); }");
        assert_eq!(verdict.source, VerdictSource::HeuristicOnly);
        assert_eq!(verdict.verified_findings.len(), 1);
        assert_eq!(verdict.scores.overall, 65);
    }
}
