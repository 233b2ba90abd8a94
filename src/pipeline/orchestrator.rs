use std::sync::Arc;

use chrono::Utc;
use crate::agents::{AgentRegistry, Tier, TierPolicy};
use crate::config::QuorumConfig;
use crate::consensus::{ScoringPolicy, Supervisor};
use crate::errors::{InputError, QuorumError};
use crate::models::{AnalysisRequest, ConsolidatedReport, ParsedResult};
use crate::normalizer::normalize;
use crate::prompts::{PromptBuilder, PromptLoader};
use crate::reporting::{consolidate, ConsolidationContext};
use crate::sink::ReportSink;
use super::dispatcher::{AgentCall, DispatchSettings, Dispatcher};
use super::events::{emit, AuditEvent, EventSender};
use super::state::{AuditStage, AuditState};
use super::transport::{AnalysisTransport, ProviderTransport};
use tracing::{error, info, warn};

/// Tunables for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub free: TierPolicy,
    pub premium: TierPolicy,
    pub scoring: ScoringPolicy,
    pub dispatch: DispatchSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            free: TierPolicy::defaults_for(Tier::Free),
            premium: TierPolicy::defaults_for(Tier::Premium),
            scoring: ScoringPolicy::default(),
            dispatch: DispatchSettings::default(),
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &QuorumConfig) -> Self {
        Self {
            free: config.tier_policy(Tier::Free),
            premium: config.tier_policy(Tier::Premium),
            scoring: config.scoring_policy(),
            dispatch: config.dispatch_settings(),
        }
    }

    pub fn policy(&self, tier: Tier) -> &TierPolicy {
        match tier {
            Tier::Free => &self.free,
            Tier::Premium => &self.premium,
        }
    }
}

/// Runs audits end to end: prompt, fan-out, normalization, verification,
/// consolidation. One instance can serve many audits concurrently.
pub struct AuditPipeline {
    registry: Arc<AgentRegistry>,
    builder: Arc<PromptBuilder>,
    dispatcher: Dispatcher,
    settings: PipelineSettings,
    sink: Option<Arc<dyn ReportSink>>,
    events: Option<EventSender>,
}

impl AuditPipeline {
    pub fn new(
        registry: Arc<AgentRegistry>,
        builder: Arc<PromptBuilder>,
        transport: Arc<dyn AnalysisTransport>,
        settings: PipelineSettings,
    ) -> Self {
        let dispatcher = Dispatcher::new(transport, settings.dispatch.clone());
        Self { registry, builder, dispatcher, settings, sink: None, events: None }
    }

    /// Pipeline wired to the hosted model APIs described by `config`.
    pub fn from_config(config: &QuorumConfig) -> Result<Self, QuorumError> {
        let registry = Arc::new(config.registry()?);
        let loader = PromptLoader::new(config.prompts_dir());
        let builder = Arc::new(PromptBuilder::new(loader)?);
        let transport: Arc<dyn AnalysisTransport> = Arc::new(ProviderTransport::new(&config.llm(), registry.all()));
        Ok(Self::new(registry, builder, transport, PipelineSettings::from_config(config)))
    }

    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_events(mut self, tx: Option<EventSender>) -> Self {
        self.dispatcher = self.dispatcher.with_events(tx.clone());
        self.events = tx;
        self
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Audit `source_text` with the agents of `tier`. Only input errors are
    /// returned; agent, supervisor and persistence failures degrade the report.
    pub async fn run_audit(
        &self,
        source_text: &str,
        contract_name: &str,
        tier: Tier,
    ) -> Result<ConsolidatedReport, InputError> {
        let variant = self.settings.policy(tier).prompt_variant;
        let request = AnalysisRequest::new(source_text, contract_name, tier, variant)?;
        self.run(&request).await
    }

    pub async fn run(&self, request: &AnalysisRequest) -> Result<ConsolidatedReport, InputError> {
        let audit_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let mut state = AuditState::new();
        let policy = self.settings.policy(request.tier).clone();
        let (agents, supervisor) = self.registry.select_agents(request.tier);

        let prompt = self.builder.build_prompt(request, &policy)?;
        info!(
            audit_id = %audit_id,
            contract = %request.contract_name,
            tier = %request.tier,
            agents = agents.len(),
            prompt_tokens = prompt.estimated_tokens,
            "Audit started"
        );
        emit(&self.events, AuditEvent::AuditStarted {
            audit_id: audit_id.clone(),
            contract: request.contract_name.clone(),
            tier: request.tier,
            agents: agents.iter().map(|a| a.id.clone()).collect(),
            supervisor: supervisor.id.clone(),
        });

        self.enter(&mut state, AuditStage::Dispatched);
        let calls: Vec<AgentCall> = agents
            .iter()
            .map(|agent| AgentCall { agent: agent.clone(), system: self.builder.system_prompt(agent) })
            .collect();
        let raw = self.dispatcher.dispatch(calls, Arc::from(prompt.user.as_str()), policy.call_timeout).await;

        self.enter(&mut state, AuditStage::Normalizing);
        let results: Vec<ParsedResult> = raw.iter().map(normalize).collect();
        for result in results.iter().filter(|r| r.succeeded()) {
            emit(&self.events, AuditEvent::AgentNormalized {
                agent_id: result.agent_id.clone(),
                strategy: result.parse_strategy,
                findings: result.findings.len(),
            });
        }
        let succeeded = results.iter().filter(|r| r.succeeded()).count();
        if succeeded == 0 {
            warn!(audit_id = %audit_id, "Every analysis agent failed");
        }

        self.enter(&mut state, AuditStage::Verifying);
        let outcome = Supervisor::new(&self.dispatcher, &self.builder, self.settings.scoring)
            .verify(request, &policy, &supervisor, &results)
            .await;
        if let Some(reason) = &outcome.fallback_reason {
            emit(&self.events, AuditEvent::SupervisorFallback { reason: reason.clone() });
            self.enter(&mut state, AuditStage::VerifyingFallback);
        }

        self.enter(&mut state, AuditStage::Consolidated);
        let ctx = ConsolidationContext {
            audit_id: audit_id.clone(),
            contract_name: request.contract_name.clone(),
            tier: request.tier,
            agents,
            supervisor,
            supervisor_result: outcome.supervisor_result,
            started_at,
            completed_at: Utc::now(),
            stages: state.history.clone(),
            omitted_sections: prompt.omitted_sections,
        };
        let report = consolidate(&results, &outcome.verdict, &ctx);

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.persist(&report).await {
                warn!(audit_id = %audit_id, error = %e, "Failed to persist report");
            }
        }

        info!(
            audit_id = %audit_id,
            overall = report.scores.overall,
            risk = %report.risk_level,
            findings = report.statistics.total_findings,
            supervisor_verified = report.metadata.supervisor_verified,
            "Audit complete"
        );
        emit(&self.events, AuditEvent::AuditCompleted {
            audit_id,
            overall_score: report.scores.overall,
            risk_level: report.risk_level,
            findings: report.statistics.total_findings,
            supervisor_verified: report.metadata.supervisor_verified,
        });
        Ok(report)
    }

    fn enter(&self, state: &mut AuditState, stage: AuditStage) {
        if let Err(e) = state.advance(stage) {
            error!(error = %e, "Invalid audit stage transition");
            return;
        }
        emit(&self.events, AuditEvent::StageEntered { stage });
    }
}
