use tokio::sync::mpsc;
use crate::agents::Tier;
use crate::models::{ParseStrategy, RiskLevel};
use super::state::AuditStage;

/// Progress messages streamed from a running audit to whoever renders them.
#[derive(Debug, Clone, PartialEq)]
pub enum AuditEvent {
    AuditStarted {
        audit_id: String,
        contract: String,
        tier: Tier,
        agents: Vec<String>,
        supervisor: String,
    },
    StageEntered {
        stage: AuditStage,
    },
    AgentStarted {
        agent_id: String,
    },
    AgentReplied {
        agent_id: String,
        elapsed_ms: u64,
    },
    AgentFailed {
        agent_id: String,
        error: String,
    },
    AgentNormalized {
        agent_id: String,
        strategy: ParseStrategy,
        findings: usize,
    },
    SupervisorFallback {
        reason: String,
    },
    AuditCompleted {
        audit_id: String,
        overall_score: u8,
        risk_level: RiskLevel,
        findings: usize,
        supervisor_verified: bool,
    },
}

pub type EventSender = mpsc::UnboundedSender<AuditEvent>;

/// Send an event if a listener is attached. A closed channel is not an error.
pub fn emit(tx: &Option<EventSender>, event: AuditEvent) {
    if let Some(tx) = tx {
        let _ = tx.send(event);
    }
}
