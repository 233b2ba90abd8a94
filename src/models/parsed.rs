use std::time::Duration;

use serde::{Deserialize, Serialize};
use super::finding::Finding;
use super::verdict::{DeploymentRecommendation, RiskLevel, Scores};
use crate::errors::QuorumError;

/// Which normalizer stage recovered structure from a reply, in decreasing confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseStrategy {
    Direct,
    Extracted,
    Repaired,
    Heuristic,
}

impl ParseStrategy {
    pub fn confidence(&self) -> f32 {
        match self {
            ParseStrategy::Direct => 1.0,
            ParseStrategy::Extracted => 0.85,
            ParseStrategy::Repaired => 0.6,
            ParseStrategy::Heuristic => 0.25,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParseStrategy::Direct => "direct",
            ParseStrategy::Extracted => "extracted",
            ParseStrategy::Repaired => "repaired",
            ParseStrategy::Heuristic => "heuristic",
        }
    }
}

impl std::fmt::Display for ParseStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    RateLimited,
    Authentication,
    Transport,
    MalformedEnvelope,
    EmptyPayload,
    Internal,
}

/// Typed per-agent call failure carried inside a [`RawAgentResponse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl TransportFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(FailureKind::Timeout, format!("no reply within {}ms", after.as_millis()))
    }
}

impl From<&QuorumError> for TransportFailure {
    fn from(err: &QuorumError) -> Self {
        let kind = match err {
            QuorumError::Timeout(_) => FailureKind::Timeout,
            QuorumError::RateLimit(_) | QuorumError::Billing(_) => FailureKind::RateLimited,
            QuorumError::Authentication(_) => FailureKind::Authentication,
            QuorumError::EmptyResponse(_) => FailureKind::EmptyPayload,
            QuorumError::LLMApi(_) | QuorumError::Json(_) => FailureKind::MalformedEnvelope,
            QuorumError::Network(_) | QuorumError::Io(_) => FailureKind::Transport,
            _ => FailureKind::Internal,
        };
        Self::new(kind, err.to_string())
    }
}

impl std::fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Outcome of one agent call, written exactly once by the dispatcher task that owns it.
#[derive(Debug, Clone)]
pub struct RawAgentResponse {
    pub agent_id: String,
    pub outcome: Result<String, TransportFailure>,
    pub elapsed: Duration,
}

impl RawAgentResponse {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// One agent's reply after normalization into the fixed finding schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedResult {
    pub agent_id: String,
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub false_positives: Vec<Finding>,
    pub scores: Scores,
    /// True when at least one numeric score came from the model itself.
    pub scores_reported: bool,
    pub parse_strategy: ParseStrategy,
    pub confidence: f32,
    pub summary: Option<String>,
    pub risk_level: Option<RiskLevel>,
    pub deployment_recommendation: Option<DeploymentRecommendation>,
    /// Coercions and degradations applied while normalizing.
    #[serde(default)]
    pub notes: Vec<String>,
    pub error: Option<TransportFailure>,
    pub elapsed_ms: u64,
}

impl ParsedResult {
    /// Degraded result standing in for an agent whose call failed.
    pub fn failed(agent_id: &str, failure: TransportFailure, elapsed: Duration) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            findings: Vec::new(),
            false_positives: Vec::new(),
            scores: Scores::default(),
            scores_reported: false,
            parse_strategy: ParseStrategy::Heuristic,
            confidence: 0.0,
            summary: None,
            risk_level: None,
            deployment_recommendation: None,
            notes: vec![format!("agent call failed: {}", failure)],
            error: Some(failure),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}
