use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::errors::QuorumError;

/// Lifecycle of one audit invocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStage {
    Pending,
    Dispatched,
    Normalizing,
    Verifying,
    VerifyingFallback,
    Consolidated,
}

impl AuditStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Dispatched => "DISPATCHED",
            Self::Normalizing => "NORMALIZING",
            Self::Verifying => "VERIFYING",
            Self::VerifyingFallback => "VERIFYING_FALLBACK",
            Self::Consolidated => "CONSOLIDATED",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Pending => "Preparing prompt",
            Self::Dispatched => "Querying agents",
            Self::Normalizing => "Normalizing replies",
            Self::Verifying => "Supervisor verification",
            Self::VerifyingFallback => "Local consensus",
            Self::Consolidated => "Report consolidated",
        }
    }

    pub fn can_advance_to(&self, next: AuditStage) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Dispatched)
                | (Self::Dispatched, Self::Normalizing)
                | (Self::Normalizing, Self::Verifying)
                | (Self::Verifying, Self::Consolidated)
                | (Self::Verifying, Self::VerifyingFallback)
                | (Self::VerifyingFallback, Self::Consolidated)
        )
    }
}

impl std::fmt::Display for AuditStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditState {
    pub stage: AuditStage,
    pub history: Vec<AuditStage>,
    pub started_at: DateTime<Utc>,
}

impl AuditState {
    pub fn new() -> Self {
        Self {
            stage: AuditStage::Pending,
            history: vec![AuditStage::Pending],
            started_at: Utc::now(),
        }
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    pub fn advance(&mut self, next: AuditStage) -> Result<(), QuorumError> {
        if !self.stage.can_advance_to(next) {
            return Err(QuorumError::Internal(format!(
                "invalid audit stage transition {} -> {}",
                self.stage, next
            )));
        }
        self.stage = next;
        self.history.push(next);
        Ok(())
    }

    pub fn used_fallback(&self) -> bool {
        self.history.contains(&AuditStage::VerifyingFallback)
    }
}

impl Default for AuditState {
    fn default() -> Self {
        Self::new()
    }
}
