use serde::{Deserialize, Serialize};
use crate::models::{Category, Finding, Scores, Severity};

/// Score deductions applied per confirmed finding during local consensus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringPolicy {
    pub critical_penalty: u8,
    pub high_penalty: u8,
    pub medium_penalty: u8,
    pub floor: u8,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            critical_penalty: 30,
            high_penalty: 20,
            medium_penalty: 10,
            floor: 10,
        }
    }
}

impl ScoringPolicy {
    pub fn penalty(&self, severity: Severity) -> u32 {
        match severity {
            Severity::Critical => self.critical_penalty as u32,
            Severity::High => self.high_penalty as u32,
            Severity::Medium => self.medium_penalty as u32,
            Severity::Low | Severity::Info => 0,
        }
    }

    /// 100 minus the penalties of `findings`, never below the floor.
    pub fn score<'a>(&self, findings: impl IntoIterator<Item = &'a Finding>) -> u8 {
        let total: u32 = findings.into_iter().map(|f| self.penalty(f.severity)).sum();
        100u32.saturating_sub(total).max(self.floor.min(100) as u32) as u8
    }

    /// Category scores over each category's findings, plus the overall score.
    pub fn scores(&self, findings: &[Finding]) -> Scores {
        let in_category = |category: Category| findings.iter().filter(move |f| f.category == category);
        Scores {
            security: self.score(in_category(Category::Security)),
            gas: self.score(in_category(Category::Gas)),
            quality: self.score(in_category(Category::Quality)),
            overall: self.score(findings),
        }
    }
}
