use serde::{Deserialize, Serialize};
use super::finding::{Finding, Severity};
use super::parsed::ParseStrategy;

/// Score substituted when no model produced a numeric score.
pub const DEFAULT_SCORE: u8 = 75;

/// Category scores plus the aggregate, each clamped to 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    pub security: u8,
    pub gas: u8,
    pub quality: u8,
    pub overall: u8,
}

impl Scores {
    pub fn uniform(value: u8) -> Self {
        let v = value.min(100);
        Self { security: v, gas: v, quality: v, overall: v }
    }
}

impl Default for Scores {
    fn default() -> Self {
        Self::uniform(DEFAULT_SCORE)
    }
}

/// Clamp any numeric score reading into the 0..=100 range.
pub fn clamp_score(value: f64) -> u8 {
    if value.is_nan() {
        return DEFAULT_SCORE;
    }
    value.round().clamp(0.0, 100.0) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }

    pub fn parse_lenient(raw: &str) -> Option<RiskLevel> {
        let lower = raw.trim().to_lowercase();
        if lower.starts_with("crit") || lower.contains("severe") {
            Some(RiskLevel::Critical)
        } else if lower.starts_with("high") {
            Some(RiskLevel::High)
        } else if lower.starts_with("med") || lower.starts_with("moderate") {
            Some(RiskLevel::Medium)
        } else if lower.starts_with("low") || lower.starts_with("minimal") || lower == "none" {
            Some(RiskLevel::Low)
        } else {
            None
        }
    }

    /// Risk implied by the most severe finding in a set.
    pub fn from_findings<'a>(findings: impl IntoIterator<Item = &'a Finding>) -> RiskLevel {
        let worst = findings.into_iter().map(|f| f.severity).min();
        match worst {
            Some(Severity::Critical) => RiskLevel::Critical,
            Some(Severity::High) => RiskLevel::High,
            Some(Severity::Medium) => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentRecommendation {
    Ready,
    ReviewRequired,
    DoNotDeploy,
}

impl DeploymentRecommendation {
    pub fn for_risk(risk: RiskLevel) -> Self {
        match risk {
            RiskLevel::Critical | RiskLevel::High => DeploymentRecommendation::DoNotDeploy,
            RiskLevel::Medium => DeploymentRecommendation::ReviewRequired,
            RiskLevel::Low => DeploymentRecommendation::Ready,
        }
    }

    /// Word-level match over the phrasings models emit; negation outranks
    /// review, which outranks approval.
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        const NEGATIVE: &[&[&str]] = &[
            &["not"], &["dont"], &["don", "t"], &["block"], &["blocked"], &["reject"], &["rejected"], &["unsafe"],
        ];
        const REVIEW: &[&[&str]] = &[&["review"], &["caution"], &["fix"], &["fixes"], &["conditional"]];
        const READY: &[&[&str]] = &[&["ready"], &["safe"], &["approve"], &["approved"], &["deploy"]];

        let lower = raw.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let mentions = |phrases: &[&[&str]]| {
            phrases.iter().any(|phrase| words.windows(phrase.len()).any(|w| w == *phrase))
        };

        if mentions(NEGATIVE) {
            Some(DeploymentRecommendation::DoNotDeploy)
        } else if mentions(REVIEW) {
            Some(DeploymentRecommendation::ReviewRequired)
        } else if mentions(READY) {
            Some(DeploymentRecommendation::Ready)
        } else {
            None
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            DeploymentRecommendation::Ready => "Ready for deployment",
            DeploymentRecommendation::ReviewRequired => "Review and address findings before deployment",
            DeploymentRecommendation::DoNotDeploy => "Do not deploy until critical and high severity issues are resolved",
        }
    }
}

/// Which path produced the verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerdictSource {
    Supervisor { agent_id: String, strategy: ParseStrategy },
    LocalConsensus,
    HeuristicOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisorVerdict {
    pub verified_findings: Vec<Finding>,
    pub false_positives: Vec<Finding>,
    pub scores: Scores,
    pub risk_level: RiskLevel,
    pub deployment_recommendation: DeploymentRecommendation,
    pub summary: Option<String>,
    pub source: VerdictSource,
}

impl SupervisorVerdict {
    pub fn supervisor_verified(&self) -> bool {
        matches!(self.source, VerdictSource::Supervisor { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_score_bounds() {
        assert_eq!(clamp_score(-5.0), 0);
        assert_eq!(clamp_score(140.0), 100);
        assert_eq!(clamp_score(72.4), 72);
        assert_eq!(clamp_score(f64::NAN), DEFAULT_SCORE);
    }

    #[test]
    fn test_risk_level_parse() {
        assert_eq!(RiskLevel::parse_lenient("Critical risk"), Some(RiskLevel::Critical));
        assert_eq!(RiskLevel::parse_lenient("medium"), Some(RiskLevel::Medium));
        assert_eq!(RiskLevel::parse_lenient("unclear"), None);
    }

    #[test]
    fn test_deployment_for_risk() {
        assert_eq!(DeploymentRecommendation::for_risk(RiskLevel::High), DeploymentRecommendation::DoNotDeploy);
        assert_eq!(DeploymentRecommendation::for_risk(RiskLevel::Medium), DeploymentRecommendation::ReviewRequired);
        assert_eq!(DeploymentRecommendation::for_risk(RiskLevel::Low), DeploymentRecommendation::Ready);
    }

    #[test]
    fn test_deployment_parse_negation_wins() {
        assert_eq!(
            DeploymentRecommendation::parse_lenient("Do NOT deploy"),
            Some(DeploymentRecommendation::DoNotDeploy)
        );
        assert_eq!(
            DeploymentRecommendation::parse_lenient("deploy after review"),
            Some(DeploymentRecommendation::ReviewRequired)
        );
    }

    #[test]
    fn test_deployment_parse_matches_whole_words() {
        assert_eq!(
            DeploymentRecommendation::parse_lenient("Safe to deploy; nothing critical found"),
            Some(DeploymentRecommendation::Ready)
        );
        assert_eq!(
            DeploymentRecommendation::parse_lenient("do_not_deploy"),
            Some(DeploymentRecommendation::DoNotDeploy)
        );
        assert_eq!(
            DeploymentRecommendation::parse_lenient("Don't deploy yet"),
            Some(DeploymentRecommendation::DoNotDeploy)
        );
        assert_eq!(
            DeploymentRecommendation::parse_lenient("note: review first"),
            Some(DeploymentRecommendation::ReviewRequired)
        );
        assert_eq!(
            DeploymentRecommendation::parse_lenient("ready_for_deployment"),
            Some(DeploymentRecommendation::Ready)
        );
        assert_eq!(DeploymentRecommendation::parse_lenient("prefixed"), None);
    }
}
