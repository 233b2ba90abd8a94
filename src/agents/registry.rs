use std::sync::LazyLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use crate::errors::{InputError, QuorumError};
use crate::models::PromptVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Premium,
}

impl Tier {
    pub const ALL: [Tier; 2] = [Tier::Free, Tier::Premium];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Premium => "premium",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "premium" | "paid" => Ok(Self::Premium),
            other => Err(InputError::UnknownTier(other.to_string())),
        }
    }
}

/// What an agent is asked to focus on. `Verification` marks a tier's supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Specialty {
    Security,
    Gas,
    Quality,
    General,
    Verification,
}

impl Specialty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Security => "security",
            Self::Gas => "gas",
            Self::Quality => "quality",
            Self::General => "general",
            Self::Verification => "verification",
        }
    }

    /// One-line focus hint woven into the agent's system prompt.
    pub fn focus(&self) -> &'static str {
        match self {
            Self::Security => "Prioritize exploitable vulnerabilities and loss-of-funds paths.",
            Self::Gas => "Pay particular attention to storage layout and gas-heavy loops.",
            Self::Quality => "Pay particular attention to maintainability and standards compliance.",
            Self::General => "Cover security, gas and code quality evenly.",
            Self::Verification => "Verify the findings of other auditors against the source.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub id: String,
    pub display_name: String,
    pub specialty: Specialty,
    pub tier: Tier,
    /// Backend the transport routes this agent to ("openrouter", "openai", "anthropic").
    pub provider: String,
    pub model: String,
}

impl AgentSpec {
    fn builtin(id: &str, display_name: &str, specialty: Specialty, tier: Tier, provider: &str, model: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            specialty,
            tier,
            provider: provider.to_string(),
            model: model.to_string(),
        }
    }

    pub fn is_supervisor(&self) -> bool {
        self.specialty == Specialty::Verification
    }
}

/// Per-tier knobs: prompt budget, call deadlines and analysis depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierPolicy {
    pub token_budget: usize,
    pub supervisor_token_budget: usize,
    #[serde(with = "duration_secs")]
    pub call_timeout: Duration,
    #[serde(with = "duration_secs")]
    pub supervisor_timeout: Duration,
    pub analysis_depth: String,
    pub prompt_variant: PromptVariant,
}

impl TierPolicy {
    pub fn defaults_for(tier: Tier) -> Self {
        match tier {
            Tier::Free => Self {
                token_budget: 12_000,
                supervisor_token_budget: 16_000,
                call_timeout: Duration::from_secs(60),
                supervisor_timeout: Duration::from_secs(90),
                analysis_depth: "standard".to_string(),
                prompt_variant: PromptVariant::Full,
            },
            Tier::Premium => Self {
                token_budget: 48_000,
                supervisor_token_budget: 64_000,
                call_timeout: Duration::from_secs(120),
                supervisor_timeout: Duration::from_secs(180),
                analysis_depth: "deep".to_string(),
                prompt_variant: PromptVariant::Full,
            },
        }
    }
}

mod duration_secs {
    use std::time::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

pub static DEFAULT_AGENTS: LazyLock<Vec<AgentSpec>> = LazyLock::new(|| vec![
    AgentSpec::builtin(
        "deepseek-chat", "DeepSeek V3", Specialty::Security, Tier::Free,
        "openrouter", "deepseek/deepseek-chat-v3-0324:free",
    ),
    AgentSpec::builtin(
        "gemini-flash", "Gemini 2.0 Flash", Specialty::General, Tier::Free,
        "openrouter", "google/gemini-2.0-flash-exp:free",
    ),
    AgentSpec::builtin(
        "llama-70b", "Llama 3.3 70B", Specialty::Gas, Tier::Free,
        "openrouter", "meta-llama/llama-3.3-70b-instruct:free",
    ),
    AgentSpec::builtin(
        "qwen-supervisor", "Qwen 2.5 72B", Specialty::Verification, Tier::Free,
        "openrouter", "qwen/qwen-2.5-72b-instruct:free",
    ),
    AgentSpec::builtin(
        "claude-sonnet", "Claude Sonnet", Specialty::Security, Tier::Premium,
        "openrouter", "anthropic/claude-sonnet-4",
    ),
    AgentSpec::builtin(
        "gpt-4o", "GPT-4o", Specialty::General, Tier::Premium,
        "openrouter", "openai/gpt-4o",
    ),
    AgentSpec::builtin(
        "gemini-pro", "Gemini 2.5 Pro", Specialty::Quality, Tier::Premium,
        "openrouter", "google/gemini-2.5-pro",
    ),
    AgentSpec::builtin(
        "premium-supervisor", "Claude Opus Supervisor", Specialty::Verification, Tier::Premium,
        "openrouter", "anthropic/claude-opus-4",
    ),
]);

#[derive(Debug, Clone)]
struct TierRoster {
    agents: Vec<AgentSpec>,
    supervisor: AgentSpec,
}

/// Immutable agent roster, built once at start-up and shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    free: TierRoster,
    premium: TierRoster,
}

impl AgentRegistry {
    pub fn builtin() -> Self {
        // The built-in roster always has both tiers with a supervisor each.
        match Self::from_specs(DEFAULT_AGENTS.clone()) {
            Ok(registry) => registry,
            Err(e) => unreachable!("built-in agent roster is invalid: {}", e),
        }
    }

    /// Build a registry from an explicit list. Each tier needs at least one analysis
    /// agent and exactly one supervisor; agent ids must be unique.
    pub fn from_specs(specs: Vec<AgentSpec>) -> Result<Self, QuorumError> {
        let mut seen = std::collections::HashSet::new();
        for spec in &specs {
            if spec.id.trim().is_empty() {
                return Err(QuorumError::Config("agent id must not be empty".into()));
            }
            if !seen.insert(spec.id.clone()) {
                return Err(QuorumError::Config(format!("duplicate agent id: {}", spec.id)));
            }
        }

        let free = Self::roster(&specs, Tier::Free)?;
        let premium = Self::roster(&specs, Tier::Premium)?;
        Ok(Self { free, premium })
    }

    /// Overlay custom agents onto the built-in roster. A tier the custom list does
    /// not mention keeps its built-in agents.
    pub fn with_overrides(custom: Vec<AgentSpec>) -> Result<Self, QuorumError> {
        if custom.is_empty() {
            return Ok(Self::builtin());
        }
        let mut specs = custom;
        for tier in Tier::ALL {
            if !specs.iter().any(|s| s.tier == tier) {
                specs.extend(DEFAULT_AGENTS.iter().filter(|s| s.tier == tier).cloned());
            }
        }
        Self::from_specs(specs)
    }

    fn roster(specs: &[AgentSpec], tier: Tier) -> Result<TierRoster, QuorumError> {
        let (supervisors, mut agents): (Vec<AgentSpec>, Vec<AgentSpec>) = specs
            .iter()
            .filter(|s| s.tier == tier)
            .cloned()
            .partition(|s| s.is_supervisor());

        if agents.is_empty() {
            return Err(QuorumError::Config(format!("tier '{}' has no analysis agents", tier)));
        }
        let mut supervisors = supervisors.into_iter();
        let supervisor = supervisors.next().ok_or_else(|| {
            QuorumError::Config(format!("tier '{}' has no supervisor agent", tier))
        })?;
        if supervisors.next().is_some() {
            return Err(QuorumError::Config(format!("tier '{}' has more than one supervisor", tier)));
        }
        agents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(TierRoster { agents, supervisor })
    }

    fn tier(&self, tier: Tier) -> &TierRoster {
        match tier {
            Tier::Free => &self.free,
            Tier::Premium => &self.premium,
        }
    }

    /// Analysis agents for a tier (sorted by id) and that tier's supervisor.
    pub fn select_agents(&self, tier: Tier) -> (Vec<AgentSpec>, AgentSpec) {
        let roster = self.tier(tier);
        (roster.agents.clone(), roster.supervisor.clone())
    }

    pub fn find(&self, agent_id: &str) -> Option<&AgentSpec> {
        self.all().find(|a| a.id == agent_id)
    }

    pub fn all(&self) -> impl Iterator<Item = &AgentSpec> {
        [&self.free, &self.premium]
            .into_iter()
            .flat_map(|r| r.agents.iter().chain(std::iter::once(&r.supervisor)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(id: &str, tier: Tier, specialty: Specialty) -> AgentSpec {
        AgentSpec::builtin(id, id, specialty, tier, "openrouter", "test/model")
    }

    #[test]
    fn test_builtin_has_both_tiers() {
        let registry = AgentRegistry::builtin();
        for tier in Tier::ALL {
            let (agents, supervisor) = registry.select_agents(tier);
            assert!(!agents.is_empty());
            assert!(supervisor.is_supervisor());
            assert!(agents.iter().all(|a| a.tier == tier && !a.is_supervisor()));
        }
    }

    #[test]
    fn test_select_agents_sorted_by_id() {
        let registry = AgentRegistry::builtin();
        let (agents, _) = registry.select_agents(Tier::Free);
        let ids: Vec<_> = agents.iter().map(|a| a.id.clone()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let specs = vec![
            spec("a", Tier::Free, Specialty::Security),
            spec("a", Tier::Free, Specialty::Gas),
            spec("sup", Tier::Free, Specialty::Verification),
        ];
        assert!(AgentRegistry::from_specs(specs).is_err());
    }

    #[test]
    fn test_tier_without_supervisor_rejected() {
        let specs = vec![
            spec("a", Tier::Free, Specialty::Security),
            spec("b", Tier::Premium, Specialty::Security),
            spec("sup", Tier::Premium, Specialty::Verification),
        ];
        let err = AgentRegistry::from_specs(specs).unwrap_err();
        assert!(err.to_string().contains("no supervisor"));
    }

    #[test]
    fn test_overrides_keep_unmentioned_tier() {
        let custom = vec![
            spec("local-a", Tier::Free, Specialty::Security),
            spec("local-sup", Tier::Free, Specialty::Verification),
        ];
        let registry = AgentRegistry::with_overrides(custom).unwrap();
        let (free, sup) = registry.select_agents(Tier::Free);
        assert_eq!(free.len(), 1);
        assert_eq!(sup.id, "local-sup");
        let (premium, _) = registry.select_agents(Tier::Premium);
        assert!(premium.iter().any(|a| a.id == "gpt-4o"));
    }

    #[test]
    fn test_tier_from_str() {
        assert_eq!("Premium".parse::<Tier>().unwrap(), Tier::Premium);
        assert_eq!("gold".parse::<Tier>().unwrap_err(), InputError::UnknownTier("gold".into()));
    }

    #[test]
    fn test_tier_policy_defaults() {
        let free = TierPolicy::defaults_for(Tier::Free);
        let premium = TierPolicy::defaults_for(Tier::Premium);
        assert!(premium.token_budget > free.token_budget);
        assert!(free.supervisor_timeout > free.call_timeout);
    }
}
